//! Per-destination health counters and the snapshots built from them

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters for a single loaded destination
///
/// Mutated only by the manager during dispatch.
#[derive(Debug, Default)]
pub struct DestinationHealth {
    /// Events the destination accepted
    events_processed: AtomicU64,
    /// Handler or hook failures
    error_count: AtomicU64,
    last_error: Mutex<Option<String>>,
    last_used: Mutex<Option<DateTime<Utc>>>,
}

impl DestinationHealth {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    pub fn inc_events_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Count a failure and remember its message
    pub fn record_error(&self, message: impl Into<String>) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stamp the destination as used now
    pub fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }

    pub fn last_used(&self) -> Option<DateTime<Utc>> {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Status snapshot of one destination (for reporting)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationStatus {
    #[serde(rename = "type")]
    pub destination_type: String,
    pub loaded: bool,
    pub events_processed: u64,
    pub error_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

/// Aggregate over every tracked destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    /// Destinations the manager attempted to load
    pub total_destinations: usize,
    pub loaded_destinations: usize,
    pub total_events_processed: u64,
    pub total_errors: u64,
    /// Destinations with at least one error
    pub destinations_with_errors: usize,
}

impl HealthSummary {
    /// Fold a set of statuses into a summary
    pub fn from_statuses<'a>(statuses: impl IntoIterator<Item = &'a DestinationStatus>) -> Self {
        statuses
            .into_iter()
            .fold(Self::default(), |mut summary, status| {
                summary.total_destinations += 1;
                if status.loaded {
                    summary.loaded_destinations += 1;
                }
                summary.total_events_processed += status.events_processed;
                summary.total_errors += status.error_count;
                if status.error_count > 0 {
                    summary.destinations_with_errors += 1;
                }
                summary
            })
    }
}

/// Result of a connection probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

/// Connection probe outcome for one destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    #[serde(rename = "type")]
    pub destination_type: String,
    pub status: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn new(destination_type: impl Into<String>, status: ConnectionState) -> Self {
        Self {
            destination_type: destination_type.into(),
            status,
            error: None,
        }
    }

    pub fn error(destination_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            destination_type: destination_type.into(),
            status: ConnectionState::Error,
            error: Some(message.into()),
        }
    }
}
