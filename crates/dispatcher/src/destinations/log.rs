//! LogDestination - logs event summaries via tracing

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{
    AnalyticsEvent, ContractError, Delivery, DestinationMetadata, EventContext, Settings,
};
use serde_json::Value;
use tracing::{debug, info, instrument};

pub const LOG_DESTINATION_TYPE: &str = "log";

/// Level used for per-event lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LogLevel {
    #[default]
    Info,
    Debug,
}

/// Destination that logs event summaries for debugging
#[derive(Debug, Default)]
pub struct LogDestination {
    level: LogLevel,
    logged: AtomicU64,
}

impl LogDestination {
    /// Create a new LogDestination logging at info level
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far
    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }

    #[instrument(
        name = "log_destination_deliver",
        skip(self, event, ctx),
        fields(event_type = %event.event_type())
    )]
    async fn deliver(
        &self,
        event: &AnalyticsEvent,
        ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        let identity = event.identity().unwrap_or("-");
        let message_id = event.message_id.as_deref().unwrap_or("-");
        match self.level {
            LogLevel::Info => info!(
                destination = LOG_DESTINATION_TYPE,
                session_id = %ctx.session_id,
                identity,
                message_id,
                "Analytics event"
            ),
            LogLevel::Debug => debug!(
                destination = LOG_DESTINATION_TYPE,
                session_id = %ctx.session_id,
                identity,
                message_id,
                "Analytics event"
            ),
        }
        self.logged.fetch_add(1, Ordering::Relaxed);
        Ok(Delivery::Delivered)
    }
}

forward_event_handlers!(LogDestination => deliver {
    fn destination_type(&self) -> &str {
        LOG_DESTINATION_TYPE
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn metadata(&self) -> DestinationMetadata {
        DestinationMetadata {
            name: "Log".to_string(),
            description: "Writes a summary line per event to the relay log".to_string(),
            category: Some("debugging".to_string()),
            website: None,
        }
    }

    async fn initialize(&mut self, settings: &Settings) -> Result<(), ContractError> {
        self.level = match settings.get("level").and_then(Value::as_str) {
            None | Some("info") => LogLevel::Info,
            Some("debug") => LogLevel::Debug,
            Some(other) => {
                return Err(ContractError::invalid_settings(
                    LOG_DESTINATION_TYPE,
                    format!("unknown level '{other}', expected 'info' or 'debug'"),
                ))
            }
        };
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ContractError> {
        info!(logged = self.logged(), "LogDestination closed");
        Ok(())
    }

    fn generate_script(&self, _settings: &Settings) -> Option<String> {
        Some(
            "window.analytics = window.analytics || { track: console.log, page: console.log };"
                .to_string(),
        )
    }
});
