//! Destination plugin contract and the data types exchanged with plugins

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use crate::{AnalyticsEvent, ConsentPurpose, ContractError, EventContext};

/// Opaque per-destination settings
pub type Settings = HashMap<String, Value>;

/// Destination configuration supplied by the embedding application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DestinationConfig {
    /// Destination type name, e.g. "log" or "google-analytics"
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "destination type cannot be empty"))]
    pub destination_type: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub settings: Settings,

    /// Overrides the plugin's own consent requirements when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_consent: Option<Vec<ConsentPurpose>>,
}

fn default_enabled() -> bool {
    true
}

impl DestinationConfig {
    /// Enabled config with no settings
    pub fn new(destination_type: impl Into<String>) -> Self {
        Self {
            destination_type: destination_type.into(),
            enabled: true,
            settings: Settings::new(),
            required_consent: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn with_required_consent(mut self, purposes: Vec<ConsentPurpose>) -> Self {
        self.required_consent = Some(purposes);
        self
    }

    /// Read a string setting
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }
}

/// Descriptive metadata a plugin reports about itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationMetadata {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// Outcome of a single event handed to a destination, passed to `on_after_event`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub destination: String,
    pub timestamp: DateTime<Utc>,
}

impl EventResult {
    pub fn success(destination: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            destination: destination.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(destination: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            destination: destination.into(),
            timestamp: Utc::now(),
        }
    }
}

/// What a handler did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Event was accepted by the destination
    Delivered,
    /// Destination does not handle this event type
    Unsupported,
}

/// Destination plugin contract
///
/// Every event-type handler defaults to [`Delivery::Unsupported`], so a plugin
/// only overrides the variants it cares about. Hooks default to no-ops.
///
/// Handlers take `&self`: the manager shares one instance across tasks, so a
/// plugin that keeps mutable state wraps it itself.
#[async_trait]
pub trait DestinationPlugin: Send + Sync {
    /// Destination type name (matches the registry key)
    fn destination_type(&self) -> &str;

    fn version(&self) -> &str;

    fn metadata(&self) -> DestinationMetadata {
        DestinationMetadata {
            name: self.destination_type().to_string(),
            ..Default::default()
        }
    }

    /// Purposes that must all be granted for non-consent events to reach this plugin
    fn required_consent(&self) -> &[ConsentPurpose] {
        &[]
    }

    /// Prepare the plugin (open connections, validate settings)
    async fn initialize(&mut self, settings: &Settings) -> Result<(), ContractError>;

    /// Probe the destination. `Ok(false)` means reachable-but-unhealthy.
    async fn test_connection(&self) -> Result<bool, ContractError> {
        Ok(true)
    }

    async fn track(
        &self,
        _event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        Ok(Delivery::Unsupported)
    }

    async fn page(
        &self,
        _event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        Ok(Delivery::Unsupported)
    }

    async fn identify(
        &self,
        _event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        Ok(Delivery::Unsupported)
    }

    async fn group(
        &self,
        _event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        Ok(Delivery::Unsupported)
    }

    async fn alias(
        &self,
        _event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        Ok(Delivery::Unsupported)
    }

    async fn consent(
        &self,
        _event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        Ok(Delivery::Unsupported)
    }

    /// Called before each handler; `Some(event)` replaces the event for this call only
    async fn on_before_event(
        &self,
        _event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Option<AnalyticsEvent>, ContractError> {
        Ok(None)
    }

    /// Called after a successful handler call
    async fn on_after_event(&self, _event: &AnalyticsEvent, _result: &EventResult) {}

    /// Called with the handler error and the original event
    async fn on_error(&self, _error: &ContractError, _event: &AnalyticsEvent) {}

    /// Release resources. Invoked by an explicit manager shutdown only.
    async fn destroy(&self) -> Result<(), ContractError> {
        Ok(())
    }

    /// Client-side snippet for browser delivery, if the destination has one
    fn generate_script(&self, _settings: &Settings) -> Option<String> {
        None
    }
}

/// Constructor for a destination plugin, keyed by type in the registry
pub type DestinationFactory =
    Arc<dyn Fn(&Settings) -> Result<Box<dyn DestinationPlugin>, ContractError> + Send + Sync>;

/// Wrap a closure as a [`DestinationFactory`]
pub fn destination_factory<F>(f: F) -> DestinationFactory
where
    F: Fn(&Settings) -> Result<Box<dyn DestinationPlugin>, ContractError> + Send + Sync + 'static,
{
    Arc::new(f)
}
