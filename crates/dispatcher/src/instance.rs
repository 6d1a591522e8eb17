//! DestinationInstance - a loaded plugin plus its config and health counters

use std::sync::Arc;
use std::time::Instant;

use contracts::{
    AnalyticsEvent, ConsentPurpose, ContractError, Delivery, DestinationConfig,
    DestinationPlugin, EventContext, EventResult, EventType,
};
use tracing::{debug, warn};

use crate::health::{DestinationHealth, DestinationStatus};

/// What happened to one event handed to a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Plugin kept the default handler for this event type
    Unsupported,
    /// Event type unknown to the relay; no handler was called
    UnknownType,
    /// Handler or `on_before_event` failed; the message is in `last_error`
    Failed(String),
}

/// A loaded destination
pub struct DestinationInstance {
    plugin: Arc<dyn DestinationPlugin>,
    config: DestinationConfig,
    health: DestinationHealth,
}

impl DestinationInstance {
    /// Wrap an initialized plugin
    pub fn new(plugin: Box<dyn DestinationPlugin>, config: DestinationConfig) -> Self {
        Self {
            plugin: Arc::from(plugin),
            config,
            health: DestinationHealth::new(),
        }
    }

    pub fn destination_type(&self) -> &str {
        &self.config.destination_type
    }

    pub fn plugin(&self) -> &dyn DestinationPlugin {
        self.plugin.as_ref()
    }

    pub fn config(&self) -> &DestinationConfig {
        &self.config
    }

    pub fn health(&self) -> &DestinationHealth {
        &self.health
    }

    /// Purposes gating non-consent events: the config list if given, else the plugin's
    pub fn required_consent(&self) -> Vec<ConsentPurpose> {
        match &self.config.required_consent {
            Some(purposes) => purposes.clone(),
            None => self.plugin.required_consent().to_vec(),
        }
    }

    pub fn status(&self) -> DestinationStatus {
        DestinationStatus {
            destination_type: self.destination_type().to_string(),
            loaded: true,
            events_processed: self.health.events_processed(),
            error_count: self.health.error_count(),
            last_error: self.health.last_error(),
            last_used: self.health.last_used(),
        }
    }

    /// Run the hook chain and the type handler for one event
    ///
    /// `on_before_event` may substitute the event for this call. On success
    /// `on_after_event` gets a successful [`EventResult`]; on failure `on_error`
    /// gets the original event and the after-hook is skipped.
    pub async fn dispatch_event(
        &self,
        event: &AnalyticsEvent,
        ctx: &EventContext,
    ) -> DispatchOutcome {
        let started = Instant::now();

        let substituted = match self.plugin.on_before_event(event, ctx).await {
            Ok(substituted) => substituted,
            Err(e) => return self.fail(e, event).await,
        };
        let target = substituted.as_ref().unwrap_or(event);
        let event_type = target.event_type();

        let delivery = match event_type {
            EventType::Track => self.plugin.track(target, ctx).await,
            EventType::Page => self.plugin.page(target, ctx).await,
            EventType::Identify => self.plugin.identify(target, ctx).await,
            EventType::Group => self.plugin.group(target, ctx).await,
            EventType::Alias => self.plugin.alias(target, ctx).await,
            EventType::Consent => self.plugin.consent(target, ctx).await,
            EventType::Unknown => {
                warn!(
                    destination = %self.destination_type(),
                    message_id = target.message_id.as_deref().unwrap_or(""),
                    "Unknown event type, no handler called"
                );
                return DispatchOutcome::UnknownType;
            }
        };

        match delivery {
            Ok(Delivery::Delivered) => {
                self.health.inc_events_processed();
                self.health.touch();
                observability::record_event_dispatched(self.destination_type(), event_type, true);
                observability::record_dispatch_latency_ms(
                    self.destination_type(),
                    started.elapsed().as_secs_f64() * 1000.0,
                );
                let result = EventResult::success(self.destination_type());
                self.plugin.on_after_event(target, &result).await;
                DispatchOutcome::Delivered
            }
            Ok(Delivery::Unsupported) => {
                debug!(
                    destination = %self.destination_type(),
                    event_type = %event_type,
                    "Event type not handled by destination"
                );
                DispatchOutcome::Unsupported
            }
            Err(e) => self.fail(e, event).await,
        }
    }

    async fn fail(&self, error: ContractError, original: &AnalyticsEvent) -> DispatchOutcome {
        let message = error.to_string();
        warn!(
            destination = %self.destination_type(),
            event_type = %original.event_type(),
            error = %message,
            "Event dispatch failed"
        );
        self.health.record_error(message.clone());
        observability::record_event_dispatched(
            self.destination_type(),
            original.event_type(),
            false,
        );
        self.plugin.on_error(&error, original).await;
        DispatchOutcome::Failed(message)
    }
}

impl std::fmt::Debug for DestinationInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationInstance")
            .field("destination_type", &self.destination_type())
            .field("version", &self.plugin.version())
            .field("health", &self.health)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contracts::{ConsentState, Settings};
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Records every hook call as a string
    #[derive(Default)]
    struct Probe {
        calls: CallLog,
        fail_track: bool,
        rename_to: Option<String>,
    }

    impl Probe {
        fn log(&self, entry: impl Into<String>) {
            self.calls.lock().unwrap().push(entry.into());
        }
    }

    #[async_trait]
    impl DestinationPlugin for Probe {
        fn destination_type(&self) -> &str {
            "probe"
        }

        fn version(&self) -> &str {
            "0.1.0"
        }

        async fn initialize(&mut self, _settings: &Settings) -> Result<(), ContractError> {
            Ok(())
        }

        async fn track(
            &self,
            event: &AnalyticsEvent,
            _ctx: &EventContext,
        ) -> Result<Delivery, ContractError> {
            if self.fail_track {
                return Err(ContractError::delivery("probe", "rejected"));
            }
            if let contracts::EventPayload::Track { name, .. } = &event.payload {
                self.log(format!("track:{name}"));
            }
            Ok(Delivery::Delivered)
        }

        async fn on_before_event(
            &self,
            event: &AnalyticsEvent,
            _ctx: &EventContext,
        ) -> Result<Option<AnalyticsEvent>, ContractError> {
            self.log("before");
            Ok(self
                .rename_to
                .as_ref()
                .filter(|_| event.event_type() == EventType::Track)
                .map(|name| AnalyticsEvent::track(name.clone()).with_user_id("u1")))
        }

        async fn on_after_event(&self, _event: &AnalyticsEvent, result: &EventResult) {
            self.log(format!("after:{}", result.success));
        }

        async fn on_error(&self, _error: &ContractError, event: &AnalyticsEvent) {
            self.log(format!("error:{}", event.event_type()));
        }
    }

    fn instance(probe: Probe) -> (DestinationInstance, CallLog) {
        let calls = probe.calls.clone();
        let instance = DestinationInstance::new(Box::new(probe), DestinationConfig::new("probe"));
        (instance, calls)
    }

    fn recorded(calls: &CallLog) -> Vec<String> {
        calls.lock().unwrap().clone()
    }

    fn ctx() -> EventContext {
        EventContext::new("s1", ConsentState::all_granted())
    }

    #[tokio::test]
    async fn test_delivered_runs_hooks_in_order() {
        let (instance, calls) = instance(Probe::default());
        let event = AnalyticsEvent::track("Signup").with_user_id("u1");

        let outcome = instance.dispatch_event(&event, &ctx()).await;

        assert_eq!(outcome, DispatchOutcome::Delivered);
        assert_eq!(recorded(&calls), ["before", "track:Signup", "after:true"]);
        assert_eq!(instance.health().events_processed(), 1);
        assert!(instance.health().last_used().is_some());
    }

    #[tokio::test]
    async fn test_before_hook_substitutes_event() {
        let (instance, calls) = instance(Probe {
            rename_to: Some("Renamed".into()),
            ..Default::default()
        });

        instance
            .dispatch_event(&AnalyticsEvent::track("Original").with_user_id("u1"), &ctx())
            .await;

        assert_eq!(recorded(&calls), ["before", "track:Renamed", "after:true"]);
    }

    #[tokio::test]
    async fn test_failure_routes_to_on_error_and_skips_after() {
        let (instance, calls) = instance(Probe {
            fail_track: true,
            ..Default::default()
        });

        let outcome = instance
            .dispatch_event(&AnalyticsEvent::track("x").with_user_id("u1"), &ctx())
            .await;

        assert!(matches!(outcome, DispatchOutcome::Failed(_)));
        assert_eq!(recorded(&calls), ["before", "error:track"]);
        assert_eq!(instance.health().error_count(), 1);
        assert_eq!(instance.health().events_processed(), 0);
        assert!(instance.health().last_error().unwrap().contains("rejected"));
    }

    #[tokio::test]
    async fn test_unsupported_changes_no_counters() {
        let (instance, calls) = instance(Probe::default());

        let outcome = instance
            .dispatch_event(&AnalyticsEvent::page("home").with_user_id("u1"), &ctx())
            .await;

        assert_eq!(outcome, DispatchOutcome::Unsupported);
        assert_eq!(recorded(&calls), ["before"]);
        assert_eq!(instance.health().events_processed(), 0);
        assert_eq!(instance.health().error_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_type_calls_no_handler() {
        let (instance, calls) = instance(Probe::default());
        let event: AnalyticsEvent =
            serde_json::from_str(r#"{"type": "screen", "userId": "u1"}"#).unwrap();

        let outcome = instance.dispatch_event(&event, &ctx()).await;

        assert_eq!(outcome, DispatchOutcome::UnknownType);
        assert_eq!(recorded(&calls), ["before"]);
    }

    #[test]
    fn test_required_consent_prefers_config() {
        let config = DestinationConfig::new("probe")
            .with_required_consent(vec![ConsentPurpose::Marketing]);
        let gated = DestinationInstance::new(Box::new(Probe::default()), config);
        assert_eq!(gated.required_consent(), vec![ConsentPurpose::Marketing]);

        let (plain, _) = instance(Probe::default());
        assert!(plain.required_consent().is_empty());
    }
}
