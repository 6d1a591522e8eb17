//! 测试辅助：记录型 mock 目的地

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use contracts::{
    destination_factory, AnalyticsEvent, ConsentAction, ContractError, Delivery,
    DestinationFactory, DestinationPlugin, EventContext, EventType, Settings,
};
use registry::{DestinationPackage, LoaderError, PackageExport, PluginRegistry};

/// Shared view of everything a recording destination received
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<AnalyticsEvent>>>,
    constructed: Arc<AtomicUsize>,
}

impl Recorder {
    /// Register a healthy recording destination under `name`
    pub fn register(registry: &PluginRegistry, name: &str) -> Self {
        let recorder = Self::default();
        registry
            .register(name, recorder.factory(name, false))
            .unwrap();
        recorder
    }

    /// Register a destination whose handlers always fail
    pub fn register_failing(registry: &PluginRegistry, name: &str) -> Self {
        let recorder = Self::default();
        registry.register(name, recorder.factory(name, true)).unwrap();
        recorder
    }

    pub fn factory(&self, name: &str, failing: bool) -> DestinationFactory {
        let recorder = self.clone();
        let name = name.to_string();
        destination_factory(move |_| {
            recorder.constructed.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingDestination {
                name: name.clone(),
                recorder: recorder.clone(),
                failing,
                offline: false,
            }))
        })
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn types(&self) -> Vec<EventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(AnalyticsEvent::event_type)
            .collect()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }
}

/// Destination that records every event it handles
///
/// Settings: `fail_init` fails `initialize`, `offline` makes the connection test report false.
struct RecordingDestination {
    name: String,
    recorder: Recorder,
    failing: bool,
    offline: bool,
}

impl RecordingDestination {
    fn record(&self, event: &AnalyticsEvent) -> Result<Delivery, ContractError> {
        if self.failing {
            return Err(ContractError::delivery(&self.name, "endpoint unavailable"));
        }
        self.recorder.events.lock().unwrap().push(event.clone());
        Ok(Delivery::Delivered)
    }
}

#[async_trait]
impl DestinationPlugin for RecordingDestination {
    fn destination_type(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "0.0.1"
    }

    async fn initialize(&mut self, settings: &Settings) -> Result<(), ContractError> {
        if settings.contains_key("fail_init") {
            return Err(ContractError::initialization(&self.name, "bad credentials"));
        }
        self.offline = settings.contains_key("offline");
        Ok(())
    }

    async fn test_connection(&self) -> Result<bool, ContractError> {
        Ok(!self.offline)
    }

    async fn track(
        &self,
        event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        self.record(event)
    }

    async fn page(
        &self,
        event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        self.record(event)
    }

    async fn identify(
        &self,
        event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        self.record(event)
    }

    async fn group(
        &self,
        event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        self.record(event)
    }

    async fn alias(
        &self,
        event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        self.record(event)
    }

    async fn consent(
        &self,
        event: &AnalyticsEvent,
        _ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        self.record(event)
    }
}

/// Package exporting one recording destination as a constructor
pub struct RecordingPackage {
    export_name: String,
    recorder: Recorder,
}

impl RecordingPackage {
    pub fn new(export_name: &str) -> Self {
        Self {
            export_name: export_name.to_string(),
            recorder: Recorder::default(),
        }
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }
}

impl DestinationPackage for RecordingPackage {
    fn name(&self) -> &str {
        "recording-package"
    }

    fn exports(&self) -> Result<Vec<PackageExport>, LoaderError> {
        let destination_type = registry::destination_type_from_export(&self.export_name)
            .ok_or_else(|| LoaderError::package_unavailable("bad export name"))?;
        Ok(vec![PackageExport::constructor(
            self.export_name.clone(),
            self.recorder.factory(&destination_type, false),
        )])
    }
}

/// One event of every known type
pub fn mixed_batch() -> Vec<AnalyticsEvent> {
    vec![
        AnalyticsEvent::track("Signup").with_user_id("u1"),
        AnalyticsEvent::page("home").with_user_id("u1"),
        AnalyticsEvent::identify("u1"),
        AnalyticsEvent::group("acme").with_user_id("u1"),
        AnalyticsEvent::alias("anon-1", "u1"),
        AnalyticsEvent::consent(ConsentAction::Updated).with_user_id("u1"),
    ]
}
