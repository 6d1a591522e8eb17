//! DestinationManager - loads destinations and fans batches out to them
//!
//! Each loaded destination gets its own task per batch, so a slow or failing
//! destination never blocks or fails its siblings. Within one destination
//! events are dispatched one at a time, in batch order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use contracts::{AnalyticsEvent, DestinationConfig, EventContext};
use event_processor::filter_events_by_consent;
use registry::DestinationLoader;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::health::{ConnectionState, ConnectionStatus, DestinationStatus, HealthSummary};
use crate::instance::{DestinationInstance, DispatchOutcome};

/// Lifecycle of one destination type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    /// Accepted by the availability check, not started yet
    Registered,
    Loading,
    Loaded,
    LoadFailed { reason: String },
    /// Dropped by `clear()`
    Cleared,
}

impl LoadState {
    /// Owned by an in-flight or finished load; another load must not start
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Registered | Self::Loading | Self::Loaded)
    }
}

/// Outcome of one `load_destinations` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    /// (type, reason)
    pub failed: Vec<(String, String)>,
    pub disabled: Vec<String>,
    /// Enabled but already loaded or loading, or a duplicate entry
    pub skipped: Vec<String>,
}

#[derive(Default)]
struct ManagerState {
    instances: HashMap<String, Arc<DestinationInstance>>,
    load_states: HashMap<String, LoadState>,
}

/// Destination manager
pub struct DestinationManager {
    loader: DestinationLoader,
    state: RwLock<ManagerState>,
}

impl DestinationManager {
    pub fn new(loader: DestinationLoader) -> Self {
        Self {
            loader,
            state: RwLock::new(ManagerState::default()),
        }
    }

    pub fn loader(&self) -> &DestinationLoader {
        &self.loader
    }

    /// Load every enabled config concurrently
    ///
    /// # Errors
    /// `DestinationsUnavailable` if any enabled type cannot be resolved; in that
    /// case nothing is loaded. Individual load failures are reported in the
    /// [`LoadReport`] and never fail the call.
    #[instrument(
        name = "destination_manager_load",
        skip(self, configs),
        fields(config_count = configs.len())
    )]
    pub async fn load_destinations(
        &self,
        configs: &[DestinationConfig],
    ) -> Result<LoadReport, DispatcherError> {
        let mut report = LoadReport::default();
        let mut seen = HashSet::new();
        let mut to_load = Vec::new();

        for config in configs {
            let destination_type = &config.destination_type;
            if !config.enabled {
                info!(destination = %destination_type, "Destination disabled, skipping");
                report.disabled.push(destination_type.clone());
                continue;
            }
            if !seen.insert(destination_type.clone()) {
                warn!(destination = %destination_type, "Duplicate destination config, first wins");
                report.skipped.push(destination_type.clone());
                continue;
            }
            if self.is_loaded(destination_type) {
                debug!(destination = %destination_type, "Destination already loaded");
                report.skipped.push(destination_type.clone());
                continue;
            }
            to_load.push(config.clone());
        }

        self.loader
            .validate_available(to_load.iter().map(|c| c.destination_type.as_str()))
            .inspect_err(|e| error!(error = %e, "Destination availability check failed"))?;

        // Claimed under one write lock; overlapping calls skip claimed types
        let to_load: Vec<DestinationConfig> = {
            let mut state = self.write_state();
            to_load
                .into_iter()
                .filter(|config| {
                    let destination_type = &config.destination_type;
                    if state
                        .load_states
                        .get(destination_type)
                        .is_some_and(LoadState::is_claimed)
                    {
                        debug!(
                            destination = %destination_type,
                            "Destination load already in progress"
                        );
                        report.skipped.push(destination_type.clone());
                        return false;
                    }
                    state
                        .load_states
                        .insert(destination_type.clone(), LoadState::Registered);
                    true
                })
                .collect()
        };
        let claimed: Vec<String> = to_load
            .iter()
            .map(|c| c.destination_type.clone())
            .collect();

        let mut tasks = JoinSet::new();
        for config in to_load {
            self.set_load_state(&config.destination_type, LoadState::Loading);
            let loader = self.loader.clone();
            tasks.spawn(async move {
                let destination_type = config.destination_type.clone();
                (destination_type, load_one(&loader, config).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((destination_type, Ok(instance))) => {
                    info!(
                        destination = %destination_type,
                        version = instance.plugin().version(),
                        "Destination loaded"
                    );
                    observability::record_destination_loaded(&destination_type, true);
                    let mut state = self.write_state();
                    state
                        .instances
                        .insert(destination_type.clone(), Arc::new(instance));
                    state
                        .load_states
                        .insert(destination_type.clone(), LoadState::Loaded);
                    report.loaded.push(destination_type);
                }
                Ok((destination_type, Err(e))) => {
                    error!(
                        destination = %destination_type,
                        error = %e,
                        "Destination failed to load"
                    );
                    observability::record_destination_loaded(&destination_type, false);
                    self.set_load_state(
                        &destination_type,
                        LoadState::LoadFailed {
                            reason: e.to_string(),
                        },
                    );
                    report.failed.push((destination_type, e.to_string()));
                }
                Err(join_error) => {
                    error!(error = %join_error, "Destination load task aborted");
                }
            }
        }

        // A panicked load task leaves its type in Loading
        {
            let mut state = self.write_state();
            for destination_type in &claimed {
                if let Some(load_state) = state.load_states.get_mut(destination_type) {
                    if *load_state == LoadState::Loading {
                        let reason = "load task panicked".to_string();
                        report.failed.push((destination_type.clone(), reason.clone()));
                        *load_state = LoadState::LoadFailed { reason };
                    }
                }
            }
            observability::record_loaded_destinations(state.instances.len());
        }

        report.loaded.sort();
        report.failed.sort();
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            disabled = report.disabled.len(),
            "Destinations loaded"
        );
        Ok(report)
    }

    /// Dispatch a processed batch to every loaded destination
    ///
    /// Returns once every destination task has finished. Destination failures
    /// are logged and never surface to the caller.
    #[instrument(
        name = "destination_manager_process",
        skip(self, events, ctx),
        fields(batch_size = events.len(), session_id = %ctx.session_id)
    )]
    pub async fn process_events(&self, events: &[AnalyticsEvent], ctx: &EventContext) {
        if events.is_empty() {
            return;
        }

        let instances = self.snapshot_instances();
        if instances.is_empty() {
            debug!("No destinations loaded, batch dropped");
            return;
        }

        let events: Arc<[AnalyticsEvent]> = events.into();
        let ctx = Arc::new(ctx.clone());

        let mut tasks = JoinSet::new();
        for instance in instances {
            let events = events.clone();
            let ctx = ctx.clone();
            tasks.spawn(async move { dispatch_to_destination(instance, &events, &ctx).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Destination finished batch with failures"),
                Err(join_error) => error!(error = %join_error, "Destination task aborted"),
            }
        }
    }

    /// Probe one destination; never fails
    #[instrument(name = "destination_manager_test", skip(self))]
    pub async fn test_destination(&self, destination_type: &str) -> ConnectionStatus {
        let instance = self.read_state().instances.get(destination_type).cloned();
        let status = match instance {
            Some(instance) => probe(&instance).await,
            None => ConnectionStatus::error(destination_type, "destination not loaded"),
        };
        observability::record_connection_test(destination_type, status.status.as_str());
        status
    }

    /// Probe every loaded destination concurrently, sorted by type
    #[instrument(name = "destination_manager_test_all", skip(self))]
    pub async fn test_connections(&self) -> Vec<ConnectionStatus> {
        let mut tasks = JoinSet::new();
        for instance in self.snapshot_instances() {
            tasks.spawn(async move { probe(&instance).await });
        }

        let mut statuses = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(status) => {
                    observability::record_connection_test(
                        &status.destination_type,
                        status.status.as_str(),
                    );
                    statuses.push(status);
                }
                Err(join_error) => error!(error = %join_error, "Connection test task aborted"),
            }
        }
        statuses.sort_by(|a, b| a.destination_type.cmp(&b.destination_type));
        statuses
    }

    /// Status of one tracked destination
    pub fn destination_status(&self, destination_type: &str) -> Option<DestinationStatus> {
        let state = self.read_state();
        if let Some(instance) = state.instances.get(destination_type) {
            return Some(instance.status());
        }
        match state.load_states.get(destination_type)? {
            LoadState::LoadFailed { reason } => Some(DestinationStatus {
                destination_type: destination_type.to_string(),
                loaded: false,
                events_processed: 0,
                error_count: 0,
                last_error: Some(reason.clone()),
                last_used: None,
            }),
            _ => None,
        }
    }

    pub fn load_state(&self, destination_type: &str) -> Option<LoadState> {
        self.read_state().load_states.get(destination_type).cloned()
    }

    /// Loaded destination types, sorted
    pub fn loaded_destinations(&self) -> Vec<String> {
        let mut types: Vec<String> = self.read_state().instances.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn is_loaded(&self, destination_type: &str) -> bool {
        self.read_state().instances.contains_key(destination_type)
    }

    /// Statuses of every tracked (loaded or failed) destination, sorted by type
    pub fn statuses(&self) -> Vec<DestinationStatus> {
        let tracked: Vec<String> = {
            let state = self.read_state();
            state
                .load_states
                .iter()
                .filter(|(_, s)| !matches!(s, LoadState::Cleared))
                .map(|(t, _)| t.clone())
                .collect()
        };
        let mut statuses: Vec<DestinationStatus> = tracked
            .iter()
            .filter_map(|t| self.destination_status(t))
            .collect();
        statuses.sort_by(|a, b| a.destination_type.cmp(&b.destination_type));
        statuses
    }

    pub fn health_summary(&self) -> HealthSummary {
        HealthSummary::from_statuses(&self.statuses())
    }

    /// Client-side scripts of loaded destinations that provide one, sorted by type
    pub fn generate_scripts(&self) -> Vec<(String, String)> {
        let mut scripts: Vec<(String, String)> = self
            .snapshot_instances()
            .iter()
            .filter_map(|instance| {
                instance
                    .plugin()
                    .generate_script(&instance.config().settings)
                    .map(|script| (instance.destination_type().to_string(), script))
            })
            .collect();
        scripts.sort();
        scripts
    }

    /// Drop every instance without calling `destroy()`
    pub fn clear(&self) {
        let mut state = self.write_state();
        let cleared = state.instances.len();
        state.instances.clear();
        state.load_states.retain(|_, s| *s == LoadState::Loaded);
        for load_state in state.load_states.values_mut() {
            *load_state = LoadState::Cleared;
        }
        observability::record_loaded_destinations(0);
        info!(cleared, "Destinations cleared");
    }

    /// Call `destroy()` on every loaded destination, then clear
    #[instrument(name = "destination_manager_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        for instance in self.snapshot_instances() {
            if let Err(e) = instance.plugin().destroy().await {
                error!(
                    destination = %instance.destination_type(),
                    error = %e,
                    "Destination destroy failed"
                );
            }
        }
        self.clear();
        info!("Destination manager shutdown complete");
    }

    fn snapshot_instances(&self) -> Vec<Arc<DestinationInstance>> {
        self.read_state().instances.values().cloned().collect()
    }

    fn set_load_state(&self, destination_type: &str, load_state: LoadState) {
        self.write_state()
            .load_states
            .insert(destination_type.to_string(), load_state);
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ManagerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ManagerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DestinationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationManager")
            .field("loader", &self.loader)
            .field("loaded", &self.loaded_destinations())
            .finish()
    }
}

/// Resolve, construct and initialize one destination
async fn load_one(
    loader: &DestinationLoader,
    config: DestinationConfig,
) -> Result<DestinationInstance, DispatcherError> {
    let destination_type = config.destination_type.as_str();
    let factory = loader
        .load(destination_type)
        .map_err(|e| DispatcherError::load(destination_type, e.to_string()))?;

    let mut plugin = factory(&config.settings)
        .map_err(|e| DispatcherError::load(destination_type, e.to_string()))?;

    plugin
        .initialize(&config.settings)
        .await
        .map_err(|e| DispatcherError::load(destination_type, e.to_string()))?;

    Ok(DestinationInstance::new(plugin, config))
}

/// Consent-filter and dispatch a batch to one destination
#[instrument(
    name = "destination_dispatch",
    skip(instance, events, ctx),
    fields(destination = %instance.destination_type())
)]
async fn dispatch_to_destination(
    instance: Arc<DestinationInstance>,
    events: &[AnalyticsEvent],
    ctx: &EventContext,
) -> Result<(), DispatcherError> {
    let required = instance.required_consent();
    let eligible = filter_events_by_consent(events, ctx, &required);
    observability::record_events_dropped("consent", events.len() - eligible.len());

    if eligible.is_empty() {
        debug!(required = ?required, "No consent-eligible events for destination");
        return Ok(());
    }

    let mut failed = 0;
    let mut last_error = None;
    for event in &eligible {
        if let DispatchOutcome::Failed(message) = instance.dispatch_event(event, ctx).await {
            failed += 1;
            last_error = Some(message);
        }
    }

    debug!(
        attempted = eligible.len(),
        failed,
        "Destination batch complete"
    );

    match last_error {
        None => Ok(()),
        Some(last_error) => Err(DispatcherError::DestinationFailed {
            destination: instance.destination_type().to_string(),
            failed,
            attempted: eligible.len(),
            last_error,
        }),
    }
}

async fn probe(instance: &DestinationInstance) -> ConnectionStatus {
    let destination_type = instance.destination_type();
    match instance.plugin().test_connection().await {
        Ok(true) => ConnectionStatus::new(destination_type, ConnectionState::Connected),
        Ok(false) => ConnectionStatus::new(destination_type, ConnectionState::Disconnected),
        Err(e) => {
            warn!(destination = %destination_type, error = %e, "Connection test failed");
            ConnectionStatus::error(destination_type, e.to_string())
        }
    }
}
