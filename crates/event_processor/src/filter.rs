//! Batch-wide event filters and the consent eligibility filter

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use contracts::{AnalyticsEvent, ConsentPurpose, EventContext, EventType};

/// Predicate type; `true` keeps the event
pub type FilterFn = Arc<dyn Fn(&AnalyticsEvent, &EventContext) -> bool + Send + Sync>;

/// Named batch-wide filter
#[derive(Clone)]
pub struct EventFilter {
    name: String,
    predicate: FilterFn,
}

impl EventFilter {
    /// Create a filter from a predicate
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&AnalyticsEvent, &EventContext) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(f),
        }
    }

    /// Drop every event whose type is in `types`
    pub fn exclude_types(types: impl IntoIterator<Item = EventType>) -> Self {
        let excluded: HashSet<EventType> = types.into_iter().collect();
        Self::new("exclude_types", move |event, _| {
            !excluded.contains(&event.event_type())
        })
    }

    /// Drop track events whose name is in `names`
    pub fn exclude_track_names(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let excluded: HashSet<String> = names.into_iter().map(Into::into).collect();
        Self::new("exclude_track_names", move |event, _| match &event.payload {
            contracts::EventPayload::Track { name, .. } => !excluded.contains(name),
            _ => true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, event: &AnalyticsEvent, ctx: &EventContext) -> bool {
        (self.predicate)(event, ctx)
    }
}

impl fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFilter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// True when `event` may be delivered under `required` purposes
///
/// Consent events are always eligible.
pub fn is_consent_eligible(
    event: &AnalyticsEvent,
    ctx: &EventContext,
    required: &[ConsentPurpose],
) -> bool {
    event.is_consent() || ctx.consent.satisfies(required)
}

/// Subset of `events` eligible under `required` purposes, in original order
pub fn filter_events_by_consent(
    events: &[AnalyticsEvent],
    ctx: &EventContext,
    required: &[ConsentPurpose],
) -> Vec<AnalyticsEvent> {
    events
        .iter()
        .filter(|event| is_consent_eligible(event, ctx, required))
        .cloned()
        .collect()
}
