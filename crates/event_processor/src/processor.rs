//! EventProcessor - validate, enrich and filter a batch
//!
//! Stages run in order and each can be toggled off. Per-event failures drop
//! the event; only an oversized batch fails the call.

use contracts::{AnalyticsEvent, ConsentPurpose, EventContext};
use tracing::{debug, info, instrument, warn};

use crate::config::ProcessorConfig;
use crate::enrichment::enrich_event;
use crate::error::{ProcessorError, Result};
use crate::filter::{filter_events_by_consent, EventFilter};
use crate::validation::validate_event;

/// Per-stage counts for one processed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub received: usize,
    pub invalid: usize,
    pub filtered: usize,
    pub accepted: usize,
}

/// Batch processing stage in front of the destination manager
#[derive(Debug, Clone, Default)]
pub struct EventProcessor {
    config: ProcessorConfig,
    filters: Vec<EventFilter>,
}

impl EventProcessor {
    /// Create a processor with no filters
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            filters: Vec::new(),
        }
    }

    /// Append a batch-wide filter; filters run in insertion order
    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn add_filter(&mut self, filter: EventFilter) {
        self.filters.push(filter);
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn filters(&self) -> &[EventFilter] {
        &self.filters
    }

    /// Run validation, enrichment and filtering over `events`
    ///
    /// # Errors
    /// `BatchTooLarge` if `events.len() > max_batch_size`; nothing is processed.
    pub fn process_events(
        &self,
        events: Vec<AnalyticsEvent>,
        ctx: &EventContext,
    ) -> Result<Vec<AnalyticsEvent>> {
        self.process_events_with_counts(events, ctx)
            .map(|(events, _)| events)
    }

    /// Same as [`process_events`](Self::process_events), also returning stage counts
    #[instrument(
        name = "event_processor_process",
        skip(self, events, ctx),
        fields(batch_size = events.len(), session_id = %ctx.session_id)
    )]
    pub fn process_events_with_counts(
        &self,
        events: Vec<AnalyticsEvent>,
        ctx: &EventContext,
    ) -> Result<(Vec<AnalyticsEvent>, StageCounts)> {
        let received = events.len();
        if received > self.config.max_batch_size {
            warn!(
                size = received,
                max = self.config.max_batch_size,
                "Batch rejected: too large"
            );
            observability::record_batch_rejected(received, self.config.max_batch_size);
            return Err(ProcessorError::BatchTooLarge {
                size: received,
                max: self.config.max_batch_size,
            });
        }
        observability::record_batch_received(received);

        let mut counts = StageCounts {
            received,
            ..Default::default()
        };

        let mut events = if self.config.validate {
            self.validate_stage(events)
        } else {
            events
        };
        counts.invalid = received - events.len();

        if self.config.enrich {
            events = events.iter().map(|e| enrich_event(e, ctx)).collect();
        }

        if self.config.filter && !self.filters.is_empty() {
            let before = events.len();
            events.retain(|event| self.passes_filters(event, ctx));
            counts.filtered = before - events.len();
        }

        counts.accepted = events.len();
        observability::record_events_dropped("validation", counts.invalid);
        observability::record_events_dropped("filter", counts.filtered);

        info!(
            received = counts.received,
            invalid = counts.invalid,
            filtered = counts.filtered,
            accepted = counts.accepted,
            "Batch processed"
        );

        Ok((events, counts))
    }

    /// Events eligible under `required`; consent events always pass
    ///
    /// Returns the input unchanged when consent filtering is disabled.
    pub fn filter_events_by_consent(
        &self,
        events: &[AnalyticsEvent],
        ctx: &EventContext,
        required: &[ConsentPurpose],
    ) -> Vec<AnalyticsEvent> {
        if !self.config.consent_filter {
            return events.to_vec();
        }
        let kept = filter_events_by_consent(events, ctx, required);
        observability::record_events_dropped("consent", events.len() - kept.len());
        kept
    }

    fn validate_stage(&self, events: Vec<AnalyticsEvent>) -> Vec<AnalyticsEvent> {
        events
            .into_iter()
            .enumerate()
            .filter_map(|(index, event)| match validate_event(&event) {
                Ok(()) => Some(event),
                Err(issue) => {
                    warn!(
                        index,
                        event_type = %event.event_type(),
                        message_id = event.message_id.as_deref().unwrap_or(""),
                        reason = %issue,
                        "Dropping invalid event"
                    );
                    None
                }
            })
            .collect()
    }

    fn passes_filters(&self, event: &AnalyticsEvent, ctx: &EventContext) -> bool {
        match self.filters.iter().find(|f| !f.matches(event, ctx)) {
            Some(rejecting) => {
                debug!(
                    filter = rejecting.name(),
                    event_type = %event.event_type(),
                    "Event filtered out"
                );
                false
            }
            None => true,
        }
    }
}
