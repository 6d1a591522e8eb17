//! Pipeline - event processor in front of the destination manager

use std::sync::Arc;

use contracts::{AnalyticsEvent, EventContext};
use event_processor::{EventProcessor, StageCounts};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::DispatcherError;
use crate::manager::DestinationManager;

/// What happened to one ingested batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub received: usize,
    /// Dropped by structural validation
    pub invalid: usize,
    /// Dropped by batch-wide filters
    pub filtered: usize,
    /// Handed to the destination manager
    pub accepted: usize,
}

impl From<StageCounts> for BatchReport {
    fn from(counts: StageCounts) -> Self {
        Self {
            received: counts.received,
            invalid: counts.invalid,
            filtered: counts.filtered,
            accepted: counts.accepted,
        }
    }
}

/// Processing plus dispatch for one batch at a time
#[derive(Debug, Clone)]
pub struct Pipeline {
    processor: EventProcessor,
    manager: Arc<DestinationManager>,
}

impl Pipeline {
    pub fn new(processor: EventProcessor, manager: Arc<DestinationManager>) -> Self {
        Self { processor, manager }
    }

    pub fn processor(&self) -> &EventProcessor {
        &self.processor
    }

    pub fn manager(&self) -> &Arc<DestinationManager> {
        &self.manager
    }

    /// Process a raw batch and dispatch the survivors
    ///
    /// # Errors
    /// `Processor(BatchTooLarge)` if the batch exceeds the configured maximum;
    /// nothing is dispatched in that case. Destination failures never surface here.
    #[instrument(
        name = "pipeline_ingest",
        skip(self, events, ctx),
        fields(batch_size = events.len(), session_id = %ctx.session_id)
    )]
    pub async fn ingest(
        &self,
        events: Vec<AnalyticsEvent>,
        ctx: &EventContext,
    ) -> Result<BatchReport, DispatcherError> {
        let (accepted, counts) = self.processor.process_events_with_counts(events, ctx)?;
        self.manager.process_events(&accepted, ctx).await;

        let report = BatchReport::from(counts);
        info!(
            received = report.received,
            accepted = report.accepted,
            destinations = self.manager.loaded_destinations().len(),
            "Batch ingested"
        );
        Ok(report)
    }
}
