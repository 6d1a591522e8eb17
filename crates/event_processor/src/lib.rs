//! # Event Processor
//!
//! Batch processing stage in front of destination dispatch.
//!
//! Responsibilities:
//! - Reject oversized batches
//! - Structural validation per event type (invalid events are dropped)
//! - Enrichment with session and request context
//! - Batch-wide filters and the consent eligibility filter
//!
//! ## Usage Example
//!
//! ```ignore
//! use event_processor::{EventFilter, EventProcessor, ProcessorConfig};
//! use contracts::EventType;
//!
//! let processor = EventProcessor::new(ProcessorConfig::default())
//!     .with_filter(EventFilter::exclude_types([EventType::Alias]));
//!
//! let accepted = processor.process_events(events, &ctx)?;
//! ```

mod config;
mod enrichment;
mod error;
mod filter;
mod processor;
mod validation;

pub use config::{ProcessorConfig, DEFAULT_MAX_BATCH_SIZE};
pub use enrichment::enrich_event;
pub use error::{ProcessorError, Result, ValidationIssue};
pub use filter::{filter_events_by_consent, is_consent_eligible, EventFilter, FilterFn};
pub use processor::{EventProcessor, StageCounts};
pub use validation::validate_event;
