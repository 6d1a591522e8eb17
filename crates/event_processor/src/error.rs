//! Event processor error types

use contracts::EventType;
use thiserror::Error;

/// Fatal processing errors
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Batch exceeds `max_batch_size`; resubmit in smaller batches
    #[error("batch size {size} exceeds maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

/// Why a single event failed structural validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("missing timestamp")]
    MissingTimestamp,

    #[error("either userId or anonymousId is required")]
    MissingIdentity,

    #[error("{event_type} event requires userId")]
    MissingUserId { event_type: EventType },

    #[error("track event requires a non-empty name")]
    EmptyTrackName,

    #[error("group event requires a non-empty groupId")]
    MissingGroupId,

    #[error("alias event requires a non-empty previousId")]
    MissingPreviousId,

    #[error("consent event action must be one of granted, revoked, updated (got {found})")]
    InvalidConsentAction { found: String },

    #[error("unknown event type")]
    UnknownType,
}

/// Result alias
pub type Result<T> = std::result::Result<T, ProcessorError>;
