//! # Contracts
//!
//! Frozen interface contracts shared by every relay crate: analytics events,
//! consent state, per-batch context and the destination plugin trait.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Event and session timestamps are UTC (`chrono::DateTime<Utc>`)
//! - Events carry their own timestamp; the processor rejects events without one

mod consent;
mod context;
mod destination;
mod error;
mod event;

pub use consent::{ConsentPurpose, ConsentState};
pub use context::{EventContext, RequestMetadata};
pub use destination::*;
pub use error::*;
pub use event::*;
