//! # Dispatcher
//!
//! Destination fan-out.
//!
//! Responsibilities:
//! - Load configured destinations through the registry/loader
//! - Consent-filter each batch per destination and dispatch by event type
//! - Isolate failing destinations; track per-destination health
//! - Ship the built-in `log`, `file` and `network` destinations

pub mod destinations;
pub mod error;
pub mod health;
pub mod instance;
pub mod manager;
pub mod pipeline;

pub use destinations::{BuiltinPackage, FileDestination, LogDestination, NetworkDestination};
pub use error::DispatcherError;
pub use health::{
    ConnectionState, ConnectionStatus, DestinationHealth, DestinationStatus, HealthSummary,
};
pub use instance::{DestinationInstance, DispatchOutcome};
pub use manager::{DestinationManager, LoadReport, LoadState};
pub use pipeline::{BatchReport, Pipeline};
