//! Infrastructure layer: event store, event bus, projections and wiring.

pub mod config;
pub mod event_bus;
pub mod event_store;
pub mod identity;
pub mod projections;
pub mod runtime;
pub mod transaction_service;

pub use config::LedgerConfig;
pub use runtime::{LedgerRuntime, LedgerRuntimeBuilder};
