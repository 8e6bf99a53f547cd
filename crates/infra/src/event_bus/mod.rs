//! Infrastructure event bus implementations.
//!
//! The bus contract lives in `assetlog-events`. This module provides the
//! store-backed implementation whose `publish` means "durably persisted".

pub mod store_backed;

pub use store_backed::StoreBackedEventBus;
