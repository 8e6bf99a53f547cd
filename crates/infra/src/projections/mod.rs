//! Projection implementations and the query layer that maintains them.
//!
//! All projections are:
//! - **Rebuildable**: reconstructed from the event log on demand
//! - **Pure**: state is a function of the ordered events alone
//! - **Disposable**: cached state can be dropped at any time

pub mod balances;
pub mod query_service;

pub use balances::{BalanceKey, Balances, BalancesProjection};
pub use query_service::ProjectionQueryService;
