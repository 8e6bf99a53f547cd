//! `assetlog-core`: ledger foundation building blocks.
//!
//! This crate contains **pure** primitives (no IO, no async): identifiers,
//! actors, the error taxonomy and the exact decimal/money codec.

pub mod clock;
pub mod decimal;
pub mod error;
pub mod id;
pub mod identity;
pub mod version;

pub use clock::{Clock, FixedClock, SystemClock};
pub use decimal::{
    Decimal, DecimalWire, Money, decimal_to_money, decimal_to_wire, money_to_decimal,
    wire_to_decimal,
};
pub use error::{CodecError, ErrorKind, LedgerError, LedgerResult, ValidationError};
pub use id::{AssetId, AssetScope, EventId, ProjectionId};
pub use identity::{Identity, IdentityType};
pub use version::ExpectedVersion;
