//! `assetlog-events`: the event model and its contracts.
//!
//! Pure types (payloads, events, drafts, wire records, filters) plus the two
//! seams that infrastructure implements: [`EventBus`] and [`Projection`].

pub mod bus;
pub mod draft;
pub mod event;
pub mod payload;
pub mod projection;
pub mod query;
pub mod record;

pub use bus::{EventBus, EventHandler, SubscriptionId};
pub use draft::{EventDraft, Origin, TransactionDraft};
pub use event::{ConsistencyMode, Event, EventKind, EventType, TransactionDetails, reserved};
pub use payload::{MAX_DEPTH, Payload, PayloadValue};
pub use projection::{Projection, apply_until};
pub use query::{DEFAULT_PAGE_LIMIT, EventFilter, MAX_PAGE_LIMIT, Pagination};
pub use record::{EventRecord, IdentityRecord};
