//! One-step event construction.
//!
//! A draft is a plain struct: fill in the fields (usually with struct-update
//! syntax over `Default`), then call `build`. Required fields are `Option`s so
//! that a missing one is reported as [`ValidationError::MissingRequiredField`]
//! instead of being silently defaulted.
//!
//! ```ignore
//! let event = EventDraft {
//!     actor: Some(Identity::player("alice")?),
//!     event_type: Some(EventType::AssetCreated),
//!     payload: Some(Payload::new().with("name", "coins")),
//!     ..EventDraft::default()
//! }
//! .build()?;
//! ```
//!
//! ## Identity and time
//!
//! [`Origin::Fresh`] generates a new id and stamps the clock's "now".
//! [`Origin::Replayed`] reuses a historical id and timestamp verbatim, which is
//! what lets idempotent consumers recognise a re-delivered event.
//!
//! [`ValidationError::MissingRequiredField`]: assetlog_core::ValidationError::MissingRequiredField

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use assetlog_core::{AssetId, Clock, Decimal, EventId, Identity, LedgerError, LedgerResult, SystemClock};

use crate::event::{ConsistencyMode, Event, EventKind, EventType, TransactionDetails, reserved};
use crate::payload::Payload;

/// Where an event's id and timestamp come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Origin {
    /// A new fact: generate an id and use the current time.
    #[default]
    Fresh,
    /// A historical fact being rebuilt: keep its id and timestamp.
    Replayed {
        id: EventId,
        occurred_at: DateTime<Utc>,
    },
}

impl Origin {
    fn resolve(self, clock: &dyn Clock) -> (EventId, DateTime<Utc>) {
        match self {
            Origin::Fresh => (EventId::generate(), clock.now()),
            Origin::Replayed { id, occurred_at } => (id, occurred_at),
        }
    }
}

/// Draft of a non-transaction event.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub origin: Origin,
    pub actor: Option<Identity>,
    pub event_type: Option<EventType>,
    pub payload: Option<Payload>,
    pub schema_version: u32,
    pub metadata: BTreeMap<String, String>,
}

impl Default for EventDraft {
    fn default() -> Self {
        Self {
            origin: Origin::Fresh,
            actor: None,
            event_type: None,
            payload: None,
            schema_version: 1,
            metadata: BTreeMap::new(),
        }
    }
}

impl EventDraft {
    /// Draft with all required fields set.
    pub fn new(actor: Identity, event_type: EventType, payload: Payload) -> Self {
        Self {
            actor: Some(actor),
            event_type: Some(event_type),
            payload: Some(payload),
            ..Self::default()
        }
    }

    pub fn build(self) -> LedgerResult<Event> {
        self.build_with(&SystemClock)
    }

    pub fn build_with(self, clock: &dyn Clock) -> LedgerResult<Event> {
        let actor = self.actor.ok_or_else(|| LedgerError::missing("actor"))?;
        let event_type = self.event_type.ok_or_else(|| LedgerError::missing("event_type"))?;
        let payload = self.payload.ok_or_else(|| LedgerError::missing("payload"))?;

        if event_type == EventType::Transaction {
            return Err(LedgerError::invalid_argument(
                "TRANSACTION events must be built from a TransactionDraft",
            ));
        }

        assemble(Header {
            origin: self.origin,
            actor,
            event_type,
            payload,
            schema_version: self.schema_version,
            metadata: self.metadata,
            kind: EventKind::Plain,
            clock,
        })
    }
}

/// Draft of a transaction: a signed delta on one asset.
///
/// `payload` carries optional extra data and may not use the reserved
/// transaction keys (see [`reserved`]).
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub origin: Origin,
    pub actor: Option<Identity>,
    pub asset: Option<AssetId>,
    pub delta: Option<Decimal>,
    pub consistency: Option<ConsistencyMode>,
    pub source: Option<Identity>,
    pub target: Option<Identity>,
    pub reason: Option<String>,
    pub payload: Payload,
    pub schema_version: u32,
    pub metadata: BTreeMap<String, String>,
}

impl Default for TransactionDraft {
    fn default() -> Self {
        Self {
            origin: Origin::Fresh,
            actor: None,
            asset: None,
            delta: None,
            consistency: None,
            source: None,
            target: None,
            reason: None,
            payload: Payload::new(),
            schema_version: 1,
            metadata: BTreeMap::new(),
        }
    }
}

impl TransactionDraft {
    /// Draft with all required fields set.
    pub fn new(actor: Identity, asset: AssetId, delta: Decimal, consistency: ConsistencyMode) -> Self {
        Self {
            actor: Some(actor),
            asset: Some(asset),
            delta: Some(delta),
            consistency: Some(consistency),
            ..Self::default()
        }
    }

    pub fn build(self) -> LedgerResult<Event> {
        self.build_with(&SystemClock)
    }

    pub fn build_with(self, clock: &dyn Clock) -> LedgerResult<Event> {
        let actor = self.actor.ok_or_else(|| LedgerError::missing("actor"))?;
        let asset = self.asset.ok_or_else(|| LedgerError::missing("asset"))?;
        let delta = self.delta.ok_or_else(|| LedgerError::missing("delta"))?;
        let consistency = self.consistency.ok_or_else(|| LedgerError::missing("consistency"))?;

        if let Some(key) = self.payload.keys().find(|k| reserved::is_reserved(k)) {
            return Err(LedgerError::invalid_payload(
                key,
                "key is reserved for transaction details",
            ));
        }
        for party in [self.source.as_ref(), self.target.as_ref()].into_iter().flatten() {
            if !party.is_valid() {
                return Err(LedgerError::invalid_id(format!("invalid transaction party `{party}`")));
            }
        }

        let details = TransactionDetails {
            asset,
            delta,
            consistency,
            source: self.source,
            target: self.target,
            reason: self.reason,
        };

        assemble(Header {
            origin: self.origin,
            actor,
            event_type: EventType::Transaction,
            payload: self.payload,
            schema_version: self.schema_version,
            metadata: self.metadata,
            kind: EventKind::Transaction(details),
            clock,
        })
    }
}

struct Header<'a> {
    origin: Origin,
    actor: Identity,
    event_type: EventType,
    payload: Payload,
    schema_version: u32,
    metadata: BTreeMap<String, String>,
    kind: EventKind,
    clock: &'a dyn Clock,
}

/// Shared validation for both drafts. Nothing is constructed until every check passes.
fn assemble(header: Header<'_>) -> LedgerResult<Event> {
    if !header.actor.is_valid() {
        return Err(LedgerError::invalid_id("actor id cannot be empty"));
    }
    if header.schema_version == 0 {
        return Err(LedgerError::invalid_argument("schema_version starts at 1"));
    }
    if header.metadata.keys().any(String::is_empty) {
        return Err(LedgerError::invalid_argument("metadata keys must be non-empty"));
    }

    let (id, occurred_at) = header.origin.resolve(header.clock);
    let event = Event {
        id,
        occurred_at,
        actor: header.actor,
        event_type: header.event_type,
        payload: header.payload,
        schema_version: header.schema_version,
        metadata: header.metadata,
        kind: header.kind,
    };

    // Transactions validate the merged wire shape, not just the user keys.
    event.wire_payload().validate()?;
    Ok(event)
}
