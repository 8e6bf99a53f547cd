use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assetlog_core::{AssetId, Decimal, EventId, Identity};

use crate::payload::{Payload, PayloadValue};

/// Payload keys that carry transaction details on the wire.
///
/// A transaction's own payload may not use these keys; the flat wire form
/// merges them into the same map.
pub mod reserved {
    pub const ASSET: &str = "asset";
    pub const DELTA: &str = "delta";
    pub const CONSISTENCY: &str = "consistency";
    pub const SOURCE: &str = "source";
    pub const TARGET: &str = "target";
    pub const REASON: &str = "reason";

    pub const ALL: [&str; 6] = [ASSET, DELTA, CONSISTENCY, SOURCE, TARGET, REASON];

    pub fn is_reserved(key: &str) -> bool {
        ALL.contains(&key)
    }
}

/// Classification of an event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Transaction,
    AssetCreated,
    AssetUpdated,
    AssetDeleted,
    IdentityCreated,
    IdentityUpdated,
    System,
    Custom,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::Transaction,
        EventType::AssetCreated,
        EventType::AssetUpdated,
        EventType::AssetDeleted,
        EventType::IdentityCreated,
        EventType::IdentityUpdated,
        EventType::System,
        EventType::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Transaction => "TRANSACTION",
            EventType::AssetCreated => "ASSET_CREATED",
            EventType::AssetUpdated => "ASSET_UPDATED",
            EventType::AssetDeleted => "ASSET_DELETED",
            EventType::IdentityCreated => "IDENTITY_CREATED",
            EventType::IdentityUpdated => "IDENTITY_UPDATED",
            EventType::System => "SYSTEM",
            EventType::Custom => "CUSTOM",
        }
    }

    /// Case-insensitive parse; unrecognised names map to `Custom`.
    pub fn parse(token: &str) -> Self {
        let upper = token.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .unwrap_or(EventType::Custom)
    }
}

impl core::fmt::Display for EventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// How a transaction is serialized against other writers of the same asset.
///
/// - `Strong`: writers of one asset are serialized; the append is checked
///   against the version observed under that serialization.
/// - `Optimistic`: no serialization; the append is checked against the
///   version observed when the transaction was submitted.
/// - `Eventual`: appended without a version check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyMode {
    #[default]
    Strong,
    Eventual,
    Optimistic,
}

impl ConsistencyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsistencyMode::Strong => "STRONG",
            ConsistencyMode::Eventual => "EVENTUAL",
            ConsistencyMode::Optimistic => "OPTIMISTIC",
        }
    }

    /// Case-insensitive parse; unrecognised names map to `Strong`.
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "EVENTUAL" => ConsistencyMode::Eventual,
            "OPTIMISTIC" => ConsistencyMode::Optimistic,
            _ => ConsistencyMode::Strong,
        }
    }
}

impl core::fmt::Display for ConsistencyMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsistencyMode {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Transaction-specific part of an event: a signed change of one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDetails {
    pub(crate) asset: AssetId,
    pub(crate) delta: Decimal,
    pub(crate) consistency: ConsistencyMode,
    pub(crate) source: Option<Identity>,
    pub(crate) target: Option<Identity>,
    pub(crate) reason: Option<String>,
}

impl TransactionDetails {
    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    /// Signed change. Positive credits the holder, negative debits it.
    pub fn delta(&self) -> Decimal {
        self.delta
    }

    pub fn consistency(&self) -> ConsistencyMode {
        self.consistency
    }

    pub fn source(&self) -> Option<&Identity> {
        self.source.as_ref()
    }

    pub fn target(&self) -> Option<&Identity> {
        self.target.as_ref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Shape of an event beyond the common header.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Plain,
    Transaction(TransactionDetails),
}

/// An immutable record of a fact that occurred.
///
/// Events are:
/// - **immutable** (no setters; "changing" an event means appending a new one)
/// - **self-describing** (actor, type and timestamp travel with the payload)
/// - **versioned** (`schema_version` starts at 1)
///
/// Construction goes through [`EventDraft`](crate::EventDraft) or
/// [`TransactionDraft`](crate::TransactionDraft), which validate everything; a
/// value of this type is therefore always valid.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub(crate) id: EventId,
    pub(crate) occurred_at: DateTime<Utc>,
    pub(crate) actor: Identity,
    pub(crate) event_type: EventType,
    pub(crate) payload: Payload,
    pub(crate) schema_version: u32,
    pub(crate) metadata: BTreeMap<String, String>,
    pub(crate) kind: EventKind,
}

impl Event {
    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn actor(&self) -> &Identity {
        &self.actor
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// The caller-supplied payload, without transaction details.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn transaction(&self) -> Option<&TransactionDetails> {
        match &self.kind {
            EventKind::Transaction(details) => Some(details),
            EventKind::Plain => None,
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self.kind, EventKind::Transaction(_))
    }

    /// Header fields are populated and consistent with the event's kind.
    pub fn is_valid(&self) -> bool {
        self.actor.is_valid()
            && self.schema_version >= 1
            && match &self.kind {
                EventKind::Plain => self.event_type != EventType::Transaction,
                EventKind::Transaction(_) => self.event_type == EventType::Transaction,
            }
    }

    /// Whether `identity` took part: as actor, source or target.
    pub fn involves(&self, identity: &Identity) -> bool {
        if &self.actor == identity {
            return true;
        }
        self.transaction().is_some_and(|tx| {
            tx.source.as_ref() == Some(identity) || tx.target.as_ref() == Some(identity)
        })
    }

    /// Payload as it appears on the wire: user keys plus reserved transaction keys.
    pub fn wire_payload(&self) -> Payload {
        let mut payload = self.payload.clone();
        if let EventKind::Transaction(tx) = &self.kind {
            merge_transaction_keys(&mut payload, tx);
        }
        payload
    }
}

pub(crate) fn merge_transaction_keys(payload: &mut Payload, tx: &TransactionDetails) {
    payload.insert(reserved::ASSET, tx.asset.full_id());
    payload.insert(reserved::DELTA, tx.delta);
    payload.insert(reserved::CONSISTENCY, tx.consistency.as_str());
    if let Some(source) = &tx.source {
        payload.insert(reserved::SOURCE, source.to_string());
    }
    if let Some(target) = &tx.target {
        payload.insert(reserved::TARGET, target.to_string());
    }
    if let Some(reason) = &tx.reason {
        payload.insert(reserved::REASON, PayloadValue::String(reason.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_parse_falls_back_to_custom() {
        assert_eq!(EventType::parse("transaction"), EventType::Transaction);
        assert_eq!(EventType::parse("ASSET_DELETED"), EventType::AssetDeleted);
        assert_eq!(EventType::parse("quest_completed"), EventType::Custom);
    }

    #[test]
    fn consistency_parse_falls_back_to_strong() {
        assert_eq!(ConsistencyMode::parse("optimistic"), ConsistencyMode::Optimistic);
        assert_eq!(ConsistencyMode::parse("EVENTUAL"), ConsistencyMode::Eventual);
        assert_eq!(ConsistencyMode::parse("whatever"), ConsistencyMode::Strong);
    }

    #[test]
    fn enums_serialize_in_screaming_case() {
        assert_eq!(serde_json::to_string(&EventType::IdentityCreated).unwrap(), "\"IDENTITY_CREATED\"");
        assert_eq!(serde_json::to_string(&ConsistencyMode::Optimistic).unwrap(), "\"OPTIMISTIC\"");
    }

    #[test]
    fn reserved_keys_are_recognised() {
        assert!(reserved::is_reserved("delta"));
        assert!(!reserved::is_reserved("note"));
    }

    #[test]
    fn enum_tokens_parse_through_from_str() {
        assert_eq!("identity_created".parse::<EventType>(), Ok(EventType::IdentityCreated));
        assert_eq!("QUEST_COMPLETED".parse::<EventType>(), Ok(EventType::Custom));
        assert_eq!("optimistic".parse::<ConsistencyMode>(), Ok(ConsistencyMode::Optimistic));
        assert_eq!("LINEARIZABLE".parse::<ConsistencyMode>(), Ok(ConsistencyMode::Strong));
    }
}
