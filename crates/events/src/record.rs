//! Serializable wire records for events.
//!
//! The in-memory [`Event`] carries transaction details natively. On the wire a
//! transaction is a plain event record whose payload also holds the reserved
//! keys (`asset`, `delta`, `consistency`, `source`, `target`, `reason`), so
//! consumers that only understand the generic event shape can still read it.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use assetlog_core::{AssetId, EventId, Identity, IdentityType, LedgerError, LedgerResult};

use crate::draft::{EventDraft, Origin, TransactionDraft};
use crate::event::{ConsistencyMode, Event, EventType, reserved};
use crate::payload::{Payload, PayloadValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    #[serde(rename = "type", deserialize_with = "total_parse")]
    pub identity_type: IdentityType,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub policy_ids: Vec<String>,
}

impl From<&Identity> for IdentityRecord {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id().to_string(),
            identity_type: identity.identity_type(),
            metadata: identity.metadata().clone(),
            policy_ids: identity.attached_policy_ids().to_vec(),
        }
    }
}

impl TryFrom<IdentityRecord> for Identity {
    type Error = LedgerError;

    fn try_from(record: IdentityRecord) -> Result<Self, Self::Error> {
        Ok(Identity::new(record.id, record.identity_type)?
            .with_metadata(record.metadata)
            .with_policy_ids(record.policy_ids))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub occurred_at: DateTime<Utc>,
    pub actor: IdentityRecord,
    #[serde(rename = "type", deserialize_with = "total_parse")]
    pub event_type: EventType,
    pub payload: Payload,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_schema_version() -> u32 {
    1
}

/// Enum tokens from other producers may be unknown here; they map to the
/// enum's fallback variant instead of failing the whole record.
fn total_parse<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = Infallible>,
{
    let token = String::deserialize(deserializer)?;
    match token.parse::<T>() {
        Ok(value) => Ok(value),
        Err(never) => match never {},
    }
}

impl Event {
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            id: self.id.to_string(),
            occurred_at: self.occurred_at,
            actor: IdentityRecord::from(&self.actor),
            event_type: self.event_type,
            payload: self.wire_payload(),
            schema_version: self.schema_version,
            metadata: self.metadata.clone(),
        }
    }

    /// Rebuild an event from its wire record, keeping the recorded id and time.
    ///
    /// The result goes through the same validation as a freshly drafted event.
    pub fn from_record(record: EventRecord) -> LedgerResult<Event> {
        let origin = Origin::Replayed {
            id: EventId::new(record.id)?,
            occurred_at: record.occurred_at,
        };
        let actor = Identity::try_from(record.actor)?;

        if record.event_type != EventType::Transaction {
            return EventDraft {
                origin,
                actor: Some(actor),
                event_type: Some(record.event_type),
                payload: Some(record.payload),
                schema_version: record.schema_version,
                metadata: record.metadata,
            }
            .build();
        }

        let mut payload = record.payload;
        let asset = take_string(&mut payload, reserved::ASSET)?
            .map(|s| s.parse::<AssetId>())
            .transpose()?;
        let delta = match payload.remove(reserved::DELTA) {
            None | Some(PayloadValue::Null) => None,
            Some(PayloadValue::Decimal(d)) => Some(d),
            Some(other) => {
                return Err(LedgerError::invalid_payload(
                    reserved::DELTA,
                    format!("expected decimal, found {}", other.kind()),
                ));
            }
        };
        let consistency = take_string(&mut payload, reserved::CONSISTENCY)?.map(|s| ConsistencyMode::parse(&s));
        let source = take_string(&mut payload, reserved::SOURCE)?
            .map(|s| s.parse::<Identity>())
            .transpose()?;
        let target = take_string(&mut payload, reserved::TARGET)?
            .map(|s| s.parse::<Identity>())
            .transpose()?;
        let reason = take_string(&mut payload, reserved::REASON)?;

        TransactionDraft {
            origin,
            actor: Some(actor),
            asset,
            delta,
            consistency,
            source,
            target,
            reason,
            payload,
            schema_version: record.schema_version,
            metadata: record.metadata,
        }
        .build()
    }
}

fn take_string(payload: &mut Payload, key: &'static str) -> LedgerResult<Option<String>> {
    match payload.remove(key) {
        None | Some(PayloadValue::Null) => Ok(None),
        Some(PayloadValue::String(s)) => Ok(Some(s)),
        Some(other) => Err(LedgerError::invalid_payload(key, format!("expected string, found {}", other.kind()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetlog_core::AssetScope;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn transfer() -> Event {
        TransactionDraft {
            source: Some(Identity::player("alice").unwrap()),
            target: Some(Identity::new("payment:stripe", IdentityType::External).unwrap()),
            reason: Some("refund".into()),
            payload: Payload::new().with("order", 7i32),
            ..TransactionDraft::new(
                Identity::system("billing").unwrap(),
                AssetId::new(AssetScope::Player, "coins").unwrap(),
                dec!(-3.25),
                ConsistencyMode::Optimistic,
            )
        }
        .build()
        .unwrap()
    }

    #[test]
    fn transaction_survives_the_wire() {
        let event = transfer();
        let json = serde_json::to_string(&event.to_record()).unwrap();
        let record: EventRecord = serde_json::from_str(&json).unwrap();
        let back = Event::from_record(record).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.transaction().unwrap().consistency(), ConsistencyMode::Optimistic);
    }

    #[test]
    fn record_shape_uses_reserved_payload_keys() {
        let value = serde_json::to_value(transfer().to_record()).unwrap();
        assert_eq!(value["type"], json!("TRANSACTION"));
        assert_eq!(value["actor"]["type"], json!("SYSTEM"));
        assert_eq!(value["payload"]["asset"], json!({ "string": "player:coins" }));
        assert_eq!(value["payload"]["delta"], json!({ "decimal": { "value": "-3.25", "scale": 2 } }));
        assert_eq!(value["payload"]["target"], json!({ "string": "EXTERNAL:payment:stripe" }));
        assert_eq!(value["payload"]["order"], json!({ "int32": 7 }));
    }

    #[test]
    fn transaction_record_without_delta_is_rejected() {
        let mut record = transfer().to_record();
        record.payload.remove(reserved::DELTA);
        assert_eq!(Event::from_record(record).unwrap_err(), LedgerError::missing("delta"));
    }

    #[test]
    fn plain_record_round_trips_with_metadata() {
        let event = EventDraft {
            metadata: BTreeMap::from([("trace".to_string(), "abc".to_string())]),
            ..EventDraft::new(
                Identity::player("alice").unwrap(),
                EventType::IdentityCreated,
                Payload::new().with("display", "Alice"),
            )
        }
        .build()
        .unwrap();
        let back = Event::from_record(event.to_record()).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.metadata().get("trace").map(String::as_str), Some("abc"));
    }

    #[test]
    fn unknown_type_tokens_fall_back_instead_of_failing() {
        let raw = json!({
            "id": "evt-1",
            "occurred_at": "2024-01-01T00:00:00Z",
            "actor": { "id": "r2", "type": "ROBOT" },
            "type": "QUEST_COMPLETED",
            "payload": { "quest": { "string": "dragon" } }
        });
        let record: EventRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.actor.identity_type, IdentityType::Unknown);
        assert_eq!(record.event_type, EventType::Custom);

        let event = Event::from_record(record).unwrap();
        assert_eq!(event.event_type(), EventType::Custom);
        assert_eq!(event.actor().identity_type(), IdentityType::Unknown);
    }

    #[test]
    fn lower_case_tokens_are_accepted() {
        let raw = json!({
            "id": "evt-2",
            "occurred_at": "2024-01-01T00:00:00Z",
            "actor": { "id": "alice", "type": "player" },
            "type": "system",
            "payload": {}
        });
        let record: EventRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.actor.identity_type, IdentityType::Player);
        assert_eq!(record.event_type, EventType::System);
    }

    #[test]
    fn mistyped_reserved_value_names_the_found_kind() {
        let mut record = transfer().to_record();
        record.payload.insert(reserved::DELTA, "3.25");
        assert_eq!(
            Event::from_record(record).unwrap_err(),
            LedgerError::invalid_payload(reserved::DELTA, "expected decimal, found string")
        );
    }
}
