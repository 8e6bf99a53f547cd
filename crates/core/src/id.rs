//! Strongly-typed identifiers used across the ledger.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Globally unique identifier of an event.
///
/// Opaque string token. Replayed events must carry their original id so that
/// idempotent consumers can deduplicate them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    pub fn new(value: impl Into<String>) -> Result<Self, LedgerError> {
        let value = value.into();
        if value.is_empty() {
            return Err(LedgerError::invalid_id("EventId cannot be empty"));
        }
        Ok(Self(value))
    }

    /// Create a fresh identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Only for genuinely new events.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EventId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EventId {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventId> for String {
    fn from(value: EventId) -> Self {
        value.0
    }
}

/// Ownership boundary of an asset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetScope {
    Player,
    Server,
    Global,
    Unknown,
}

impl AssetScope {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetScope::Player => "player",
            AssetScope::Server => "server",
            AssetScope::Global => "global",
            AssetScope::Unknown => "unknown",
        }
    }

    /// Case-insensitive parse; unrecognised tokens map to `Unknown`.
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "player" => AssetScope::Player,
            "server" => AssetScope::Server,
            "global" => AssetScope::Global,
            _ => AssetScope::Unknown,
        }
    }
}

impl fmt::Display for AssetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetScope {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// What a transaction's delta applies to. Carries no numeric state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId {
    scope: AssetScope,
    name: String,
}

impl AssetId {
    pub fn new(scope: AssetScope, name: impl Into<String>) -> Result<Self, LedgerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(LedgerError::invalid_id("asset name cannot be empty"));
        }
        Ok(Self { scope, name })
    }

    pub fn scope(&self) -> AssetScope {
        self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical `scope:name` form, scope lower-case (e.g. `player:coins`).
    pub fn full_id(&self) -> String {
        format!("{}:{}", self.scope, self.name)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}

impl FromStr for AssetId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scope, name) = split_qualified(s, "AssetId")?;
        Self::new(AssetScope::parse(scope), name)
    }
}

impl TryFrom<String> for AssetId {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssetId> for String {
    fn from(value: AssetId) -> Self {
        value.full_id()
    }
}

/// Identifies one projection's output stream (`namespace:name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectionId {
    namespace: String,
    name: String,
}

impl ProjectionId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self, LedgerError> {
        let namespace = namespace.into();
        let name = name.into();
        if namespace.is_empty() {
            return Err(LedgerError::invalid_id("projection namespace cannot be empty"));
        }
        if name.is_empty() {
            return Err(LedgerError::invalid_id("projection name cannot be empty"));
        }
        Ok(Self { namespace, name })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }
}

impl fmt::Display for ProjectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

impl FromStr for ProjectionId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = split_qualified(s, "ProjectionId")?;
        Self::new(namespace, name)
    }
}

impl TryFrom<String> for ProjectionId {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectionId> for String {
    fn from(value: ProjectionId) -> Self {
        value.value()
    }
}

/// Split at the first `:`; both sides must be non-empty.
fn split_qualified<'a>(s: &'a str, what: &str) -> Result<(&'a str, &'a str), LedgerError> {
    match s.split_once(':') {
        Some((head, tail)) if !head.is_empty() && !tail.is_empty() => Ok((head, tail)),
        _ => Err(LedgerError::invalid_id(format!("{what}: `{s}` is not `prefix:name`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_id_full_id_uses_lowercase_scope() {
        let asset = AssetId::new(AssetScope::Player, "coins").unwrap();
        assert_eq!(asset.full_id(), "player:coins");
    }

    #[test]
    fn asset_id_round_trips_through_full_id() {
        for scope in [AssetScope::Player, AssetScope::Server, AssetScope::Global, AssetScope::Unknown] {
            let asset = AssetId::new(scope, "world_boss:hp").unwrap();
            let parsed: AssetId = asset.full_id().parse().unwrap();
            assert_eq!(parsed, asset);
        }
    }

    #[test]
    fn asset_scope_parse_is_case_insensitive_and_total() {
        let asset: AssetId = "SERVER:boss_hp".parse().unwrap();
        assert_eq!(asset.scope(), AssetScope::Server);

        let odd: AssetId = "galaxy:stars".parse().unwrap();
        assert_eq!(odd.scope(), AssetScope::Unknown);
        assert_eq!(odd.name(), "stars");
    }

    #[test]
    fn malformed_qualified_ids_are_rejected() {
        for raw in ["", "coins", ":coins", "player:"] {
            assert!(raw.parse::<AssetId>().is_err(), "{raw:?} should be rejected");
            assert!(raw.parse::<ProjectionId>().is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn projection_id_name_may_contain_colons() {
        let id: ProjectionId = "balance:player:coins".parse().unwrap();
        assert_eq!(id.namespace(), "balance");
        assert_eq!(id.name(), "player:coins");
        assert_eq!(id.value().parse::<ProjectionId>().unwrap(), id);
    }

    #[test]
    fn event_ids_are_non_empty_and_generated_unique() {
        assert!(EventId::new("").is_err());
        assert_ne!(EventId::generate(), EventId::generate());
    }

    #[test]
    fn asset_id_serializes_as_full_id_string() {
        let asset = AssetId::new(AssetScope::Global, "reputation").unwrap();
        let json = serde_json::to_string(&asset).unwrap();
        assert_eq!(json, "\"global:reputation\"");
        let back: AssetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, asset);
    }

    #[test]
    fn asset_scope_from_str_is_total() {
        assert_eq!("Server".parse::<AssetScope>(), Ok(AssetScope::Server));
        assert_eq!("realm".parse::<AssetScope>(), Ok(AssetScope::Unknown));
    }
}
