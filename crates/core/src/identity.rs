//! Actors: who caused an event.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::str::FromStr;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityType {
    Player,
    System,
    Ai,
    External,
    Unknown,
}

impl IdentityType {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentityType::Player => "PLAYER",
            IdentityType::System => "SYSTEM",
            IdentityType::Ai => "AI",
            IdentityType::External => "EXTERNAL",
            IdentityType::Unknown => "UNKNOWN",
        }
    }

    /// Case-insensitive parse; unrecognised tokens map to `Unknown`.
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "PLAYER" => IdentityType::Player,
            "SYSTEM" => IdentityType::System,
            "AI" => IdentityType::Ai,
            "EXTERNAL" => IdentityType::External,
            _ => IdentityType::Unknown,
        }
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityType {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// An actor: player, system component, AI agent or external service.
///
/// Immutable value. Equality, ordering and hashing consider only
/// `(identity_type, id)`; metadata and attached policies are descriptive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    id: String,
    identity_type: IdentityType,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    attached_policy_ids: Vec<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, identity_type: IdentityType) -> Result<Self, LedgerError> {
        let id = id.into();
        if id.is_empty() {
            return Err(LedgerError::invalid_id("identity id cannot be empty"));
        }
        Ok(Self {
            id,
            identity_type,
            metadata: BTreeMap::new(),
            attached_policy_ids: Vec::new(),
        })
    }

    pub fn player(id: impl Into<String>) -> Result<Self, LedgerError> {
        Self::new(id, IdentityType::Player)
    }

    pub fn system(id: impl Into<String>) -> Result<Self, LedgerError> {
        Self::new(id, IdentityType::System)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity_type(&self) -> IdentityType {
        self.identity_type
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn attached_policy_ids(&self) -> &[String] {
        &self.attached_policy_ids
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_policy_ids(mut self, policy_ids: Vec<String>) -> Self {
        self.attached_policy_ids = policy_ids;
        self
    }

    /// Structural validity (deserialized values bypass `new`).
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.identity_type == other.identity_type && self.id == other.id
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity_type.hash(state);
        self.id.hash(state);
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity_type
            .cmp(&other.identity_type)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Actor-string form `TYPE:id`.
impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identity_type, self.id)
    }
}

impl FromStr for Identity {
    type Err = LedgerError;

    /// Accepts `TYPE:id`, or a bare `id` which defaults to `PLAYER`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((token, id)) => Self::new(id, IdentityType::parse(token)),
            None => Self::player(s),
        }
    }
}
