//! Identity resolution boundary.
//!
//! The ledger only needs to know whether an identity exists; how identities
//! are stored or authenticated is up to the implementation behind
//! [`IdentityService`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use assetlog_core::{Identity, IdentityType, LedgerError, LedgerResult};

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The registered identity for `(id, type)`, if any.
    async fn resolve(&self, id: &str, identity_type: IdentityType) -> LedgerResult<Option<Identity>>;

    /// Whether `identity` is registered.
    async fn verify(&self, identity: &Identity) -> LedgerResult<bool>;

    /// Register a new identity. Registering an existing `(id, type)` is a `Conflict`.
    async fn create(
        &self,
        id: &str,
        identity_type: IdentityType,
        metadata: BTreeMap<String, String>,
    ) -> LedgerResult<Identity>;
}

#[async_trait]
impl<I> IdentityService for Arc<I>
where
    I: IdentityService + ?Sized,
{
    async fn resolve(&self, id: &str, identity_type: IdentityType) -> LedgerResult<Option<Identity>> {
        (**self).resolve(id, identity_type).await
    }

    async fn verify(&self, identity: &Identity) -> LedgerResult<bool> {
        (**self).verify(identity).await
    }

    async fn create(
        &self,
        id: &str,
        identity_type: IdentityType,
        metadata: BTreeMap<String, String>,
    ) -> LedgerResult<Identity> {
        (**self).create(id, identity_type, metadata).await
    }
}

/// In-memory identity registry for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryIdentityService {
    identities: RwLock<HashMap<(IdentityType, String), Identity>>,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn resolve(&self, id: &str, identity_type: IdentityType) -> LedgerResult<Option<Identity>> {
        let identities = self
            .identities
            .read()
            .map_err(|_| LedgerError::persistence("identity registry lock poisoned"))?;
        Ok(identities.get(&(identity_type, id.to_string())).cloned())
    }

    async fn verify(&self, identity: &Identity) -> LedgerResult<bool> {
        Ok(self.resolve(identity.id(), identity.identity_type()).await?.is_some())
    }

    async fn create(
        &self,
        id: &str,
        identity_type: IdentityType,
        metadata: BTreeMap<String, String>,
    ) -> LedgerResult<Identity> {
        let identity = Identity::new(id, identity_type)?.with_metadata(metadata);
        let mut identities = self
            .identities
            .write()
            .map_err(|_| LedgerError::persistence("identity registry lock poisoned"))?;
        let key = (identity_type, id.to_string());
        if identities.contains_key(&key) {
            return Err(LedgerError::conflict(format!("identity `{identity}` already exists")));
        }
        identities.insert(key, identity.clone());
        debug!(identity = %identity, "identity created");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_resolve_and_verify() {
        let service = InMemoryIdentityService::new();
        let meta = BTreeMap::from([("name".to_string(), "Alice".to_string())]);
        let alice = service.create("alice", IdentityType::Player, meta).await.unwrap();

        let resolved = service.resolve("alice", IdentityType::Player).await.unwrap().unwrap();
        assert_eq!(resolved.metadata().get("name").map(String::as_str), Some("Alice"));
        assert!(service.verify(&alice).await.unwrap());
        assert!(!service.verify(&Identity::system("alice").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_create_is_a_conflict() {
        let service = InMemoryIdentityService::new();
        service.create("bot", IdentityType::Ai, BTreeMap::new()).await.unwrap();
        let err = service.create("bot", IdentityType::Ai, BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(service.create("", IdentityType::Ai, BTreeMap::new()).await.is_err());
    }
}
