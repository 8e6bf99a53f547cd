//! Transaction execution with per-transaction consistency policy.
//!
//! ```text
//! Transaction
//!   ↓
//! 1. Pick the expected stream version from the consistency mode
//!   ↓
//! 2. Publish through the bus (durable append, version check)
//!   ↓
//! 3. Subscribers and projections observe the persisted event
//! ```
//!
//! | mode         | serialization        | append check                     |
//! |--------------|----------------------|----------------------------------|
//! | `STRONG`     | per-asset lock       | `Exact(version read under lock)` |
//! | `OPTIMISTIC` | none                 | `Exact(version observed by caller)` |
//! | `EVENTUAL`   | none                 | `Any`                            |
//!
//! A `Conflict` from STRONG or OPTIMISTIC means another writer got there
//! first; the caller may rebuild and retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use assetlog_core::{AssetId, Decimal, EventId, ExpectedVersion, Identity, LedgerError, LedgerResult};
use assetlog_events::{ConsistencyMode, Event, EventBus, TransactionDraft};

use crate::event_store::{EventStore, asset_stream};
use crate::identity::IdentityService;

pub struct TransactionService<B, S, I> {
    bus: B,
    store: S,
    identities: I,
    asset_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<B, S, I> TransactionService<B, S, I>
where
    B: EventBus,
    S: EventStore,
    I: IdentityService,
{
    pub fn new(bus: B, store: S, identities: I) -> Self {
        Self {
            bus,
            store,
            identities,
            asset_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current version of `asset`'s stream. OPTIMISTIC callers read this before
    /// building a transaction and pass it to [`execute_expecting`](Self::execute_expecting).
    pub async fn stream_version(&self, asset: &AssetId) -> LedgerResult<u64> {
        self.store.stream_version(&asset_stream(asset)).await
    }

    /// Apply `tx` according to its consistency mode.
    pub async fn execute(&self, tx: Event) -> LedgerResult<EventId> {
        let (stream, consistency) = transaction_stream(&tx)?;
        match consistency {
            ConsistencyMode::Strong => {
                let lock = self.asset_lock(&stream)?;
                let outcome = {
                    let _serialized = lock.lock().await;
                    match self.store.stream_version(&stream).await {
                        Ok(current) => self.publish(tx, ExpectedVersion::Exact(current)).await,
                        Err(err) => Err(err),
                    }
                };
                self.release_asset_lock(&stream, lock);
                outcome
            }
            ConsistencyMode::Optimistic => {
                let current = self.store.stream_version(&stream).await?;
                self.publish(tx, ExpectedVersion::Exact(current)).await
            }
            ConsistencyMode::Eventual => self.publish(tx, ExpectedVersion::Any).await,
        }
    }

    /// Apply `tx` with an explicit stream expectation, bypassing the mode's default.
    pub async fn execute_expecting(&self, tx: Event, expected: ExpectedVersion) -> LedgerResult<EventId> {
        transaction_stream(&tx)?;
        self.publish(tx, expected).await
    }

    /// Record `delta` on `asset` for `actor`.
    pub async fn execute_delta(
        &self,
        asset: AssetId,
        delta: Decimal,
        actor: Identity,
        consistency: ConsistencyMode,
    ) -> LedgerResult<EventId> {
        let tx = TransactionDraft::new(actor, asset, delta, consistency).build()?;
        self.execute(tx).await
    }

    /// Move `amount` of `asset` from `source` to `target` (STRONG).
    ///
    /// Both parties must be known to the identity service.
    pub async fn transfer(
        &self,
        asset: AssetId,
        amount: Decimal,
        source: Identity,
        target: Identity,
        reason: Option<String>,
    ) -> LedgerResult<EventId> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_argument(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }
        for party in [&source, &target] {
            if !self.identities.verify(party).await? {
                return Err(LedgerError::not_found("identity", party.to_string()));
            }
        }

        let tx = TransactionDraft {
            source: Some(source.clone()),
            target: Some(target),
            reason,
            ..TransactionDraft::new(source, asset, amount, ConsistencyMode::Strong)
        }
        .build()?;
        self.execute(tx).await
    }

    async fn publish(&self, tx: Event, expected: ExpectedVersion) -> LedgerResult<EventId> {
        let id = tx.id().clone();
        self.bus.publish_expecting(tx, expected).await?;
        debug!(event_id = %id, expected = ?expected, "transaction executed");
        Ok(id)
    }

    fn asset_lock(&self, stream: &str) -> LedgerResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .asset_locks
            .lock()
            .map_err(|_| LedgerError::persistence("asset lock table poisoned"))?;
        Ok(Arc::clone(locks.entry(stream.to_string()).or_default()))
    }

    /// Drop the table entry once no other writer holds or awaits it.
    fn release_asset_lock(&self, stream: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let Ok(mut locks) = self.asset_locks.lock() else {
            return;
        };
        if locks.get(stream).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(stream);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_asset_locks(&self) -> usize {
        self.asset_locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

fn transaction_stream(tx: &Event) -> LedgerResult<(String, ConsistencyMode)> {
    let details = tx
        .transaction()
        .ok_or_else(|| LedgerError::invalid_argument(format!("event `{}` is not a transaction", tx.id())))?;
    Ok((asset_stream(details.asset()), details.consistency()))
}
