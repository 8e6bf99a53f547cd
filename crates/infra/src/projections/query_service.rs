//! Projection registry, catch-up and replay.
//!
//! The query service owns the projections it maintains. State is derived from
//! the event store on demand:
//!
//! - `query_projection` catches a cached state up to the log head. Events are
//!   folded one by one when that is provably equivalent to a full recompute;
//!   otherwise the state is recomputed from full history.
//! - `replay` always recomputes from persisted events with
//!   `occurred_at <= target_time` and never reads or writes the cache.
//!
//! Different projections advance concurrently; one projection's state is
//! advanced by at most one query at a time.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use assetlog_core::{AssetId, Decimal, Identity, LedgerError, LedgerResult, ProjectionId};
use assetlog_events::{Event, EventFilter, Pagination, Projection};

use crate::config::LedgerConfig;
use crate::event_store::EventStore;
use crate::projections::balances::{Balances, BalancesProjection};

type AnyState = Box<dyn Any + Send + Sync>;

/// Object-safe view of a [`Projection`] with its state type erased.
trait ErasedProjection: Send + Sync {
    fn incremental(&self) -> bool;
    fn state_type_id(&self) -> TypeId;
    fn state_type_name(&self) -> &'static str;
    fn apply_all(&self, events: &[Event]) -> AnyState;
    fn apply_one(&self, state: AnyState, event: &Event) -> AnyState;
}

struct Erased<P>(P);

impl<P: Projection> ErasedProjection for Erased<P> {
    fn incremental(&self) -> bool {
        P::INCREMENTAL
    }

    fn state_type_id(&self) -> TypeId {
        TypeId::of::<P::State>()
    }

    fn state_type_name(&self) -> &'static str {
        type_name::<P::State>()
    }

    fn apply_all(&self, events: &[Event]) -> AnyState {
        Box::new(self.0.apply(events))
    }

    fn apply_one(&self, state: AnyState, event: &Event) -> AnyState {
        match state.downcast::<P::State>() {
            Ok(state) => Box::new(self.0.apply_event(*state, event)),
            // Slots only ever hold `P::State`.
            Err(other) => other,
        }
    }
}

struct Cached {
    state: AnyState,
    /// Highest sequence folded into `state`.
    cursor: u64,
    latest_at: Option<DateTime<Utc>>,
}

struct Registered {
    projection: Box<dyn ErasedProjection>,
    cache: Mutex<Option<Cached>>,
}

impl Registered {
    fn check_type<T: 'static>(&self, id: &ProjectionId) -> LedgerResult<()> {
        if self.projection.state_type_id() == TypeId::of::<T>() {
            Ok(())
        } else {
            Err(LedgerError::invalid_argument(format!(
                "projection `{id}` has state type `{}`, not `{}`",
                self.projection.state_type_name(),
                type_name::<T>()
            )))
        }
    }
}

fn downcast<T: Clone + 'static>(state: &AnyState) -> LedgerResult<T> {
    state
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| LedgerError::invalid_argument(format!("state is not `{}`", type_name::<T>())))
}

/// Query layer over the event store.
pub struct ProjectionQueryService<S> {
    store: S,
    config: LedgerConfig,
    registry: RwLock<HashMap<ProjectionId, Arc<Registered>>>,
}

impl<S> ProjectionQueryService<S>
where
    S: EventStore,
{
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            registry: RwLock::new(HashMap::new()),
        }
    }

    /// Start maintaining `projection`. A second registration under the same id is a `Conflict`.
    pub fn register_projection<P: Projection>(&self, projection: P) -> LedgerResult<()> {
        let id = projection.id();
        let mut registry = self
            .registry
            .write()
            .map_err(|_| LedgerError::persistence("projection registry lock poisoned"))?;
        if registry.contains_key(&id) {
            return Err(LedgerError::conflict(format!("projection `{id}` is already registered")));
        }
        registry.insert(
            id.clone(),
            Arc::new(Registered {
                projection: Box::new(Erased(projection)),
                cache: Mutex::new(None),
            }),
        );
        info!(projection = %id, incremental = P::INCREMENTAL, "projection registered");
        Ok(())
    }

    pub fn unregister_projection(&self, id: &ProjectionId) -> LedgerResult<()> {
        let mut registry = self
            .registry
            .write()
            .map_err(|_| LedgerError::persistence("projection registry lock poisoned"))?;
        if registry.remove(id).is_none() {
            return Err(LedgerError::not_found("projection", id.value()));
        }
        info!(projection = %id, "projection unregistered");
        Ok(())
    }

    pub fn registered_ids(&self) -> LedgerResult<Vec<ProjectionId>> {
        let registry = self
            .registry
            .read()
            .map_err(|_| LedgerError::persistence("projection registry lock poisoned"))?;
        let mut ids: Vec<_> = registry.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Current state of a registered projection, caught up to the log head.
    pub async fn query_projection<T: Clone + 'static>(&self, id: &ProjectionId) -> LedgerResult<T> {
        let entry = self.lookup(id)?;
        entry.check_type::<T>(id)?;

        let mut cache = entry.cache.lock().await;
        let refreshed = match cache.take() {
            Some(cached) => self.catch_up(id, &entry, cached).await?,
            None => self.recompute(&entry).await?,
        };
        let state = downcast::<T>(&refreshed.state);
        *cache = Some(refreshed);
        state
    }

    /// State recomputed from persisted events with `occurred_at <= target_time`.
    pub async fn replay<T: Clone + 'static>(&self, id: &ProjectionId, target_time: DateTime<Utc>) -> LedgerResult<T> {
        let entry = self.lookup(id)?;
        entry.check_type::<T>(id)?;

        let snapshot = self.bounded("replay", self.store.load_history(Some(target_time))).await?;
        debug!(projection = %id, events = snapshot.events.len(), until = %target_time, "replaying projection");
        downcast::<T>(&entry.projection.apply_all(&snapshot.events))
    }

    /// Balance of `asset` held by `holder` (`None`: held by the asset itself).
    ///
    /// Requires [`BalancesProjection`] to be registered. A balance that left the
    /// exact decimal range is a `Codec(Overflow)` error.
    pub async fn query_balance(&self, asset: &AssetId, holder: Option<&Identity>) -> LedgerResult<Decimal> {
        let id = BalancesProjection::new()?.id();
        let balances: Balances = self.query_projection(&id).await?;
        balances.get(asset, holder)
    }

    pub async fn query_history(&self, filter: EventFilter, pagination: Option<Pagination>) -> LedgerResult<Vec<Event>> {
        let page = self.config.page(pagination);
        let stored = self.bounded("query_history", self.store.query(&filter, page)).await?;
        Ok(stored.into_iter().map(|s| s.event).collect())
    }

    fn lookup(&self, id: &ProjectionId) -> LedgerResult<Arc<Registered>> {
        let registry = self
            .registry
            .read()
            .map_err(|_| LedgerError::persistence("projection registry lock poisoned"))?;
        registry
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("projection", id.value()))
    }

    async fn catch_up(&self, id: &ProjectionId, entry: &Registered, cached: Cached) -> LedgerResult<Cached> {
        let fresh = self.bounded("query_projection", self.store.events_after(cached.cursor)).await?;
        let Some(last) = fresh.last() else {
            return Ok(cached);
        };

        // Folding is only equivalent to a recompute when the new events sort
        // after everything already folded.
        let mut latest = cached.latest_at;
        let in_order = fresh.iter().all(|stored| {
            let at = stored.event.occurred_at();
            let ok = latest.is_none_or(|prev| at >= prev);
            latest = Some(at);
            ok
        });

        if !entry.projection.incremental() || !in_order {
            debug!(
                projection = %id,
                incremental = entry.projection.incremental(),
                in_order,
                "falling back to full recompute"
            );
            return self.recompute(entry).await;
        }

        let cursor = last.sequence;
        let mut state = cached.state;
        for stored in &fresh {
            state = entry.projection.apply_one(state, &stored.event);
        }
        Ok(Cached {
            state,
            cursor,
            latest_at: latest,
        })
    }

    async fn recompute(&self, entry: &Registered) -> LedgerResult<Cached> {
        let snapshot = self.bounded("query_projection", self.store.load_history(None)).await?;
        Ok(Cached {
            state: entry.projection.apply_all(&snapshot.events),
            cursor: snapshot.head,
            latest_at: snapshot.events.last().map(Event::occurred_at),
        })
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = LedgerResult<T>>,
    ) -> LedgerResult<T> {
        let limit = self.config.query_timeout;
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| LedgerError::timeout(operation, limit))?
    }
}
