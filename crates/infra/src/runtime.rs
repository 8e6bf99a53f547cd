//! Explicit wiring of the ledger services.
//!
//! A [`LedgerRuntime`] is built once at process start and passed around by
//! reference. Each component may be supplied at most once.
//!
//! ```ignore
//! let runtime = LedgerRuntime::builder()
//!     .event_store(InMemoryEventStore::new())
//!     .executor(tokio::runtime::Handle::current())
//!     .config(LedgerConfig::from_env()?)
//!     .build()?;
//!
//! runtime.transactions().execute_delta(asset, dec!(5), actor, ConsistencyMode::Strong).await?;
//! let balance = runtime.queries().query_balance(&asset, Some(&actor)).await?;
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use assetlog_core::{LedgerError, LedgerResult};

use crate::config::LedgerConfig;
use crate::event_bus::StoreBackedEventBus;
use crate::event_store::EventStore;
use crate::identity::{IdentityService, InMemoryIdentityService};
use crate::projections::{BalancesProjection, ProjectionQueryService};
use crate::transaction_service::TransactionService;

pub type SharedEventStore = Arc<dyn EventStore>;
pub type SharedIdentityService = Arc<dyn IdentityService>;
pub type LedgerBus = StoreBackedEventBus<SharedEventStore>;
pub type LedgerQueries = ProjectionQueryService<SharedEventStore>;
pub type LedgerTransactions = TransactionService<Arc<LedgerBus>, SharedEventStore, SharedIdentityService>;

pub struct LedgerRuntime {
    config: LedgerConfig,
    store: SharedEventStore,
    bus: Arc<LedgerBus>,
    queries: Arc<LedgerQueries>,
    transactions: Arc<LedgerTransactions>,
    identities: SharedIdentityService,
}

impl LedgerRuntime {
    pub fn builder() -> LedgerRuntimeBuilder {
        LedgerRuntimeBuilder::default()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedEventStore {
        &self.store
    }

    pub fn bus(&self) -> &Arc<LedgerBus> {
        &self.bus
    }

    pub fn queries(&self) -> &Arc<LedgerQueries> {
        &self.queries
    }

    pub fn transactions(&self) -> &Arc<LedgerTransactions> {
        &self.transactions
    }

    pub fn identities(&self) -> &SharedIdentityService {
        &self.identities
    }
}

#[derive(Default)]
pub struct LedgerRuntimeBuilder {
    store: Option<SharedEventStore>,
    identities: Option<SharedIdentityService>,
    config: Option<LedgerConfig>,
    executor: Option<Handle>,
    supplied_twice: Vec<&'static str>,
}

impl LedgerRuntimeBuilder {
    pub fn event_store(self, store: impl EventStore + 'static) -> Self {
        self.shared_event_store(Arc::new(store))
    }

    pub fn shared_event_store(mut self, store: SharedEventStore) -> Self {
        set_once(&mut self.store, store, "event_store", &mut self.supplied_twice);
        self
    }

    pub fn identity_service(mut self, identities: SharedIdentityService) -> Self {
        set_once(&mut self.identities, identities, "identity_service", &mut self.supplied_twice);
        self
    }

    pub fn config(mut self, config: LedgerConfig) -> Self {
        set_once(&mut self.config, config, "config", &mut self.supplied_twice);
        self
    }

    /// Executor on which subscriber workers run.
    pub fn executor(mut self, executor: Handle) -> Self {
        set_once(&mut self.executor, executor, "executor", &mut self.supplied_twice);
        self
    }

    pub fn build(self) -> LedgerResult<LedgerRuntime> {
        if let Some(component) = self.supplied_twice.first() {
            return Err(LedgerError::conflict(format!("{component} was supplied more than once")));
        }
        let store = self.store.ok_or_else(|| LedgerError::missing("event_store"))?;
        let executor = self.executor.ok_or_else(|| LedgerError::missing("executor"))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let identities = self
            .identities
            .unwrap_or_else(|| Arc::new(InMemoryIdentityService::new()) as SharedIdentityService);

        let bus = Arc::new(StoreBackedEventBus::new(Arc::clone(&store), executor, config.clone()));
        let queries = Arc::new(ProjectionQueryService::new(Arc::clone(&store), config.clone()));
        queries.register_projection(BalancesProjection::new()?)?;
        let transactions = Arc::new(TransactionService::new(
            Arc::clone(&bus),
            Arc::clone(&store),
            Arc::clone(&identities),
        ));

        info!(
            publish_timeout = ?config.publish_timeout,
            query_timeout = ?config.query_timeout,
            "ledger runtime built"
        );

        Ok(LedgerRuntime {
            config,
            store,
            bus,
            queries,
            transactions,
            identities,
        })
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, name: &'static str, supplied_twice: &mut Vec<&'static str>) {
    if slot.is_some() {
        supplied_twice.push(name);
    } else {
        *slot = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryEventStore;
    use assetlog_events::Projection;

    #[tokio::test]
    async fn components_may_be_supplied_once() {
        let err = LedgerRuntime::builder()
            .event_store(InMemoryEventStore::new())
            .event_store(InMemoryEventStore::new())
            .executor(Handle::current())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn store_and_executor_are_required() {
        let err = LedgerRuntime::builder().executor(Handle::current()).build().err().unwrap();
        assert_eq!(err, LedgerError::missing("event_store"));

        let err = LedgerRuntime::builder()
            .event_store(InMemoryEventStore::new())
            .build()
            .err()
            .unwrap();
        assert_eq!(err, LedgerError::missing("executor"));
    }

    #[tokio::test]
    async fn balances_projection_is_registered() {
        let runtime = LedgerRuntime::builder()
            .event_store(InMemoryEventStore::new())
            .executor(Handle::current())
            .build()
            .unwrap();
        let ids = runtime.queries().registered_ids().unwrap();
        assert_eq!(ids, vec![BalancesProjection::new().unwrap().id()]);
    }
}
