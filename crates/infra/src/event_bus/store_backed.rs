use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use assetlog_core::{ExpectedVersion, LedgerError, LedgerResult};
use assetlog_events::{Event, EventBus, EventFilter, EventHandler, EventType, Pagination, SubscriptionId};

use crate::config::LedgerConfig;
use crate::event_store::{EventStore, StoredEvent};

struct Subscriber {
    id: SubscriptionId,
    /// `None` receives every event.
    event_type: Option<EventType>,
    tx: mpsc::UnboundedSender<Arc<Event>>,
}

impl Subscriber {
    fn wants(&self, event: &Event) -> bool {
        self.event_type.is_none_or(|t| t == event.event_type())
    }
}

/// Event bus whose `publish` completes only after the event store append.
///
/// ## Ordering invariant
///
/// **Notification happens only after append succeeds.** Appends and the
/// fan-out that follows them are serialized, so every subscriber receives
/// events in persistence order.
///
/// ## Subscribers
///
/// Each subscription owns an unbounded queue drained by its own task on the
/// configured executor. Publishing only enqueues, so a slow or failing handler
/// never delays the publisher or its siblings. Handlers are synchronous and
/// run on the executor's blocking pool one event at a time, so a handler that
/// blocks holds up only its own subscription. Handler errors and panics are
/// logged and dropped.
pub struct StoreBackedEventBus<S> {
    store: S,
    executor: Handle,
    config: LedgerConfig,
    publish_lock: tokio::sync::Mutex<()>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl<S> StoreBackedEventBus<S>
where
    S: EventStore,
{
    pub fn new(store: S, executor: Handle, config: LedgerConfig) -> Self {
        Self {
            store,
            executor,
            config,
            publish_lock: tokio::sync::Mutex::new(()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        // A panic while holding this lock cannot leave the vector half-updated.
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn add_subscriber(&self, event_type: Option<EventType>, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        self.executor.spawn(deliver(id.clone(), handler, rx));
        self.lock_subscribers().push(Subscriber {
            id: id.clone(),
            event_type,
            tx,
        });
        debug!(subscription = %id, event_type = ?event_type, "subscription added");
        id
    }

    fn fan_out(&self, stored: &StoredEvent) {
        let event = Arc::new(stored.event.clone());
        let mut subs = self.lock_subscribers();
        // Drop subscribers whose worker has gone away.
        subs.retain(|sub| !sub.wants(&event) || sub.tx.send(Arc::clone(&event)).is_ok());
    }
}

async fn deliver(id: SubscriptionId, handler: Arc<dyn EventHandler>, mut rx: mpsc::UnboundedReceiver<Arc<Event>>) {
    while let Some(event) = rx.recv().await {
        let event_id = event.id().clone();
        let handler = Arc::clone(&handler);
        match tokio::task::spawn_blocking(move || handler.handle(&event)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(subscription = %id, event_id = %event_id, error = ?err, "event handler failed");
            }
            Err(join) if join.is_panic() => {
                error!(subscription = %id, event_id = %event_id, "event handler panicked");
            }
            Err(_) => {
                debug!(subscription = %id, "executor shutting down");
                break;
            }
        }
    }
    debug!(subscription = %id, "subscription worker stopped");
}

#[async_trait]
impl<S> EventBus for StoreBackedEventBus<S>
where
    S: EventStore,
{
    async fn publish_expecting(&self, event: Event, expected: ExpectedVersion) -> LedgerResult<()> {
        let event_id = event.id().clone();
        let event_type = event.event_type();
        let limit = self.config.publish_timeout;

        let outcome = tokio::time::timeout(limit, async {
            let _serialized = self.publish_lock.lock().await;
            let stored = self.store.append(event, expected).await?;
            self.fan_out(&stored);
            Ok::<_, LedgerError>(stored)
        })
        .await;

        match outcome {
            Ok(Ok(stored)) => {
                debug!(
                    event_id = %event_id,
                    event_type = %event_type,
                    sequence = stored.sequence,
                    "event persisted"
                );
                Ok(())
            }
            Ok(Err(err @ LedgerError::Conflict(_))) => {
                debug!(event_id = %event_id, error = %err, "publish rejected by concurrency check");
                Err(err)
            }
            Ok(Err(err)) => {
                warn!(event_id = %event_id, error = %err, code = err.kind().code(), "publish failed; event not persisted");
                Err(err)
            }
            Err(_) => {
                warn!(event_id = %event_id, timeout = ?limit, "publish timed out; persistence outcome unknown");
                Err(LedgerError::timeout("publish", limit))
            }
        }
    }

    fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) -> LedgerResult<SubscriptionId> {
        Ok(self.add_subscriber(Some(event_type), handler))
    }

    fn subscribe_all(&self, handler: Arc<dyn EventHandler>) -> LedgerResult<SubscriptionId> {
        Ok(self.add_subscriber(None, handler))
    }

    fn unsubscribe(&self, id: &SubscriptionId) -> LedgerResult<()> {
        let mut subs = self.lock_subscribers();
        let before = subs.len();
        // Dropping the sender lets the worker drain what is queued, then stop.
        subs.retain(|sub| &sub.id != id);
        if subs.len() == before {
            return Err(LedgerError::not_found("subscription", id.as_str()));
        }
        debug!(subscription = %id, "subscription removed");
        Ok(())
    }

    async fn query_history(&self, filter: EventFilter, pagination: Pagination) -> LedgerResult<Vec<Event>> {
        let page = self.config.page(Some(pagination));
        let limit = self.config.query_timeout;
        match tokio::time::timeout(limit, self.store.query(&filter, page)).await {
            Ok(result) => Ok(result?.into_iter().map(|stored| stored.event).collect()),
            Err(_) => {
                warn!(timeout = ?limit, "history query timed out");
                Err(LedgerError::timeout("query_history", limit))
            }
        }
    }
}
