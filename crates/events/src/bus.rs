//! Event publishing/subscription contract.
//!
//! The bus is the single entry point through which facts enter the ledger.
//!
//! ## Durability
//!
//! `publish` resolves successfully **only once the event is durably persisted**
//! in the backing event store. It does not wait for subscribers. A crash of any
//! consumer after `publish` returned `Ok` can therefore never lose the event:
//! it is visible to `query_history` and to projection replay.
//!
//! An event has exactly two durable states: not yet persisted (publish in
//! flight or failed) and persisted (terminal). There is no retraction;
//! corrections are new, compensating events.
//!
//! ## Handlers are advisory
//!
//! Subscribers are notified after persistence. A failing (or panicking)
//! handler:
//! - does not roll back the publication
//! - does not affect sibling handlers
//! - does not block the publisher
//!
//! Failures are logged per subscriber and otherwise dropped.
//!
//! ## Delivery
//!
//! Each subscriber sees events in persistence order. Handlers should still be
//! idempotent: replayed events keep their original id, so deduplicating by
//! [`EventId`](assetlog_core::EventId) is always possible.

use core::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use assetlog_core::{ExpectedVersion, LedgerResult};

use crate::event::{Event, EventType};
use crate::query::{EventFilter, Pagination};

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A subscriber callback.
///
/// Errors are reported to the bus for logging only; they never reach the
/// publisher. `handle` is synchronous and may block; bus implementations
/// must not call it on an async worker thread.
pub trait EventHandler: Send + Sync + 'static {
    fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn handle(&self, event: &Event) -> anyhow::Result<()> {
        self(event)
    }
}

/// Durable publish plus fan-out.
///
/// All methods are async or non-blocking; none of them waits on a handler.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Persist `event`, then notify matching subscribers.
    ///
    /// `Ok` means durably persisted. `Err(Timeout)` means the outcome is
    /// unknown; re-query history before assuming it was not stored.
    async fn publish(&self, event: Event) -> LedgerResult<()> {
        self.publish_expecting(event, ExpectedVersion::Any).await
    }

    /// Like [`publish`](Self::publish), with an optimistic concurrency check on
    /// the event's stream.
    async fn publish_expecting(&self, event: Event, expected: ExpectedVersion) -> LedgerResult<()>;

    /// Receive events of one type.
    fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) -> LedgerResult<SubscriptionId>;

    /// Receive every event.
    fn subscribe_all(&self, handler: Arc<dyn EventHandler>) -> LedgerResult<SubscriptionId>;

    /// Stop delivery to a subscription. Unknown ids are `NotFound`.
    fn unsubscribe(&self, id: &SubscriptionId) -> LedgerResult<()>;

    /// Persisted events matching `filter`, ordered by `occurred_at`.
    async fn query_history(&self, filter: EventFilter, pagination: Pagination) -> LedgerResult<Vec<Event>>;
}

#[async_trait]
impl<B> EventBus for Arc<B>
where
    B: EventBus + ?Sized,
{
    async fn publish(&self, event: Event) -> LedgerResult<()> {
        (**self).publish(event).await
    }

    async fn publish_expecting(&self, event: Event, expected: ExpectedVersion) -> LedgerResult<()> {
        (**self).publish_expecting(event, expected).await
    }

    fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) -> LedgerResult<SubscriptionId> {
        (**self).subscribe(event_type, handler)
    }

    fn subscribe_all(&self, handler: Arc<dyn EventHandler>) -> LedgerResult<SubscriptionId> {
        (**self).subscribe_all(handler)
    }

    fn unsubscribe(&self, id: &SubscriptionId) -> LedgerResult<()> {
        (**self).unsubscribe(id)
    }

    async fn query_history(&self, filter: EventFilter, pagination: Pagination) -> LedgerResult<Vec<Event>> {
        (**self).query_history(filter, pagination).await
    }
}
