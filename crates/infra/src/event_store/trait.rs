use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use assetlog_core::{AssetId, ExpectedVersion, LedgerResult};
use assetlog_events::{Event, EventFilter, EventType, Pagination};

/// An event that has been **persisted** and assigned a position in the log.
///
/// ## Sequence numbers
///
/// `sequence` is global: every append gets the next number (last + 1), with
/// no gaps and no reuse. It defines persistence order, which is also the
/// order in which subscribers are notified and in which projections catch up.
///
/// `stream_version` is the version of the event's stream *after* this append
/// and is what [`ExpectedVersion`] is checked against.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub sequence: u64,
    pub stream_version: u64,
    pub event: Event,
}

/// Time-ordered history together with the log position it was read at.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    pub events: Vec<Event>,
    /// Highest sequence in the log when the snapshot was taken.
    pub head: u64,
}

/// Stream an event is versioned in.
///
/// A transaction belongs to its asset's stream; any other event to the stream
/// of its type.
pub fn stream_key(event: &Event) -> String {
    match event.transaction() {
        Some(tx) => asset_stream(tx.asset()),
        None => type_stream(event.event_type()),
    }
}

pub fn asset_stream(asset: &AssetId) -> String {
    format!("asset:{}", asset.full_id())
}

pub fn type_stream(event_type: EventType) -> String {
    format!("type:{event_type}")
}

/// Append-only event store: the ledger's only source of truth.
///
/// ## Append semantics
///
/// `append()`:
/// - checks optimistic concurrency against the event's stream version
/// - assigns the next global sequence number
/// - makes the event visible to every read atomically (no partial writes)
///
/// Appending an id that is already stored is idempotent when the content is
/// identical (the stored record is returned and nothing is added) and a
/// `Conflict` otherwise.
///
/// ## Ordering
///
/// History reads are ordered by `(occurred_at, sequence)`. `events_after`
/// is ordered by `sequence`.
///
/// ## Implementation requirements
///
/// Implementations must serialize appends so that persistence order is well
/// defined, and must never expose a half-written event.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: Event, expected_version: ExpectedVersion) -> LedgerResult<StoredEvent>;

    /// Events with `sequence > after`, in sequence order.
    async fn events_after(&self, after: u64) -> LedgerResult<Vec<StoredEvent>>;

    /// Full time-ordered history, optionally cut at `occurred_at <= until`.
    async fn load_history(&self, until: Option<DateTime<Utc>>) -> LedgerResult<HistorySnapshot>;

    /// Time-ordered, filtered, paginated history.
    async fn query(&self, filter: &EventFilter, pagination: Pagination) -> LedgerResult<Vec<StoredEvent>>;

    /// Current version of `stream` (0 for an empty stream).
    async fn stream_version(&self, stream: &str) -> LedgerResult<u64>;
}

#[async_trait]
impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    async fn append(&self, event: Event, expected_version: ExpectedVersion) -> LedgerResult<StoredEvent> {
        (**self).append(event, expected_version).await
    }

    async fn events_after(&self, after: u64) -> LedgerResult<Vec<StoredEvent>> {
        (**self).events_after(after).await
    }

    async fn load_history(&self, until: Option<DateTime<Utc>>) -> LedgerResult<HistorySnapshot> {
        (**self).load_history(until).await
    }

    async fn query(&self, filter: &EventFilter, pagination: Pagination) -> LedgerResult<Vec<StoredEvent>> {
        (**self).query(filter, pagination).await
    }

    async fn stream_version(&self, stream: &str) -> LedgerResult<u64> {
        (**self).stream_version(stream).await
    }
}
