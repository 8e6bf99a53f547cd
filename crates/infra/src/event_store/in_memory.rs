use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use assetlog_core::{EventId, ExpectedVersion, LedgerError, LedgerResult};
use assetlog_events::{Event, EventFilter, Pagination};

use super::r#trait::{EventStore, HistorySnapshot, StoredEvent, stream_key};

#[derive(Debug, Default)]
struct Log {
    /// Append order; `entries[i].sequence == i + 1`.
    entries: Vec<StoredEvent>,
    /// Indices into `entries`, ordered by `(occurred_at, sequence)`.
    by_time: Vec<usize>,
    by_id: HashMap<EventId, usize>,
    versions: HashMap<String, u64>,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    log: RwLock<Log>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Log>> {
        self.log
            .read()
            .map_err(|_| LedgerError::persistence("event log lock poisoned"))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Log>> {
        self.log
            .write()
            .map_err(|_| LedgerError::persistence("event log lock poisoned"))
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: Event, expected_version: ExpectedVersion) -> LedgerResult<StoredEvent> {
        let mut log = self.write()?;

        if let Some(&idx) = log.by_id.get(event.id()) {
            let existing = &log.entries[idx];
            return if existing.event == event {
                Ok(existing.clone())
            } else {
                Err(LedgerError::conflict(format!(
                    "event id `{}` already stored with different content",
                    event.id()
                )))
            };
        }

        let stream = stream_key(&event);
        let current = log.versions.get(&stream).copied().unwrap_or(0);
        expected_version.check(&stream, current)?;

        let idx = log.entries.len();
        let stored = StoredEvent {
            sequence: idx as u64 + 1,
            stream_version: current + 1,
            event,
        };

        // The new sequence is the largest, so it sorts after every event with the same timestamp.
        let at = stored.event.occurred_at();
        let pos = {
            let entries = &log.entries;
            log.by_time.partition_point(|&i| entries[i].event.occurred_at() <= at)
        };
        log.by_time.insert(pos, idx);
        log.by_id.insert(stored.event.id().clone(), idx);
        log.versions.insert(stream, current + 1);
        log.entries.push(stored.clone());

        Ok(stored)
    }

    async fn events_after(&self, after: u64) -> LedgerResult<Vec<StoredEvent>> {
        let log = self.read()?;
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(log.entries.len());
        Ok(log.entries[start..].to_vec())
    }

    async fn load_history(&self, until: Option<DateTime<Utc>>) -> LedgerResult<HistorySnapshot> {
        let log = self.read()?;
        let events = log
            .by_time
            .iter()
            .map(|&i| &log.entries[i].event)
            .take_while(|e| until.is_none_or(|t| e.occurred_at() <= t))
            .cloned()
            .collect();
        Ok(HistorySnapshot {
            events,
            head: log.entries.len() as u64,
        })
    }

    async fn query(&self, filter: &EventFilter, pagination: Pagination) -> LedgerResult<Vec<StoredEvent>> {
        let log = self.read()?;
        Ok(log
            .by_time
            .iter()
            .map(|&i| &log.entries[i])
            .filter(|stored| filter.matches(&stored.event))
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect())
    }

    async fn stream_version(&self, stream: &str) -> LedgerResult<u64> {
        Ok(self.read()?.versions.get(stream).copied().unwrap_or(0))
    }
}
