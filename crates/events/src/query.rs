//! History query parameters shared by the bus and the store.
//!
//! All history reads are paginated by default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assetlog_core::{AssetId, Identity};

use crate::event::{Event, EventType};

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Pagination parameters for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of events to return.
    pub limit: u32,
    /// Number of matching events to skip (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// Clamp the limit to `max`.
    pub fn capped(self, max: u32) -> Self {
        Self {
            limit: self.limit.min(max),
            ..self
        }
    }
}

/// Filter criteria for history queries. Every field is optional; an empty
/// filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Filter by event type.
    pub event_type: Option<EventType>,
    /// Only transactions on this asset.
    pub asset: Option<AssetId>,
    /// Events this identity took part in (actor, source or target).
    pub participant: Option<Identity>,
    /// Inclusive lower bound on `occurred_at`.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `occurred_at`.
    pub end: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_type(event_type: EventType) -> Self {
        Self {
            event_type: Some(event_type),
            ..Self::default()
        }
    }

    pub fn for_asset(asset: AssetId) -> Self {
        Self {
            asset: Some(asset),
            ..Self::default()
        }
    }

    pub fn involving(mut self, identity: Identity) -> Self {
        self.participant = Some(identity);
        self
    }

    /// Restrict to the half-open interval `[start, end)`.
    pub fn between(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if self.event_type.is_some_and(|t| t != event.event_type()) {
            return false;
        }
        if let Some(asset) = &self.asset {
            if event.transaction().map(|tx| tx.asset()) != Some(asset) {
                return false;
            }
        }
        if let Some(identity) = &self.participant {
            if !event.involves(identity) {
                return false;
            }
        }
        let at = event.occurred_at();
        if self.start.is_some_and(|start| at < start) {
            return false;
        }
        if self.end.is_some_and(|end| at >= end) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConsistencyMode, EventDraft, Origin, Payload, TransactionDraft};
    use assetlog_core::{AssetScope, EventId};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn tx_at(secs: i64, who: &str) -> Event {
        TransactionDraft {
            origin: Origin::Replayed {
                id: EventId::generate(),
                occurred_at: at(secs),
            },
            ..TransactionDraft::new(
                Identity::player(who).unwrap(),
                AssetId::new(AssetScope::Player, "coins").unwrap(),
                dec!(1),
                ConsistencyMode::Strong,
            )
        }
        .build()
        .unwrap()
    }

    #[test]
    fn pagination_is_capped() {
        assert_eq!(Pagination::new(Some(5000), None).limit, MAX_PAGE_LIMIT);
        assert_eq!(Pagination::new(None, None), Pagination::default());
        assert_eq!(Pagination::new(Some(500), Some(3)).capped(100).limit, 100);
    }

    #[test]
    fn time_window_is_half_open() {
        let filter = EventFilter::all().between(Some(at(10)), Some(at(20)));
        assert!(!filter.matches(&tx_at(9, "a")));
        assert!(filter.matches(&tx_at(10, "a")));
        assert!(filter.matches(&tx_at(19, "a")));
        assert!(!filter.matches(&tx_at(20, "a")));
    }

    #[test]
    fn asset_and_participant_filters() {
        let coins = AssetId::new(AssetScope::Player, "coins").unwrap();
        let plain = EventDraft::new(Identity::player("a").unwrap(), EventType::System, Payload::new())
            .build()
            .unwrap();

        let by_asset = EventFilter::for_asset(coins);
        assert!(by_asset.matches(&tx_at(0, "a")));
        assert!(!by_asset.matches(&plain));

        let by_bob = EventFilter::all().involving(Identity::player("bob").unwrap());
        assert!(by_bob.matches(&tx_at(0, "bob")));
        assert!(!by_bob.matches(&tx_at(0, "a")));
    }
}
