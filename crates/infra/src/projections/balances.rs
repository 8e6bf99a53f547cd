//! Balances projection.
//!
//! Tracks the balance of every `(asset, holder)` pair derived from
//! transaction events. Non-transaction events are ignored.
//!
//! Holder resolution per transaction:
//! - `target` is credited with `delta`
//! - `source` is debited with `delta`
//! - with neither, the actor holds PLAYER-scoped assets, and SERVER/GLOBAL
//!   (and unknown-scope) assets are held by the asset itself (`holder = None`)
//!
//! A pair whose running balance leaves the exact decimal range is marked as
//! overflowed and reads as an error from then on; it is never clamped.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use assetlog_core::{AssetId, AssetScope, CodecError, Decimal, Identity, LedgerResult, ProjectionId};
use assetlog_events::{Event, Projection};

pub const BALANCES_NAMESPACE: &str = "balance";
pub const BALANCES_NAME: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BalanceKey {
    pub asset: AssetId,
    pub holder: Option<Identity>,
}

impl BalanceKey {
    fn new(asset: &AssetId, holder: Option<&Identity>) -> Self {
        Self {
            asset: asset.clone(),
            holder: holder.cloned(),
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.holder {
            Some(holder) => write!(f, "balance of {} held by {holder}", self.asset),
            None => write!(f, "balance of {}", self.asset),
        }
    }
}

/// Read model: balance per `(asset, holder)`. Absent pairs read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances {
    entries: BTreeMap<BalanceKey, Decimal>,
    overflowed: BTreeSet<BalanceKey>,
}

impl Balances {
    /// Exact balance of the pair, or `Codec(Overflow)` once it has left the decimal range.
    pub fn get(&self, asset: &AssetId, holder: Option<&Identity>) -> LedgerResult<Decimal> {
        let key = BalanceKey::new(asset, holder);
        if self.overflowed.contains(&key) {
            return Err(CodecError::Overflow(key.to_string()).into());
        }
        Ok(self.entries.get(&key).copied().unwrap_or(Decimal::ZERO))
    }

    /// Sum over every holder of `asset`.
    pub fn total(&self, asset: &AssetId) -> LedgerResult<Decimal> {
        let overflow = || CodecError::Overflow(format!("total of {asset}"));
        if self.overflowed.iter().any(|key| &key.asset == asset) {
            return Err(overflow().into());
        }
        self.entries
            .iter()
            .filter(|(key, _)| &key.asset == asset)
            .try_fold(Decimal::ZERO, |acc, (_, v)| acc.checked_add(*v))
            .ok_or_else(|| overflow().into())
    }

    /// Pairs with an exact balance. Overflowed pairs are listed by [`overflowed`](Self::overflowed).
    pub fn iter(&self) -> impl Iterator<Item = (&BalanceKey, &Decimal)> {
        self.entries.iter()
    }

    pub fn overflowed(&self) -> impl Iterator<Item = &BalanceKey> {
        self.overflowed.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.overflowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.overflowed.is_empty()
    }

    fn adjust(&mut self, asset: &AssetId, holder: Option<&Identity>, delta: Decimal) {
        let key = BalanceKey::new(asset, holder);
        if self.overflowed.contains(&key) {
            return;
        }
        let current = self.entries.get(&key).copied().unwrap_or(Decimal::ZERO);
        match current.checked_add(delta) {
            Some(next) => {
                self.entries.insert(key, next);
            }
            None => {
                self.entries.remove(&key);
                self.overflowed.insert(key);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BalancesProjection {
    id: ProjectionId,
}

impl BalancesProjection {
    pub fn new() -> LedgerResult<Self> {
        Ok(Self {
            id: ProjectionId::new(BALANCES_NAMESPACE, BALANCES_NAME)?,
        })
    }
}

impl Projection for BalancesProjection {
    type State = Balances;

    fn id(&self) -> ProjectionId {
        self.id.clone()
    }

    fn initial_state(&self) -> Balances {
        Balances::default()
    }

    fn apply_event(&self, mut state: Balances, event: &Event) -> Balances {
        let Some(tx) = event.transaction() else {
            return state;
        };

        match (tx.source(), tx.target()) {
            (None, None) => {
                let holder = (tx.asset().scope() == AssetScope::Player).then(|| event.actor());
                state.adjust(tx.asset(), holder, tx.delta());
            }
            (source, target) => {
                if let Some(target) = target {
                    state.adjust(tx.asset(), Some(target), tx.delta());
                }
                if let Some(source) = source {
                    state.adjust(tx.asset(), Some(source), -tx.delta());
                }
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetlog_core::{ErrorKind, LedgerError};
    use assetlog_events::{ConsistencyMode, TransactionDraft};
    use rust_decimal_macros::dec;

    fn player(id: &str) -> Identity {
        Identity::player(id).unwrap()
    }

    fn asset(scope: AssetScope, name: &str) -> AssetId {
        AssetId::new(scope, name).unwrap()
    }

    fn tx(actor: &str, asset: AssetId, delta: Decimal, source: Option<&str>, target: Option<&str>) -> Event {
        TransactionDraft {
            source: source.map(player),
            target: target.map(player),
            ..TransactionDraft::new(player(actor), asset, delta, ConsistencyMode::Strong)
        }
        .build()
        .unwrap()
    }

    #[test]
    fn self_credits_and_transfers() {
        let coins = asset(AssetScope::Player, "coins");
        let events = vec![
            tx("alice", coins.clone(), dec!(100), None, None),
            tx("alice", coins.clone(), dec!(30), Some("alice"), Some("bob")),
            tx("bob", coins.clone(), dec!(-5), None, None),
        ];
        let state = BalancesProjection::new().unwrap().apply(&events);
        assert_eq!(state.get(&coins, Some(&player("alice"))).unwrap(), dec!(70));
        assert_eq!(state.get(&coins, Some(&player("bob"))).unwrap(), dec!(25));
        assert_eq!(state.total(&coins).unwrap(), dec!(95));
    }

    #[test]
    fn shared_assets_are_held_by_the_asset() {
        let boss_hp = asset(AssetScope::Server, "boss_hp");
        let events = vec![
            tx("alice", boss_hp.clone(), dec!(-10), None, None),
            tx("bob", boss_hp.clone(), dec!(-15.5), None, None),
        ];
        let state = BalancesProjection::new().unwrap().apply(&events);
        assert_eq!(state.get(&boss_hp, None).unwrap(), dec!(-25.5));
        assert_eq!(state.get(&boss_hp, Some(&player("alice"))).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn empty_history_is_empty_state() {
        assert!(BalancesProjection::new().unwrap().apply(&[]).is_empty());
    }

    #[test]
    fn overflowing_balance_is_an_error_not_a_clamp() {
        let coins = asset(AssetScope::Player, "coins");
        let events = vec![
            tx("alice", coins.clone(), Decimal::MAX, None, None),
            tx("alice", coins.clone(), Decimal::MAX, None, None),
            tx("alice", coins.clone(), -Decimal::MAX, None, None),
            tx("bob", coins.clone(), dec!(3), None, None),
        ];
        let state = BalancesProjection::new().unwrap().apply(&events);

        let err = state.get(&coins, Some(&player("alice"))).unwrap_err();
        assert!(matches!(err, LedgerError::Codec(CodecError::Overflow(_))));
        assert_eq!(err.kind(), ErrorKind::Precision);
        assert_eq!(state.get(&coins, Some(&player("bob"))).unwrap(), dec!(3));
        assert_eq!(state.total(&coins).unwrap_err().kind(), ErrorKind::Precision);
        assert_eq!(state.overflowed().count(), 1);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn total_that_overflows_is_an_error() {
        let coins = asset(AssetScope::Player, "coins");
        let events = vec![
            tx("alice", coins.clone(), Decimal::MAX, None, None),
            tx("bob", coins.clone(), Decimal::MAX, None, None),
        ];
        let state = BalancesProjection::new().unwrap().apply(&events);
        assert_eq!(state.get(&coins, Some(&player("bob"))).unwrap(), Decimal::MAX);
        assert_eq!(state.total(&coins).unwrap_err().kind(), ErrorKind::Precision);
    }
}
