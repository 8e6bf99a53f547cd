use core::fmt::Debug;

use chrono::{DateTime, Utc};

use assetlog_core::ProjectionId;

use crate::event::Event;

/// A projection derives queryable state from an ordered event sequence.
///
/// ## Purity
///
/// [`apply`](Projection::apply) must be a pure function of its input: the same
/// sequence always yields the same state, with no I/O and no shared mutation.
/// That is what makes replay, audit and time-travel queries correct by
/// construction, and it is why projections never log.
///
/// ## Incremental application
///
/// By default a projection is a left fold of
/// [`apply_event`](Projection::apply_event) over
/// [`initial_state`](Projection::initial_state). For such a projection,
/// folding one more event over a prior state is *structurally* equivalent to
/// recomputing from the full prefix, so the query layer may advance a cached
/// state event by event.
///
/// A projection that overrides `apply` (for example to sort, window or
/// deduplicate its input) breaks that equivalence and must set
/// [`INCREMENTAL`](Projection::INCREMENTAL) to `false`; the query layer then
/// always recomputes from full history.
///
/// ## Disposability
///
/// State is disposable. It can be dropped and rebuilt from the event store at
/// any time; events are the only source of truth.
pub trait Projection: Send + Sync + 'static {
    type State: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Whether `apply(prefix + [e]) == apply_event(apply(prefix), e)` holds.
    const INCREMENTAL: bool = true;

    fn id(&self) -> ProjectionId;

    fn initial_state(&self) -> Self::State;

    /// Fold a single event into `state`. Irrelevant events return `state` unchanged.
    fn apply_event(&self, state: Self::State, event: &Event) -> Self::State;

    /// Derive state from a whole ordered sequence.
    fn apply(&self, events: &[Event]) -> Self::State {
        events
            .iter()
            .fold(self.initial_state(), |state, event| self.apply_event(state, event))
    }
}

/// State as of `target_time`: only events with `occurred_at <= target_time` count.
///
/// `events` must be in time order.
pub fn apply_until<P: Projection>(
    projection: &P,
    events: &[Event],
    target_time: DateTime<Utc>,
) -> P::State {
    let cut = events.partition_point(|e| e.occurred_at() <= target_time);
    projection.apply(&events[..cut])
}
