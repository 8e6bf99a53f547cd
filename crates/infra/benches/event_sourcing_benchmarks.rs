use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::str::FromStr;
use std::sync::Arc;

use assetlog_core::{
    AssetId, AssetScope, Decimal, EventId, ExpectedVersion, Identity, decimal_to_money, money_to_decimal,
};
use assetlog_events::{ConsistencyMode, Event, EventBus, Origin, Projection, TransactionDraft};
use assetlog_infra::config::LedgerConfig;
use assetlog_infra::event_bus::StoreBackedEventBus;
use assetlog_infra::event_store::{EventStore, InMemoryEventStore};
use assetlog_infra::projections::{BalancesProjection, ProjectionQueryService};
use chrono::{Duration, TimeZone, Utc};

fn coins() -> AssetId {
    AssetId::new(AssetScope::Player, "coins").unwrap()
}

fn transactions(count: usize) -> Vec<Event> {
    let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let players: Vec<Identity> = (0..16).map(|i| Identity::player(format!("p{i}")).unwrap()).collect();
    (0..count)
        .map(|i| {
            TransactionDraft {
                origin: Origin::Replayed {
                    id: EventId::generate(),
                    occurred_at: base + Duration::milliseconds(i as i64),
                },
                target: Some(players[i % players.len()].clone()),
                ..TransactionDraft::new(
                    players[(i + 1) % players.len()].clone(),
                    coins(),
                    Decimal::new((i % 1000) as i64 + 1, 2),
                    ConsistencyMode::Eventual,
                )
            }
            .build()
            .unwrap()
        })
        .collect()
}

fn bench_money_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("money_codec");
    let values: Vec<Decimal> = ["0", "1.23", "-0.000000001", "123456789.987654321", "-42.5"]
        .iter()
        .map(|s| Decimal::from_str(s).unwrap())
        .collect();
    group.throughput(Throughput::Elements(values.len() as u64));

    group.bench_function("decimal_to_money_and_back", |b| {
        b.iter(|| {
            for v in &values {
                let m = decimal_to_money("USD", black_box(*v)).unwrap();
                black_box(money_to_decimal(&m.currency_code, m.units, m.nanos).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_publish_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_throughput");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for batch_size in [1, 10, 100].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(BenchmarkId::new("publish", batch_size), batch_size, |b, &size| {
            let store = Arc::new(InMemoryEventStore::new());
            let bus = StoreBackedEventBus::new(store, runtime.handle().clone(), LedgerConfig::default());

            b.iter(|| {
                runtime.block_on(async {
                    for tx in transactions(size) {
                        bus.publish(black_box(tx)).await.unwrap();
                    }
                });
            });
        });
    }

    group.finish();
}

fn bench_replay_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_speed");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for event_count in [100, 1000, 10000].iter() {
        let events = transactions(*event_count);
        let projection = BalancesProjection::new().unwrap();

        group.bench_with_input(BenchmarkId::new("pure_apply", event_count), &events, |b, events| {
            b.iter(|| black_box(projection.apply(black_box(events))));
        });

        let store = Arc::new(InMemoryEventStore::new());
        runtime.block_on(async {
            for e in events.iter().cloned() {
                store.append(e, ExpectedVersion::Any).await.unwrap();
            }
        });
        let queries = ProjectionQueryService::new(store, LedgerConfig::default());
        queries.register_projection(projection.clone()).unwrap();
        let cutoff = events[events.len() / 2].occurred_at();

        group.bench_with_input(BenchmarkId::new("replay_to_midpoint", event_count), &cutoff, |b, &t| {
            b.iter(|| {
                runtime.block_on(async {
                    black_box(
                        queries
                            .replay::<assetlog_infra::projections::Balances>(&projection.id(), t)
                            .await
                            .unwrap(),
                    )
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_money_codec, bench_publish_throughput, bench_replay_speed);
criterion_main!(benches);
