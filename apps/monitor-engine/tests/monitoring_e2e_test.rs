//! End-to-end dispatch scenarios over in-memory adapters.

use std::sync::Arc;

use chrono::Utc;
use monitor_engine::api::{ApiCall, Lookup, MockMonitoringApi, TargetStatus};
use monitor_engine::buffer::{BufferedItem, EntityBuffer};
use monitor_engine::dispatch::Trigger;
use monitor_engine::feed::TickPayload;
use monitor_engine::lifecycle::PositionRouter;
use monitor_engine::models::{Candle, Category, Entity, EntityKind, KlineData, KlineUpdate, Side};
use monitor_engine::store::{ChangeMethod, ExtremumKind, InMemoryStateStore, StateStore};
use rust_decimal::Decimal;

fn position(id: i64, uuid: &str, price: i64) -> Entity {
    Entity {
        id,
        uuid: uuid.to_string(),
        symbol: "BTCUSDT".to_string(),
        status: "open".to_string(),
        category: Category::Option,
        side: Side::Buy,
        qty: "1".to_string(),
        price: Decimal::new(price, 0),
        is_test: Some(false),
        created_at: Utc::now(),
    }
}

fn tick(low: i64, high: i64, close: i64, ts: i64) -> TickPayload {
    let update = KlineUpdate {
        kind: "kline_update".to_string(),
        data: KlineData {
            symbol: "BTCUSDT".to_string(),
            interval: 60,
            exchange: "bybit".to_string(),
            data: Candle {
                ts,
                open: Decimal::new(low, 0),
                high: Decimal::new(high, 0),
                low: Decimal::new(low, 0),
                close: Decimal::new(close, 0),
                volume: Decimal::ONE,
                turnover: Decimal::ONE,
                dt: None,
            },
        },
    };
    TickPayload::Json(serde_json::to_value(update).unwrap())
}

struct Pipeline {
    api: Arc<MockMonitoringApi>,
    store: Arc<InMemoryStateStore>,
    buffer: Arc<EntityBuffer>,
    trigger: Trigger<PositionRouter<MockMonitoringApi, InMemoryStateStore>, InMemoryStateStore>,
}

fn pipeline() -> Pipeline {
    let api = Arc::new(MockMonitoringApi::new());
    let store = Arc::new(InMemoryStateStore::new());
    store.set_lifetime_secs(3600);
    let buffer = Arc::new(EntityBuffer::new("queue_monitoring_position"));
    let trigger = Trigger::new(
        EntityKind::Position,
        Arc::clone(&buffer),
        Arc::new(PositionRouter::new(Arc::clone(&api), Arc::clone(&store))),
        Arc::clone(&store),
    );
    Pipeline {
        api,
        store,
        buffer,
        trigger,
    }
}

#[tokio::test]
async fn first_straddling_tick_completes_a_new_position() {
    let pipeline = pipeline();
    let pos = position(7, "p-1", 100);
    pipeline.api.on_fetch("p-1", Lookup::Alive(Box::new(pos.clone())));
    pipeline.buffer.add(BufferedItem::bootstrap(pos)).await;

    // First sighting: band 95..105 already straddles the target of 100,
    // so completion fires on this very tick.
    pipeline.trigger.dispatch(&tick(95, 105, 102, 1_000)).await;

    assert!(pipeline.buffer.is_empty().await);
    assert!(
        !pipeline
            .store
            .is_tracked(EntityKind::Position, 7)
            .await
            .unwrap()
    );

    let calls = pipeline.api.calls();
    assert!(calls.contains(&ApiCall::ChangeStatus {
        kind: EntityKind::Position,
        uuid: "p-1".to_string(),
        status: TargetStatus::Monitoring,
        kline_ms: None,
    }));
    assert!(calls.contains(&ApiCall::ChangeStatus {
        kind: EntityKind::Position,
        uuid: "p-1".to_string(),
        status: TargetStatus::Completed,
        kline_ms: Some(1_000),
    }));

    // The tracked state was created (set) and torn down (delete) once.
    let notifications = pipeline.store.notifications();
    let sets = notifications
        .iter()
        .filter(|n| n.method == ChangeMethod::Set)
        .count();
    let deletes = notifications
        .iter()
        .filter(|n| n.method == ChangeMethod::Delete)
        .count();
    assert_eq!(sets, 1);
    assert_eq!(deletes, 1);

    // Seeded from the market range on first sighting.
    let set = notifications
        .iter()
        .find(|n| n.method == ChangeMethod::Set)
        .and_then(|n| n.data.clone())
        .unwrap();
    assert_eq!(set.min_price, Decimal::new(95, 0));
    assert_eq!(set.max_price, Decimal::new(105, 0));
}

#[tokio::test]
async fn out_of_band_position_keeps_cycling_until_the_band_reaches_it() {
    let pipeline = pipeline();
    let pos = position(8, "p-2", 200);
    pipeline.api.on_fetch("p-2", Lookup::Alive(Box::new(pos.clone())));
    pipeline.buffer.add(BufferedItem::bootstrap(pos)).await;

    // Entry tick far below the target: tracked, but pending.
    pipeline.trigger.dispatch(&tick(95, 105, 102, 1_000)).await;
    assert_eq!(pipeline.buffer.len().await, 1);
    assert!(
        pipeline
            .store
            .is_tracked(EntityKind::Position, 8)
            .await
            .unwrap()
    );

    // Rally towards the target: extremes follow the closes monotonically.
    pipeline.trigger.dispatch(&tick(100, 150, 148, 2_000)).await;
    pipeline.trigger.dispatch(&tick(120, 170, 165, 3_000)).await;
    assert_eq!(
        pipeline.store.extremum(EntityKind::Position, "p-2", ExtremumKind::Max),
        Some(Decimal::new(165, 0))
    );
    assert_eq!(
        pipeline.store.extremum(EntityKind::Position, "p-2", ExtremumKind::Min),
        Some(Decimal::new(102, 0))
    );

    // The band finally straddles 200.
    pipeline.trigger.dispatch(&tick(190, 210, 205, 4_000)).await;
    assert!(pipeline.buffer.is_empty().await);
    assert!(pipeline.api.calls().contains(&ApiCall::ChangeStatus {
        kind: EntityKind::Position,
        uuid: "p-2".to_string(),
        status: TargetStatus::Completed,
        kline_ms: Some(4_000),
    }));
}

#[tokio::test]
async fn mixed_batch_keeps_fifo_order_for_survivors() {
    let pipeline = pipeline();

    // a: out of band (pending), b: in band (finished), c: out of band.
    let a = position(1, "a", 500);
    let b = position(2, "b", 100);
    let c = position(3, "c", 700);
    for entity in [&a, &b, &c] {
        pipeline
            .api
            .on_fetch(&entity.uuid, Lookup::Alive(Box::new(entity.clone())));
    }
    for entity in [a, b, c] {
        pipeline.buffer.add(BufferedItem::bootstrap(entity)).await;
    }

    pipeline.trigger.dispatch(&tick(95, 105, 102, 1_000)).await;

    let order: Vec<String> = pipeline
        .buffer
        .peek_all()
        .await
        .into_iter()
        .map(|item| item.entity.uuid)
        .collect();
    assert_eq!(order, vec!["a", "c"]);

    let deletes = pipeline
        .store
        .notifications()
        .into_iter()
        .filter(|n| n.method == ChangeMethod::Delete)
        .count();
    assert_eq!(deletes, 1);
}

#[tokio::test]
async fn spot_positions_are_requeued_untouched() {
    let pipeline = pipeline();
    let mut pos = position(9, "s-1", 100);
    pos.category = Category::Spot;
    pipeline.buffer.add(BufferedItem::bootstrap(pos)).await;

    pipeline.trigger.dispatch(&tick(95, 105, 102, 1_000)).await;

    assert_eq!(pipeline.buffer.len().await, 1);
    assert!(pipeline.api.calls().is_empty());
}
