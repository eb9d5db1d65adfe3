//! Option-category order lifecycle.

use std::sync::Arc;

use super::{LifecycleError, Outcome, extremum};
use crate::api::{Lookup, MonitoringApi, StatusOutcome, TargetStatus};
use crate::models::{Candle, Entity, EntityKind, KlineUpdate, Side};
use crate::store::{ExtremumKind, StateStore, TrackedState};

/// Lifecycle service for option/futures orders.
///
/// An order closes once the candle's closing price crosses its target
/// rate in the side's direction.
pub struct OptionOrderLifecycle<A, S> {
    api: Arc<A>,
    store: Arc<S>,
}

impl<A, S> OptionOrderLifecycle<A, S>
where
    A: MonitoringApi,
    S: StateStore,
{
    /// Create the service with injected clients.
    #[must_use]
    pub fn new(api: Arc<A>, store: Arc<S>) -> Self {
        Self { api, store }
    }

    /// Evaluate one order against one tick.
    pub async fn handle(
        &self,
        order: &Entity,
        kline: &KlineUpdate,
    ) -> Result<Outcome, LifecycleError> {
        let candle = kline.candle();

        if !self.store.is_tracked(EntityKind::Order, order.id).await? {
            match self.api.fetch(EntityKind::Order, &order.uuid).await? {
                Lookup::Terminal => {
                    tracing::info!(uuid = %order.uuid, "Order already terminal upstream");
                    return Ok(Outcome::Finished);
                }
                Lookup::Alive(_) => {}
            }

            let accepted = self
                .api
                .change_status(EntityKind::Order, &order.uuid, TargetStatus::Monitoring, None)
                .await?;
            if accepted != StatusOutcome::Applied {
                return Ok(Outcome::Pending);
            }

            self.begin_tracking(order, candle).await?;
            // The entry candle is evaluated like any other.
        }

        self.advance_extremes(order, candle).await?;
        self.evaluate(order, candle).await
    }

    async fn begin_tracking(&self, order: &Entity, candle: &Candle) -> Result<(), LifecycleError> {
        let uuid = &order.uuid;
        let (min, max) = self.store.load_extremes(EntityKind::Order, uuid).await?;

        let (min_price, max_price) = if let (Some(min), Some(max)) = (min, max) {
            tracing::info!(uuid = %uuid, min = %min, max = %max, "Resuming recorded extremes");
            (min, max)
        } else {
            // Orders seed everything from the current close.
            self.store
                .record_extremum(EntityKind::Order, uuid, ExtremumKind::Min, candle.close)
                .await?;
            self.store
                .record_extremum(EntityKind::Order, uuid, ExtremumKind::Max, candle.close)
                .await?;
            tracing::info!(uuid = %uuid, close = %candle.close, "No recorded extremes, seeding from close");
            (candle.close, candle.close)
        };

        let state = TrackedState {
            uuid: uuid.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            price_entry: order.price,
            max_price,
            min_price,
            dt: None,
        };
        self.store
            .put_tracked(EntityKind::Order, order.id, &state)
            .await?;

        tracing::info!(
            symbol = %order.symbol,
            side = order.side.as_str(),
            price = %order.price,
            "Tracking new order"
        );
        Ok(())
    }

    async fn advance_extremes(&self, order: &Entity, candle: &Candle) -> Result<(), LifecycleError> {
        let Some(mut state) = self.store.tracked(EntityKind::Order, order.id).await? else {
            tracing::error!(id = order.id, "Tracked state missing while monitoring");
            return Ok(());
        };

        if extremum::advance(self.store.as_ref(), EntityKind::Order, &mut state, candle.close)
            .await?
        {
            self.store
                .put_tracked(EntityKind::Order, order.id, &state)
                .await?;
            tracing::info!(
                symbol = %state.symbol,
                side = state.side.as_str(),
                min = %state.min_price,
                max = %state.max_price,
                "Extremes updated"
            );
        }
        Ok(())
    }

    async fn evaluate(&self, order: &Entity, candle: &Candle) -> Result<Outcome, LifecycleError> {
        if order.is_terminal() {
            tracing::debug!(uuid = %order.uuid, "Skipping already-terminal order");
            return Ok(Outcome::Pending);
        }

        let satisfied = match order.side {
            Side::Buy => candle.close >= order.price,
            Side::Sell => candle.close <= order.price,
        };
        if !satisfied {
            return Ok(Outcome::Pending);
        }

        tracing::info!(
            symbol = %order.symbol,
            side = order.side.as_str(),
            rate = %order.price,
            uuid = %order.uuid,
            "Close crossed target rate, closing order"
        );
        let outcome = self
            .api
            .close_order(&order.uuid, order.price, candle.ts)
            .await?;
        Ok(match outcome {
            StatusOutcome::Applied => Outcome::Finished,
            StatusOutcome::Rejected | StatusOutcome::Unknown => Outcome::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::api::{ApiCall, MockMonitoringApi};
    use crate::models::Category;
    use crate::store::InMemoryStateStore;
    use crate::testkit::{entity, kline};

    fn service() -> (
        Arc<MockMonitoringApi>,
        Arc<InMemoryStateStore>,
        OptionOrderLifecycle<MockMonitoringApi, InMemoryStateStore>,
    ) {
        let api = Arc::new(MockMonitoringApi::new());
        let store = Arc::new(InMemoryStateStore::new());
        let service = OptionOrderLifecycle::new(Arc::clone(&api), Arc::clone(&store));
        (api, store, service)
    }

    #[tokio::test]
    async fn buy_order_closes_when_close_reaches_target() {
        let (api, store, service) = service();
        let order = entity(3, "o1", Category::Option, Side::Buy, 100);
        api.on_fetch("o1", Lookup::Alive(Box::new(order.clone())));

        let outcome = service.handle(&order, &kline(95, 105, 102, 42)).await.unwrap();
        assert_eq!(outcome, Outcome::Finished);

        let state = store.tracked(EntityKind::Order, 3).await.unwrap().unwrap();
        assert_eq!(state.min_price, Decimal::new(102, 0));
        assert_eq!(state.max_price, Decimal::new(102, 0));

        assert!(api.calls().contains(&ApiCall::CloseOrder {
            uuid: "o1".to_string(),
            rate: Decimal::new(100, 0),
            kline_ms: 42,
        }));
    }

    #[tokio::test]
    async fn sell_order_waits_for_close_below_target() {
        let (api, _store, service) = service();
        let order = entity(4, "o2", Category::Option, Side::Sell, 100);
        api.on_fetch("o2", Lookup::Alive(Box::new(order.clone())));

        let outcome = service.handle(&order, &kline(100, 110, 105, 1)).await.unwrap();
        assert_eq!(outcome, Outcome::Pending);

        let outcome = service.handle(&order, &kline(90, 105, 99, 2)).await.unwrap();
        assert_eq!(outcome, Outcome::Finished);
    }

    #[tokio::test]
    async fn conflict_on_close_counts_as_success() {
        let (api, _store, service) = service();
        let order = entity(5, "o3", Category::Option, Side::Buy, 100);
        api.on_fetch("o3", Lookup::Alive(Box::new(order.clone())));
        api.set_close_outcome(StatusOutcome::Applied);

        let outcome = service.handle(&order, &kline(95, 105, 101, 1)).await.unwrap();
        assert_eq!(outcome, Outcome::Finished);
    }

    #[tokio::test]
    async fn rejected_close_keeps_the_order_queued() {
        let (api, _store, service) = service();
        let order = entity(6, "o4", Category::Option, Side::Buy, 100);
        api.on_fetch("o4", Lookup::Alive(Box::new(order.clone())));
        api.set_close_outcome(StatusOutcome::Rejected);

        let outcome = service.handle(&order, &kline(95, 105, 101, 1)).await.unwrap();
        assert_eq!(outcome, Outcome::Pending);
    }
}
