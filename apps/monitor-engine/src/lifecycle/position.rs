//! Option-category position lifecycle.

use std::sync::Arc;

use chrono::Utc;

use super::{LifecycleError, Outcome, extremum};
use crate::api::{Lookup, MonitoringApi, StatusOutcome, TargetStatus};
use crate::models::{Candle, Entity, EntityKind, KlineUpdate};
use crate::store::{ExtremumKind, StateStore, TrackedState};

/// Lifecycle service for option/futures positions.
///
/// A position completes when the candle range straddles its target price;
/// it is force-cancelled when its configured lifetime runs out first.
pub struct OptionPositionLifecycle<A, S> {
    api: Arc<A>,
    store: Arc<S>,
}

impl<A, S> OptionPositionLifecycle<A, S>
where
    A: MonitoringApi,
    S: StateStore,
{
    /// Create the service with injected clients.
    #[must_use]
    pub fn new(api: Arc<A>, store: Arc<S>) -> Self {
        Self { api, store }
    }

    /// Evaluate one position against one tick.
    pub async fn handle(
        &self,
        position: &Entity,
        kline: &KlineUpdate,
    ) -> Result<Outcome, LifecycleError> {
        let candle = kline.candle();

        if self.expired(position).await {
            tracing::info!(uuid = %position.uuid, "Position lifetime expired, cancelling");
            let outcome = self
                .api
                .change_status(EntityKind::Position, &position.uuid, TargetStatus::Cancel, None)
                .await?;
            return Ok(done_if_applied(outcome));
        }

        if !self.store.is_tracked(EntityKind::Position, position.id).await? {
            match self.api.fetch(EntityKind::Position, &position.uuid).await? {
                Lookup::Terminal => {
                    tracing::info!(uuid = %position.uuid, "Position already terminal upstream");
                    return Ok(Outcome::Finished);
                }
                Lookup::Alive(_) => {}
            }

            let accepted = self
                .api
                .change_status(
                    EntityKind::Position,
                    &position.uuid,
                    TargetStatus::Monitoring,
                    None,
                )
                .await?;
            if accepted != StatusOutcome::Applied {
                return Ok(Outcome::Pending);
            }

            self.begin_tracking(position, candle).await?;
            // Deliberately fall through: the entry candle itself may
            // already satisfy the completion condition.
        }

        self.advance_extremes(position, candle).await?;
        self.evaluate(position, candle).await
    }

    async fn expired(&self, position: &Entity) -> bool {
        let ttl = self.store.position_lifetime_secs().await;
        let expires_at = position.created_at + chrono::Duration::seconds(ttl);
        Utc::now() >= expires_at
    }

    async fn begin_tracking(
        &self,
        position: &Entity,
        candle: &Candle,
    ) -> Result<(), LifecycleError> {
        let uuid = &position.uuid;
        let (min, max) = self.store.load_extremes(EntityKind::Position, uuid).await?;

        let (min_price, max_price) = if let (Some(min), Some(max)) = (min, max) {
            tracing::info!(uuid = %uuid, min = %min, max = %max, "Resuming recorded extremes");
            (min, max)
        } else {
            // First sighting: records start at the close, the working
            // copy starts at the candle range.
            self.store
                .record_extremum(EntityKind::Position, uuid, ExtremumKind::Min, candle.close)
                .await?;
            self.store
                .record_extremum(EntityKind::Position, uuid, ExtremumKind::Max, candle.close)
                .await?;
            tracing::info!(
                uuid = %uuid,
                low = %candle.low,
                high = %candle.high,
                "No recorded extremes, seeding from market range"
            );
            (candle.low, candle.high)
        };

        let state = TrackedState {
            uuid: uuid.clone(),
            symbol: position.symbol.clone(),
            side: position.side,
            price_entry: position.price,
            max_price,
            min_price,
            dt: None,
        };
        self.store
            .put_tracked(EntityKind::Position, position.id, &state)
            .await?;

        tracing::info!(
            symbol = %position.symbol,
            side = position.side.as_str(),
            price = %position.price,
            "Tracking new position"
        );
        Ok(())
    }

    async fn advance_extremes(
        &self,
        position: &Entity,
        candle: &Candle,
    ) -> Result<(), LifecycleError> {
        let Some(mut state) = self.store.tracked(EntityKind::Position, position.id).await? else {
            tracing::error!(id = position.id, "Tracked state missing while monitoring");
            return Ok(());
        };

        if extremum::advance(self.store.as_ref(), EntityKind::Position, &mut state, candle.close)
            .await?
        {
            self.store
                .put_tracked(EntityKind::Position, position.id, &state)
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

    async fn evaluate(
        &self,
        position: &Entity,
        candle: &Candle,
    ) -> Result<Outcome, LifecycleError> {
        if position.is_terminal() {
            tracing::debug!(uuid = %position.uuid, "Skipping already-terminal position");
            return Ok(Outcome::Pending);
        }

        // Entry condition for either side: the candle range straddled the
        // target price.
        if candle.low <= position.price && position.price <= candle.high {
            tracing::info!(
                symbol = %position.symbol,
                side = position.side.as_str(),
                price = %position.price,
                uuid = %position.uuid,
                "Target price inside candle range, completing"
            );
            let outcome = self
                .api
                .change_status(
                    EntityKind::Position,
                    &position.uuid,
                    TargetStatus::Completed,
                    Some(candle.ts),
                )
                .await?;
            return Ok(done_if_applied(outcome));
        }

        Ok(Outcome::Pending)
    }
}

const fn done_if_applied(outcome: StatusOutcome) -> Outcome {
    match outcome {
        StatusOutcome::Applied => Outcome::Finished,
        StatusOutcome::Rejected | StatusOutcome::Unknown => Outcome::Pending,
    }
}
