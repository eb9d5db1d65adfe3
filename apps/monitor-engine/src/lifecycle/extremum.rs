//! Monotonic extremum tracking shared by both categories.

use rust_decimal::Decimal;

use crate::models::EntityKind;
use crate::store::{ExtremumKind, StateStore, StoreError, TrackedState};

/// Advance the tracked extremes with a new price.
///
/// MAX only ever increases and MIN only ever decreases; each breached
/// record is persisted immediately and independently so a restart can
/// reconstruct the extremes without replaying ticks. Returns whether
/// anything moved (the caller re-persists the tracked state if so).
pub async fn advance<S>(
    store: &S,
    kind: EntityKind,
    state: &mut TrackedState,
    price: Decimal,
) -> Result<bool, StoreError>
where
    S: StateStore + ?Sized,
{
    let mut moved = false;

    if price > state.max_price {
        state.max_price = price;
        store
            .record_extremum(kind, &state.uuid, ExtremumKind::Max, price)
            .await?;
        moved = true;
    }

    if price < state.min_price {
        state.min_price = price;
        store
            .record_extremum(kind, &state.uuid, ExtremumKind::Min, price)
            .await?;
        moved = true;
    }

    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use crate::store::InMemoryStateStore;

    fn state() -> TrackedState {
        TrackedState {
            uuid: "u1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            price_entry: Decimal::new(100, 0),
            max_price: Decimal::new(100, 0),
            min_price: Decimal::new(100, 0),
            dt: None,
        }
    }

    #[tokio::test]
    async fn max_never_decreases_and_min_never_increases() {
        let store = InMemoryStateStore::new();
        let mut state = state();
        let prices = [105i64, 98, 102, 95, 101, 110, 96];

        for price in prices {
            advance(&store, EntityKind::Position, &mut state, Decimal::new(price, 0))
                .await
                .unwrap();
        }

        assert_eq!(state.max_price, Decimal::new(110, 0));
        assert_eq!(state.min_price, Decimal::new(95, 0));
        assert_eq!(
            store.extremum(EntityKind::Position, "u1", ExtremumKind::Max),
            Some(Decimal::new(110, 0))
        );
        assert_eq!(
            store.extremum(EntityKind::Position, "u1", ExtremumKind::Min),
            Some(Decimal::new(95, 0))
        );
    }

    #[tokio::test]
    async fn unchanged_price_moves_nothing() {
        let store = InMemoryStateStore::new();
        let mut state = state();

        let moved = advance(&store, EntityKind::Order, &mut state, Decimal::new(100, 0))
            .await
            .unwrap();

        assert!(!moved);
        assert!(store.extremum(EntityKind::Order, "u1", ExtremumKind::Max).is_none());
    }
}
