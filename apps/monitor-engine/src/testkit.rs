//! Shared fixtures for unit tests.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::models::{Candle, Category, Entity, KlineData, KlineUpdate, Side};

/// Entity with the given identity and whole-number target price.
#[must_use]
pub fn entity(id: i64, uuid: &str, category: Category, side: Side, price: i64) -> Entity {
    Entity {
        id,
        uuid: uuid.to_string(),
        symbol: "BTCUSDT".to_string(),
        status: "open".to_string(),
        category,
        side,
        qty: "1".to_string(),
        price: Decimal::new(price, 0),
        is_test: None,
        created_at: Utc::now(),
    }
}

/// One-minute BTCUSDT kline with whole-number OHLC.
#[must_use]
pub fn kline(low: i64, high: i64, close: i64, ts: i64) -> KlineUpdate {
    KlineUpdate {
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
    }
}
