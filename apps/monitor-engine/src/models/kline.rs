//! Market candle updates published on the pub/sub feed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV candle. The feed publishes single-letter field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Candle timestamp in milliseconds.
    pub ts: i64,
    /// Open price.
    #[serde(rename = "o")]
    pub open: Decimal,
    /// High price.
    #[serde(rename = "h")]
    pub high: Decimal,
    /// Low price.
    #[serde(rename = "l")]
    pub low: Decimal,
    /// Close price.
    #[serde(rename = "c")]
    pub close: Decimal,
    /// Traded volume.
    #[serde(rename = "v")]
    pub volume: Decimal,
    /// Turnover (volume in quote currency).
    #[serde(rename = "t")]
    pub turnover: Decimal,
    /// Human-readable timestamp, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<String>,
}

/// Candle plus the symbol/interval/exchange it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KlineData {
    /// Symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Candle interval in seconds.
    pub interval: i64,
    /// Source exchange, e.g. `bybit`.
    #[serde(rename = "ex")]
    pub exchange: String,
    /// The candle itself.
    pub data: Candle,
}

/// Envelope published on `kline:{symbol}` channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KlineUpdate {
    /// Message discriminator, `kline_update` on the wire.
    #[serde(rename = "type")]
    pub kind: String,
    /// Candle payload.
    pub data: KlineData,
}

impl KlineUpdate {
    /// The candle carried by this update.
    #[must_use]
    pub const fn candle(&self) -> &Candle {
        &self.data.data
    }
}
