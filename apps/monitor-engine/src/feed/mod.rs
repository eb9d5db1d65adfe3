//! Market-data feed: pub/sub subscription, filtering, callback fan-out.

use async_trait::async_trait;

use crate::models::KlineUpdate;

mod filter;
mod listener;

pub use filter::TickFilter;
pub use listener::FeedListener;

/// Payload delivered to tick callbacks.
///
/// JSON-decodable messages arrive decoded; anything else is passed
/// through unchanged as a raw string.
#[derive(Debug, Clone)]
pub enum TickPayload {
    /// Decoded JSON message.
    Json(serde_json::Value),
    /// Payload that was not valid JSON.
    Raw(String),
}

impl TickPayload {
    /// Interpret the payload as a kline update, if it is one.
    #[must_use]
    pub fn as_kline(&self) -> Option<KlineUpdate> {
        match self {
            Self::Json(value) => serde_json::from_value(value.clone()).ok(),
            Self::Raw(_) => None,
        }
    }
}

/// Callback invoked for every tick that survives the filter chain.
///
/// Invocations are fire-and-forget tasks; implementations must handle
/// their own failures.
#[async_trait]
pub trait TickHandler: Send + Sync {
    /// Process one tick.
    async fn on_tick(&self, tick: TickPayload);
}
