//! Pub/sub feed listener.
//!
//! Subscribes to the configured kline channels and fans qualifying ticks
//! out to the registered handlers. Any receive-loop error tears the
//! connection down and rebuilds connection and subscriptions from scratch
//! after a fixed delay; the channel list is preserved across reconnects.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{TickFilter, TickHandler, TickPayload};
use crate::buffer::EntityBuffer;
use crate::config::FeedConfig;

/// Long-running pub/sub consumer for market ticks.
pub struct FeedListener {
    client: redis::Client,
    channels: Vec<String>,
    callbacks: HashMap<String, Vec<Arc<dyn TickHandler>>>,
    buffers: Vec<Arc<EntityBuffer>>,
    filter: Mutex<TickFilter>,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
}

impl FeedListener {
    /// Build a listener over the configured feed connection.
    ///
    /// `buffers` are consulted before dispatch: when every buffer is
    /// empty, ticks are dropped without waking any handler.
    pub fn new(
        config: &FeedConfig,
        buffers: Vec<Arc<EntityBuffer>>,
        shutdown: CancellationToken,
    ) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(config.url.as_str())?;
        Ok(Self {
            client,
            channels: config.channels.clone(),
            callbacks: HashMap::new(),
            buffers,
            filter: Mutex::new(TickFilter::new(&config.interval, config.debounce)),
            reconnect_delay: config.reconnect_delay,
            shutdown,
        })
    }

    /// Register a handler for a channel. Multiple handlers per channel
    /// are supported; the channel is subscribed even if it was not in the
    /// configured list.
    pub fn register(&mut self, channel: impl Into<String>, handler: Arc<dyn TickHandler>) {
        let channel = channel.into();
        if !self.channels.contains(&channel) {
            self.channels.push(channel.clone());
        }
        self.callbacks.entry(channel).or_default().push(handler);
    }

    /// Run until shutdown, resubscribing after every failure.
    pub async fn run(&self) {
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }

            match self.listen_round().await {
                Ok(()) => return,
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        delay_ms = self.reconnect_delay.as_millis() as u64,
                        "Feed listener error, resubscribing"
                    );
                }
            }

            tokio::select! {
                () = self.shutdown.cancelled() => return,
                () = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    /// One connect-subscribe-listen cycle. `Ok` means shutdown.
    async fn listen_round(&self) -> Result<(), redis::RedisError> {
        let connection = self.client.get_async_connection().await?;
        let mut pubsub = connection.into_pubsub();
        for channel in &self.channels {
            pubsub.subscribe(channel).await?;
        }
        tracing::info!(channels = ?self.channels, "Subscribed to feed channels");

        let mut stream = pubsub.on_message();
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => return Ok(()),
                message = stream.next() => match message {
                    Some(message) => self.handle_message(&message).await,
                    None => {
                        return Err(redis::RedisError::from((
                            redis::ErrorKind::IoError,
                            "feed message stream ended",
                        )));
                    }
                }
            }
        }
    }

    async fn handle_message(&self, message: &redis::Msg) {
        let channel = message.get_channel_name().to_string();
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(channel = %channel, error = %error, "Undecodable feed payload");
                return;
            }
        };

        // Nothing is being monitored: don't wake the dispatchers.
        if !self.any_pending().await {
            return;
        }

        let tick = match serde_json::from_str::<serde_json::Value>(&payload) {
            Ok(value) => TickPayload::Json(value),
            Err(_) => TickPayload::Raw(payload),
        };

        if let TickPayload::Json(value) = &tick {
            if !self.filter.lock().interval_matches(value) {
                return;
            }
        }

        if !self.filter.lock().accept(&channel) {
            tracing::trace!(channel = %channel, "Tick debounced");
            return;
        }

        let Some(handlers) = self.callbacks.get(&channel) else {
            return;
        };
        for handler in handlers {
            // Fire and forget: a slow dispatch must not stall the feed.
            let handler = Arc::clone(handler);
            let tick = tick.clone();
            tokio::spawn(async move {
                handler.on_tick(tick).await;
            });
        }
    }

    async fn any_pending(&self) -> bool {
        for buffer in &self.buffers {
            if !buffer.is_empty().await {
                return true;
            }
        }
        false
    }
}
