//! AMQP consumer feeding the entity buffers.
//!
//! The broker is pure transport: a delivery is acknowledged the moment
//! its entity sits in the local buffer, and everything downstream retries
//! off the buffer rather than the queue. Connection loss mid-run triggers
//! a reconnect that re-declares and re-consumes every registered queue.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::LinearBackoff;
use crate::buffer::{BufferedItem, DeliveryHandle, EntityBuffer};
use crate::config::BrokerConfig;
use crate::models::Entity;

type TaggedDelivery = (String, Arc<EntityBuffer>, Result<Delivery, lapin::Error>);

/// Errors from the broker consumer.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Every connect attempt failed; fatal at startup.
    #[error("broker connect failed after {attempts} attempts: {source}")]
    ConnectExhausted {
        /// Attempts made before giving up.
        attempts: u32,
        /// Last connect error.
        #[source]
        source: lapin::Error,
    },

    /// AMQP protocol failure.
    #[error("broker protocol error: {0}")]
    Protocol(#[from] lapin::Error),
}

/// Wraps a lapin delivery so the buffer can settle it.
struct AmqpDelivery(Delivery);

#[async_trait]
impl DeliveryHandle for AmqpDelivery {
    async fn ack(&self) -> anyhow::Result<()> {
        self.0.ack(BasicAckOptions::default()).await?;
        Ok(())
    }
}

/// Consumes the monitoring queues into their entity buffers.
pub struct BrokerConsumer {
    url: String,
    prefetch: u16,
    connect_attempts: u32,
    connect_base_delay: std::time::Duration,
    bindings: Vec<(String, Arc<EntityBuffer>)>,
    connection: tokio::sync::Mutex<Option<Connection>>,
    channel: tokio::sync::Mutex<Option<Channel>>,
    shutdown: CancellationToken,
}

impl BrokerConsumer {
    /// Create a consumer; call [`Self::register`] before [`Self::connect`].
    #[must_use]
    pub fn new(config: &BrokerConfig, shutdown: CancellationToken) -> Self {
        Self {
            url: config.url.clone(),
            prefetch: config.prefetch,
            connect_attempts: config.connect_attempts,
            connect_base_delay: config.connect_base_delay,
            bindings: Vec::new(),
            connection: tokio::sync::Mutex::new(None),
            channel: tokio::sync::Mutex::new(None),
            shutdown,
        }
    }

    /// Bind a queue to the buffer its entities are staged in.
    pub fn register(&mut self, queue: impl Into<String>, buffer: Arc<EntityBuffer>) {
        self.bindings.push((queue.into(), buffer));
    }

    /// Establish connection and channel with bounded linear backoff.
    ///
    /// Exhausting the backoff is the one fatal startup error of the
    /// engine.
    pub async fn connect(&self) -> Result<(), ConsumerError> {
        let mut backoff = LinearBackoff::new(self.connect_base_delay, self.connect_attempts);
        loop {
            match self.try_connect().await {
                Ok((connection, channel)) => {
                    tracing::info!(attempt = backoff.attempt() + 1, "Broker connected");
                    *self.connection.lock().await = Some(connection);
                    *self.channel.lock().await = Some(channel);
                    return Ok(());
                }
                Err(error) => match backoff.next_delay() {
                    Some(delay) => {
                        tracing::warn!(
                            attempt = backoff.attempt(),
                            max_attempts = self.connect_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Broker connect failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(ConsumerError::ConnectExhausted {
                            attempts: self.connect_attempts,
                            source: error,
                        });
                    }
                },
            }
        }
    }

    async fn try_connect(&self) -> Result<(Connection, Channel), lapin::Error> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await?;
        Ok((connection, channel))
    }

    /// Consume until shutdown, reconnecting across connection loss.
    ///
    /// Mid-run backoff exhaustion is logged and retried on a fresh
    /// cycle; only the startup [`Self::connect`] is allowed to be fatal.
    pub async fn run(&self) {
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }

            let channel = self.channel.lock().await.clone();
            let Some(channel) = channel else {
                if let Err(error) = self.connect().await {
                    tracing::error!(error = %error, "Broker reconnect exhausted, starting a fresh cycle");
                    tokio::time::sleep(self.connect_base_delay).await;
                }
                continue;
            };

            match self.consume_round(&channel).await {
                Ok(true) => return,
                Ok(false) => {
                    tracing::warn!("Broker connection lost, reconnecting");
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Broker consume setup failed, reconnecting");
                }
            }

            *self.channel.lock().await = None;
            *self.connection.lock().await = None;
            tokio::time::sleep(self.connect_base_delay).await;
        }
    }

    /// Declare and consume every registered queue until the connection
    /// dies or shutdown is requested. Returns `true` on shutdown.
    async fn consume_round(&self, channel: &Channel) -> Result<bool, ConsumerError> {
        let mut streams: Vec<Pin<Box<dyn Stream<Item = TaggedDelivery> + Send>>> = Vec::new();

        for (queue, buffer) in &self.bindings {
            channel
                .queue_declare(
                    queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..QueueDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await?;
            let consumer = channel
                .basic_consume(
                    queue,
                    &format!("monitor-{queue}"),
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await?;
            tracing::info!(queue = %queue, "Consuming queue");

            let queue = queue.clone();
            let buffer = Arc::clone(buffer);
            streams.push(Box::pin(consumer.map(move |delivery| {
                (queue.clone(), Arc::clone(&buffer), delivery)
            })));
        }

        let mut merged = futures::stream::select_all(streams);
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => return Ok(true),
                next = merged.next() => match next {
                    Some((queue, buffer, Ok(delivery))) => {
                        self.on_delivery(&queue, &buffer, delivery).await;
                    }
                    Some((queue, _, Err(error))) => {
                        tracing::warn!(queue = %queue, error = %error, "Consumer stream error");
                        return Ok(false);
                    }
                    None => {
                        tracing::warn!("All consumer streams ended");
                        return Ok(false);
                    }
                }
            }
        }
    }

    async fn on_delivery(&self, queue: &str, buffer: &Arc<EntityBuffer>, delivery: Delivery) {
        match serde_json::from_slice::<Entity>(&delivery.data) {
            Ok(entity) => {
                tracing::debug!(queue = %queue, uuid = %entity.uuid, "Delivery received");
                let item = BufferedItem::new(entity, Some(Arc::new(AmqpDelivery(delivery))));
                buffer.add(item).await;
            }
            Err(error) => {
                // One redelivery for a bad body, then drop it for good so
                // a poison message never wedges the queue.
                if delivery.redelivered {
                    tracing::warn!(queue = %queue, error = %error, "Undecodable delivery seen twice, dropping");
                    if let Err(error) = delivery.ack(BasicAckOptions::default()).await {
                        tracing::warn!(error = %error, "Ack failed for dropped delivery");
                    }
                } else {
                    tracing::warn!(queue = %queue, error = %error, "Undecodable delivery, requeueing once");
                    let options = BasicNackOptions {
                        requeue: true,
                        ..BasicNackOptions::default()
                    };
                    if let Err(error) = delivery.nack(options).await {
                        tracing::warn!(error = %error, "Nack failed for undecodable delivery");
                    }
                }
            }
        }
    }

    /// Best-effort teardown: close channel, then connection.
    pub async fn close(&self) {
        if let Some(channel) = self.channel.lock().await.take() {
            if let Err(error) = channel.close(200, "shutdown").await {
                tracing::debug!(error = %error, "Channel close failed");
            }
        }
        if let Some(connection) = self.connection.lock().await.take() {
            if let Err(error) = connection.close(200, "shutdown").await {
                tracing::debug!(error = %error, "Connection close failed");
            }
        }
        tracing::info!("Broker connection closed");
    }
}
