//! Durable broker consumer.

mod consumer;
mod reconnect;

pub use consumer::{BrokerConsumer, ConsumerError};
pub use reconnect::LinearBackoff;
