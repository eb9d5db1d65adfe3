//! Key-value store port: tracked state, extremum records, settings.
//!
//! The store is shared across processes; every tracked-state mutation is
//! mirrored as a publish on the `MONITORING` channel so external observers
//! (e.g. a dashboard) stay in sync without polling.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EntityKind, Side};

mod memory;
mod redis;

pub use self::memory::InMemoryStateStore;
pub use self::redis::RedisStateStore;

/// Channel on which tracked-state change notifications are published.
pub const MONITORING_CHANNEL: &str = "MONITORING";

/// Settings key holding the position lifetime in seconds.
pub const POSITION_LIFETIME_KEY: &str = "settings:position-lifetime-seconds";

/// Fallback position lifetime when the settings key is absent.
pub const DEFAULT_POSITION_LIFETIME_SECS: i64 = 5;

/// Which extremum a record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumKind {
    /// Running minimum; only ever decreases.
    Min,
    /// Running maximum; only ever increases.
    Max,
}

impl ExtremumKind {
    /// Uppercase key suffix, `MIN` or `MAX`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Working copy of an entity kept while it is being monitored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedState {
    /// Entity correlation key.
    pub uuid: String,
    /// Traded symbol.
    pub symbol: String,
    /// Trade direction.
    pub side: Side,
    /// Entry/target price the entity was created with.
    pub price_entry: Decimal,
    /// Highest price seen since monitoring began.
    pub max_price: Decimal,
    /// Lowest price seen since monitoring began.
    pub min_price: Decimal,
    /// Last-write timestamp, stamped by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<String>,
}

/// Payload of one extremum record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtremumRecord {
    /// Recorded price.
    pub value: Decimal,
    /// Write timestamp, `%d-%m-%Y %H:%M:%S`.
    pub dt: String,
}

/// Mutation method carried in a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeMethod {
    /// Tracked state was created or updated.
    Set,
    /// Tracked state was deleted.
    Delete,
}

/// Message published on [`MONITORING_CHANNEL`] for every state mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// Entity id the mutation applies to.
    pub id: i64,
    /// Entity kind.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// What happened.
    pub method: ChangeMethod,
    /// New state for `set`, absent for `delete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TrackedState>,
}

/// Errors from the key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying store operation failed.
    #[error("store error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// Stored payload could not be (de)serialized.
    #[error("store payload error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Port over the key-value store used by the lifecycle services.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Whether tracked state exists for the entity.
    async fn is_tracked(&self, kind: EntityKind, id: i64) -> Result<bool, StoreError>;

    /// Load tracked state for the entity.
    async fn tracked(&self, kind: EntityKind, id: i64) -> Result<Option<TrackedState>, StoreError>;

    /// Create or update tracked state, publishing a `set` notification.
    async fn put_tracked(
        &self,
        kind: EntityKind,
        id: i64,
        state: &TrackedState,
    ) -> Result<(), StoreError>;

    /// Delete tracked state, publishing a `delete` notification.
    async fn remove_tracked(&self, kind: EntityKind, id: i64) -> Result<(), StoreError>;

    /// Load both extremum records for an entity, `(min, max)`.
    ///
    /// A missing or unreadable record comes back as `None`.
    async fn load_extremes(
        &self,
        kind: EntityKind,
        uuid: &str,
    ) -> Result<(Option<Decimal>, Option<Decimal>), StoreError>;

    /// Persist one extremum record. Records are never deleted.
    async fn record_extremum(
        &self,
        kind: EntityKind,
        uuid: &str,
        which: ExtremumKind,
        value: Decimal,
    ) -> Result<(), StoreError>;

    /// Position lifetime from the settings partition, with a short cache.
    async fn position_lifetime_secs(&self) -> i64;
}
