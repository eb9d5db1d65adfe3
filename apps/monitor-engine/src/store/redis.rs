//! Redis adapter for the state store.
//!
//! Three logical partitions, mirroring the store layout the rest of the
//! platform expects: tracked state (with the `MONITORING` publishes),
//! operator settings, and extremum records.

use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use rust_decimal::Decimal;

use super::{
    ChangeMethod, ChangeNotification, DEFAULT_POSITION_LIFETIME_SECS, ExtremumKind,
    ExtremumRecord, MONITORING_CHANNEL, POSITION_LIFETIME_KEY, StateStore, StoreError,
    TrackedState,
};
use crate::config::StoreConfig;
use crate::models::EntityKind;

/// How long a fetched lifetime setting stays fresh.
const LIFETIME_CACHE_TTL: Duration = Duration::from_secs(5);

/// [`StateStore`] backed by Redis.
pub struct RedisStateStore {
    data: ConnectionManager,
    settings: ConnectionManager,
    extremes: ConnectionManager,
    lifetime_cache: Mutex<Option<(Instant, i64)>>,
}

impl RedisStateStore {
    /// Connect all three partitions.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let data = Self::manager(&config.url(config.data_db)).await?;
        let settings = Self::manager(&config.url(config.settings_db)).await?;
        let extremes = Self::manager(&config.url(config.extremum_db)).await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            "Connected to key-value store"
        );

        Ok(Self {
            data,
            settings,
            extremes,
            lifetime_cache: Mutex::new(None),
        })
    }

    async fn manager(url: &str) -> Result<ConnectionManager, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(ConnectionManager::new(client).await?)
    }

    async fn publish(&self, notification: &ChangeNotification) -> Result<(), StoreError> {
        let payload = serde_json::to_string(notification)?;
        let mut conn = self.data.clone();
        let _: i64 = conn.publish(MONITORING_CHANNEL, payload).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StateStore for RedisStateStore {
    async fn is_tracked(&self, kind: EntityKind, id: i64) -> Result<bool, StoreError> {
        let mut conn = self.data.clone();
        Ok(conn.exists(kind.state_key(id)).await?)
    }

    async fn tracked(&self, kind: EntityKind, id: i64) -> Result<Option<TrackedState>, StoreError> {
        let mut conn = self.data.clone();
        let raw: Option<String> = conn.get(kind.state_key(id)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put_tracked(
        &self,
        kind: EntityKind,
        id: i64,
        state: &TrackedState,
    ) -> Result<(), StoreError> {
        let mut state = state.clone();
        state.dt = Some(Utc::now().to_rfc3339());

        // Notify first, then persist, matching the platform's observers.
        self.publish(&ChangeNotification {
            id,
            kind,
            method: ChangeMethod::Set,
            data: Some(state.clone()),
        })
        .await?;

        let payload = serde_json::to_string(&state)?;
        let mut conn = self.data.clone();
        let _: () = conn.set(kind.state_key(id), payload).await?;
        Ok(())
    }

    async fn remove_tracked(&self, kind: EntityKind, id: i64) -> Result<(), StoreError> {
        self.publish(&ChangeNotification {
            id,
            kind,
            method: ChangeMethod::Delete,
            data: None,
        })
        .await?;

        let mut conn = self.data.clone();
        let _: () = conn.del(kind.state_key(id)).await?;
        Ok(())
    }

    async fn load_extremes(
        &self,
        kind: EntityKind,
        uuid: &str,
    ) -> Result<(Option<Decimal>, Option<Decimal>), StoreError> {
        let keys = vec![
            kind.extremum_key(uuid, ExtremumKind::Min.as_str()),
            kind.extremum_key(uuid, ExtremumKind::Max.as_str()),
        ];
        let mut conn = self.extremes.clone();
        let raw: Vec<Option<String>> = conn.mget(keys).await?;

        // An unreadable record is treated the same as a missing one.
        let parse = |slot: Option<&Option<String>>| {
            slot.and_then(Option::as_deref)
                .and_then(|raw| serde_json::from_str::<ExtremumRecord>(raw).ok())
                .map(|record| record.value)
        };
        Ok((parse(raw.first()), parse(raw.get(1))))
    }

    async fn record_extremum(
        &self,
        kind: EntityKind,
        uuid: &str,
        which: ExtremumKind,
        value: Decimal,
    ) -> Result<(), StoreError> {
        let record = ExtremumRecord {
            value,
            dt: Utc::now().format("%d-%m-%Y %H:%M:%S").to_string(),
        };
        let payload = serde_json::to_string(&record)?;
        let mut conn = self.extremes.clone();
        let _: () = conn.set(kind.extremum_key(uuid, which.as_str()), payload).await?;
        Ok(())
    }

    async fn position_lifetime_secs(&self) -> i64 {
        if let Some((fetched_at, value)) = *self.lifetime_cache.lock() {
            if fetched_at.elapsed() < LIFETIME_CACHE_TTL {
                return value;
            }
        }

        let mut conn = self.settings.clone();
        let value = match conn.get::<_, Option<String>>(POSITION_LIFETIME_KEY).await {
            Ok(Some(raw)) => raw.parse().unwrap_or(DEFAULT_POSITION_LIFETIME_SECS),
            Ok(None) => DEFAULT_POSITION_LIFETIME_SECS,
            Err(error) => {
                tracing::warn!(error = %error, "Failed to read position lifetime setting");
                DEFAULT_POSITION_LIFETIME_SECS
            }
        };

        *self.lifetime_cache.lock() = Some((Instant::now(), value));
        value
    }
}
