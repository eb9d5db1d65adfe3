//! Environment-driven configuration.

use std::time::Duration;

use thiserror::Error;

/// Default broker prefetch (in-flight unacknowledged deliveries).
const DEFAULT_PREFETCH: u16 = 64;

/// Default broker connect attempts before giving up.
const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;

/// Default base delay for the linear connect backoff.
const DEFAULT_CONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default delay before the feed listener resubscribes after an error.
const DEFAULT_FEED_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Default per-channel quiet period between dispatched ticks.
const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(3);

/// Default management API request timeout.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(15);

/// Candle interval the dispatch loop cares about.
const DEFAULT_MONITOR_INTERVAL: &str = "1m";

/// Default feed channel list.
const DEFAULT_CHANNELS: &str = "kline:BTCUSDT";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset.
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),
}

/// Broker consumer settings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// AMQP connection URL.
    pub url: String,
    /// Prefetch count (bounds in-flight deliveries).
    pub prefetch: u16,
    /// Connect attempts before the backoff is exhausted.
    pub connect_attempts: u32,
    /// Base delay of the linear backoff (`attempt × base`).
    pub connect_base_delay: Duration,
}

/// Feed listener settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Redis URL of the pub/sub feed.
    pub url: String,
    /// Channels to subscribe, e.g. `kline:BTCUSDT`.
    pub channels: Vec<String>,
    /// Delay before resubscribing after a receive-loop error.
    pub reconnect_delay: Duration,
    /// Per-channel quiet period between dispatched ticks.
    pub debounce: Duration,
    /// Candle interval accepted by the tick filter.
    pub interval: String,
}

/// Key-value store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis host.
    pub host: String,
    /// Redis port.
    pub port: u16,
    /// Optional password.
    pub password: Option<String>,
    /// Partition holding tracked state and the `MONITORING` channel.
    pub data_db: u8,
    /// Partition holding operator settings.
    pub settings_db: u8,
    /// Partition holding extremum records.
    pub extremum_db: u8,
}

impl StoreConfig {
    /// Redis URL for one database partition.
    #[must_use]
    pub fn url(&self, db: u8) -> String {
        let auth = self
            .password
            .as_ref()
            .map(|password| format!(":{password}@"))
            .unwrap_or_default();
        format!("redis://{auth}{}:{}/{db}", self.host, self.port)
    }
}

/// Management API settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL including the API prefix, e.g. `http://host:8000/api`.
    pub base_url: String,
    /// Fixed request timeout.
    pub timeout: Duration,
}

/// Everything the binary needs, parsed once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Broker consumer settings.
    pub broker: BrokerConfig,
    /// Feed listener settings.
    pub feed: FeedConfig,
    /// Key-value store settings.
    pub store: StoreConfig,
    /// Management API settings.
    pub api: ApiConfig,
}

impl EngineConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let amqp_url = required("AMQP_URL")?;
        let api_base_url = required("API_BASE_URL")?;

        let host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("REDIS_PORT", 6379);
        let password = std::env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty());

        let store = StoreConfig {
            host,
            port,
            password,
            data_db: parse_var("REDIS_DATA_DB", 8),
            settings_db: parse_var("REDIS_SETTINGS_DB", 1),
            extremum_db: parse_var("REDIS_EXTREMUM_DB", 3),
        };

        let channels = std::env::var("FEED_CHANNELS")
            .unwrap_or_else(|_| DEFAULT_CHANNELS.to_string())
            .split(',')
            .map(|channel| channel.trim().to_string())
            .filter(|channel| !channel.is_empty())
            .collect();

        Ok(Self {
            broker: BrokerConfig {
                url: amqp_url,
                prefetch: parse_var("BROKER_PREFETCH", DEFAULT_PREFETCH),
                connect_attempts: parse_var("BROKER_CONNECT_ATTEMPTS", DEFAULT_CONNECT_ATTEMPTS),
                connect_base_delay: DEFAULT_CONNECT_BASE_DELAY,
            },
            feed: FeedConfig {
                // The feed rides the default partition of the same store.
                url: store.url(0),
                channels,
                reconnect_delay: DEFAULT_FEED_RECONNECT_DELAY,
                debounce: DEFAULT_DEBOUNCE,
                interval: DEFAULT_MONITOR_INTERVAL.to_string(),
            },
            store,
            api: ApiConfig {
                base_url: api_base_url,
                timeout: DEFAULT_API_TIMEOUT,
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn parse_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_urls_carry_partition_and_auth() {
        let config = StoreConfig {
            host: "redis.internal".to_string(),
            port: 6380,
            password: Some("s3cret".to_string()),
            data_db: 8,
            settings_db: 1,
            extremum_db: 3,
        };
        assert_eq!(config.url(8), "redis://:s3cret@redis.internal:6380/8");

        let config = StoreConfig {
            password: None,
            ..config
        };
        assert_eq!(config.url(0), "redis://redis.internal:6380/0");
    }
}
