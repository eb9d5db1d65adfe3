// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Monitor Engine - Entity Lifecycle Monitoring
//!
//! Watches trading orders and positions against live market candles and
//! drives their lifecycle (`pending → monitoring → completed | cancel`)
//! through the management API. The engine sits between three systems it
//! does not own:
//!
//! - the **message broker**, which delivers newly created entities on
//!   durable queues ([`broker`]),
//! - the **pub/sub feed**, which delivers market candle ticks ([`feed`]),
//! - the **management API**, which holds authoritative entity status
//!   ([`api`]).
//!
//! A **key-value store** ([`store`]) carries the per-entity working state
//! (price extremes) and a change-notification channel for external
//! observers.
//!
//! # Pipeline
//!
//! ```text
//! Broker ──> EntityBuffer ──(tick)──> Trigger ──> Router ──> Lifecycle
//!                ^                                               │
//!                └── InitialLoader (bootstrap)     API + store <─┘
//! ```
//!
//! Deliveries are acknowledged only once buffered locally; ticks are
//! filtered and debounced before they drain a buffer; every per-entity
//! decision is idempotent against API retries (a conflict counts as
//! success), so crashes and redeliveries never corrupt entity state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod broker;
pub mod buffer;
pub mod config;
pub mod dispatch;
pub mod feed;
pub mod lifecycle;
pub mod loader;
pub mod models;
pub mod store;
pub mod telemetry;

#[cfg(test)]
pub mod testkit;

pub use api::{HttpApiClient, Lookup, MonitoringApi, StatusOutcome, TargetStatus};
pub use broker::{BrokerConsumer, ConsumerError};
pub use buffer::{AddOutcome, BufferedItem, DeliveryHandle, EntityBuffer};
pub use config::EngineConfig;
pub use dispatch::{Trigger, Wire};
pub use feed::{FeedListener, TickHandler, TickPayload};
pub use lifecycle::{EntityRouter, LifecycleError, Outcome};
pub use loader::InitialLoader;
pub use models::{Category, Entity, EntityKind, KlineUpdate, Side};
pub use store::{InMemoryStateStore, RedisStateStore, StateStore, TrackedState};
