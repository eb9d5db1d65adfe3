//! Management API port.
//!
//! The management API owns authoritative entity status. The engine only
//! reads entities and requests status transitions; the status-mutation
//! endpoints are idempotent per the contract in [`StatusOutcome`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Entity, EntityKind};

mod client;
mod mock;

pub use client::HttpApiClient;
pub use mock::{ApiCall, MockMonitoringApi};

/// Status value a mutation request asks the API to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    /// Entity accepted for live monitoring.
    Monitoring,
    /// Price condition met; the platform takes it from here.
    Completed,
    /// Entity abandoned (e.g. lifetime expired).
    Cancel,
}

impl TargetStatus {
    /// Lowercase wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monitoring => "monitoring",
            Self::Completed => "completed",
            Self::Cancel => "cancel",
        }
    }
}

/// How the API answered a status-mutation request.
///
/// A conflict response (already in the target state) counts as applied,
/// which is what makes retried mutations safe across crashes and
/// redeliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// The transition took effect (or had already taken effect).
    Applied,
    /// The API definitively refused; do not retry.
    Rejected,
    /// Transient failure; retry on the next tick.
    Unknown,
}

/// Result of looking an entity up by uuid.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The entity exists and is still live.
    Alive(Box<Entity>),
    /// The entity already reached a terminal status upstream.
    Terminal,
}

/// Errors from the management API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request failed in transport or response decoding.
    #[error("api transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a status the caller cannot interpret.
    #[error("api returned unexpected status {status}")]
    UnexpectedStatus {
        /// HTTP status code received.
        status: u16,
    },
}

/// Port over the management API.
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    /// Look up an entity by uuid.
    async fn fetch(&self, kind: EntityKind, uuid: &str) -> Result<Lookup, ApiError>;

    /// Fetch all currently open entities of a kind.
    ///
    /// Degrades to an empty list on any failure; bootstrap must not be
    /// blocked by a flaky API.
    async fn list_open(&self, kind: EntityKind) -> Vec<Entity>;

    /// Request a status transition.
    async fn change_status(
        &self,
        kind: EntityKind,
        uuid: &str,
        status: TargetStatus,
        kline_ms: Option<i64>,
    ) -> Result<StatusOutcome, ApiError>;

    /// Request an order close at the given rate.
    async fn close_order(
        &self,
        uuid: &str,
        rate: Decimal,
        kline_ms: i64,
    ) -> Result<StatusOutcome, ApiError>;
}
