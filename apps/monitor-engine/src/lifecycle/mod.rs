//! Per-entity lifecycle state machines.
//!
//! An entity moves `unseen → status check → monitoring → terminal`. The
//! services here own the in-store working copy (tracked state + extremum
//! records) and ask the management API to flip authoritative status; they
//! never execute trades themselves.

use async_trait::async_trait;
use thiserror::Error;

use crate::api::ApiError;
use crate::models::{Entity, KlineUpdate};
use crate::store::StoreError;

pub mod extremum;
mod order;
mod position;
mod router;
mod spot;

pub use order::OptionOrderLifecycle;
pub use position::OptionPositionLifecycle;
pub use router::{OrderRouter, PositionRouter};
pub use spot::SpotLifecycle;

/// Whether an entity is done with monitoring after a routing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Terminal: the entity leaves the buffer and its tracked state is
    /// deleted.
    Finished,
    /// Not yet actionable: the entity is requeued for the next tick.
    Pending,
}

/// Errors surfaced by lifecycle routing.
///
/// The dispatch loop treats every error as a transient not-done: the
/// entity is requeued and retried on the next tick.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Management API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Key-value store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Routes one entity through its category's lifecycle service.
#[async_trait]
pub trait EntityRouter: Send + Sync {
    /// Evaluate one entity against one tick.
    async fn route(
        &self,
        entity: &Entity,
        kline: &KlineUpdate,
    ) -> Result<Outcome, LifecycleError>;
}
