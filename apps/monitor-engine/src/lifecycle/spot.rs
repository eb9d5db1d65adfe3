//! Spot-category stub.

use super::{LifecycleError, Outcome};
use crate::models::{Entity, EntityKind, KlineUpdate};

/// Placeholder service for spot entities.
///
/// Spot handling is not implemented; entities stay queued and are
/// re-examined on every tick so nothing is silently dropped.
pub struct SpotLifecycle {
    kind: EntityKind,
}

impl SpotLifecycle {
    /// Create the stub for one entity kind.
    #[must_use]
    pub const fn new(kind: EntityKind) -> Self {
        Self { kind }
    }

    /// Always reports not-done.
    pub fn handle(&self, entity: &Entity, _kline: &KlineUpdate) -> Result<Outcome, LifecycleError> {
        tracing::warn!(
            kind = %self.kind,
            symbol = %entity.symbol,
            uuid = %entity.uuid,
            "Spot handling not implemented"
        );
        Ok(Outcome::Pending)
    }
}
