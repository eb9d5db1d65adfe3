//! Initial data load: seed the buffers from currently open entities.

use std::sync::Arc;

use crate::api::MonitoringApi;
use crate::buffer::{AddOutcome, BufferedItem, EntityBuffer};
use crate::models::EntityKind;

/// Fetches open entities from the management API at process start so
/// monitoring resumes before any live broker traffic arrives.
pub struct InitialLoader<A> {
    api: Arc<A>,
}

impl<A> InitialLoader<A>
where
    A: MonitoringApi,
{
    /// Create a loader over the injected API client.
    #[must_use]
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Seed one buffer with the open entities of its kind.
    ///
    /// Entities that already reached a terminal status are dropped here;
    /// everything else enters the buffer without a delivery handle.
    pub async fn seed(&self, kind: EntityKind, buffer: &EntityBuffer) {
        let entities = self.api.list_open(kind).await;
        let total = entities.len();

        let mut kept = 0usize;
        for entity in entities {
            if entity.is_terminal() {
                continue;
            }
            if buffer.add(BufferedItem::bootstrap(entity)).await == AddOutcome::Added {
                kept += 1;
            }
        }

        tracing::info!(kind = %kind, kept, total, "Seeded buffer from open entities");
    }
}
