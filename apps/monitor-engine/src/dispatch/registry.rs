//! Static registration table: queue ↔ entity kind ↔ dispatch trigger.
//!
//! The full wiring — buffer per queue, router per kind, trigger per
//! buffer — is assembled once at startup from this table; nothing is
//! discovered at runtime.

use std::sync::Arc;

use super::Trigger;
use crate::api::MonitoringApi;
use crate::buffer::EntityBuffer;
use crate::feed::TickHandler;
use crate::lifecycle::{OrderRouter, PositionRouter};
use crate::models::EntityKind;
use crate::store::StateStore;

/// Broker queue carrying newly created orders.
pub const QUEUE_MONITORING_ORDER: &str = "queue_monitoring_order";

/// Broker queue carrying newly created positions.
pub const QUEUE_MONITORING_POSITION: &str = "queue_monitoring_position";

/// One row of the registration table.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    /// Broker queue name.
    pub queue: &'static str,
    /// Entity kind staged on that queue.
    pub kind: EntityKind,
}

/// Every queue the engine consumes.
pub const BINDINGS: [Binding; 2] = [
    Binding {
        queue: QUEUE_MONITORING_POSITION,
        kind: EntityKind::Position,
    },
    Binding {
        queue: QUEUE_MONITORING_ORDER,
        kind: EntityKind::Order,
    },
];

/// A fully wired pipeline for one queue.
pub struct Wire {
    /// Broker queue name.
    pub queue: &'static str,
    /// Entity kind this pipeline monitors.
    pub kind: EntityKind,
    /// Staging buffer between broker and trigger.
    pub buffer: Arc<EntityBuffer>,
    /// Tick handler to register with the feed listener.
    pub handler: Arc<dyn TickHandler>,
}

/// Assemble one pipeline per [`BINDINGS`] row.
#[must_use]
pub fn build<A, S>(api: &Arc<A>, store: &Arc<S>) -> Vec<Wire>
where
    A: MonitoringApi + 'static,
    S: StateStore + 'static,
{
    BINDINGS
        .iter()
        .map(|binding| {
            let buffer = Arc::new(EntityBuffer::new(binding.queue));
            let handler: Arc<dyn TickHandler> = match binding.kind {
                EntityKind::Position => Arc::new(Trigger::new(
                    binding.kind,
                    Arc::clone(&buffer),
                    Arc::new(PositionRouter::new(Arc::clone(api), Arc::clone(store))),
                    Arc::clone(store),
                )),
                EntityKind::Order => Arc::new(Trigger::new(
                    binding.kind,
                    Arc::clone(&buffer),
                    Arc::new(OrderRouter::new(Arc::clone(api), Arc::clone(store))),
                    Arc::clone(store),
                )),
            };
            Wire {
                queue: binding.queue,
                kind: binding.kind,
                buffer,
                handler,
            }
        })
        .collect()
}
