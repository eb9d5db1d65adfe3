//! Per-queue staging buffer for entities awaiting dispatch.
//!
//! The buffer is the durability hand-off point between the broker consumer
//! (producer) and one dispatch trigger (consumer): a delivery is only
//! acknowledged to the broker once its entity sits in the buffer. All
//! operations serialize on a single async lock; FIFO order is preserved
//! across pop/requeue cycles so every queued entity makes progress.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::Entity;

/// Handle for settling a broker delivery once its entity is buffered.
///
/// Abstracted so tests can observe acknowledgments without a live broker.
#[async_trait]
pub trait DeliveryHandle: Send + Sync {
    /// Acknowledge the delivery to the broker.
    async fn ack(&self) -> anyhow::Result<()>;
}

/// An entity staged for dispatch, plus the broker delivery it came from.
///
/// `delivery` is `None` for entities seeded by the initial loader.
#[derive(Clone)]
pub struct BufferedItem {
    /// The decoded entity payload.
    pub entity: Entity,
    /// Originating broker delivery, if any.
    pub delivery: Option<Arc<dyn DeliveryHandle>>,
}

impl BufferedItem {
    /// Wrap an entity together with its broker delivery handle.
    #[must_use]
    pub fn new(entity: Entity, delivery: Option<Arc<dyn DeliveryHandle>>) -> Self {
        Self { entity, delivery }
    }

    /// Wrap an entity that did not come over the broker.
    #[must_use]
    pub fn bootstrap(entity: Entity) -> Self {
        Self {
            entity,
            delivery: None,
        }
    }
}

/// Result of [`EntityBuffer::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entity was appended to the back of the buffer.
    Added,
    /// An entity with the same uuid is already queued; the incoming
    /// delivery was acknowledged and discarded.
    Duplicate,
}

/// Ordered, uuid-deduplicated staging queue for one broker queue.
pub struct EntityBuffer {
    name: &'static str,
    items: Mutex<VecDeque<BufferedItem>>,
}

impl EntityBuffer {
    /// Create an empty buffer named after the queue it stages.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue name this buffer stages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Append an item unless its uuid is already queued.
    ///
    /// The delivery handle is acknowledged in both branches, in the added
    /// branch strictly after the item is in the queue — the buffer, not
    /// the broker, is the durability boundary.
    pub async fn add(&self, item: BufferedItem) -> AddOutcome {
        let ack = item.delivery.clone();
        let uuid = item.entity.uuid.clone();
        let outcome = {
            let mut items = self.items.lock().await;
            if items
                .iter()
                .any(|queued| queued.entity.uuid == item.entity.uuid)
            {
                AddOutcome::Duplicate
            } else {
                items.push_back(item);
                AddOutcome::Added
            }
        };

        if outcome == AddOutcome::Duplicate {
            tracing::debug!(queue = self.name, uuid = %uuid, "Skipping duplicate entity");
        }
        Self::settle(ack).await;
        outcome
    }

    /// Take the oldest item, if any.
    pub async fn pop_front(&self) -> Option<BufferedItem> {
        self.items.lock().await.pop_front()
    }

    /// Cycle a not-yet-ready item to the back of the line.
    pub async fn requeue_back(&self, item: BufferedItem) {
        self.items.lock().await.push_back(item);
    }

    /// Drop the queued item with the given uuid, if present.
    pub async fn remove(&self, uuid: &str) -> bool {
        let mut items = self.items.lock().await;
        let before = items.len();
        items.retain(|queued| queued.entity.uuid != uuid);
        items.len() < before
    }

    /// Number of items currently queued.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Whether the buffer is empty.
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Ordered snapshot of the queued items.
    pub async fn peek_all(&self) -> Vec<BufferedItem> {
        self.items.lock().await.iter().cloned().collect()
    }

    async fn settle(handle: Option<Arc<dyn DeliveryHandle>>) {
        if let Some(handle) = handle {
            if let Err(error) = handle.ack().await {
                tracing::warn!(error = %error, "Failed to ack broker delivery");
            }
        }
    }
}
