//! The dispatch loop bound to one channel and one buffer.

use std::sync::Arc;

use async_trait::async_trait;

use crate::buffer::EntityBuffer;
use crate::feed::{TickHandler, TickPayload};
use crate::lifecycle::{EntityRouter, Outcome};
use crate::models::EntityKind;
use crate::store::StateStore;

/// Drains its buffer on every qualifying tick and routes each entity.
///
/// The trigger is the sole consumer of its buffer. Each invocation
/// processes exactly the number of items present when it started;
/// entities added mid-dispatch wait for the next tick, which bounds loop
/// duration under sustained inflow.
pub struct Trigger<R, S> {
    label: String,
    kind: EntityKind,
    buffer: Arc<EntityBuffer>,
    router: Arc<R>,
    store: Arc<S>,
}

impl<R, S> Trigger<R, S>
where
    R: EntityRouter,
    S: StateStore,
{
    /// Bind a trigger to its buffer, router and store.
    #[must_use]
    pub fn new(kind: EntityKind, buffer: Arc<EntityBuffer>, router: Arc<R>, store: Arc<S>) -> Self {
        Self {
            label: format!("{kind}-dispatch"),
            kind,
            buffer,
            router,
            store,
        }
    }

    /// Run one dispatch pass for a tick.
    pub async fn dispatch(&self, tick: &TickPayload) {
        let Some(kline) = tick.as_kline() else {
            tracing::trace!(trigger = %self.label, "Ignoring non-kline tick");
            return;
        };

        let pending = self.buffer.len().await;
        if pending == 0 {
            return;
        }
        tracing::debug!(
            trigger = %self.label,
            pending,
            symbol = %kline.data.symbol,
            "Dispatching tick"
        );

        for _ in 0..pending {
            let Some(item) = self.buffer.pop_front().await else {
                break;
            };

            match self.router.route(&item.entity, &kline).await {
                Ok(Outcome::Finished) => {
                    tracing::info!(
                        trigger = %self.label,
                        uuid = %item.entity.uuid,
                        "Entity reached a terminal state"
                    );
                    if let Err(error) = self.store.remove_tracked(self.kind, item.entity.id).await {
                        tracing::warn!(
                            error = %error,
                            id = item.entity.id,
                            "Failed to clear tracked state"
                        );
                    }
                }
                Ok(Outcome::Pending) => {
                    self.buffer.requeue_back(item).await;
                }
                Err(error) => {
                    // Transient by definition: never drop an entity over a
                    // failed pass.
                    tracing::warn!(
                        trigger = %self.label,
                        uuid = %item.entity.uuid,
                        error = %error,
                        "Routing failed, requeueing"
                    );
                    self.buffer.requeue_back(item).await;
                }
            }
        }
    }
}

#[async_trait]
impl<R, S> TickHandler for Trigger<R, S>
where
    R: EntityRouter + 'static,
    S: StateStore + 'static,
{
    async fn on_tick(&self, tick: TickPayload) {
        self.dispatch(&tick).await;
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::buffer::BufferedItem;
    use crate::lifecycle::LifecycleError;
    use crate::models::{Category, Entity, KlineUpdate, Side};
    use crate::store::{ChangeMethod, InMemoryStateStore};
    use crate::testkit::{entity, kline};

    /// Router scripted per uuid; optionally injects a new entity into the
    /// buffer while routing, to exercise the bounded-dispatch rule.
    struct ScriptedRouter {
        finish: Vec<String>,
        inject: Mutex<Option<(Arc<EntityBuffer>, Entity)>>,
    }

    impl ScriptedRouter {
        fn finishing(uuids: &[&str]) -> Self {
            Self {
                finish: uuids.iter().map(ToString::to_string).collect(),
                inject: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl EntityRouter for ScriptedRouter {
        async fn route(
            &self,
            entity: &Entity,
            _kline: &KlineUpdate,
        ) -> Result<Outcome, LifecycleError> {
            let injection = self.inject.lock().take();
            if let Some((buffer, extra)) = injection {
                buffer.add(BufferedItem::bootstrap(extra)).await;
            }
            if self.finish.contains(&entity.uuid) {
                Ok(Outcome::Finished)
            } else {
                Ok(Outcome::Pending)
            }
        }
    }

    fn item(uuid: &str) -> BufferedItem {
        BufferedItem::bootstrap(entity(1, uuid, Category::Option, Side::Buy, 100))
    }

    fn payload() -> TickPayload {
        TickPayload::Json(serde_json::to_value(kline(95, 105, 100, 1)).unwrap())
    }

    #[tokio::test]
    async fn finished_entities_leave_and_pending_ones_cycle_in_order() {
        let buffer = Arc::new(EntityBuffer::new("queue_test"));
        for uuid in ["a", "b", "c"] {
            buffer.add(item(uuid)).await;
        }
        let store = Arc::new(InMemoryStateStore::new());
        let trigger = Trigger::new(
            EntityKind::Position,
            Arc::clone(&buffer),
            Arc::new(ScriptedRouter::finishing(&["b"])),
            Arc::clone(&store),
        );

        trigger.dispatch(&payload()).await;

        let order: Vec<String> = buffer
            .peek_all()
            .await
            .into_iter()
            .map(|item| item.entity.uuid)
            .collect();
        assert_eq!(order, vec!["a", "c"]);

        let deletions: Vec<_> = store
            .notifications()
            .into_iter()
            .filter(|n| n.method == ChangeMethod::Delete)
            .collect();
        assert_eq!(deletions.len(), 1);
        assert_eq!(deletions[0].kind, EntityKind::Position);
    }

    #[tokio::test]
    async fn items_added_mid_dispatch_wait_for_the_next_tick() {
        let buffer = Arc::new(EntityBuffer::new("queue_test"));
        buffer.add(item("first")).await;

        let router = ScriptedRouter {
            finish: vec!["first".to_string(), "late".to_string()],
            inject: Mutex::new(Some((
                Arc::clone(&buffer),
                entity(2, "late", Category::Option, Side::Buy, 100),
            ))),
        };
        let store = Arc::new(InMemoryStateStore::new());
        let trigger = Trigger::new(
            EntityKind::Order,
            Arc::clone(&buffer),
            Arc::new(router),
            Arc::clone(&store),
        );

        trigger.dispatch(&payload()).await;

        // "late" arrived during the pass and must still be queued.
        let remaining: Vec<String> = buffer
            .peek_all()
            .await
            .into_iter()
            .map(|item| item.entity.uuid)
            .collect();
        assert_eq!(remaining, vec!["late"]);

        trigger.dispatch(&payload()).await;
        assert!(buffer.is_empty().await);
    }

    #[tokio::test]
    async fn non_kline_ticks_are_ignored() {
        let buffer = Arc::new(EntityBuffer::new("queue_test"));
        buffer.add(item("a")).await;
        let trigger = Trigger::new(
            EntityKind::Order,
            Arc::clone(&buffer),
            Arc::new(ScriptedRouter::finishing(&["a"])),
            Arc::new(InMemoryStateStore::new()),
        );

        trigger
            .dispatch(&TickPayload::Raw("not json".to_string()))
            .await;
        assert_eq!(buffer.len().await, 1);
    }
}
