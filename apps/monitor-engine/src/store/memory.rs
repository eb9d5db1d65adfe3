//! In-memory state store for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::{
    ChangeMethod, ChangeNotification, DEFAULT_POSITION_LIFETIME_SECS, ExtremumKind, StateStore,
    StoreError, TrackedState,
};
use crate::models::EntityKind;

/// [`StateStore`] kept entirely in process memory.
///
/// Change notifications are recorded instead of published so tests can
/// assert on them.
pub struct InMemoryStateStore {
    tracked: Mutex<HashMap<String, TrackedState>>,
    extremes: Mutex<HashMap<String, Decimal>>,
    notifications: Mutex<Vec<ChangeNotification>>,
    lifetime_secs: AtomicI64,
}

impl InMemoryStateStore {
    /// Create an empty store with the default position lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tracked: Mutex::new(HashMap::new()),
            extremes: Mutex::new(HashMap::new()),
            notifications: Mutex::new(Vec::new()),
            lifetime_secs: AtomicI64::new(DEFAULT_POSITION_LIFETIME_SECS),
        }
    }

    /// Override the position lifetime returned by the settings lookup.
    pub fn set_lifetime_secs(&self, secs: i64) {
        self.lifetime_secs.store(secs, Ordering::SeqCst);
    }

    /// Pre-seed one extremum record.
    pub fn seed_extremum(&self, kind: EntityKind, uuid: &str, which: ExtremumKind, value: Decimal) {
        self.extremes
            .lock()
            .insert(kind.extremum_key(uuid, which.as_str()), value);
    }

    /// Current value of one extremum record.
    #[must_use]
    pub fn extremum(&self, kind: EntityKind, uuid: &str, which: ExtremumKind) -> Option<Decimal> {
        self.extremes
            .lock()
            .get(&kind.extremum_key(uuid, which.as_str()))
            .copied()
    }

    /// Every notification recorded so far, in publish order.
    #[must_use]
    pub fn notifications(&self) -> Vec<ChangeNotification> {
        self.notifications.lock().clone()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn is_tracked(&self, kind: EntityKind, id: i64) -> Result<bool, StoreError> {
        Ok(self.tracked.lock().contains_key(&kind.state_key(id)))
    }

    async fn tracked(&self, kind: EntityKind, id: i64) -> Result<Option<TrackedState>, StoreError> {
        Ok(self.tracked.lock().get(&kind.state_key(id)).cloned())
    }

    async fn put_tracked(
        &self,
        kind: EntityKind,
        id: i64,
        state: &TrackedState,
    ) -> Result<(), StoreError> {
        let mut state = state.clone();
        state.dt = Some(Utc::now().to_rfc3339());
        self.notifications.lock().push(ChangeNotification {
            id,
            kind,
            method: ChangeMethod::Set,
            data: Some(state.clone()),
        });
        self.tracked.lock().insert(kind.state_key(id), state);
        Ok(())
    }

    async fn remove_tracked(&self, kind: EntityKind, id: i64) -> Result<(), StoreError> {
        self.notifications.lock().push(ChangeNotification {
            id,
            kind,
            method: ChangeMethod::Delete,
            data: None,
        });
        self.tracked.lock().remove(&kind.state_key(id));
        Ok(())
    }

    async fn load_extremes(
        &self,
        kind: EntityKind,
        uuid: &str,
    ) -> Result<(Option<Decimal>, Option<Decimal>), StoreError> {
        Ok((
            self.extremum(kind, uuid, ExtremumKind::Min),
            self.extremum(kind, uuid, ExtremumKind::Max),
        ))
    }

    async fn record_extremum(
        &self,
        kind: EntityKind,
        uuid: &str,
        which: ExtremumKind,
        value: Decimal,
    ) -> Result<(), StoreError> {
        self.extremes
            .lock()
            .insert(kind.extremum_key(uuid, which.as_str()), value);
        Ok(())
    }

    async fn position_lifetime_secs(&self) -> i64 {
        self.lifetime_secs.load(Ordering::SeqCst)
    }
}
