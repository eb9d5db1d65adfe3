//! Scripted management API for tests.

use std::collections::HashMap;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::{ApiError, Lookup, MonitoringApi, StatusOutcome, TargetStatus};
use crate::models::{Entity, EntityKind};

/// One recorded call against the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    /// `fetch` was invoked.
    Fetch {
        /// Entity kind requested.
        kind: EntityKind,
        /// Entity uuid requested.
        uuid: String,
    },
    /// `change_status` was invoked.
    ChangeStatus {
        /// Entity kind requested.
        kind: EntityKind,
        /// Entity uuid requested.
        uuid: String,
        /// Target status requested.
        status: TargetStatus,
        /// Candle timestamp carried, if any.
        kline_ms: Option<i64>,
    },
    /// `close_order` was invoked.
    CloseOrder {
        /// Order uuid requested.
        uuid: String,
        /// Close rate requested.
        rate: Decimal,
        /// Candle timestamp carried.
        kline_ms: i64,
    },
}

/// [`MonitoringApi`] with scripted responses and call recording.
pub struct MockMonitoringApi {
    lookups: Mutex<HashMap<String, Lookup>>,
    failing_lookups: Mutex<Vec<String>>,
    status_outcome: Mutex<StatusOutcome>,
    close_outcome: Mutex<StatusOutcome>,
    open: Mutex<HashMap<EntityKind, Vec<Entity>>>,
    calls: Mutex<Vec<ApiCall>>,
}

impl MockMonitoringApi {
    /// Create a mock that answers `Applied` to every mutation and
    /// `Terminal` to every lookup.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lookups: Mutex::new(HashMap::new()),
            failing_lookups: Mutex::new(Vec::new()),
            status_outcome: Mutex::new(StatusOutcome::Applied),
            close_outcome: Mutex::new(StatusOutcome::Applied),
            open: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script the lookup answer for one uuid.
    pub fn on_fetch(&self, uuid: &str, lookup: Lookup) {
        self.lookups.lock().insert(uuid.to_string(), lookup);
    }

    /// Make lookups for one uuid fail as a transient error.
    pub fn fail_fetch(&self, uuid: &str) {
        self.failing_lookups.lock().push(uuid.to_string());
    }

    /// Outcome every `change_status` call reports.
    pub fn set_status_outcome(&self, outcome: StatusOutcome) {
        *self.status_outcome.lock() = outcome;
    }

    /// Outcome every `close_order` call reports.
    pub fn set_close_outcome(&self, outcome: StatusOutcome) {
        *self.close_outcome.lock() = outcome;
    }

    /// Script the `list_open` answer for one kind.
    pub fn set_open(&self, kind: EntityKind, entities: Vec<Entity>) {
        self.open.lock().insert(kind, entities);
    }

    /// All calls recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }
}

impl Default for MockMonitoringApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MonitoringApi for MockMonitoringApi {
    async fn fetch(&self, kind: EntityKind, uuid: &str) -> Result<Lookup, ApiError> {
        self.calls.lock().push(ApiCall::Fetch {
            kind,
            uuid: uuid.to_string(),
        });
        if self.failing_lookups.lock().iter().any(|u| u == uuid) {
            return Err(ApiError::UnexpectedStatus { status: 503 });
        }
        Ok(self
            .lookups
            .lock()
            .get(uuid)
            .cloned()
            .unwrap_or(Lookup::Terminal))
    }

    async fn list_open(&self, kind: EntityKind) -> Vec<Entity> {
        self.open.lock().get(&kind).cloned().unwrap_or_default()
    }

    async fn change_status(
        &self,
        kind: EntityKind,
        uuid: &str,
        status: TargetStatus,
        kline_ms: Option<i64>,
    ) -> Result<StatusOutcome, ApiError> {
        self.calls.lock().push(ApiCall::ChangeStatus {
            kind,
            uuid: uuid.to_string(),
            status,
            kline_ms,
        });
        Ok(*self.status_outcome.lock())
    }

    async fn close_order(
        &self,
        uuid: &str,
        rate: Decimal,
        kline_ms: i64,
    ) -> Result<StatusOutcome, ApiError> {
        self.calls.lock().push(ApiCall::CloseOrder {
            uuid: uuid.to_string(),
            rate,
            kline_ms,
        });
        Ok(*self.close_outcome.lock())
    }
}
