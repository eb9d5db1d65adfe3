//! HTTP adapter for the management API.

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{ApiError, Lookup, MonitoringApi, StatusOutcome, TargetStatus};
use crate::config::ApiConfig;
use crate::models::{Entity, EntityKind};

/// [`MonitoringApi`] over JSON/HTTP with a fixed request timeout.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChangeStatusRequest<'a> {
    uuid: &'a str,
    status: TargetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    kline_ms: Option<String>,
}

#[derive(Serialize)]
struct CloseOrderRequest<'a> {
    uuid: &'a str,
    rate: Decimal,
    kline_ms: String,
}

impl HttpApiClient {
    /// Build a client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Map a status-mutation response code onto an outcome.
    ///
    /// 409 means the entity is already in the requested state and counts
    /// as applied; 412 gets the same treatment on the close endpoint.
    const fn mutation_outcome(status: StatusCode, precondition_ok: bool) -> StatusOutcome {
        match status.as_u16() {
            200 | 409 => StatusOutcome::Applied,
            412 if precondition_ok => StatusOutcome::Applied,
            404 => StatusOutcome::Rejected,
            _ => StatusOutcome::Unknown,
        }
    }
}

#[async_trait::async_trait]
impl MonitoringApi for HttpApiClient {
    async fn fetch(&self, kind: EntityKind, uuid: &str) -> Result<Lookup, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/{}/", kind.as_str())))
            .query(&[("uuid", uuid)])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ApiError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let entity: Entity = response.json().await?;
        if entity.is_terminal() {
            Ok(Lookup::Terminal)
        } else {
            Ok(Lookup::Alive(Box::new(entity)))
        }
    }

    async fn list_open(&self, kind: EntityKind) -> Vec<Entity> {
        let url = self.url(&format!("/{}/ListOpen", kind.as_str()));
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(url = %url, error = %error, "ListOpen request failed");
                return Vec::new();
            }
        };

        if response.status() != StatusCode::OK {
            tracing::warn!(url = %url, status = response.status().as_u16(), "ListOpen returned non-200");
            return Vec::new();
        }

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(url = %url, error = %error, "ListOpen body was not JSON");
                return Vec::new();
            }
        };
        let Some(items) = body.as_array() else {
            tracing::warn!(url = %url, "ListOpen body was not an array");
            return Vec::new();
        };

        let mut entities = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<Entity>(item.clone()) {
                Ok(entity) => entities.push(entity),
                Err(error) => {
                    tracing::warn!(kind = %kind, error = %error, "Skipping undecodable open entity");
                }
            }
        }
        tracing::info!(kind = %kind, count = entities.len(), "Fetched open entities");
        entities
    }

    async fn change_status(
        &self,
        kind: EntityKind,
        uuid: &str,
        status: TargetStatus,
        kline_ms: Option<i64>,
    ) -> Result<StatusOutcome, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/{}/changeStatus", kind.as_str())))
            .json(&ChangeStatusRequest {
                uuid,
                status,
                kline_ms: kline_ms.map(|ms| ms.to_string()),
            })
            .send()
            .await?;

        let outcome = Self::mutation_outcome(response.status(), false);
        tracing::debug!(
            kind = %kind,
            uuid = %uuid,
            status = status.as_str(),
            code = response.status().as_u16(),
            outcome = ?outcome,
            "Status change requested"
        );
        Ok(outcome)
    }

    async fn close_order(
        &self,
        uuid: &str,
        rate: Decimal,
        kline_ms: i64,
    ) -> Result<StatusOutcome, ApiError> {
        let response = self
            .client
            .post(self.url("/order/close"))
            .json(&CloseOrderRequest {
                uuid,
                rate,
                kline_ms: kline_ms.to_string(),
            })
            .send()
            .await?;

        let outcome = Self::mutation_outcome(response.status(), true);
        tracing::debug!(
            uuid = %uuid,
            rate = %rate,
            code = response.status().as_u16(),
            outcome = ?outcome,
            "Order close requested"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_counts_as_applied() {
        assert_eq!(
            HttpApiClient::mutation_outcome(StatusCode::CONFLICT, false),
            StatusOutcome::Applied
        );
    }

    #[test]
    fn not_found_is_definitive() {
        assert_eq!(
            HttpApiClient::mutation_outcome(StatusCode::NOT_FOUND, false),
            StatusOutcome::Rejected
        );
    }

    #[test]
    fn server_errors_are_transient() {
        assert_eq!(
            HttpApiClient::mutation_outcome(StatusCode::INTERNAL_SERVER_ERROR, false),
            StatusOutcome::Unknown
        );
        assert_eq!(
            HttpApiClient::mutation_outcome(StatusCode::BAD_GATEWAY, true),
            StatusOutcome::Unknown
        );
    }

    #[test]
    fn precondition_failed_applies_only_on_close() {
        assert_eq!(
            HttpApiClient::mutation_outcome(StatusCode::PRECONDITION_FAILED, true),
            StatusOutcome::Applied
        );
        assert_eq!(
            HttpApiClient::mutation_outcome(StatusCode::PRECONDITION_FAILED, false),
            StatusOutcome::Unknown
        );
    }
}
