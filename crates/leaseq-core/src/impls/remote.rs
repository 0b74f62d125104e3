//! RemoteQueueClient - `QueueStore` over the HTTP leasing protocol
//!
//! The client is a stateless translator: one request per operation, no
//! caching, no client-side locking. All concurrency control lives in the
//! service. Transport failures surface as `QueueError::Transport` so the
//! processor backs off and polls again; retrying is safe because a stale
//! `release` can only ever produce a lease conflict.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{
    DeadLetter, ItemId, LeaseId, LeasedItem, Payload, QueueError, QueueName, QueueStats,
    ReleaseOutcome,
};
use crate::ports::QueueStore;
use crate::service::protocol::*;

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct RemoteQueueClient {
    base_url: String,
    http: reqwest::Client,
}

impl RemoteQueueClient {
    /// Client for the service at `base_url` (e.g. `http://127.0.0.1:7070`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, QueueError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| QueueError::Configuration(format!("http client: {e}")))?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Dead-lettered items of a queue, oldest first.
    pub async fn dead_letters(&self, queue: &QueueName) -> Result<Vec<DeadLetter>, QueueError> {
        let path = queue_path(ENDPOINT_QUEUE_DEAD_LETTERS, queue);
        self.expect_data(self.http.get(self.url(&path))).await
    }

    /// `true` when the service answers its health check.
    pub async fn health(&self) -> Result<bool, QueueError> {
        let health: HealthResponse = self.expect_data(self.http.get(self.url(ENDPOINT_HEALTH))).await?;
        Ok(health.status == "ok")
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        item: Option<ItemId>,
    ) -> Result<Option<T>, QueueError> {
        self.send(self.http.post(self.url(path)).json(body), item).await
    }

    async fn expect_data<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, QueueError> {
        self.send(request, None)
            .await?
            .ok_or_else(|| QueueError::Protocol("response carried no data".to_string()))
    }

    /// One round trip. `Ok(None)` is the protocol's empty-result signal.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        item: Option<ItemId>,
    ) -> Result<Option<T>, QueueError> {
        let response = request
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        let envelope: ApiResponse<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            // proxies and dying servers answer with non-envelope bodies
            Err(_) if status.is_server_error() => {
                return Err(QueueError::Transport(format!("server answered {status}")));
            }
            Err(e) => {
                return Err(QueueError::Protocol(format!(
                    "undecodable response ({status}): {e}"
                )));
            }
        };

        if let Some(error) = envelope.error {
            return Err(map_api_error(error, status, item));
        }
        if !status.is_success() {
            return Err(QueueError::Protocol(format!("{status} without error body")));
        }
        Ok(envelope.data)
    }
}

/// Map a wire error back onto the local taxonomy. `item` is the item the
/// request was about, if any.
fn map_api_error(error: ApiError, status: reqwest::StatusCode, item: Option<ItemId>) -> QueueError {
    match (error.code.as_str(), item) {
        (CODE_QUEUE_NOT_FOUND, _) => {
            let name = error.message.strip_prefix("queue not found: ").unwrap_or(&error.message);
            QueueError::QueueNotFound(name.to_string())
        }
        (CODE_LEASE_CONFLICT, Some(item_id)) => QueueError::LeaseConflict { item_id },
        (CODE_ITEM_NOT_FOUND, Some(item_id)) => QueueError::ItemNotFound(item_id),
        (CODE_INVALID_REQUEST, _) => {
            QueueError::Protocol(format!("invalid request: {}", error.message))
        }
        _ if status.is_server_error() => QueueError::Transport(error.message),
        (code, _) => QueueError::Protocol(format!("{code}: {}", error.message)),
    }
}

#[async_trait]
impl QueueStore for RemoteQueueClient {
    async fn create_queue(&self, queue: &QueueName) -> Result<(), QueueError> {
        let path = queue_path(ENDPOINT_QUEUE, queue);
        let _: CreateQueueResponse = self.expect_data(self.http.put(self.url(&path))).await?;
        Ok(())
    }

    async fn add(&self, queue: &QueueName, payload: Payload) -> Result<ItemId, QueueError> {
        let req = AddItemRequest {
            queue_name: queue.clone(),
            data: payload,
        };
        let resp: AddItemResponse = self
            .post(ENDPOINT_ADD_ITEM, &req, None)
            .await?
            .ok_or_else(|| QueueError::Protocol("add returned no id".to_string()))?;
        Ok(resp.id)
    }

    async fn lease(
        &self,
        queue: &QueueName,
        lease_duration: Duration,
    ) -> Result<Option<LeasedItem>, QueueError> {
        let req = LeaseItemRequest {
            queue_name: queue.clone(),
            lease_expiry: lease_duration,
        };
        self.post(ENDPOINT_LEASE_ITEM, &req, None).await
    }

    async fn release(
        &self,
        item_id: ItemId,
        lease_id: LeaseId,
        outcome: ReleaseOutcome,
    ) -> Result<(), QueueError> {
        let req = ReleaseItemRequest { lease_id, outcome };
        let resp: Option<ReleaseItemResponse> = self
            .post(&release_path(item_id), &req, Some(item_id))
            .await?;
        match resp {
            Some(ReleaseItemResponse { released: true }) => Ok(()),
            _ => Err(QueueError::Protocol("release was not acknowledged".to_string())),
        }
    }

    async fn stats(&self, queue: &QueueName) -> Result<QueueStats, QueueError> {
        let path = queue_path(ENDPOINT_QUEUE_STATS, queue);
        self.expect_data(self.http.get(self.url(&path))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn conflict_codes_map_back_to_conflicts() {
        let id = ItemId::from_ulid(Ulid::new());
        let err = QueueError::LeaseConflict { item_id: id };
        let wire = ApiError {
            code: err.code().to_string(),
            message: err.to_string(),
        };

        let back = map_api_error(wire, reqwest::StatusCode::CONFLICT, Some(id));
        assert!(matches!(back, QueueError::LeaseConflict { item_id } if item_id == id));
    }

    #[test]
    fn not_found_codes_keep_their_meaning() {
        let id = ItemId::from_ulid(Ulid::new());
        let err = QueueError::ItemNotFound(id);
        let wire = ApiError {
            code: err.code().to_string(),
            message: err.to_string(),
        };
        assert!(matches!(
            map_api_error(wire, reqwest::StatusCode::NOT_FOUND, Some(id)),
            QueueError::ItemNotFound(got) if got == id
        ));

        let wire = ApiError {
            code: CODE_QUEUE_NOT_FOUND.to_string(),
            message: QueueError::QueueNotFound("mail".to_string()).to_string(),
        };
        assert!(matches!(
            map_api_error(wire, reqwest::StatusCode::NOT_FOUND, None),
            QueueError::QueueNotFound(name) if name == "mail"
        ));
    }

    #[test]
    fn internal_errors_are_transient() {
        let wire = ApiError {
            code: CODE_INTERNAL.to_string(),
            message: "disk on fire".to_string(),
        };
        assert_eq!(
            map_api_error(wire, reqwest::StatusCode::INTERNAL_SERVER_ERROR, None).kind(),
            crate::domain::ErrorKind::Transient
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        // port 9 (discard) on loopback: nothing listens there in CI
        let client = RemoteQueueClient::new("http://127.0.0.1:9").unwrap();
        let err = client
            .lease(&QueueName::new("q").unwrap(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Transport(_)));
    }
}
