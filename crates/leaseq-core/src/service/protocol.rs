//! Network Protocol Definitions
//!
//! DTOs and endpoints shared by the leasing service (`service::handlers`)
//! and its client (`impls::remote`). Bodies are JSON, camelCase, and every
//! response is wrapped in `ApiResponse`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::outcome::duration_ms;
use crate::domain::{ItemId, LeaseId, Payload, QueueError, QueueName, ReleaseOutcome};

pub const ENDPOINT_HEALTH: &str = "/health";
pub const ENDPOINT_QUEUE: &str = "/queues/{name}";
pub const ENDPOINT_QUEUE_STATS: &str = "/queues/{name}/stats";
pub const ENDPOINT_QUEUE_DEAD_LETTERS: &str = "/queues/{name}/dead-letters";
pub const ENDPOINT_ADD_ITEM: &str = "/items";
pub const ENDPOINT_LEASE_ITEM: &str = "/items/lease";
pub const ENDPOINT_RELEASE_ITEM: &str = "/items/{id}/release";

/// Machine-readable error codes.
pub const CODE_QUEUE_NOT_FOUND: &str = "queue_not_found";
pub const CODE_ITEM_NOT_FOUND: &str = "item_not_found";
pub const CODE_LEASE_CONFLICT: &str = "lease_conflict";
pub const CODE_INVALID_REQUEST: &str = "invalid_request";
pub const CODE_INTERNAL: &str = "internal";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub queue_name: QueueName,
    pub data: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddItemResponse {
    pub id: ItemId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseItemRequest {
    pub queue_name: QueueName,
    #[serde(rename = "leaseExpiryMs", with = "duration_ms")]
    pub lease_expiry: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseItemRequest {
    pub lease_id: LeaseId,
    pub outcome: ReleaseOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseItemResponse {
    pub released: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueueResponse {
    pub name: QueueName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Response envelope: `data` on success, `error` on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }

    pub fn err(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

impl QueueError {
    /// Wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::QueueNotFound(_) => CODE_QUEUE_NOT_FOUND,
            QueueError::ItemNotFound(_) => CODE_ITEM_NOT_FOUND,
            QueueError::LeaseConflict { .. } => CODE_LEASE_CONFLICT,
            QueueError::InvalidQueueName(_) => CODE_INVALID_REQUEST,
            QueueError::Transport(_) | QueueError::Protocol(_) | QueueError::Configuration(_) => {
                CODE_INTERNAL
            }
        }
    }
}

/// Path for one queue (`/queues/{name}` with the name filled in).
pub fn queue_path(template: &str, queue: &QueueName) -> String {
    template.replace("{name}", queue.as_str())
}

pub fn release_path(item_id: ItemId) -> String {
    ENDPOINT_RELEASE_ITEM.replace("{id}", &item_id.as_ulid().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn lease_request_uses_wire_names() {
        let req = LeaseItemRequest {
            queue_name: QueueName::new("mail").unwrap(),
            lease_expiry: Duration::from_secs(30),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v, serde_json::json!({"queueName": "mail", "leaseExpiryMs": 30000}));
    }

    #[test]
    fn empty_envelope_means_nothing_to_lease() {
        let v = serde_json::to_value(ApiResponse::<AddItemResponse>::empty()).unwrap();
        assert_eq!(v, serde_json::json!({"data": null, "error": null}));
    }

    #[test]
    fn paths_fill_in_their_segments() {
        let q = QueueName::new("mail").unwrap();
        assert_eq!(queue_path(ENDPOINT_QUEUE_STATS, &q), "/queues/mail/stats");

        let ulid = Ulid::new();
        assert_eq!(
            release_path(ItemId::from_ulid(ulid)),
            format!("/items/{ulid}/release")
        );
    }
}
