//! HTTP handlers for the leasing service.
//!
//! The service is the single writer of item state: every handler is one
//! call into the authoritative `InMemoryQueueStore`, whose per-queue lock
//! makes lease/release indivisible no matter how many client processes
//! talk to it.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::protocol::*;
use crate::domain::{DeadLetter, ItemId, LeasedItem, QueueError, QueueName, QueueStats};
use crate::impls::InMemoryQueueStore;
use crate::ports::QueueStore;

/// Shared handler state.
#[derive(Clone)]
pub struct ServiceState {
    pub store: Arc<InMemoryQueueStore>,
}

/// Error returned by handlers; rendered as an `ApiResponse` envelope.
#[derive(Debug)]
pub enum ServiceError {
    Queue(QueueError),
    BadRequest(String),
}

impl From<QueueError> for ServiceError {
    fn from(value: QueueError) -> Self {
        ServiceError::Queue(value)
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(value: JsonRejection) -> Self {
        ServiceError::BadRequest(value.body_text())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ServiceError::Queue(err) => {
                let status = match &err {
                    QueueError::QueueNotFound(_) | QueueError::ItemNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    QueueError::LeaseConflict { .. } => StatusCode::CONFLICT,
                    QueueError::InvalidQueueName(_) => StatusCode::BAD_REQUEST,
                    QueueError::Transport(_)
                    | QueueError::Protocol(_)
                    | QueueError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code(), err.to_string())
            }
            ServiceError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, CODE_INVALID_REQUEST, message)
            }
        };
        if status.is_server_error() {
            tracing::error!(%code, %message, "request failed");
        }
        (status, Json(ApiResponse::<()>::err(code, message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

fn parse_queue(raw: String) -> Result<QueueName, ServiceError> {
    Ok(QueueName::new(raw)?)
}

pub async fn handle_health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
    }))
}

pub async fn handle_create_queue(
    State(state): State<ServiceState>,
    Path(name): Path<String>,
) -> ApiResult<CreateQueueResponse> {
    let name = parse_queue(name)?;
    state.store.create_queue(&name).await?;
    tracing::info!(queue = %name, "queue declared");
    Ok(Json(ApiResponse::ok(CreateQueueResponse { name })))
}

pub async fn handle_add_item(
    State(state): State<ServiceState>,
    body: Result<Json<AddItemRequest>, JsonRejection>,
) -> ApiResult<AddItemResponse> {
    let Json(req) = body?;
    let id = state.store.add(&req.queue_name, req.data).await?;
    Ok(Json(ApiResponse::ok(AddItemResponse { id })))
}

/// `data: null` is the empty-result signal.
pub async fn handle_lease_item(
    State(state): State<ServiceState>,
    body: Result<Json<LeaseItemRequest>, JsonRejection>,
) -> ApiResult<LeasedItem> {
    let Json(req) = body?;
    let leased = state.store.lease(&req.queue_name, req.lease_expiry).await?;
    Ok(Json(match leased {
        Some(item) => ApiResponse::ok(item),
        None => ApiResponse::empty(),
    }))
}

pub async fn handle_release_item(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    body: Result<Json<ReleaseItemRequest>, JsonRejection>,
) -> ApiResult<ReleaseItemResponse> {
    let item_id: ItemId = id
        .parse()
        .map_err(|e| ServiceError::BadRequest(format!("invalid item id {id:?}: {e}")))?;
    let Json(req) = body?;
    state.store.release(item_id, req.lease_id, req.outcome).await?;
    Ok(Json(ApiResponse::ok(ReleaseItemResponse { released: true })))
}

pub async fn handle_queue_stats(
    State(state): State<ServiceState>,
    Path(name): Path<String>,
) -> ApiResult<QueueStats> {
    let name = parse_queue(name)?;
    let stats = state.store.stats(&name).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

pub async fn handle_dead_letters(
    State(state): State<ServiceState>,
    Path(name): Path<String>,
) -> ApiResult<Vec<DeadLetter>> {
    let name = parse_queue(name)?;
    let dead = state.store.dead_letters(&name).await?;
    Ok(Json(ApiResponse::ok(dead)))
}
