//! Leasing service: the lease protocol over HTTP.
//!
//! - **`protocol`**: DTOs, endpoints and error codes shared with the client
//! - **`handlers`**: axum handlers over the authoritative in-memory store
//!
//! `router` wires them; `serve` runs the router until `shutdown` resolves.

pub mod handlers;
pub mod protocol;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;

use self::handlers::*;
use self::protocol::*;
use crate::impls::InMemoryQueueStore;

pub fn router(store: Arc<InMemoryQueueStore>) -> Router {
    Router::new()
        .route(ENDPOINT_HEALTH, get(handle_health))
        .route(ENDPOINT_QUEUE, put(handle_create_queue))
        .route(ENDPOINT_QUEUE_STATS, get(handle_queue_stats))
        .route(ENDPOINT_QUEUE_DEAD_LETTERS, get(handle_dead_letters))
        .route(ENDPOINT_ADD_ITEM, post(handle_add_item))
        .route(ENDPOINT_LEASE_ITEM, post(handle_lease_item))
        .route(ENDPOINT_RELEASE_ITEM, post(handle_release_item))
        .with_state(ServiceState { store })
}

/// Serve `store` on `listener` until `shutdown` completes.
pub async fn serve<F>(
    listener: TcpListener,
    store: Arc<InMemoryQueueStore>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "leasing service listening");
    }
    axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueueName;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt as _;
    use serde_json::{Value, json};
    use tower::ServiceExt; // for Router::oneshot

    fn app() -> Router {
        let store = InMemoryQueueStore::with_queues([QueueName::new("q").unwrap()]);
        router(Arc::new(store))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn add_lease_release_over_http() {
        let app = app();

        let (status, v) = call(&app, "POST", "/items", Some(json!({"queueName": "q", "data": "foo"}))).await;
        assert_eq!(status, StatusCode::OK);
        let id = v["data"]["id"].as_str().unwrap().to_string();

        let lease_req = json!({"queueName": "q", "leaseExpiryMs": 30000});
        let (status, v) = call(&app, "POST", "/items/lease", Some(lease_req.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["id"], id.as_str());
        assert_eq!(v["data"]["data"], "foo");
        let lease_id = v["data"]["leaseId"].as_str().unwrap().to_string();

        let (_, v) = call(&app, "POST", "/items/lease", Some(lease_req)).await;
        assert!(v["data"].is_null());
        assert!(v["error"].is_null());

        let uri = format!("/items/{id}/release");
        let (status, v) = call(
            &app,
            "POST",
            &uri,
            Some(json!({"leaseId": lease_id, "outcome": {"type": "commit"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["released"], true);

        let (status, v) = call(&app, "GET", "/queues/q/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["committed"], 1);
        assert_eq!(v["data"]["ready"], 0);
    }

    #[tokio::test]
    async fn unknown_queue_is_a_404_with_code() {
        let app = app();
        let (status, v) = call(&app, "POST", "/items", Some(json!({"queueName": "nope", "data": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(v["error"]["code"], CODE_QUEUE_NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_lease_is_a_409_with_code() {
        let app = app();
        let (_, v) = call(&app, "POST", "/items", Some(json!({"queueName": "q", "data": "x"}))).await;
        let id = v["data"]["id"].as_str().unwrap().to_string();
        call(&app, "POST", "/items/lease", Some(json!({"queueName": "q", "leaseExpiryMs": 30000}))).await;

        let bogus = ulid::Ulid::new().to_string();
        let (status, v) = call(
            &app,
            "POST",
            &format!("/items/{id}/release"),
            Some(json!({"leaseId": bogus, "outcome": {"type": "deadLetter"}})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(v["error"]["code"], CODE_LEASE_CONFLICT);
    }

    #[tokio::test]
    async fn malformed_bodies_are_invalid_requests() {
        let app = app();
        let (status, v) = call(&app, "POST", "/items", Some(json!({"queueName": "bad name", "data": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"]["code"], CODE_INVALID_REQUEST);

        let (status, v) = call(&app, "POST", "/items/not-a-ulid/release", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"]["code"], CODE_INVALID_REQUEST);
    }

    #[tokio::test]
    async fn declare_queue_then_use_it() {
        let app = app();
        let (status, v) = call(&app, "PUT", "/queues/fresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["name"], "fresh");

        let (status, _) = call(&app, "POST", "/items", Some(json!({"queueName": "fresh", "data": "x"}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, v) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["status"], "ok");
    }
}
