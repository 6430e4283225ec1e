//! HTTP surface of a cache node.
//!
//! | Route                | Purpose                                   |
//! |----------------------|-------------------------------------------|
//! | `GET /health`        | liveness probe used by peers              |
//! | `GET /kv/{key}`      | local read, raw bytes                     |
//! | `PUT /kv/{key}`      | replicated write (`ttl`, `min`, `full`)   |
//! | `DELETE /kv/{key}`   | replicated delete (`min`, `full`)         |
//! | `POST /sync`         | inbound write from a peer, never re-sent  |
//!
//! `/kv` and `/kv/` without a key answer `400 missing key` for any method.
//!
//! Replicated writes report progress in the `X-Replicated-Acked` and
//! `X-Replicated-Total` headers, on success and on replication failure.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::clock::parse_ttl;
use crate::entry::SyncMsg;
use crate::error::{RequestError, WriteError};
use crate::node::Node;
use crate::replication::{Acks, WritePolicy};

pub const ACKED_HEADER: HeaderName = HeaderName::from_static("x-replicated-acked");
pub const TOTAL_HEADER: HeaderName = HeaderName::from_static("x-replicated-total");

pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/kv", any(missing_key))
        .route("/kv/", any(missing_key))
        .route("/kv/:key", get(read_key).put(write_key).delete(delete_key))
        .route("/sync", post(sync))
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

/// Raw query parameters of a write. Parsed by hand so that every malformed
/// value becomes a `400` with a readable reason.
#[derive(Debug, Default, Deserialize)]
struct WriteParams {
    ttl: Option<String>,
    min: Option<String>,
    full: Option<String>,
}

impl WriteParams {
    fn ttl(&self) -> Result<Option<Duration>, RequestError> {
        Ok(parse_ttl(self.ttl.as_deref().unwrap_or_default())?)
    }

    fn policy(&self) -> Result<WritePolicy, RequestError> {
        let min_acks = match self.min.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| RequestError::BadMin(raw.to_string()))?,
        };
        let full = match self.full.as_deref().map(str::trim) {
            None | Some("") | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(raw) => return Err(RequestError::BadFull(raw.to_string())),
        };
        Ok(WritePolicy { min_acks, full })
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn missing_key() -> RequestError {
    RequestError::MissingKey
}

async fn read_key(State(node): State<Arc<Node>>, Path(key): Path<String>) -> Response {
    match node.get(&key) {
        Some(value) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            value,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn write_key(
    State(node): State<Arc<Node>>,
    Path(key): Path<String>,
    Query(params): Query<WriteParams>,
    body: Bytes,
) -> Result<Response, RequestError> {
    let ttl = params.ttl()?;
    let policy = params.policy()?;
    let result = node.set(&key, body.to_vec(), ttl, policy).await;
    Ok(replicated(StatusCode::CREATED, result))
}

async fn delete_key(
    State(node): State<Arc<Node>>,
    Path(key): Path<String>,
    Query(params): Query<WriteParams>,
) -> Result<Response, RequestError> {
    let policy = params.policy()?;
    let result = node.delete(&key, policy).await;
    Ok(replicated(StatusCode::NO_CONTENT, result))
}

async fn sync(State(node): State<Arc<Node>>, body: Bytes) -> Result<StatusCode, RequestError> {
    let msg: SyncMsg = serde_json::from_slice(&body)?;
    node.apply_sync(&msg);
    Ok(StatusCode::NO_CONTENT)
}

fn replicated(success: StatusCode, result: Result<Acks, WriteError>) -> Response {
    match result {
        Ok(acks) => (success, ack_headers(acks)).into_response(),
        Err(WriteError::Stale) => {
            (StatusCode::CONFLICT, WriteError::Stale.to_string()).into_response()
        }
        Err(WriteError::Replication(err)) => {
            let acks = err.acks();
            (
                StatusCode::BAD_GATEWAY,
                ack_headers(acks),
                format!(
                    "replication error: {err} (acked {}/{})",
                    acks.acked, acks.total
                ),
            )
                .into_response()
        }
    }
}

fn ack_headers(acks: Acks) -> [(HeaderName, String); 2] {
    [
        (ACKED_HEADER, acks.acked.to_string()),
        (TOTAL_HEADER, acks.total.to_string()),
    ]
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<Node>) {
        let node = Arc::new(Node::new(NodeConfig::new("A", Vec::new())).expect("node"));
        (router(Arc::clone(&node)), node)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: impl Into<Body>) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body.into())
            .expect("request");
        app.clone().oneshot(request).await.expect("infallible")
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _) = app();
        let response = call(&app, "GET", "/health", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");
    }

    #[tokio::test]
    async fn put_then_get_roundtrips_raw_bytes() {
        let (app, _) = app();
        let response = call(&app, "PUT", "/kv/hello", "world").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[&ACKED_HEADER], "0");
        assert_eq!(response.headers()[&TOTAL_HEADER], "0");

        let response = call(&app, "GET", "/kv/hello", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(body_string(response).await, "world");
    }

    #[tokio::test]
    async fn absent_key_is_not_found() {
        let (app, _) = app();
        let response = call(&app, "GET", "/kv/nope", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_write_params_are_rejected() {
        let (app, node) = app();
        let malformed = [
            "/kv/k?ttl=soon",
            "/kv/k?ttl=-5s",
            "/kv/k?min=-1",
            "/kv/k?min=x",
            "/kv/k?full=maybe",
        ];
        for uri in malformed {
            let response = call(&app, "PUT", uri, "v").await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
        assert!(node.store().is_empty(), "rejected writes must not touch the store");

        let response = call(&app, "DELETE", "/kv/k?min=two", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(node.store().is_empty());
    }

    #[tokio::test]
    async fn write_requiring_acks_without_peers_is_bad_gateway() {
        let (app, node) = app();
        let response = call(&app, "PUT", "/kv/k?min=1", "v").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[&ACKED_HEADER], "0");
        assert_eq!(response.headers()[&TOTAL_HEADER], "0");
        assert!(body_string(response).await.contains("no peers available"));
        assert_eq!(node.get("k"), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn empty_key_is_bad_request() {
        let (app, node) = app();
        for (method, uri) in [("PUT", "/kv/"), ("GET", "/kv/"), ("DELETE", "/kv")] {
            let response = call(&app, method, uri, "v").await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(body_string(response).await, "missing key");
        }
        assert!(node.store().is_empty());
    }

    #[tokio::test]
    async fn stale_write_conflicts() {
        let (app, node) = app();
        let newer = crate::entry::Entry::live(b"new".to_vec(), None, i64::MAX, "B").to_sync("k");
        node.apply_sync(&newer);

        let response = call(&app, "PUT", "/kv/k", "old").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(node.get("k"), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn delete_hides_key() {
        let (app, _) = app();
        call(&app, "PUT", "/kv/k", "v").await;
        let response = call(&app, "DELETE", "/kv/k", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[&TOTAL_HEADER], "0");

        let response = call(&app, "GET", "/kv/k", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sync_applies_without_replicating() {
        let (app, node) = app();
        let body = r#"{"op":"set","key":"k","value":"dg==","version":5,"origin":"X"}"#;
        let response = call(&app, "POST", "/sync", body).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(node.get("k"), Some(b"v".to_vec()));

        // Replays are accepted but change nothing.
        let response = call(&app, "POST", "/sync", body).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(node.store().len(), 1);
    }

    #[tokio::test]
    async fn sync_rejects_bad_json_and_unknown_ops() {
        let (app, node) = app();
        let response = call(&app, "POST", "/sync", "{not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let unknown = r#"{"op":"incr","key":"k","version":1,"origin":"X"}"#;
        let response = call(&app, "POST", "/sync", unknown).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(node.store().is_empty());
    }
}
