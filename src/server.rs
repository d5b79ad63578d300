//! HTTP binding for the path service.
//!
//! Routes:
//! - `GET /` returns a short welcome message.
//! - `POST /semantic-path` takes `{start, end, k?, max_results?}` and returns
//!   `{path: [{step, code, label, description}]}`.
//!
//! Path computation is synchronous (model inference plus index scans), so each
//! request runs it on the blocking pool.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::error::PathError;
use crate::hydrate::StepContent;
use crate::service::PathService;
use crate::synth::PathParams;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PathService>,
    /// Used for any parameter a request leaves out.
    pub defaults: PathParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRequest {
    /// Label to start from.
    pub start: String,
    /// Label to end at.
    pub end: String,
    /// Neighbours considered at each hop. Signed, so negative values surface
    /// as `InvalidParameter`.
    #[serde(default)]
    pub k: Option<i64>,
    /// Maximum length of the returned path.
    #[serde(default)]
    pub max_results: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResponse {
    pub path: Vec<StepContent>,
}

/// Error body: `{"error": "..."}` with a status derived from the failure.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<PathError> for ApiError {
    fn from(err: PathError) -> Self {
        let status = match &err {
            PathError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            PathError::NotResolvable(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.message);
        }
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

async fn read_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Welcome to the Semantic Path API."
    }))
}

/// A request override, or `default` when the field was left out.
fn override_or(name: &'static str, value: Option<i64>, default: usize) -> Result<usize, PathError> {
    match value {
        None => Ok(default),
        Some(v) => match usize::try_from(v) {
            Ok(v) if v >= 1 => Ok(v),
            _ => Err(PathError::InvalidParameter { name, value: v }),
        },
    }
}

async fn semantic_path(
    State(state): State<AppState>,
    payload: Result<Json<PathRequest>, JsonRejection>,
) -> Result<Json<PathResponse>, ApiError> {
    let Json(request) = payload?;
    info!("Request payload: {:?}", request);
    let params = PathParams::new(
        override_or("k", request.k, state.defaults.k)?,
        override_or("max_steps", request.max_results, state.defaults.max_steps)?,
    );

    let service = Arc::clone(&state.service);
    let path = tokio::task::spawn_blocking(move || {
        service.compute_path(&request.start, &request.end, params)
    })
    .await
    .map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: e.to_string(),
    })??;

    Ok(Json(PathResponse { path }))
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(read_root))
        .route("/semantic-path", post(semantic_path))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn run(state: AppState, host: &str, port: u16) -> Result<(), Box<dyn Error>> {
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Semantic path API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::LookupEmbedder;
    use crate::index::IndexBackend;
    use crate::store::{ItemMetadata, VectorStore};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(store: VectorStore, embedder: LookupEmbedder) -> AppState {
        let service =
            PathService::with_backend(store, IndexBackend::Flat, None, Box::new(embedder)).unwrap();
        AppState {
            service: Arc::new(service),
            defaults: PathParams::default(),
        }
    }

    fn catalog() -> VectorStore {
        let rows = [
            ("c_1", "1", "Alpha", 0.0),
            ("c_2", "2", "Beta", 1.0),
            ("c_3", "3", "Gamma", 2.0),
        ];
        VectorStore::new(
            1,
            rows.iter().map(|r| r.0.to_string()).collect(),
            rows.iter().map(|r| vec![r.3]).collect(),
            rows.iter()
                .map(|r| ItemMetadata {
                    code: r.1.into(),
                    label: r.2.into(),
                    document: format!("{} \n {} \n About {}.", r.1, r.2, r.2),
                    ..ItemMetadata::default()
                })
                .collect(),
        )
        .unwrap()
    }

    async fn post_json(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/semantic-path")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_root() {
        let app = router(state(catalog(), LookupEmbedder::new(1)));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_semantic_path() {
        let embedder = LookupEmbedder::new(1).with("Gamma", vec![2.0]);
        let app = router(state(catalog(), embedder));

        let (status, body) = post_json(app, r#"{"start": "alpha", "end": "Gamma", "k": 2}"#).await;
        assert_eq!(status, StatusCode::OK);

        let response: PathResponse = serde_json::from_value(body).unwrap();
        let labels: Vec<&str> = response.path.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(response.path[0].step, 1);
        assert_eq!(response.path[2].code, "3");
        assert_eq!(response.path[2].description, "About Gamma.");
    }

    #[tokio::test]
    async fn test_invalid_parameter_is_bad_request() {
        let embedder = LookupEmbedder::new(1).with("Gamma", vec![2.0]);
        let app = router(state(catalog(), embedder));

        let (status, body) =
            post_json(app, r#"{"start": "Alpha", "end": "Gamma", "max_results": 0}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("max_steps"));
    }

    #[tokio::test]
    async fn test_negative_parameters_are_bad_request() {
        let embedder = LookupEmbedder::new(1).with("Gamma", vec![2.0]);
        let app = router(state(catalog(), embedder));

        let (status, body) =
            post_json(app.clone(), r#"{"start": "Alpha", "end": "Gamma", "k": -1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("`k`") && message.contains("-1"), "{message}");

        let (status, body) =
            post_json(app, r#"{"start": "Alpha", "end": "Gamma", "max_results": -3}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("max_steps"));
    }

    #[tokio::test]
    async fn test_malformed_body_gets_json_error() {
        let app = router(state(catalog(), LookupEmbedder::new(1)));
        let (status, body) =
            post_json(app, r#"{"start": "Alpha", "end": "Gamma", "k": "five"}"#).await;
        assert!(status.is_client_error());
        assert!(body["error"].is_string());
    }

    #[test]
    fn test_override_or() {
        assert_eq!(override_or("k", None, 5).unwrap(), 5);
        assert_eq!(override_or("k", Some(3), 5).unwrap(), 3);
        assert!(matches!(
            override_or("k", Some(0), 5),
            Err(PathError::InvalidParameter { name: "k", value: 0 })
        ));
    }

    #[tokio::test]
    async fn test_root_message() {
        let app = router(state(catalog(), LookupEmbedder::new(1)));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Welcome to the Semantic Path API.");
    }

    #[tokio::test]
    async fn test_empty_store_is_not_found() {
        let app = router(state(VectorStore::empty(1), LookupEmbedder::new(1)));
        let (status, _) = post_json(app, r#"{"start": "Alpha", "end": "Gamma"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
