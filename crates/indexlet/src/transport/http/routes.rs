//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{BridgeError, ErrorKind};
use crate::service::{IndexService, ServiceStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadIndexRequest {
    pub project_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolOccurrencesRequest {
    pub file_path: String,
    /// Raw JSON so the bridge's own validation sees non-integer input.
    pub line_number: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct OccurrencesRequest {
    pub usr: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub pattern: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// Bridge error as an HTTP response: uniform
/// `{"error": {"kind": ..., "message": ...}}` envelope.
struct ApiError(BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::InputValidation | ErrorKind::RemoteValidation => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorKind::Spawn => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Connection | ErrorKind::Decode | ErrorKind::RemoteService => {
                StatusCode::BAD_GATEWAY
            }
        };

        let body = Json(json!({
            "error": {
                "kind": self.0.kind(),
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

fn result_envelope(result: serde_json::Value) -> Json<serde_json::Value> {
    Json(json!({ "result": result }))
}

async fn health_check(State(service): State<Arc<IndexService>>) -> Json<ServiceStatus> {
    Json(service.status().await)
}

async fn shutdown(State(service): State<Arc<IndexService>>) -> impl IntoResponse {
    tracing::info!("Shutdown requested via HTTP");
    service.trigger_shutdown();
    (StatusCode::OK, Json(json!({ "status": "shutting_down" })))
}

async fn load_index(
    State(service): State<Arc<IndexService>>,
    Json(request): Json<LoadIndexRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let available = service.load_index(&request.project_name).await?;
    Ok(result_envelope(json!(available)))
}

async fn symbol_occurrences(
    State(service): State<Arc<IndexService>>,
    Json(request): Json<SymbolOccurrencesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = service
        .symbol_occurrences(&request.file_path, &request.line_number)
        .await?;
    Ok(result_envelope(result))
}

async fn occurrences(
    State(service): State<Arc<IndexService>>,
    Json(request): Json<OccurrencesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = service
        .get_occurrences(&request.usr, &request.roles)
        .await?;
    Ok(result_envelope(result))
}

async fn search(
    State(service): State<Arc<IndexService>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = service
        .search_pattern(&request.pattern, request.options.as_deref())
        .await?;
    Ok(result_envelope(result))
}

pub fn routes(service: Arc<IndexService>) -> Router {
    Router::new()
        .route("/health-check", get(health_check))
        .route("/shutdown", post(shutdown))
        .route("/index/load", post(load_index))
        .route("/index/symbol-occurrences", post(symbol_occurrences))
        .route("/index/occurrences", post(occurrences))
        .route("/index/search", post(search))
        .with_state(service)
}
