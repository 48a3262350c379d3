use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::control::{ControlError, ControlPlane, Health};
use crate::shutdown::Shutdown;

#[derive(Debug, Default, Deserialize)]
struct FilterRequest {
    #[serde(default)]
    filter: String,
}

#[derive(Debug, Default, Deserialize)]
struct ModeRequest {
    #[serde(default)]
    mode: String,
}

#[derive(Debug, Default, Deserialize)]
struct PrintRequest {
    #[serde(default, rename = "imageUrl")]
    image_url: Option<String>,
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match self {
            ControlError::Locked => StatusCode::FORBIDDEN,
            ControlError::InvalidFilter | ControlError::InvalidMode | ControlError::MissingImageUrl => {
                StatusCode::BAD_REQUEST
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(plane: ControlPlane) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/set_filter", post(set_filter))
        .route("/set_mode", post(set_mode))
        .route("/print", post(print))
        .with_state(plane)
}

async fn health(State(plane): State<ControlPlane>) -> Json<Health> {
    Json(plane.health())
}

// A missing or unparsable body is treated as an empty request
async fn set_filter(
    State(plane): State<ControlPlane>,
    body: Option<Json<FilterRequest>>,
) -> Result<Json<serde_json::Value>, ControlError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let filter = plane.set_filter(&req.filter)?;
    Ok(Json(json!({ "success": true, "filter": filter.name() })))
}

async fn set_mode(
    State(plane): State<ControlPlane>,
    body: Option<Json<ModeRequest>>,
) -> Result<Json<serde_json::Value>, ControlError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let mode = plane.set_mode(&req.mode)?;
    Ok(Json(json!({ "success": true, "mode": mode.name() })))
}

async fn print(
    State(plane): State<ControlPlane>,
    body: Option<Json<PrintRequest>>,
) -> Result<Json<serde_json::Value>, ControlError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    plane.request_print(req.image_url.as_deref())?;
    Ok(Json(json!({ "success": true })))
}

/// Serves the control API until `shutdown` fires.
pub async fn serve(listener: TcpListener, plane: ControlPlane, shutdown: Shutdown) -> Result<()> {
    tracing::info!("Control API on http://{}", listener.local_addr()?);
    axum::serve(listener, router(plane))
        .with_graceful_shutdown(shutdown.wait())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {e}"))?;
    Ok(())
}
