//! # GET /health

use axum::Json;
use resign_types::HealthResponse;

/// GET /health — 常に `{"status": "ok"}` を返す。
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
