//! # サーバーエンドポイント
//!
//! - `POST /uploadCert` — 署名用アイデンティティのアップロード
//! - `POST /signIPA` — IPAの再署名と公開
//! - `GET /health` — ヘルスチェック

pub mod form;
pub mod health;
pub mod sign_ipa;
pub mod upload_cert;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use health::handle_health;
pub use sign_ipa::handle_sign_ipa;
pub use upload_cert::handle_upload_cert;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::response::IntoResponse;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppState;
use crate::error::ServiceError;

/// ルーターを構築する。
pub fn router(state: Arc<AppState>) -> axum::Router {
    let body_limit = state.max_upload_bytes;

    axum::Router::new()
        .route("/uploadCert", axum::routing::post(handle_upload_cert))
        .route("/signIPA", axum::routing::post(handle_sign_ipa))
        .route("/health", axum::routing::get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// ハンドラ内のpanicを汎用の500レスポンスに変換する。
fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    ServiceError::Internal(format!("ハンドラがpanicしました: {detail}")).into_response()
}
