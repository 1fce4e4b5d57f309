//! # ローカル transfer エンドポイント
//!
//! 開発環境用。transfer.sh互換の最小実装。
//!
//! - `PUT /{name}` — ボディを`STUB_DIR/{name}`に保存し、公開URLをプレーンテキストで返す
//! - `GET /{name}` — 保存済みファイルを返す
//!
//! 環境変数:
//! - `STUB_ADDR` — 待ち受けアドレス（デフォルト: 0.0.0.0:8090）
//! - `STUB_DIR` — 保存先ディレクトリ（デフォルト: ./transfer-data）
//! - `STUB_PUBLIC_URL` — 返却URLのベース（デフォルト: http://localhost:8090）

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// スタブサーバーの共有状態。
struct StubState {
    /// 保存先ディレクトリ
    dir: PathBuf,
    /// 返却URLのベース（末尾スラッシュなし）
    public_url: String,
}

/// ファイル名として受け付けるか。ディレクトリ外への書き込みを防ぐ。
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}

async fn handle_put(
    State(state): State<Arc<StubState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    if !is_valid_name(&name) {
        return (StatusCode::BAD_REQUEST, "invalid name\n".to_string());
    }
    if let Err(e) = tokio::fs::write(state.dir.join(&name), &body).await {
        tracing::error!(name = %name, error = %e, "保存に失敗");
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("{e}\n"));
    }
    tracing::info!(name = %name, size = body.len(), "ファイルを保存しました");
    (StatusCode::OK, format!("{}/{name}\n", state.public_url))
}

async fn handle_get(
    State(state): State<Arc<StubState>>,
    Path(name): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    if !is_valid_name(&name) {
        return Err(StatusCode::BAD_REQUEST);
    }
    tokio::fs::read(state.dir.join(&name))
        .await
        .map_err(|_| StatusCode::NOT_FOUND)
}

fn router(state: Arc<StubState>) -> axum::Router {
    axum::Router::new()
        .route("/{name}", axum::routing::put(handle_put).get(handle_get))
        .layer(axum::extract::DefaultBodyLimit::disable())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let addr = std::env::var("STUB_ADDR").unwrap_or_else(|_| "0.0.0.0:8090".to_string());
    let dir = PathBuf::from(
        std::env::var("STUB_DIR").unwrap_or_else(|_| "./transfer-data".to_string()),
    );
    let public_url = std::env::var("STUB_PUBLIC_URL")
        .unwrap_or_else(|_| "http://localhost:8090".to_string())
        .trim_end_matches('/')
        .to_string();

    tokio::fs::create_dir_all(&dir).await?;
    tracing::info!(dir = %dir.display(), public_url = %public_url, "保存先を設定");

    let app = router(Arc::new(StubState { dir, public_url }));

    tracing::info!("transferスタブを {} で起動します", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
