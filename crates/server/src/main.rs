//! # ipa-resign サーバー
//!
//! アップロードされたIPAを保存済みの署名用アイデンティティで再署名し、
//! デバイスからOTAインストールできるリンクを発行するHTTPサーバー。
//!
//! ## 役割
//! - 署名用アイデンティティ（.p12 + パスフレーズ + .mobileprovision）の保持
//! - IPAのメタデータ抽出と検証
//! - 外部署名ツール（zsign）の呼び出し
//! - 署名済みIPAとマニフェストの公開
//!
//! ## API エンドポイント
//! - `POST /uploadCert` — 署名用アイデンティティのアップロード
//! - `POST /signIPA` — 再署名 + 公開 + `itms-services://` リンク発行
//! - `GET /health` — ヘルスチェック

mod config;
mod endpoints;
mod error;
mod identity;
mod inspector;
mod manifest;
mod publish;
mod signer;

use std::sync::Arc;

use config::{AppState, PublishBackend, ServiceConfig};
use identity::IdentityStore;
use publish::{Publisher, TransferPublisher};
use signer::ZsignSigner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // 環境変数の読み込み
    let config = ServiceConfig::from_env()?;

    std::fs::create_dir_all(&config.work_dir)?;
    std::fs::create_dir_all(&config.upload_dir)?;

    let signer = ZsignSigner::new(config.signer_bin.clone(), config.signer_timeout);
    tracing::info!(
        signer = %config.signer_bin.display(),
        timeout_secs = ?config.signer_timeout.map(|t| t.as_secs()),
        "署名ツールを設定"
    );

    let publisher = build_publisher(&config)?;

    let state = Arc::new(AppState {
        identities: Arc::new(IdentityStore::new()),
        signer: Box::new(signer),
        publisher,
        work_dir: config.work_dir.clone(),
        upload_dir: config.upload_dir.clone(),
        max_upload_bytes: config.max_upload_bytes,
    });

    let app = endpoints::router(state);

    let addr = config.listen_addr();
    tracing::info!("サーバーを {} で起動します", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// 設定に応じたパブリッシャを構築する。
fn build_publisher(config: &ServiceConfig) -> anyhow::Result<Box<dyn Publisher>> {
    match config.publish_backend {
        PublishBackend::Transfer => {
            let mut builder = reqwest::Client::builder();
            if let Some(timeout) = config.publish_timeout {
                builder = builder.timeout(timeout);
            }
            tracing::info!(
                base_url = %config.publish_base_url,
                timeout_secs = ?config.publish_timeout.map(|t| t.as_secs()),
                "transferエンドポイントへ公開します"
            );
            Ok(Box::new(TransferPublisher::new(
                builder.build()?,
                config.publish_base_url.clone(),
            )))
        }
        #[cfg(feature = "vendor-aws")]
        PublishBackend::S3 => {
            tracing::info!("S3互換ストレージへ公開します");
            Ok(Box::new(publish::S3Publisher::from_env()?))
        }
        #[cfg(not(feature = "vendor-aws"))]
        PublishBackend::S3 => Err(anyhow::anyhow!(
            "PUBLISH_BACKEND=s3 には vendor-aws フィーチャーが必要です"
        )),
    }
}
