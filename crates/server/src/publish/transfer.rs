//! # transfer.sh 互換パブリッシャ
//!
//! `PUT {base_url}/{remote_name}` でペイロードを送信し、
//! プレーンテキストのレスポンス本文（前後の空白を除去）を公開URLとして扱う。
//! ファイルペイロードはディスクからストリーミングで送信する。

use tokio_util::io::ReaderStream;

use super::{content_type_for, open_file, Payload, Publisher};
use crate::error::ServiceError;

/// transfer.sh互換エンドポイントへのパブリッシャ。
pub struct TransferPublisher {
    /// HTTPクライアント（タイムアウトはクライアント側で設定）
    http_client: reqwest::Client,
    /// アップロード先のベースURL（例: "https://transfer.sh"）
    base_url: String,
}

impl TransferPublisher {
    /// 新しいTransferPublisherを作成する。
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl Publisher for TransferPublisher {
    async fn publish(&self, payload: Payload, remote_name: &str) -> Result<String, ServiceError> {
        let url = format!("{}/{remote_name}", self.base_url);

        let (body, content_length) = match payload {
            Payload::File(path) => {
                let (file, len) = open_file(&path).await?;
                (reqwest::Body::wrap_stream(ReaderStream::new(file)), len)
            }
            Payload::Bytes(bytes) => {
                let len = bytes.len() as u64;
                (reqwest::Body::from(bytes), len)
            }
        };

        let response = self
            .http_client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type_for(remote_name))
            .header(reqwest::header::CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await
            .map_err(|e| ServiceError::Publish(format!("HTTP送信失敗 ({url}): {e}")))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| ServiceError::Publish(format!("レスポンス読み取り失敗 ({url}): {e}")))?;

        if !status.is_success() {
            return Err(ServiceError::Publish(format!(
                "アップロード先がエラーを返しました: HTTP {} - {}",
                status,
                response_body.trim()
            )));
        }

        let public_url = response_body.trim();
        if public_url.is_empty() {
            return Err(ServiceError::Publish(format!("空のレスポンス ({url})")));
        }

        tracing::info!(remote_name, public_url, "成果物を公開しました");
        Ok(public_url.to_string())
    }
}
