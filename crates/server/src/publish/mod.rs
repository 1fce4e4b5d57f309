//! # 成果物の公開
//!
//! 署名済みIPAとインストールマニフェストをリモートのオブジェクトストアへ
//! アップロードし、デバイスから取得可能な公開URLを得るための抽象インターフェース。
//!
//! 現在の実装:
//! - `transfer` — `PUT {base_url}/{name}` でアップロードし、レスポンス本文をURLとする
//! - `s3` — S3互換ストレージへアップロードし、署名付きGET URLを返す（`vendor-aws`）

pub mod transfer;

#[cfg(feature = "vendor-aws")]
pub mod s3;

pub use transfer::TransferPublisher;

#[cfg(feature = "vendor-aws")]
pub use s3::S3Publisher;

use std::path::{Path, PathBuf};

use crate::error::ServiceError;

/// 公開するペイロード。
#[derive(Debug)]
pub enum Payload {
    /// ローカルファイル（署名済みIPA）
    File(PathBuf),
    /// メモリ上のバイト列（マニフェスト）
    Bytes(Vec<u8>),
}

/// ファイルペイロードを開き、サイズとともに返す。
/// 署名済みIPAはメモリに載せず、このハンドルからストリーミングで送信する。
pub(crate) async fn open_file(path: &Path) -> Result<(tokio::fs::File, u64), ServiceError> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        ServiceError::Internal(format!("{}のオープンに失敗: {e}", path.display()))
    })?;
    let len = file
        .metadata()
        .await
        .map_err(|e| ServiceError::Internal(format!("{}のメタデータ取得に失敗: {e}", path.display())))?
        .len();
    Ok((file, len))
}

/// 成果物をリモートへ公開するトレイト。
///
/// `remote_name`は呼び出し側が生成する一意な名前（拡張子付き）。
/// 1回の呼び出しにつき1回だけアップロードを試み、リトライはしない。
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// ペイロードをアップロードし、公開URLを返す。
    async fn publish(&self, payload: Payload, remote_name: &str) -> Result<String, ServiceError>;
}

/// 署名済みIPAのリモート名を生成する。
pub fn archive_remote_name() -> String {
    format!("signed_{}.ipa", uuid::Uuid::new_v4())
}

/// マニフェストのリモート名を生成する。
pub fn manifest_remote_name() -> String {
    format!("manifest_{}.plist", uuid::Uuid::new_v4())
}

/// リモート名の拡張子に対応するContent-Type。
pub(crate) fn content_type_for(remote_name: &str) -> &'static str {
    if remote_name.ends_with(".plist") {
        "application/x-plist"
    } else {
        "application/octet-stream"
    }
}
