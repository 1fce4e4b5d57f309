//! # サーバー設定・共有状態
//!
//! 環境変数からの設定読み込みとサーバーの共有状態の定義。

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::identity::IdentityStore;
use crate::publish::Publisher;
use crate::signer::Signer;

/// リクエストボディの上限のデフォルト値（2GB）
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

/// 公開バックエンドの種類。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishBackend {
    /// transfer.sh互換のPUTエンドポイント
    Transfer,
    /// S3互換ストレージ
    S3,
}

impl FromStr for PublishBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transfer" => Ok(PublishBackend::Transfer),
            "s3" => Ok(PublishBackend::S3),
            other => Err(anyhow::anyhow!(
                "不明なPUBLISH_BACKENDです: {other}（transfer または s3）"
            )),
        }
    }
}

/// 起動時に環境変数から読み込む設定。
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// 待ち受けアドレス（BIND_ADDR）
    pub bind_addr: IpAddr,
    /// 待ち受けポート（PORT）
    pub port: u16,
    /// 署名ツールの実行ファイル（SIGNER_BIN）
    pub signer_bin: PathBuf,
    /// 署名ツールのタイムアウト（SIGNER_TIMEOUT_SECS、未設定なら無制限）
    pub signer_timeout: Option<Duration>,
    /// 公開バックエンド（PUBLISH_BACKEND）
    pub publish_backend: PublishBackend,
    /// transfer.sh互換エンドポイントのベースURL（PUBLISH_BASE_URL）
    pub publish_base_url: String,
    /// アップロードのタイムアウト（PUBLISH_TIMEOUT_SECS、未設定なら無制限）
    pub publish_timeout: Option<Duration>,
    /// リクエスト単位の一時ファイルを置くディレクトリ（WORK_DIR）
    pub work_dir: PathBuf,
    /// 証明書ファイルを保存するディレクトリ（UPLOAD_DIR）
    pub upload_dir: PathBuf,
    /// リクエストボディの上限（MAX_UPLOAD_BYTES）
    pub max_upload_bytes: usize,
}

impl ServiceConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から構築する。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let temp_dir = std::env::temp_dir();

        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or(&lookup, "PORT", 8080)?,
            signer_bin: lookup("SIGNER_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("zsign")),
            signer_timeout: parse_secs(&lookup, "SIGNER_TIMEOUT_SECS")?,
            publish_backend: parse_or(&lookup, "PUBLISH_BACKEND", PublishBackend::Transfer)?,
            publish_base_url: lookup("PUBLISH_BASE_URL")
                .unwrap_or_else(|| "https://transfer.sh".to_string()),
            publish_timeout: parse_secs(&lookup, "PUBLISH_TIMEOUT_SECS")?,
            work_dir: lookup("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| temp_dir.clone()),
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(temp_dir),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    /// 待ち受けソケットアドレス。
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key}が不正です ({value}): {e}")),
        None => Ok(default),
    }
}

/// 秒数の環境変数を読む。未設定・0の場合は無制限（None）。
fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> anyhow::Result<Option<Duration>> {
    let secs: u64 = parse_or(lookup, key, 0)?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

/// サーバーの共有状態。
pub struct AppState {
    /// 現在の署名用アイデンティティ
    pub identities: Arc<IdentityStore>,
    /// 外部署名ツール（トレイトで抽象化）
    pub signer: Box<dyn Signer>,
    /// 成果物の公開先（トレイトで抽象化）
    pub publisher: Box<dyn Publisher>,
    /// リクエスト単位の一時ファイルを置くディレクトリ
    pub work_dir: PathBuf,
    /// 証明書ファイルを保存するディレクトリ
    pub upload_dir: PathBuf,
    /// リクエストボディの上限（バイト）
    pub max_upload_bytes: usize,
}
