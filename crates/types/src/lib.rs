//! # ipa-resign 共有型定義
//!
//! HTTP APIのレスポンスボディと、OTAインストール用マニフェストの
//! データ構造をRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - APIレスポンス: JSON（`status` と `message` を必ず含む単一オブジェクト）
//! - インストールマニフェスト: Property List（キー名はデバイス側インストーラの規約どおり）

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// API レスポンス
// ---------------------------------------------------------------------------

/// 成功レスポンスの`status`値
pub const STATUS_SUCCESS: &str = "success";

/// エラーレスポンスの`status`値
pub const STATUS_ERROR: &str = "error";

/// `/uploadCert`・`/signIPA`およびエラー時に返却するJSONボディ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// "success" または "error"
    pub status: String,
    /// 人間向けメッセージ
    pub message: String,
    /// OTAインストールリンク（署名成功時のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itms_url: Option<String>,
}

impl ApiResponse {
    /// 成功レスポンスを構築する。
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: message.into(),
            itms_url: None,
        }
    }

    /// エラーレスポンスを構築する。
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: message.into(),
            itms_url: None,
        }
    }

    /// インストールリンクを付与する。
    pub fn with_itms_url(mut self, itms_url: impl Into<String>) -> Self {
        self.itms_url = Some(itms_url.into());
        self
    }
}

/// `GET /health` のレスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 常に "ok"
    pub status: String,
}

// ---------------------------------------------------------------------------
// OTA インストールマニフェスト
// ---------------------------------------------------------------------------

/// アセット種別: 署名済みアーカイブ
pub const ASSET_KIND_SOFTWARE_PACKAGE: &str = "software-package";

/// メタデータ種別: アプリケーション
pub const METADATA_KIND_SOFTWARE: &str = "software";

/// `bundle-version`に書き込む固定値。実際のバージョンは抽出しない。
pub const MANIFEST_BUNDLE_VERSION: &str = "1.0";

/// `itms-services://` が参照するインストールマニフェスト。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallManifest {
    /// インストール対象（常に1件）
    pub items: Vec<ManifestItem>,
}

/// マニフェストの1アイテム。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    /// ダウンロード対象のアセット一覧
    pub assets: Vec<ManifestAsset>,
    /// アプリのメタデータ
    pub metadata: ManifestMetadata,
}

/// マニフェストのアセット。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAsset {
    /// アセット種別（"software-package"）
    pub kind: String,
    /// 公開済みアーカイブのURL
    pub url: String,
}

/// マニフェストのメタデータ。キー名はハイフン区切り。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(rename = "bundle-identifier")]
    pub bundle_identifier: String,
    #[serde(rename = "bundle-version")]
    pub bundle_version: String,
    /// 種別（"software"）
    pub kind: String,
    /// ホーム画面に表示されるアプリ名
    pub title: String,
}

impl InstallManifest {
    /// 公開済みアーカイブ1件を参照するマニフェストを構築する。
    pub fn for_archive(app_name: &str, bundle_id: &str, archive_url: &str) -> Self {
        Self {
            items: vec![ManifestItem {
                assets: vec![ManifestAsset {
                    kind: ASSET_KIND_SOFTWARE_PACKAGE.to_string(),
                    url: archive_url.to_string(),
                }],
                metadata: ManifestMetadata {
                    bundle_identifier: bundle_id.to_string(),
                    bundle_version: MANIFEST_BUNDLE_VERSION.to_string(),
                    kind: METADATA_KIND_SOFTWARE.to_string(),
                    title: app_name.to_string(),
                },
            }],
        }
    }
}
