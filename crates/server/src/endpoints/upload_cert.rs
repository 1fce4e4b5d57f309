//! # POST /uploadCert
//!
//! 署名用アイデンティティ（.p12 + パスフレーズ + .mobileprovision）のアップロード。
//!
//! ## 処理フロー
//! 1. 検証: ファイル2点の有無 → パスワード非空 → 各拡張子
//! 2. 保存: アップロードディレクトリに長期保存（プロセス終了まで削除しない）
//! 3. アイデンティティ・ストアを丸ごと置き換える
//!
//! 置き換え前の証明書ファイルは削除しない。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use resign_types::ApiResponse;
use tempfile::TempPath;

use super::form::{has_extension, next_field, open_multipart, read_bytes};
use crate::config::AppState;
use crate::error::ServiceError;
use crate::identity::SigningIdentity;

const MSG_MISSING_FILES: &str = "Missing p12 or mobileprovision";
const MSG_PASSWORD_REQUIRED: &str = "Password is required";
const MSG_INVALID_P12: &str = "Invalid .p12 file";
const MSG_INVALID_PROFILE: &str = "Invalid .mobileprovision file";
const MSG_UPLOADED: &str = "Certificates uploaded successfully";

/// アップロードされたファイルパート。
struct UploadedFile {
    file_name: String,
    bytes: Vec<u8>,
}

/// POST /uploadCert — 署名用アイデンティティを登録する。
pub async fn handle_upload_cert(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse>, ServiceError> {
    let mut multipart = open_multipart(multipart)?;

    let mut p12: Option<UploadedFile> = None;
    let mut profile: Option<UploadedFile> = None;
    let mut password: Option<String> = None;

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        match (name.as_str(), file_name) {
            ("p12", Some(file_name)) if p12.is_none() => {
                let bytes = read_bytes(field).await?;
                p12 = Some(UploadedFile { file_name, bytes });
            }
            ("mobileprovision", Some(file_name)) if profile.is_none() => {
                let bytes = read_bytes(field).await?;
                profile = Some(UploadedFile { file_name, bytes });
            }
            ("password", None) if password.is_none() => {
                let bytes = read_bytes(field).await?;
                password = Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            _ => {}
        }
    }

    // Step 1: 検証
    let (Some(p12), Some(profile)) = (p12, profile) else {
        return Err(ServiceError::BadRequest(MSG_MISSING_FILES.to_string()));
    };
    let password = password.unwrap_or_default();
    if password.is_empty() {
        return Err(ServiceError::BadRequest(MSG_PASSWORD_REQUIRED.to_string()));
    }
    if !has_extension(&p12.file_name, "p12") {
        return Err(ServiceError::BadRequest(MSG_INVALID_P12.to_string()));
    }
    if !has_extension(&profile.file_name, "mobileprovision") {
        return Err(ServiceError::BadRequest(MSG_INVALID_PROFILE.to_string()));
    }

    // Step 2: 保存（両方の書き込みが成功してから長期保存に切り替える）
    let p12_temp = write_upload(&state.upload_dir, "cert_", ".p12", &p12.bytes).await?;
    let profile_temp =
        write_upload(&state.upload_dir, "profile_", ".mobileprovision", &profile.bytes).await?;
    let key_bundle_path = keep(p12_temp)?;
    let provisioning_profile_path = keep(profile_temp)?;

    // Step 3: ストアを置き換える
    tracing::info!(
        key_bundle = %key_bundle_path.display(),
        provisioning_profile = %provisioning_profile_path.display(),
        "署名用アイデンティティを更新しました"
    );
    state
        .identities
        .set(SigningIdentity {
            key_bundle_path,
            passphrase: password,
            provisioning_profile_path,
        })
        .await;

    Ok(Json(ApiResponse::success(MSG_UPLOADED)))
}

/// アップロード内容を`dir`内の新規ファイルに書き込む。
async fn write_upload(
    dir: &Path,
    prefix: &str,
    suffix: &str,
    bytes: &[u8],
) -> Result<TempPath, ServiceError> {
    let path = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|e| ServiceError::Internal(format!("証明書ファイルの作成に失敗: {e}")))?
        .into_temp_path();
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ServiceError::Internal(format!("証明書ファイルの書き込みに失敗: {e}")))?;
    Ok(path)
}

/// 一時ファイルを削除対象から外し、プロセスの寿命まで残す。
fn keep(path: TempPath) -> Result<PathBuf, ServiceError> {
    path.keep()
        .map_err(|e| ServiceError::Internal(format!("証明書ファイルの保存に失敗: {e}")))
}
