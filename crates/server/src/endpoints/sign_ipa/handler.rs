//! /signIPA ハンドラ実装

use std::path::Path;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use resign_types::ApiResponse;
use tempfile::TempPath;

use crate::config::AppState;
use crate::endpoints::form::{has_extension, next_field, open_multipart, stream_to_temp};
use crate::error::ServiceError;
use crate::inspector::{inspect_archive, AppMetadata};
use crate::manifest::{build_manifest, install_link};
use crate::publish::{archive_remote_name, manifest_remote_name, Payload};

pub(super) const MSG_NO_IPA: &str = "No IPA file provided";
pub(super) const MSG_NO_CERTS: &str = "Certificates not uploaded";
pub(super) const MSG_INVALID_IPA: &str = "Invalid .ipa file";
pub(super) const MSG_NO_APP_INFO: &str = "Could not extract app info";
pub(super) const MSG_ARCHIVE_UPLOAD_FAILED: &str = "Failed to upload signed IPA";
pub(super) const MSG_MANIFEST_UPLOAD_FAILED: &str = "Failed to upload manifest";

/// `file`パートの受信結果。
enum ArchiveUpload {
    /// `.ipa`として一時ファイルに保存済み
    Saved(TempPath),
    /// 拡張子が不正なため保存していない
    WrongExtension,
}

/// POST /signIPA エンドポイントハンドラ。
pub async fn handle_sign_ipa(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse>, ServiceError> {
    let mut multipart = open_multipart(multipart)?;

    // Step 1: 入力検証
    let upload = receive_archive(&mut multipart, &state.work_dir)
        .await?
        .ok_or_else(|| ServiceError::BadRequest(MSG_NO_IPA.to_string()))?;
    if !state.identities.is_set().await {
        return Err(ServiceError::PreconditionFailed(MSG_NO_CERTS.to_string()));
    }
    let input = match upload {
        ArchiveUpload::Saved(path) => path,
        ArchiveUpload::WrongExtension => {
            return Err(ServiceError::BadRequest(MSG_INVALID_IPA.to_string()));
        }
    };

    // Step 2: メタデータ抽出
    let metadata = extract_metadata(&input)
        .await?
        .ok_or_else(|| ServiceError::BadRequest(MSG_NO_APP_INFO.to_string()))?;
    tracing::info!(
        app_name = %metadata.display_name,
        bundle_id = %metadata.bundle_identifier,
        "IPAのメタデータを抽出しました"
    );

    // Step 3: 署名（アイデンティティはここで1回だけ取得する）
    let output = tempfile::Builder::new()
        .prefix("signed_")
        .suffix(".ipa")
        .tempfile_in(&state.work_dir)
        .map_err(|e| ServiceError::Internal(format!("出力用一時ファイルの作成に失敗: {e}")))?
        .into_temp_path();
    {
        let identity = state
            .identities
            .current()
            .await
            .ok_or_else(|| ServiceError::PreconditionFailed(MSG_NO_CERTS.to_string()))?;
        state.signer.sign(&identity, &input, &output).await?;
    }

    // Step 4: 署名済みIPAの公開
    let archive_url = state
        .publisher
        .publish(Payload::File(output.to_path_buf()), &archive_remote_name())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "署名済みIPAの公開に失敗");
            ServiceError::Publish(MSG_ARCHIVE_UPLOAD_FAILED.to_string())
        })?;

    // Step 5: マニフェストの生成と公開
    let manifest = build_manifest(
        &metadata.display_name,
        &metadata.bundle_identifier,
        &archive_url,
    )?;
    let manifest_url = state
        .publisher
        .publish(Payload::Bytes(manifest), &manifest_remote_name())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "マニフェストの公開に失敗");
            ServiceError::Publish(MSG_MANIFEST_UPLOAD_FAILED.to_string())
        })?;

    // Step 6: インストールリンク
    let itms_url = install_link(&manifest_url);
    drop(input);
    drop(output);

    Ok(Json(
        ApiResponse::success(format!(
            "IPA signed: {} ({})",
            metadata.display_name, metadata.bundle_identifier
        ))
        .with_itms_url(itms_url),
    ))
}

/// multipartから最初の`file`ファイルパートを受け取る。
/// 拡張子が`.ipa`の場合のみ一時ファイルに保存する。
async fn receive_archive(
    multipart: &mut Multipart,
    work_dir: &Path,
) -> Result<Option<ArchiveUpload>, ServiceError> {
    let mut upload = None;

    while let Some(field) = next_field(multipart).await? {
        if upload.is_some() || field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        upload = Some(if has_extension(&file_name, "ipa") {
            ArchiveUpload::Saved(stream_to_temp(field, work_dir, "input_", ".ipa").await?)
        } else {
            ArchiveUpload::WrongExtension
        });
    }

    Ok(upload)
}

/// ブロッキングなzip読み取りを専用スレッドで実行する。
async fn extract_metadata(input: &Path) -> Result<Option<AppMetadata>, ServiceError> {
    let path = input.to_path_buf();
    tokio::task::spawn_blocking(move || inspect_archive(&path))
        .await
        .map_err(|e| ServiceError::Internal(format!("メタデータ抽出タスクが異常終了: {e}")))
}
