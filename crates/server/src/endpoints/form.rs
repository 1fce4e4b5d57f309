//! multipart/form-data の読み取りヘルパー。
//!
//! 抽出・読み取りの失敗はすべて`ServiceError::BadRequest`に変換し、
//! axum既定のプレーンテキストではなくJSONで返せるようにする。

use std::path::Path;

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::Multipart;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::error::ServiceError;

/// Multipart抽出結果をServiceErrorに変換する。
pub fn open_multipart(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Multipart, ServiceError> {
    multipart.map_err(|e| ServiceError::BadRequest(format!("Invalid multipart request: {e}")))
}

/// 次のフィールドを取得する。
pub async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, ServiceError> {
    multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Invalid multipart body: {e}")))
}

/// フィールドの内容をすべてメモリに読み込む。
pub async fn read_bytes(field: Field<'_>) -> Result<Vec<u8>, ServiceError> {
    field
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|e| ServiceError::BadRequest(format!("Invalid multipart body: {e}")))
}

/// フィールドの内容を`dir`内の一時ファイルへ書き出す。
/// 返却される`TempPath`はdrop時にファイルを削除する。
pub async fn stream_to_temp(
    mut field: Field<'_>,
    dir: &Path,
    prefix: &str,
    suffix: &str,
) -> Result<TempPath, ServiceError> {
    let temp = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|e| ServiceError::Internal(format!("一時ファイルの作成に失敗: {e}")))?;
    let handle = temp
        .as_file()
        .try_clone()
        .map_err(|e| ServiceError::Internal(format!("一時ファイルの複製に失敗: {e}")))?;
    let path = temp.into_temp_path();

    let mut out = tokio::fs::File::from_std(handle);
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        out.write_all(&chunk)
            .await
            .map_err(|e| ServiceError::Internal(format!("一時ファイルへの書き込みに失敗: {e}")))?;
    }
    out.flush()
        .await
        .map_err(|e| ServiceError::Internal(format!("一時ファイルへの書き込みに失敗: {e}")))?;

    Ok(path)
}

/// ファイル名の拡張子（最後の`.`以降、大文字小文字を区別しない）が一致するか。
pub fn has_extension(file_name: &str, expected: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.eq_ignore_ascii_case(expected),
        None => false,
    }
}
