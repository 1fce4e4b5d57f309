//! # サーバーエラー型
//!
//! 全エンドポイントで共通のエラー型。
//! どの失敗もJSON（`{"status": "error", "message": ...}`）で返却する。

use axum::http::StatusCode;
use axum::Json;
use resign_types::ApiResponse;

/// 内部エラー時にクライアントへ返す固定メッセージ
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// サーバーエラー型。
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// 不正なリクエスト（フィールド欠落、拡張子不一致、メタデータ抽出失敗）
    #[error("{0}")]
    BadRequest(String),
    /// 前提条件未達（署名用証明書が未アップロード）
    #[error("{0}")]
    PreconditionFailed(String),
    /// 外部署名ツールの失敗。診断テキストをそのまま保持する
    #[error("zsign error: {0}")]
    Signing(String),
    /// 成果物の公開に失敗
    #[error("{0}")]
    Publish(String),
    /// 内部エラー（I/O失敗、シリアライズ失敗、タスク異常終了）
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl ServiceError {
    /// エラーに対応するHTTPステータス。
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ServiceError::Signing(_) | ServiceError::Publish(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// クライアントに返すメッセージ。内部エラーの詳細はログにのみ残す。
    pub fn client_message(&self) -> String {
        match self {
            ServiceError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl axum::response::IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        if let ServiceError::Internal(detail) = &self {
            tracing::error!(error = %detail, "内部エラーが発生しました");
        }
        let status = self.status_code();
        (status, Json(ApiResponse::error(self.client_message()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::PreconditionFailed("x".into()).status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            ServiceError::Signing("bad key".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::Publish("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    /// 署名失敗のメッセージにツールの診断テキストが含まれることを確認
    #[test]
    fn test_signing_message_keeps_diagnostic() {
        let err = ServiceError::Signing("bad key\n".into());
        assert_eq!(err.client_message(), "zsign error: bad key\n");
    }

    /// 内部エラーの詳細がレスポンスに漏れないことを確認
    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let response =
            ServiceError::Internal("/tmp/input_x.ipa: permission denied".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ApiResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, ApiResponse::error(INTERNAL_ERROR_MESSAGE));
    }
}
