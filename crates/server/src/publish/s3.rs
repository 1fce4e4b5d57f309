//! # S3互換ストレージ パブリッシャ
//!
//! AWS S3, MinIO, Cloudflare R2 等のS3互換APIにオブジェクトをアップロードし、
//! デバイスが取得できる署名付きGET URLを公開URLとして返す。
//! ファイルペイロードはマルチパートアップロードでストリーミング送信する。

use super::{content_type_for, open_file, Payload, Publisher};
use crate::error::ServiceError;

/// 署名付きURLの有効期限の上限（秒）。S3の仕様上7日まで。
pub const MAX_URL_EXPIRY_SECS: u32 = 604_800;

/// S3互換ストレージによるパブリッシャ。
pub struct S3Publisher {
    /// アップロード用バケット
    bucket_internal: s3::Bucket,
    /// 署名付きURL生成用バケット。
    /// 内部ホスト名と外部ホスト名が異なる場合に使用。
    /// Noneの場合はbucket_internalを使用する。
    bucket_public: Option<s3::Bucket>,
    /// 署名付きURLの有効期限（秒）
    url_expiry_secs: u32,
}

impl S3Publisher {
    /// S3互換バケットからパブリッシャを構築する。
    pub fn new(
        bucket_internal: s3::Bucket,
        bucket_public: Option<s3::Bucket>,
        url_expiry_secs: u32,
    ) -> Self {
        Self {
            bucket_internal,
            bucket_public,
            url_expiry_secs: url_expiry_secs.min(MAX_URL_EXPIRY_SECS),
        }
    }

    /// エンドポイントと認証情報からS3互換バケットを初期化する。
    fn init_bucket(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket_name: &str,
    ) -> anyhow::Result<s3::Bucket> {
        let region = s3::Region::Custom {
            region: detect_region(endpoint),
            endpoint: endpoint.to_string(),
        };

        let credentials = s3::creds::Credentials::new(
            Some(access_key),
            Some(secret_key),
            None,
            None,
            None,
        )?;

        let bucket = s3::Bucket::new(bucket_name, region, credentials)?.with_path_style();

        Ok(*bucket)
    }

    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = std::env::var("S3_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:9000".to_string());
        let access_key =
            std::env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let secret_key =
            std::env::var("S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let bucket_name =
            std::env::var("S3_BUCKET").unwrap_or_else(|_| "signed-ipa".to_string());
        let url_expiry_secs = match std::env::var("S3_URL_EXPIRY_SECS") {
            Ok(value) => value
                .parse::<u32>()
                .map_err(|e| anyhow::anyhow!("S3_URL_EXPIRY_SECSが不正です ({value}): {e}"))?,
            Err(_) => MAX_URL_EXPIRY_SECS,
        };

        let bucket_internal =
            Self::init_bucket(&endpoint, &access_key, &secret_key, &bucket_name)?;

        let bucket_public = std::env::var("S3_PUBLIC_ENDPOINT")
            .ok()
            .map(|public_ep| {
                tracing::info!(
                    s3_public_endpoint = %public_ep,
                    "公開URL用S3エンドポイントを設定"
                );
                Self::init_bucket(&public_ep, &access_key, &secret_key, &bucket_name)
            })
            .transpose()?;

        Ok(Self::new(bucket_internal, bucket_public, url_expiry_secs))
    }
}

/// AWS S3エンドポイント（s3.REGION.amazonaws.com）からリージョンを検出する。
/// `S3_REGION`が設定されていればそれを優先し、非AWSエンドポイントではus-east-1を使う。
fn detect_region(endpoint: &str) -> String {
    if let Ok(region) = std::env::var("S3_REGION") {
        return region;
    }
    endpoint
        .find("s3.")
        .and_then(|start| {
            let rest = &endpoint[start + 3..];
            rest.find(".amazonaws.com").map(|end| rest[..end].to_string())
        })
        .filter(|region| !region.is_empty())
        .unwrap_or_else(|| "us-east-1".to_string())
}

#[async_trait::async_trait]
impl Publisher for S3Publisher {
    async fn publish(&self, payload: Payload, remote_name: &str) -> Result<String, ServiceError> {
        let content_type = content_type_for(remote_name);
        let status = match payload {
            Payload::File(path) => {
                let (mut file, _) = open_file(&path).await?;
                self.bucket_internal
                    .put_object_stream_with_content_type(&mut file, remote_name, content_type)
                    .await
                    .map_err(|e| {
                        ServiceError::Publish(format!("S3アップロード失敗 ({remote_name}): {e}"))
                    })?
                    .status_code()
            }
            Payload::Bytes(bytes) => self
                .bucket_internal
                .put_object_with_content_type(remote_name, &bytes, content_type)
                .await
                .map_err(|e| {
                    ServiceError::Publish(format!("S3アップロード失敗 ({remote_name}): {e}"))
                })?
                .status_code(),
        };

        if !(200..300).contains(&status) {
            return Err(ServiceError::Publish(format!(
                "S3がエラーを返しました: HTTP {status} ({remote_name})"
            )));
        }

        let public_bucket = self.bucket_public.as_ref().unwrap_or(&self.bucket_internal);
        let url = public_bucket
            .presign_get(remote_name, self.url_expiry_secs, None)
            .await
            .map_err(|e| ServiceError::Publish(format!("署名付きダウンロードURL生成失敗: {e}")))?;

        if url.trim().is_empty() {
            return Err(ServiceError::Publish(format!(
                "署名付きダウンロードURLが空です ({remote_name})"
            )));
        }

        tracing::info!(remote_name, "S3に成果物を公開しました");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_region_from_aws_endpoint() {
        // S3_REGIONが設定されている環境ではスキップ
        if std::env::var("S3_REGION").is_ok() {
            return;
        }
        assert_eq!(
            detect_region("https://s3.ap-northeast-1.amazonaws.com"),
            "ap-northeast-1"
        );
        assert_eq!(detect_region("http://localhost:9000"), "us-east-1");
    }

    /// 署名付きURLがオブジェクトキーを含み、有効期限が上限に丸められることを確認
    #[tokio::test]
    async fn test_presigned_url_for_object() {
        let bucket =
            S3Publisher::init_bucket("http://localhost:9000", "minioadmin", "minioadmin", "signed-ipa")
                .unwrap();
        let publisher = S3Publisher::new(bucket, None, u32::MAX);
        assert_eq!(publisher.url_expiry_secs, MAX_URL_EXPIRY_SECS);

        let url = publisher
            .bucket_internal
            .presign_get("manifest_1.plist", publisher.url_expiry_secs, None)
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost:9000/"));
        assert!(url.contains("manifest_1.plist"));
        assert!(url.contains("X-Amz-Signature="));
    }

    /// 受信したオブジェクト（キー, 内容）
    type Received = std::sync::Arc<std::sync::Mutex<Vec<(String, Vec<u8>)>>>;

    /// パススタイルの`PUT /{bucket}/{key}`を受け付けるモックS3を起動する。
    async fn start_mock_s3(status: u16) -> (u16, Received) {
        use axum::extract::{Path, State};
        use axum::http::StatusCode;

        let received: Received = Default::default();
        let app = axum::Router::new()
            .route(
                "/{bucket}/{*key}",
                axum::routing::put(
                    move |State(received): State<Received>,
                          Path((_bucket, key)): Path<(String, String)>,
                          bytes: axum::body::Bytes| async move {
                        received.lock().unwrap().push((key, bytes.to_vec()));
                        (
                            StatusCode::from_u16(status).unwrap(),
                            [("ETag", "\"d41d8cd98f00b204e9800998ecf8427e\"")],
                            "",
                        )
                    },
                ),
            )
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        (port, received)
    }

    fn local_bucket(port: u16) -> s3::Bucket {
        S3Publisher::init_bucket(
            &format!("http://127.0.0.1:{port}"),
            "minioadmin",
            "minioadmin",
            "signed-ipa",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_bytes_returns_presigned_url() {
        let (port, received) = start_mock_s3(200).await;
        let publisher = S3Publisher::new(local_bucket(port), None, 3600);

        let url = publisher
            .publish(Payload::Bytes(b"<plist/>".to_vec()), "manifest_1.plist")
            .await
            .unwrap();
        assert!(
            url.starts_with(&format!("http://127.0.0.1:{port}/signed-ipa/manifest_1.plist")),
            "{url}"
        );
        assert!(url.contains("X-Amz-Signature="));

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "manifest_1.plist");
        assert_eq!(received[0].1, b"<plist/>");
    }

    /// ファイルはアップロード用エンドポイントへ送り、URLは公開用エンドポイントで署名することを確認
    #[tokio::test]
    async fn test_publish_file_signs_with_public_endpoint() {
        let (port, received) = start_mock_s3(200).await;
        let public = S3Publisher::init_bucket(
            "https://cdn.files.test",
            "minioadmin",
            "minioadmin",
            "signed-ipa",
        )
        .unwrap();
        let publisher = S3Publisher::new(local_bucket(port), Some(public), 3600);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signed.ipa");
        std::fs::write(&path, b"signed-ipa").unwrap();

        let url = publisher
            .publish(Payload::File(path), "signed_1.ipa")
            .await
            .unwrap();
        assert!(
            url.starts_with("https://cdn.files.test/signed-ipa/signed_1.ipa"),
            "{url}"
        );

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "signed_1.ipa");
        assert_eq!(received[0].1, b"signed-ipa");
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        let (port, _) = start_mock_s3(503).await;
        let publisher = S3Publisher::new(local_bucket(port), None, 3600);

        let err = publisher
            .publish(Payload::Bytes(vec![1, 2, 3]), "manifest_1.plist")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Publish(_)));
    }
}
