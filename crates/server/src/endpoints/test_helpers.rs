//! # エンドポイントテスト用共通ヘルパー
//!
//! 署名ツール・パブリッシャのフェイク、multipartボディの構築、
//! モックtransferサーバーをupload_cert, sign_ipaのテストで共有する。

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use resign_types::ApiResponse;
use tower::ServiceExt;

use crate::config::AppState;
use crate::error::ServiceError;
use crate::identity::{IdentityStore, SigningIdentity};
use crate::publish::{Payload, Publisher};
use crate::signer::Signer;

/// 公開済み成果物の記録（リモート名, 内容）
pub type Published = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

// ---------------------------------------------------------------------------
// フェイク署名ツール
// ---------------------------------------------------------------------------

/// テスト用の署名ツール。外部コマンドは起動しない。
#[derive(Clone)]
pub struct FakeSigner {
    /// Someの場合はそのstderrで失敗する
    failure: Option<String>,
    /// trueの場合は呼び出し時にpanicする
    panics: bool,
    /// 呼び出し回数
    pub calls: Arc<AtomicUsize>,
    /// 呼び出し時のパスフレーズ
    pub passphrases: Arc<Mutex<Vec<String>>>,
}

impl FakeSigner {
    /// 入力の先頭に"signed:"を付けて出力するフェイク。
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            panics: false,
            calls: Arc::new(AtomicUsize::new(0)),
            passphrases: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 指定したstderrで非ゼロ終了するフェイク。出力ファイルも書きかけで残す。
    pub fn failing(stderr: &str) -> Self {
        Self {
            failure: Some(stderr.to_string()),
            ..Self::succeeding()
        }
    }

    /// 呼び出し時にpanicするフェイク。
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::succeeding()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Signer for FakeSigner {
    async fn sign(
        &self,
        identity: &SigningIdentity,
        input: &Path,
        output: &Path,
    ) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.passphrases
            .lock()
            .unwrap()
            .push(identity.passphrase.clone());

        if self.panics {
            panic!("fake signer panicked");
        }
        if let Some(stderr) = &self.failure {
            std::fs::write(output, b"partial").unwrap();
            return Err(ServiceError::Signing(stderr.clone()));
        }

        let mut signed = b"signed:".to_vec();
        signed.extend(std::fs::read(input).unwrap());
        std::fs::write(output, signed).unwrap();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// フェイクパブリッシャ
// ---------------------------------------------------------------------------

/// テスト用のパブリッシャ。`https://files.test/<remote_name>`を返す。
#[derive(Clone)]
pub struct FakePublisher {
    /// このサフィックスのリモート名で失敗する
    fail_suffix: Option<&'static str>,
    /// 公開された成果物
    pub published: Published,
}

impl FakePublisher {
    pub fn succeeding() -> Self {
        Self {
            fail_suffix: None,
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `suffix`で終わるリモート名の公開だけ失敗させる。
    pub fn failing_on(suffix: &'static str) -> Self {
        Self {
            fail_suffix: Some(suffix),
            ..Self::succeeding()
        }
    }
}

#[async_trait::async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, payload: Payload, remote_name: &str) -> Result<String, ServiceError> {
        if let Some(suffix) = self.fail_suffix {
            if remote_name.ends_with(suffix) {
                return Err(ServiceError::Publish("upstream unavailable".to_string()));
            }
        }
        let bytes = match payload {
            Payload::File(path) => tokio::fs::read(&path).await.unwrap(),
            Payload::Bytes(bytes) => bytes,
        };
        self.published
            .lock()
            .unwrap()
            .push((remote_name.to_string(), bytes));
        Ok(format!("https://files.test/{remote_name}"))
    }
}

// ---------------------------------------------------------------------------
// テスト用サーバー状態
// ---------------------------------------------------------------------------

/// テスト用の共有状態と、その一時ディレクトリ。
pub struct TestHarness {
    pub state: Arc<AppState>,
    /// リクエスト単位の一時ファイル置き場
    pub work_dir: tempfile::TempDir,
    /// 証明書ファイル置き場
    pub upload_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn new(signer: FakeSigner, publisher: FakePublisher) -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let upload_dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState {
            identities: Arc::new(IdentityStore::new()),
            signer: Box::new(signer),
            publisher: Box::new(publisher),
            work_dir: work_dir.path().to_path_buf(),
            upload_dir: upload_dir.path().to_path_buf(),
            max_upload_bytes: 16 * 1024 * 1024,
        });
        Self {
            state,
            work_dir,
            upload_dir,
        }
    }

    pub fn router(&self) -> axum::Router {
        crate::endpoints::router(self.state.clone())
    }

    /// アップロード済み状態をシミュレートする。
    pub async fn with_identity(self) -> Self {
        self.state
            .identities
            .set(SigningIdentity {
                key_bundle_path: self.upload_dir.path().join("cert_test.p12"),
                passphrase: "hunter2".to_string(),
                provisioning_profile_path: self
                    .upload_dir
                    .path()
                    .join("profile_test.mobileprovision"),
            })
            .await;
        self
    }
}

// ---------------------------------------------------------------------------
// HTTP ヘルパー
// ---------------------------------------------------------------------------

/// multipart/form-dataのボディを組み立てる。
pub struct MultipartBody {
    boundary: String,
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----resign-test-boundary-7MA4YWxkTrZu0gW".to_string(),
            buf: Vec::new(),
        }
    }

    pub fn file(mut self, name: &str, file_name: &str, content: &[u8]) -> Self {
        self.buf.extend(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary
            )
            .into_bytes(),
        );
        self.buf.extend_from_slice(content);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .into_bytes(),
        );
        self
    }

    /// 終端boundaryを付けずに送る（転送途中で切れたボディ）。
    pub fn into_truncated_request(self, uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.buf))
            .unwrap()
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.buf
            .extend(format!("--{}--\r\n", self.boundary).into_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.buf))
            .unwrap()
    }
}

/// ルーターにリクエストを1件送る。
pub async fn send(router: &axum::Router, request: Request<Body>) -> axum::response::Response {
    router.clone().oneshot(request).await.unwrap()
}

/// レスポンスボディをApiResponseとして読む。
pub async fn read_json(response: axum::response::Response) -> ApiResponse {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// ディレクトリ内のエントリ数。
pub fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

// ---------------------------------------------------------------------------
// モックtransferサーバー
// ---------------------------------------------------------------------------

/// `PUT /{name}` を受け付け、固定のステータスと本文を返すモックサーバーを起動する。
pub async fn start_mock_transfer(status: u16, body: &'static str) -> (u16, Published) {
    use axum::extract::{Path as UrlPath, State};
    use axum::http::StatusCode;

    let received: Published = Arc::new(Mutex::new(Vec::new()));
    let app = axum::Router::new()
        .route(
            "/{name}",
            axum::routing::put(
                move |State(received): State<Published>,
                      UrlPath(name): UrlPath<String>,
                      bytes: axum::body::Bytes| async move {
                    received.lock().unwrap().push((name, bytes.to_vec()));
                    (StatusCode::from_u16(status).unwrap(), body)
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
