//! # zsign サブプロセス署名
//!
//! `<tool> -k <p12> -p <password> -m <mobileprovision> -o <output> <input>`
//! を起動し、終了コード0のみを成功とみなす。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::Signer;
use crate::error::ServiceError;
use crate::identity::SigningIdentity;

/// zsign互換CLIによる署名実装。
pub struct ZsignSigner {
    /// 実行ファイル（PATH上の名前または絶対パス）
    program: PathBuf,
    /// サブプロセスのタイムアウト。Noneの場合は完了まで待つ
    timeout: Option<Duration>,
}

impl ZsignSigner {
    /// 新しいZsignSignerを作成する。
    ///
    /// # 引数
    /// - `program`: 署名ツールの実行ファイル（例: "zsign"）
    /// - `timeout`: サブプロセスの待ち時間上限（Noneで無制限）
    pub fn new(program: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, identity: &SigningIdentity, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-k")
            .arg(&identity.key_bundle_path)
            .arg("-p")
            .arg(&identity.passphrase)
            .arg("-m")
            .arg(&identity.provisioning_profile_path)
            .arg("-o")
            .arg(output)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // タイムアウト時にFutureがdropされたら子プロセスも終了させる
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait::async_trait]
impl Signer for ZsignSigner {
    async fn sign(
        &self,
        identity: &SigningIdentity,
        input: &Path,
        output: &Path,
    ) -> Result<(), ServiceError> {
        let mut cmd = self.command(identity, input, output);
        let child_output = cmd.output();

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child_output).await.map_err(|_| {
                ServiceError::Signing(format!("signing tool timed out after {}s", limit.as_secs()))
            })?,
            None => child_output.await,
        };

        let result = result.map_err(|e| {
            ServiceError::Signing(format!(
                "failed to start {}: {e}",
                self.program.display()
            ))
        })?;

        if result.status.success() {
            tracing::debug!(input = %input.display(), output = %output.display(), "署名ツールが正常終了");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr).into_owned();
        let diagnostic = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&result.stdout).into_owned()
        } else {
            stderr
        };
        tracing::warn!(
            status = %result.status,
            diagnostic = %diagnostic.trim(),
            "署名ツールが異常終了"
        );
        Err(ServiceError::Signing(diagnostic))
    }
}
