//! # 外部署名ツール呼び出し
//!
//! IPAの再署名を外部コマンドに委譲するための抽象インターフェース。
//!
//! 現在の実装:
//! - `zsign` — zsign互換CLIをサブプロセスとして起動する

pub mod zsign;

pub use zsign::ZsignSigner;

use std::path::Path;

use crate::error::ServiceError;
use crate::identity::SigningIdentity;

/// IPAを再署名するトレイト。
///
/// 成功時は`output`に署名済みIPAが書き込まれている。
/// 失敗は`ServiceError::Signing`（ツールの診断テキストをそのまま保持）で返す。
/// リトライは行わない。
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    async fn sign(
        &self,
        identity: &SigningIdentity,
        input: &Path,
        output: &Path,
    ) -> Result<(), ServiceError>;
}
