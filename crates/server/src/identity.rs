//! # 署名用アイデンティティ・ストア
//!
//! 最後にアップロードされた署名用アイデンティティ（.p12、パスフレーズ、
//! プロビジョニングプロファイル）を1件だけ保持する。
//!
//! - 履歴・有効期限はない。新しいアップロードが常に前のものを置き換える。
//! - 置き換えは`Arc`単位で行うため、読み手が新旧のフィールドが混ざった値を
//!   観測することはない。
//! - 内容（証明書の有効性等）の検証は行わない。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

/// 署名用アイデンティティ。3フィールドは常に揃って存在する。
#[derive(Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    /// PKCS#12（.p12）ファイルのパス
    pub key_bundle_path: PathBuf,
    /// PKCS#12のパスフレーズ
    pub passphrase: String,
    /// プロビジョニングプロファイル（.mobileprovision）のパス
    pub provisioning_profile_path: PathBuf,
}

// パスフレーズをログに出さない
impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("key_bundle_path", &self.key_bundle_path)
            .field("passphrase", &"<redacted>")
            .field("provisioning_profile_path", &self.provisioning_profile_path)
            .finish()
    }
}

/// 単一スロットのアイデンティティ・ストア。
#[derive(Default)]
pub struct IdentityStore {
    current: RwLock<Option<Arc<SigningIdentity>>>,
}

impl IdentityStore {
    /// 空のストアを作成する。
    pub fn new() -> Self {
        Self::default()
    }

    /// 現在のアイデンティティを丸ごと置き換える。
    /// 置き換え前のアイデンティティが参照するファイルは削除しない。
    pub async fn set(&self, identity: SigningIdentity) {
        let identity = Arc::new(identity);
        let mut slot = self.current.write().await;
        *slot = Some(identity);
    }

    /// 現在のアイデンティティのスナップショットを取得する。
    pub async fn current(&self) -> Option<Arc<SigningIdentity>> {
        self.current.read().await.clone()
    }

    /// アイデンティティが設定済みかどうか。
    pub async fn is_set(&self) -> bool {
        self.current.read().await.is_some()
    }
}
