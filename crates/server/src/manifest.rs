//! # インストールマニフェスト生成
//!
//! `itms-services://` から参照されるマニフェストを
//! バイナリ形式のProperty Listとして生成する。副作用なし。

use resign_types::InstallManifest;

use crate::error::ServiceError;

/// 公開済みアーカイブを参照するマニフェストをバイナリplistで生成する。
pub fn build_manifest(
    app_name: &str,
    bundle_id: &str,
    archive_url: &str,
) -> Result<Vec<u8>, ServiceError> {
    let manifest = InstallManifest::for_archive(app_name, bundle_id, archive_url);

    let mut buf = Vec::new();
    plist::to_writer_binary(&mut buf, &manifest)
        .map_err(|e| ServiceError::Internal(format!("マニフェストのシリアライズに失敗: {e}")))?;
    Ok(buf)
}

/// マニフェストURLからOTAインストールリンクを組み立てる。URLは再エンコードしない。
pub fn install_link(manifest_url: &str) -> String {
    format!("itms-services://?action=download-manifest&url={manifest_url}")
}
