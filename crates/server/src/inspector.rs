//! # アーカイブ・インスペクタ
//!
//! IPA（zipコンテナ）から`Payload/<Name>.app/Info.plist`を探し、
//! 表示名とバンドルIDを取り出す。
//!
//! アーカイブは変更しない。zipとして開けない・plistが壊れている等の場合は
//! エラーではなく「メタデータなし」（`None`）として扱い、判断は呼び出し側に委ねる。

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use zip::ZipArchive;

/// アプリバンドルを格納するトップレベルディレクトリ名
const PAYLOAD_DIR: &str = "Payload";

/// アプリバンドルディレクトリのサフィックス
const APP_BUNDLE_SUFFIX: &str = ".app";

/// アプリバンドル直下のメタデータファイル名
const INFO_PLIST: &str = "Info.plist";

/// Info.plistとして読み込む最大サイズ
const MAX_INFO_PLIST_BYTES: u64 = 1024 * 1024;

/// 表示名が取得できない場合のデフォルト値
pub const DEFAULT_APP_NAME: &str = "Unknown App";

/// バンドルIDが取得できない場合のデフォルト値
pub const DEFAULT_BUNDLE_ID: &str = "unknown.bundle";

/// IPAから抽出したアプリのメタデータ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMetadata {
    /// 表示名（CFBundleDisplayName → CFBundleName → デフォルト）
    pub display_name: String,
    /// バンドルID（CFBundleIdentifier → デフォルト）
    pub bundle_identifier: String,
}

/// IPAファイルを読み、アプリのメタデータを抽出する。
///
/// アプリバンドルまたは`Info.plist`が見つからない場合、
/// およびアーカイブ・plistのデコードに失敗した場合は`None`を返す。
pub fn inspect_archive(ipa_path: &Path) -> Option<AppMetadata> {
    let file = match File::open(ipa_path) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!(path = %ipa_path.display(), error = %e, "IPAを開けませんでした");
            return None;
        }
    };
    let mut archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(e) => {
            tracing::debug!(path = %ipa_path.display(), error = %e, "zipとして読み込めませんでした");
            return None;
        }
    };

    let bundle_dir = find_app_bundle(&archive)?;
    let info_path = format!("{bundle_dir}{INFO_PLIST}");
    let plist_bytes = read_bounded(&mut archive, &info_path)?;

    let plist = match plist::Value::from_reader(Cursor::new(plist_bytes)) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(entry = %info_path, error = %e, "Info.plistのデコードに失敗");
            return None;
        }
    };

    metadata_from_plist(&plist)
}

/// `Payload/<segment>.app/` を返す。ディレクトリエントリが無いzipにも対応するため、
/// 各エントリ名の先頭2セグメントから判定する。
/// 複数のバンドルがある場合は名前順で最初のものを使う。
fn find_app_bundle<R: Read + Seek>(archive: &ZipArchive<R>) -> Option<String> {
    archive.file_names().filter_map(app_bundle_prefix).min()
}

/// エントリを最大`MAX_INFO_PLIST_BYTES`まで読み込む。
/// 宣言サイズ・実サイズのどちらかが上限を超える場合は`None`。
fn read_bounded<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<Vec<u8>> {
    let entry = archive.by_name(name).ok()?;
    if entry.size() > MAX_INFO_PLIST_BYTES {
        tracing::debug!(entry = %name, size = entry.size(), "Info.plistが大きすぎます");
        return None;
    }

    let mut buf = Vec::new();
    entry
        .take(MAX_INFO_PLIST_BYTES + 1)
        .read_to_end(&mut buf)
        .ok()?;
    if buf.len() as u64 > MAX_INFO_PLIST_BYTES {
        tracing::debug!(entry = %name, "Info.plistが大きすぎます");
        return None;
    }
    Some(buf)
}

/// エントリ名が`Payload/<segment>.app/...`であればバンドルディレクトリのプレフィックスを返す。
fn app_bundle_prefix(entry_name: &str) -> Option<String> {
    let mut segments = entry_name.splitn(3, '/');
    let top = segments.next()?;
    let bundle = segments.next()?;
    // "Payload/Foo.app" のように末尾スラッシュが無いものはファイル扱い
    segments.next()?;

    if top != PAYLOAD_DIR || bundle.len() <= APP_BUNDLE_SUFFIX.len() {
        return None;
    }
    if !bundle.ends_with(APP_BUNDLE_SUFFIX) {
        return None;
    }
    Some(format!("{PAYLOAD_DIR}/{bundle}/"))
}

/// Info.plistの辞書から表示名とバンドルIDを取り出す。
///
/// キーが無い場合はデフォルト値を使う。空のCFBundleDisplayNameは
/// CFBundleNameへフォールバックするが、CFBundleName・CFBundleIdentifierが
/// 空文字列の場合はメタデータなし（`None`）とする。
fn metadata_from_plist(plist: &plist::Value) -> Option<AppMetadata> {
    let dict = plist.as_dictionary();
    let lookup = |key: &str| -> Option<String> {
        dict.and_then(|d| d.get(key))
            .and_then(plist::Value::as_string)
            .map(str::to_string)
    };

    let display_name = lookup("CFBundleDisplayName")
        .filter(|name| !name.is_empty())
        .or_else(|| lookup("CFBundleName"))
        .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
    let bundle_identifier =
        lookup("CFBundleIdentifier").unwrap_or_else(|| DEFAULT_BUNDLE_ID.to_string());

    if display_name.is_empty() || bundle_identifier.is_empty() {
        return None;
    }
    Some(AppMetadata {
        display_name,
        bundle_identifier,
    })
}
