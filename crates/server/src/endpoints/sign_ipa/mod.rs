//! # POST /signIPA
//!
//! IPAを保存済みアイデンティティで再署名し、OTAインストールリンクを返す。
//!
//! ## 処理フロー
//! 1. 入力検証: `file`パートの有無 → アイデンティティ登録済み（412）→ `.ipa`拡張子
//! 2. メタデータ抽出: `Payload/<Name>.app/Info.plist`から表示名・バンドルID
//! 3. 署名: アイデンティティを1回だけ取得し、外部ツールで署名
//! 4. 署名済みIPAの公開
//! 5. マニフェストの生成と公開
//! 6. `itms-services://` リンクの組み立て
//!
//! 入力・出力の一時ファイルはどの段階で終了しても1回だけ削除される。

mod handler;


pub use handler::handle_sign_ipa;
