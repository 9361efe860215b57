//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

use serde::{Deserialize, Serialize};

/// シート選択方式
///
/// データを読み込むシートを指定します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum SheetSelector {
    /// インデックス指定（0始まり）
    ///
    /// 例: `SheetSelector::Index(0)` は最初のシートを選択（デフォルト）
    Index(usize),

    /// シート名指定
    ///
    /// 例: `SheetSelector::Name("Sheet1".to_string())`
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

/// 日付の出力形式
///
/// Excelの日付セルを差し込む際の文字列形式を指定します。
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DateFormat {
    /// ISO 8601形式（YYYY-MM-DD、時刻がある場合は YYYY-MM-DD HH:MM:SS）
    ///
    /// 例: `2025-11-20`
    Iso8601,

    /// カスタム形式（chrono互換フォーマット文字列）
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxdocgen::{DateFormat, GeneratorBuilder};
    ///
    /// let builder = GeneratorBuilder::new()
    ///     .with_date_format(DateFormat::Custom("%Y年%m月%d日".to_string()));
    /// ```
    Custom(String),
}

/// 出力ファイル名が衝突した場合の方針
///
/// 設定ファイルでは明示的な指定が必須です（暗黙の既定値はありません）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum NameCollision {
    /// 既存ファイルを上書きする
    ///
    /// 同じ入力で2回実行すると、バイト単位で同一の文書が得られます。
    Overwrite,

    /// 既存ファイルがあれば`Write`エラーにする
    Fail,

    /// `_1`, `_2`, ... の接尾辞を付けて空いている名前を探す
    Rename,
}

/// プレースホルダに対応するフィールドがない場合の方針
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MissingFieldPolicy {
    /// 既定の文字列（例: `"N/A"`や空文字列）で置き換える
    Substitute(String),

    /// プレースホルダの記述をそのまま残す（目視確認用）
    Keep,
}

impl Default for MissingFieldPolicy {
    fn default() -> Self {
        MissingFieldPolicy::Substitute(String::new())
    }
}

/// レコード単位のエラーが起きた場合のバッチ方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum RecordErrorPolicy {
    /// エラーを記録して次のレコードへ進む（デフォルト）
    ///
    /// すべての失敗は`RunSummary::failures`に集められます。
    #[default]
    Skip,

    /// 最初のエラーでバッチ全体を中断する
    Abort,
}
