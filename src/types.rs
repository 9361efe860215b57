//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// セルの値を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    String(String),

    /// 論理値
    Bool(bool),

    /// 日付・日時
    DateTime(NaiveDateTime),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 空セル
    Empty,
}

impl FieldValue {
    /// 値が欠落しているかどうかを判定
    ///
    /// 空セルと空文字列は欠落として扱います。
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// スプレッドシートの1行分のデータ
///
/// 列名から値への順序付きマッピングです。列順はヘッダー行の順序を保ちます。
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    row: u32,
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    /// 新しいレコードを生成
    ///
    /// `row`はスプレッドシート上の行番号（1始まり）です。
    pub fn new(row: u32, fields: Vec<(String, FieldValue)>) -> Self {
        Self { row, fields }
    }

    /// スプレッドシート上の行番号（1始まり）
    pub fn row(&self) -> u32 {
        self.row
    }

    /// 列名と値を列順に返す
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// 列名で値を取得
    ///
    /// 完全一致を優先し、見つからない場合は列名の空白を`_`に置き換えた名前で
    /// 照合します（`first name`列は`first_name`でも参照できます）。
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(col, _)| col == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(col, _)| col.contains(' ') && col.replace(' ', "_") == name)
            })
            .map(|(_, value)| value)
    }

    /// 値が存在する（欠落していない）フィールドを取得
    pub fn get_present(&self, name: &str) -> Option<&FieldValue> {
        self.get(name).filter(|value| !value.is_missing())
    }

    /// 列数
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 列がひとつもないかどうか
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// 差し込み済みの文書
///
/// 書き出されるまでの間だけメモリ上に保持されます。
#[derive(Debug, Clone)]
pub struct BindingResult {
    /// 使用したテンプレート
    pub(crate) template: PathBuf,
    /// `.docx`のバイト列
    pub(crate) bytes: Vec<u8>,
    /// 既定値で補完したプレースホルダ名（出現順、重複なし）
    pub(crate) missing: Vec<String>,
}

impl BindingResult {
    /// 使用したテンプレートのパス
    pub fn template(&self) -> &Path {
        &self.template
    }

    /// 文書のバイト列
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 既定値で補完したプレースホルダ名
    pub fn missing(&self) -> &[String] {
        &self.missing
    }
}
