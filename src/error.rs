//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use std::path::PathBuf;
use thiserror::Error;

/// xlsxdocgenクレート全体で使用するエラー型
///
/// Excelの読み込み、テンプレートの選択・差し込み、文書の書き出しで発生する
/// すべてのエラーを統一的に扱います。
///
/// # エラーの種類
///
/// - `DataLoad`: Excelファイルが読めない、または不正な形式
/// - `TemplateNotFound`: レコードのセレクタ値に一致するテンプレートがない
/// - `UnboundPlaceholder`: テンプレート自体が壊れていて解析できない
/// - `Write`: 出力文書を書き込めない（名前の衝突を含む）
/// - `Record`: バッチ中断時に、行番号付きでレコード単位のエラーを包む
///
/// フィールド値の欠落はエラーではありません。既定のプレースホルダ文字列で
/// 補完されます。
#[derive(Error, Debug)]
pub enum XlsxToDocxError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// スプレッドシートの読み込みに失敗したエラー
    ///
    /// ファイルが存在しない、読めない、形式が壊れている、ヘッダー行がない、
    /// 指定したシートが存在しない場合に発生します。
    #[error("Failed to load data from '{}': {message}", path.display())]
    DataLoad {
        /// 読み込もうとしたファイル
        path: PathBuf,
        /// エラーの詳細
        message: String,
    },

    /// セレクタ値に一致するテンプレートがないエラー
    ///
    /// `key`には一致しなかった`フィールド=値`の組が入ります。
    #[error("No template matches row {row}: {key}")]
    TemplateNotFound {
        /// スプレッドシート上の行番号（1始まり）
        row: u32,
        /// 一致しなかったセレクタキー
        key: String,
    },

    /// テンプレートの形式が壊れていて解析できないエラー
    ///
    /// ZIPとして開けない、`word/document.xml`がない、XMLが不正、
    /// `{{`が閉じていない、プレースホルダ名が空、などの場合に発生します。
    #[error("Corrupt template '{}': {message}", template.display())]
    UnboundPlaceholder {
        /// 問題のテンプレートファイル
        template: PathBuf,
        /// エラーの詳細
        message: String,
    },

    /// 出力文書を書き込めないエラー
    #[error("Failed to write '{}': {source}", path.display())]
    Write {
        /// 書き込み先のパス
        path: PathBuf,
        /// 原因となったI/Oエラー
        #[source]
        source: std::io::Error,
    },

    /// レコード単位のエラー（`RecordErrorPolicy::Abort`で返される）
    #[error("Row {row}: {source}")]
    Record {
        /// スプレッドシート上の行番号（1始まり）
        row: u32,
        /// 元のエラー
        #[source]
        source: Box<XlsxToDocxError>,
    },

    /// 設定の検証に失敗したエラー
    ///
    /// `GeneratorBuilder::build()`時に設定を検証し、無効な設定が検出された
    /// 場合に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// ZIPアーカイブの読み書きエラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// 設定ファイル（JSON）の解析エラー
    #[error("Config file error: {0}")]
    Json(#[from] serde_json::Error),

    /// セキュリティ制限に違反したエラー
    ///
    /// 入力ファイルサイズ超過、ZIP bomb、パストラバーサルなどで発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl XlsxToDocxError {
    /// calamineのエラーを`DataLoad`に変換する
    pub(crate) fn data_load(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        XlsxToDocxError::DataLoad {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// テンプレート破損エラーを生成する
    pub(crate) fn corrupt(template: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        XlsxToDocxError::UnboundPlaceholder {
            template: template.into(),
            message: message.into(),
        }
    }

    /// レコード単位で回復可能なエラーかどうか
    ///
    /// `true`のエラーはそのレコードの処理だけを中断し、
    /// `RecordErrorPolicy::Skip`ではバッチが続行されます。
    /// `Zip`は文書の組み立て（ZIPへの書き込み）に失敗した場合です。
    /// それ以外のエラーは実行全体を止めます。
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            XlsxToDocxError::TemplateNotFound { .. }
                | XlsxToDocxError::UnboundPlaceholder { .. }
                | XlsxToDocxError::Write { .. }
                | XlsxToDocxError::Zip(_)
        )
    }
}

impl From<zip::result::ZipError> for XlsxToDocxError {
    fn from(err: zip::result::ZipError) -> Self {
        XlsxToDocxError::Zip(err.to_string())
    }
}
