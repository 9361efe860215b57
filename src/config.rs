//! Config File Module
//!
//! JSON設定ファイルの読み書きを行うモジュール。
//! 読み込んだ設定は`GeneratorBuilder`に変換して検証します。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::api::{DateFormat, NameCollision, RecordErrorPolicy, SheetSelector};
use crate::builder::GeneratorBuilder;
use crate::error::XlsxToDocxError;
use crate::selector::{SelectorRule, TemplateMap};

/// 設定ファイルの内容
///
/// `on_name_collision`には既定値がなく、必ず明示する必要があります。
///
/// ```json
/// {
///   "excel_path": "data.xlsx",
///   "template_map": {
///     "rules": [{ "field": "category", "routes": { "A": "tplA.docx" } }]
///   },
///   "output_dir": "out",
///   "missing_placeholder": "N/A",
///   "on_name_collision": "overwrite",
///   "file_name": "{name}"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// 入力スプレッドシート
    pub excel_path: PathBuf,

    /// 読み込むシート（インデックスまたは名前、省略時は先頭）
    #[serde(default)]
    pub sheet: Option<SheetSelector>,

    /// テンプレート対応表
    pub template_map: TemplateMap,

    /// 出力ディレクトリ
    pub output_dir: PathBuf,

    /// 値のないフィールドに差し込む文字列
    #[serde(default)]
    pub missing_placeholder: String,

    /// 値のないフィールドのプレースホルダを残すか
    #[serde(default)]
    pub keep_missing: bool,

    /// 名前衝突時の動作（必須）
    pub on_name_collision: NameCollision,

    /// ファイル名パターン（省略時は`record_<行番号>`）
    #[serde(default)]
    pub file_name: Option<String>,

    /// サブフォルダ名パターン
    #[serde(default)]
    pub folder: Option<String>,

    /// レコード単位のエラーの扱い
    #[serde(default)]
    pub on_record_error: RecordErrorPolicy,

    /// 日付の書式（strftime形式、省略時はISO 8601）
    #[serde(default)]
    pub date_format: Option<String>,
}

impl Config {
    /// 設定ファイルを読み込む
    ///
    /// 相対パス（入力ファイル、テンプレート、出力ディレクトリ）は
    /// 設定ファイルのあるディレクトリからの相対として解決します。
    ///
    /// # 戻り値
    ///
    /// * `Ok(Config)` - 読み込みに成功した場合
    /// * `Err(XlsxToDocxError::Io)` - ファイルを読めない場合
    /// * `Err(XlsxToDocxError::Json)` - JSONが不正、または必須項目がない場合
    pub fn load(path: impl AsRef<Path>) -> Result<Self, XlsxToDocxError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&text)?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.resolve_relative(base);
        }
        debug!(config = %path.display(), "config loaded");
        Ok(config)
    }

    /// 設定ファイルを書き出す
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), XlsxToDocxError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n")?;
        Ok(())
    }

    /// 設定ファイルの雛形
    pub fn example() -> Self {
        Self {
            excel_path: PathBuf::from("data.xlsx"),
            sheet: None,
            template_map: TemplateMap::new().with_rule(
                SelectorRule::new("category")
                    .route("A", "templates/tplA.docx")
                    .route("B", "templates/tplB.docx"),
            ),
            output_dir: PathBuf::from("out"),
            missing_placeholder: "N/A".to_string(),
            keep_missing: false,
            on_name_collision: NameCollision::Rename,
            file_name: Some("{name}_{category}".to_string()),
            folder: None,
            on_record_error: RecordErrorPolicy::Skip,
            date_format: None,
        }
    }

    /// 相対パスを`base`からの相対として解決する
    fn resolve_relative(&mut self, base: &Path) {
        if self.excel_path.is_relative() {
            self.excel_path = base.join(&self.excel_path);
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
        self.template_map.resolve_relative(base);
    }

    /// `GeneratorBuilder`に変換する
    ///
    /// 設定値の検証は`GeneratorBuilder::build()`で行われます。
    pub fn into_builder(self) -> GeneratorBuilder {
        let mut builder = GeneratorBuilder::new()
            .with_excel_path(self.excel_path)
            .with_sheet(self.sheet.unwrap_or_default())
            .with_template_map(self.template_map)
            .with_output_dir(self.output_dir)
            .with_missing_placeholder(self.missing_placeholder)
            .keep_missing(self.keep_missing)
            .with_name_collision(self.on_name_collision)
            .with_record_error_policy(self.on_record_error);

        if let Some(file_name) = self.file_name {
            builder = builder.with_file_name(file_name);
        }
        if let Some(folder) = self.folder {
            builder = builder.with_folder(folder);
        }
        if let Some(format) = self.date_format {
            builder = builder.with_date_format(DateFormat::Custom(format));
        }
        builder
    }
}
