//! Builder Module
//!
//! Fluent Builder APIを提供し、`Generator`インスタンスを段階的に構築する。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::api::{DateFormat, MissingFieldPolicy, NameCollision, RecordErrorPolicy, SheetSelector};
use crate::binder::FieldBinder;
use crate::error::XlsxToDocxError;
use crate::formatter::{validate_date_format, ValueFormatter};
use crate::output::{DocumentEmitter, NamePattern, NamingRule};
use crate::parser::RecordLoader;
use crate::selector::{TemplateMap, TemplateSelector, TemplateStore};
use crate::types::Record;

/// 進捗ログを出力する間隔（レコード数）
const PROGRESS_INTERVAL: usize = 10;

/// 生成処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct GenerationConfig {
    /// 入力スプレッドシート
    pub excel_path: Option<PathBuf>,

    /// 読み込むシート
    pub sheet: SheetSelector,

    /// テンプレート対応表
    pub template_map: TemplateMap,

    /// 出力ディレクトリ
    pub output_dir: Option<PathBuf>,

    /// 値のないフィールドに差し込む文字列
    pub missing_placeholder: String,

    /// 値のないフィールドのプレースホルダを残すか
    pub keep_missing: bool,

    /// 名前衝突時の動作
    pub name_collision: NameCollision,

    /// ファイル名パターン
    pub file_name: String,

    /// サブフォルダ名パターン
    pub folder: Option<String>,

    /// レコード単位のエラーの扱い
    pub record_error_policy: RecordErrorPolicy,

    /// 日付形式
    pub date_format: DateFormat,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            excel_path: None,
            sheet: SheetSelector::default(),
            template_map: TemplateMap::default(),
            output_dir: None,
            missing_placeholder: String::new(),
            keep_missing: false,
            name_collision: NameCollision::Fail,
            file_name: String::new(),
            folder: None,
            record_error_policy: RecordErrorPolicy::Skip,
            date_format: DateFormat::Iso8601,
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Generator`インスタンスを段階的に構築するためのビルダーです。
/// 入力ファイル・テンプレート対応表・出力ディレクトリは必須で、
/// それ以外はデフォルト値をオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxdocgen::{GeneratorBuilder, NameCollision, SelectorRule, TemplateMap};
///
/// # fn main() -> Result<(), xlsxdocgen::XlsxToDocxError> {
/// let map = TemplateMap::new().with_rule(
///     SelectorRule::new("category")
///         .route("A", "templates/tplA.docx")
///         .route("B", "templates/tplB.docx"),
/// );
///
/// let generator = GeneratorBuilder::new()
///     .with_excel_path("data.xlsx")
///     .with_template_map(map)
///     .with_output_dir("out")
///     .with_missing_placeholder("N/A")
///     .with_name_collision(NameCollision::Overwrite)
///     .with_file_name("{name}_{category}")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct GeneratorBuilder {
    /// 内部設定（構築中）
    config: GenerationConfig,
}

impl GeneratorBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - シート: 先頭のシート
    /// - 欠落フィールド: 空文字列で補完
    /// - 名前衝突: `NameCollision::Fail`
    /// - ファイル名: `record_<行番号>`
    /// - レコードのエラー: `RecordErrorPolicy::Skip`
    /// - 日付形式: ISO 8601 (YYYY-MM-DD)
    pub fn new() -> Self {
        Self {
            config: GenerationConfig::default(),
        }
    }

    /// 入力スプレッドシートを指定する（必須）
    pub fn with_excel_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.excel_path = Some(path.into());
        self
    }

    /// 読み込むシートを指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxdocgen::{GeneratorBuilder, SheetSelector};
    ///
    /// let builder = GeneratorBuilder::new()
    ///     .with_sheet(SheetSelector::Name("名簿".to_string()));
    /// ```
    pub fn with_sheet(mut self, sheet: SheetSelector) -> Self {
        self.config.sheet = sheet;
        self
    }

    /// テンプレート対応表を指定する（必須）
    pub fn with_template_map(mut self, map: TemplateMap) -> Self {
        self.config.template_map = map;
        self
    }

    /// 出力ディレクトリを指定する（必須、存在しなければ作成）
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    /// 値のないフィールドに差し込む文字列を指定する
    pub fn with_missing_placeholder(mut self, text: impl Into<String>) -> Self {
        self.config.missing_placeholder = text.into();
        self
    }

    /// 値のないフィールドのプレースホルダを残すかを指定する
    ///
    /// `true`の場合、`{{ name }}`がそのまま出力に残り、後から手作業で確認できます。
    /// `with_missing_placeholder`の指定より優先されます。
    pub fn keep_missing(mut self, keep: bool) -> Self {
        self.config.keep_missing = keep;
        self
    }

    /// 出力ファイル名が既存のファイルと衝突した場合の動作を指定する
    pub fn with_name_collision(mut self, policy: NameCollision) -> Self {
        self.config.name_collision = policy;
        self
    }

    /// ファイル名パターンを指定する
    ///
    /// `{列名}`はレコードの値に置き換えられます。拡張子`.docx`は自動で付きます。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxdocgen::GeneratorBuilder;
    ///
    /// let builder = GeneratorBuilder::new()
    ///     .with_file_name("{name}_{category}");
    /// ```
    pub fn with_file_name(mut self, pattern: impl Into<String>) -> Self {
        self.config.file_name = pattern.into();
        self
    }

    /// レコードごとのサブフォルダ名パターンを指定する
    pub fn with_folder(mut self, pattern: impl Into<String>) -> Self {
        self.config.folder = Some(pattern.into());
        self
    }

    /// レコード単位のエラー（テンプレート不一致、書き込み失敗など）の扱いを指定する
    pub fn with_record_error_policy(mut self, policy: RecordErrorPolicy) -> Self {
        self.config.record_error_policy = policy;
        self
    }

    /// 日付の出力形式を指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxdocgen::{GeneratorBuilder, DateFormat};
    ///
    /// let builder = GeneratorBuilder::new()
    ///     .with_date_format(DateFormat::Custom("%Y年%m月%d日".to_string()));
    /// ```
    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.config.date_format = format;
        self
    }

    /// 設定を検証し、`Generator`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `XlsxToDocxError::Config(String)`: 設定の検証に失敗した場合
    ///   * 入力ファイルまたは出力ディレクトリが指定されていない
    ///   * テンプレート対応表に規則もフォールバックもない
    ///   * セレクタ規則の列名が空
    ///   * ファイル名・フォルダ名のパターンが不正
    ///   * カスタム日付形式が不正な書式文字列
    pub fn build(self) -> Result<Generator, XlsxToDocxError> {
        let config = self.config;

        // 1. 必須項目の検証
        let excel_path = config
            .excel_path
            .clone()
            .ok_or_else(|| XlsxToDocxError::Config("Excel file path is not set".to_string()))?;
        let output_dir = config
            .output_dir
            .clone()
            .ok_or_else(|| XlsxToDocxError::Config("Output directory is not set".to_string()))?;

        // 2. テンプレート対応表の検証
        if config.template_map.is_empty() {
            return Err(XlsxToDocxError::Config(
                "Template map has no routes and no fallback template".to_string(),
            ));
        }
        if let Some(rule) = config
            .template_map
            .rules
            .iter()
            .find(|rule| rule.field.trim().is_empty())
        {
            return Err(XlsxToDocxError::Config(format!(
                "Selector rule has an empty field name (routes: {})",
                rule.routes.len()
            )));
        }

        // 3. 命名パターンの検証
        let file_name = NamePattern::parse(&config.file_name)?;
        let folder = config
            .folder
            .as_deref()
            .map(NamePattern::parse)
            .transpose()?;

        // 4. カスタム日付形式の検証
        if let DateFormat::Custom(ref format_str) = config.date_format {
            validate_date_format(format_str)?;
        }

        let missing_policy = if config.keep_missing {
            MissingFieldPolicy::Keep
        } else {
            MissingFieldPolicy::Substitute(config.missing_placeholder.clone())
        };

        Ok(Generator {
            excel_path,
            output_dir,
            missing_policy,
            naming: NamingRule::new(file_name, folder),
            formatter: ValueFormatter::new(config.date_format.clone()),
            config,
        })
    }
}

/// 1件のレコードの失敗
#[derive(Debug)]
pub struct RecordFailure {
    /// スプレッドシート上の行番号（1始まり）
    pub row: u32,
    /// 発生したエラー
    pub error: XlsxToDocxError,
}

/// 実行結果のまとめ
#[derive(Debug, Default)]
pub struct RunSummary {
    /// 書き出した文書のパス（行順）
    ///
    /// `NameCollision::Overwrite`で同名になった行は同じパスが複数回現れます。
    pub generated: Vec<PathBuf>,
    /// 同じ実行内で後の行に上書きされた文書の行番号
    pub overwritten_rows: Vec<u32>,
    /// スキップしたレコード（行順）
    pub failures: Vec<RecordFailure>,
    /// 所要時間
    pub elapsed: Duration,
}

impl RunSummary {
    /// 処理したレコード数
    pub fn total(&self) -> usize {
        self.generated.len() + self.failures.len()
    }

    /// すべてのレコードが成功したかどうか
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 文書生成のファサード
///
/// Loader → (レコードごとに) Selector → Binder → Emitter のパイプラインを実行します。
/// テンプレートは実行開始時に1回だけ読み込まれます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxdocgen::{GeneratorBuilder, NameCollision, TemplateMap};
///
/// # fn main() -> Result<(), xlsxdocgen::XlsxToDocxError> {
/// let generator = GeneratorBuilder::new()
///     .with_excel_path("data.xlsx")
///     .with_template_map(TemplateMap::new().with_fallback("letter.docx"))
///     .with_output_dir("out")
///     .with_name_collision(NameCollision::Rename)
///     .with_file_name("{name}")
///     .build()?;
///
/// let summary = generator.run()?;
/// for failure in &summary.failures {
///     eprintln!("row {}: {}", failure.row, failure.error);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Generator {
    config: GenerationConfig,
    excel_path: PathBuf,
    output_dir: PathBuf,
    missing_policy: MissingFieldPolicy,
    naming: NamingRule,
    formatter: ValueFormatter,
}

impl Generator {
    /// すべてのレコードについて文書を生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(RunSummary)` - 生成した文書と、スキップしたレコードの一覧
    /// * `Err(XlsxToDocxError::DataLoad)` - スプレッドシートを読み込めない場合
    /// * `Err(XlsxToDocxError::Config)` - 対応表のテンプレートが1つも読めない場合
    /// * `Err(XlsxToDocxError::Write)` - 出力ディレクトリを作成できない場合
    /// * `Err(XlsxToDocxError::Record)` - `RecordErrorPolicy::Abort`で
    ///   レコードの処理に失敗した場合
    pub fn run(&self) -> Result<RunSummary, XlsxToDocxError> {
        let started = Instant::now();
        info!(
            excel = %self.excel_path.display(),
            output = %self.output_dir.display(),
            "generation started"
        );

        // 1. データとテンプレートの読み込み（失敗は実行全体のエラー）
        let dataset = RecordLoader::new().load(&self.excel_path, &self.config.sheet)?;
        self.warn_unknown_name_fields(&dataset.headers);

        let store = TemplateStore::load(&self.config.template_map)?;
        info!(
            sheet = %dataset.sheet_name,
            records = dataset.records.len(),
            templates = store.len(),
            "inputs loaded"
        );

        std::fs::create_dir_all(&self.output_dir).map_err(|source| XlsxToDocxError::Write {
            path: self.output_dir.clone(),
            source,
        })?;

        // 2. レコードごとに選択 → 差し込み → 書き出し
        let selector = TemplateSelector::new(&self.config.template_map, &self.formatter);
        let binder = FieldBinder::new(&self.formatter, &self.missing_policy);
        let emitter = DocumentEmitter::new(
            self.output_dir.clone(),
            self.naming.clone(),
            self.config.name_collision,
        );

        let total = dataset.records.len();
        let mut summary = RunSummary::default();
        let mut written: HashMap<PathBuf, u32> = HashMap::new();

        for (index, record) in dataset.records.iter().enumerate() {
            match Self::process(record, &selector, &store, &binder, &emitter, &self.formatter) {
                Ok(path) => {
                    if let Some(previous) = written.insert(path.clone(), record.row()) {
                        warn!(
                            row = record.row(),
                            replaced_row = previous,
                            path = %path.display(),
                            "document from an earlier row overwritten"
                        );
                        summary.overwritten_rows.push(previous);
                    }
                    summary.generated.push(path);
                }
                Err(error) if !error.is_record_level() => return Err(error),
                Err(error) => match self.config.record_error_policy {
                    RecordErrorPolicy::Abort => {
                        warn!(row = record.row(), "aborting: {}", error);
                        return Err(XlsxToDocxError::Record {
                            row: record.row(),
                            source: Box::new(error),
                        });
                    }
                    RecordErrorPolicy::Skip => {
                        warn!(row = record.row(), "record skipped: {}", error);
                        summary.failures.push(RecordFailure {
                            row: record.row(),
                            error,
                        });
                    }
                },
            }

            let processed = index + 1;
            if processed % PROGRESS_INTERVAL == 0 {
                info!(processed, total, "progress");
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            generated = summary.generated.len(),
            failed = summary.failures.len(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "generation finished"
        );
        Ok(summary)
    }

    /// 1件のレコードを処理する
    fn process(
        record: &Record,
        selector: &TemplateSelector<'_>,
        store: &TemplateStore,
        binder: &FieldBinder<'_>,
        emitter: &DocumentEmitter,
        formatter: &ValueFormatter,
    ) -> Result<PathBuf, XlsxToDocxError> {
        let template_path = selector.select(record)?;
        debug!(row = record.row(), template = %template_path.display(), "template selected");

        let template = store.get(template_path)?;
        let bound = binder.bind(record, template)?;
        if !bound.missing().is_empty() {
            debug!(row = record.row(), missing = ?bound.missing(), "default placeholder used");
        }

        emitter.emit(record, &bound, formatter)
    }

    /// 命名パターンが存在しない列を参照していれば警告する
    fn warn_unknown_name_fields(&self, headers: &[String]) {
        let probe = Record::new(
            0,
            headers
                .iter()
                .map(|h| (h.clone(), crate::types::FieldValue::Empty))
                .collect(),
        );
        let patterns = std::iter::once(&self.config.file_name).chain(self.config.folder.iter());
        for pattern in patterns {
            let Ok(parsed) = NamePattern::parse(pattern) else {
                continue;
            };
            for field in parsed.fields() {
                if probe.get(field).is_none() {
                    warn!(field, "name pattern references an unknown column");
                }
            }
        }
    }

    /// 入力スプレッドシートのパス
    pub fn excel_path(&self) -> &Path {
        &self.excel_path
    }

    /// 出力ディレクトリ
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// スプレッドシートの列名を取得する
    ///
    /// テンプレート作成時に使えるプレースホルダ名の確認に使用します。
    pub fn fields(
        excel_path: impl AsRef<Path>,
        sheet: &SheetSelector,
    ) -> Result<Vec<String>, XlsxToDocxError> {
        RecordLoader::new().load_headers(excel_path.as_ref(), sheet)
    }
}
