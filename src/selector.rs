//! Template Selector Module
//!
//! レコードのセレクタフィールドの値から、使用するテンプレートを決定するモジュール。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::XlsxToDocxError;
use crate::formatter::ValueFormatter;
use crate::parser::DocxTemplate;
use crate::types::Record;

/// セレクタ規則
///
/// `field`列の値（前後の空白を除去したもの）を`routes`で引き、テンプレートを決定します。
/// 複数の値が同じテンプレートを指してもかまいません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRule {
    /// セレクタとして使う列名
    pub field: String,
    /// 値 → テンプレートパス
    pub routes: BTreeMap<String, PathBuf>,
}

impl SelectorRule {
    /// 新しい規則を生成
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            routes: BTreeMap::new(),
        }
    }

    /// 値とテンプレートの対応を追加
    pub fn route(mut self, value: impl Into<String>, template: impl Into<PathBuf>) -> Self {
        self.routes.insert(value.into(), template.into());
        self
    }
}

/// テンプレート対応表
///
/// 規則はリスト順（優先順位順）に試され、最初に一致したものが採用されます。
/// どの規則にも一致しない場合、`fallback`があればそれを使用します。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMap {
    /// セレクタ規則（優先順位順）
    #[serde(default)]
    pub rules: Vec<SelectorRule>,
    /// どの規則にも一致しない場合のテンプレート
    #[serde(default)]
    pub fallback: Option<PathBuf>,
}

impl TemplateMap {
    /// 空の対応表を生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 規則を追加（追加順が優先順位になる）
    pub fn with_rule(mut self, rule: SelectorRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// フォールバックテンプレートを設定
    pub fn with_fallback(mut self, template: impl Into<PathBuf>) -> Self {
        self.fallback = Some(template.into());
        self
    }

    /// 規則もフォールバックもないかどうか
    pub fn is_empty(&self) -> bool {
        self.rules.iter().all(|rule| rule.routes.is_empty()) && self.fallback.is_none()
    }

    /// 対応表に現れるテンプレートパス（重複なし、出現順）
    pub fn template_paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = Vec::new();
        let candidates = self
            .rules
            .iter()
            .flat_map(|rule| rule.routes.values())
            .chain(self.fallback.iter());
        for path in candidates {
            if !paths.contains(&path.as_path()) {
                paths.push(path.as_path());
            }
        }
        paths
    }

    /// 相対パスを`base`からの相対として解決する
    pub(crate) fn resolve_relative(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        for rule in &mut self.rules {
            rule.routes.values_mut().for_each(resolve);
        }
        if let Some(fallback) = self.fallback.as_mut() {
            resolve(fallback);
        }
    }
}

/// テンプレートセレクタ
#[derive(Debug, Clone)]
pub(crate) struct TemplateSelector<'a> {
    map: &'a TemplateMap,
    formatter: &'a ValueFormatter,
}

impl<'a> TemplateSelector<'a> {
    pub fn new(map: &'a TemplateMap, formatter: &'a ValueFormatter) -> Self {
        Self { map, formatter }
    }

    /// レコードに対応するテンプレートを選択する
    ///
    /// # 戻り値
    ///
    /// * `Ok(&Path)` - 一致したテンプレート（またはフォールバック）のパス
    /// * `Err(XlsxToDocxError::TemplateNotFound)` - 一致する規則がなく、
    ///   フォールバックも設定されていない場合。一致しなかった`列="値"`の組を含みます
    pub fn select(&self, record: &Record) -> Result<&'a Path, XlsxToDocxError> {
        let mut tried = Vec::with_capacity(self.map.rules.len());

        for rule in &self.map.rules {
            let value = match record.get(&rule.field) {
                Some(value) => self.formatter.format(value)?,
                None => String::new(),
            };
            let key = value.trim();
            if let Some(template) = rule.routes.get(key) {
                return Ok(template.as_path());
            }
            tried.push(format!("{}={:?}", rule.field, key));
        }

        if let Some(fallback) = &self.map.fallback {
            return Ok(fallback.as_path());
        }

        Err(XlsxToDocxError::TemplateNotFound {
            row: record.row(),
            key: tried.join(", "),
        })
    }
}

/// 読み込み済みテンプレートの集合
///
/// 対応表に現れるテンプレートを実行開始時に1回ずつ読み込みます。
/// 複数の値が同じパスを指していても読み込みは1回だけです。
#[derive(Debug, Default)]
pub(crate) struct TemplateStore {
    templates: HashMap<PathBuf, Result<DocxTemplate, String>>,
}

impl TemplateStore {
    /// 対応表のテンプレートをすべて読み込む
    ///
    /// 読めない・壊れているテンプレートはエラーメッセージとして保持し、
    /// そのテンプレートに振り分けられたレコードだけを失敗させます。
    /// 対応表のテンプレートが1つも読めない場合のみ実行全体のエラーになります。
    pub fn load(map: &TemplateMap) -> Result<Self, XlsxToDocxError> {
        let mut templates = HashMap::new();
        let mut unreadable = Vec::new();
        for path in map.template_paths() {
            let loaded = match DocxTemplate::open(path) {
                Ok(template) => {
                    debug!(
                        template = %path.display(),
                        placeholders = template.placeholders().len(),
                        "template compiled"
                    );
                    Ok(template)
                }
                Err(XlsxToDocxError::Io(e)) => {
                    warn!(template = %path.display(), "cannot read template: {}", e);
                    unreadable.push(format!("'{}': {}", path.display(), e));
                    Err(format!("cannot read template file: {}", e))
                }
                Err(XlsxToDocxError::UnboundPlaceholder { message, .. }) => {
                    warn!(template = %path.display(), "corrupt template: {}", message);
                    Err(message)
                }
                Err(other) => {
                    warn!(template = %path.display(), "rejected template: {}", other);
                    Err(other.to_string())
                }
            };
            templates.insert(path.to_path_buf(), loaded);
        }

        if !templates.is_empty() && unreadable.len() == templates.len() {
            return Err(XlsxToDocxError::Config(format!(
                "no template in template_map can be read: {}",
                unreadable.join(", ")
            )));
        }
        Ok(Self { templates })
    }

    /// 読み込み済みテンプレートを取得する
    pub fn get(&self, path: &Path) -> Result<&DocxTemplate, XlsxToDocxError> {
        match self.templates.get(path) {
            Some(Ok(template)) => Ok(template),
            Some(Err(message)) => Err(XlsxToDocxError::corrupt(path, message.clone())),
            None => Err(XlsxToDocxError::corrupt(path, "template was not loaded")),
        }
    }

    /// 読み込んだテンプレートの数（壊れたものを含む）
    pub fn len(&self) -> usize {
        self.templates.len()
    }
}
