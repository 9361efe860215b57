//! Field Binder Module
//!
//! レコードのフィールド値をテンプレートのプレースホルダに差し込むモジュール。

use std::collections::HashMap;

use crate::api::MissingFieldPolicy;
use crate::error::XlsxToDocxError;
use crate::formatter::ValueFormatter;
use crate::parser::DocxTemplate;
use crate::types::{BindingResult, Record};

/// フィールドバインダー
///
/// 値のないフィールドはエラーにせず、`MissingFieldPolicy`に従って補完します。
#[derive(Debug, Clone)]
pub(crate) struct FieldBinder<'a> {
    formatter: &'a ValueFormatter,
    missing_policy: &'a MissingFieldPolicy,
}

impl<'a> FieldBinder<'a> {
    pub fn new(formatter: &'a ValueFormatter, missing_policy: &'a MissingFieldPolicy) -> Self {
        Self {
            formatter,
            missing_policy,
        }
    }

    /// レコードをテンプレートに差し込む
    ///
    /// # 戻り値
    ///
    /// * `Ok(BindingResult)` - すべてのプレースホルダを置換した文書
    /// * `Err(XlsxToDocxError::UnboundPlaceholder)` - テンプレートの出力に失敗した場合
    pub fn bind(
        &self,
        record: &Record,
        template: &DocxTemplate,
    ) -> Result<BindingResult, XlsxToDocxError> {
        let mut values: HashMap<&str, String> = HashMap::new();
        for name in template.placeholders() {
            if let Some(value) = record.get_present(name) {
                values.insert(name.as_str(), self.formatter.format(value)?);
            }
        }

        let mut missing: Vec<String> = Vec::new();
        let bytes = template.render(|name, raw| {
            if let Some(value) = values.get(name) {
                return value.clone();
            }
            if !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
            match self.missing_policy {
                MissingFieldPolicy::Substitute(text) => text.clone(),
                MissingFieldPolicy::Keep => raw.to_string(),
            }
        })?;

        Ok(BindingResult {
            template: template.path().to_path_buf(),
            bytes,
            missing,
        })
    }
}
