//! Formatter Module
//!
//! セル値を差し込み用の文字列に変換するモジュール。

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDateTime, NaiveTime};
use std::fmt::Write;

use crate::api::DateFormat;
use crate::error::XlsxToDocxError;
use crate::types::FieldValue;

/// この値以上の整数値は指数表記を避けて`f64`のまま出力する
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0; // 2^53

/// フィールド値フォーマッター
///
/// 数値・日付・論理値を文字列化するファサードとして機能します。
#[derive(Debug, Clone)]
pub(crate) struct ValueFormatter {
    date_formatter: DateFormatter,
}

impl ValueFormatter {
    /// 新しいValueFormatterインスタンスを生成
    pub fn new(date_format: DateFormat) -> Self {
        Self {
            date_formatter: DateFormatter { date_format },
        }
    }

    /// フィールド値をフォーマット
    ///
    /// # 戻り値
    ///
    /// * `Ok(String)` - フォーマット済み文字列（空セルは空文字列）
    /// * `Err(XlsxToDocxError::Config)` - カスタム日付形式が不正な場合
    pub fn format(&self, value: &FieldValue) -> Result<String, XlsxToDocxError> {
        let formatted = match value {
            FieldValue::Number(n) => format_number(*n),
            FieldValue::String(s) => s.clone(),
            FieldValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            FieldValue::DateTime(dt) => self.date_formatter.format(dt)?,
            FieldValue::Error(e) => e.clone(),
            FieldValue::Empty => String::new(),
        };
        Ok(formatted)
    }
}

impl Default for ValueFormatter {
    fn default() -> Self {
        Self::new(DateFormat::Iso8601)
    }
}

/// 数値を文字列化する
///
/// 小数部のない値は`.0`を付けずに整数として出力します（`3.0` → `3`）。
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT_INTEGER {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// 日付フォーマッター
#[derive(Debug, Clone)]
pub(crate) struct DateFormatter {
    date_format: DateFormat,
}

impl DateFormatter {
    /// 日時をフォーマット
    ///
    /// `Iso8601`では時刻が0時ちょうどなら日付のみ、それ以外は秒まで出力します。
    pub fn format(&self, value: &NaiveDateTime) -> Result<String, XlsxToDocxError> {
        match &self.date_format {
            DateFormat::Iso8601 => {
                if value.time() == NaiveTime::MIN {
                    Ok(value.format("%Y-%m-%d").to_string())
                } else {
                    Ok(value.format("%Y-%m-%d %H:%M:%S").to_string())
                }
            }
            DateFormat::Custom(format_str) => {
                let mut out = String::new();
                write!(out, "{}", value.format(format_str)).map_err(|_| {
                    XlsxToDocxError::Config(format!(
                        "Invalid date format string: '{}'",
                        format_str
                    ))
                })?;
                Ok(out)
            }
        }
    }
}

/// カスタム日付形式を検証する
///
/// 空文字列、または解釈できない指定子を含む場合はエラーを返します。
pub(crate) fn validate_date_format(format_str: &str) -> Result<(), XlsxToDocxError> {
    let invalid = || XlsxToDocxError::Config(format!("Invalid date format string: '{}'", format_str));

    if format_str.is_empty() {
        return Err(invalid());
    }
    if StrftimeItems::new(format_str).any(|item| matches!(item, Item::Error)) {
        return Err(invalid());
    }
    Ok(())
}
