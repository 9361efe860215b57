//! Workbook Loader Module
//!
//! calamineを使用してスプレッドシートを読み込み、ヘッダー行をフィールド名とする
//! レコード列に変換します。

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::api::SheetSelector;
use crate::error::XlsxToDocxError;
use crate::formatter::ValueFormatter;
use crate::security::SecurityConfig;
use crate::types::{FieldValue, Record};

/// 読み込み済みのシート
#[derive(Debug, Clone)]
pub(crate) struct Dataset {
    /// 読み込んだシート名
    pub sheet_name: String,
    /// 列名（ヘッダー行の順序）
    pub headers: Vec<String>,
    /// データ行（行順）
    pub records: Vec<Record>,
}

/// レコードローダー
///
/// calamineのラッパーとして、ワークブックからレコードを抽出します。
/// xlsx / xlsm / xls / ods を受け付けます。
#[derive(Debug, Default)]
pub(crate) struct RecordLoader {
    security: SecurityConfig,
    formatter: ValueFormatter,
}

impl RecordLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// スプレッドシートを読み込み、データ行をレコードに変換する
    ///
    /// # 引数
    ///
    /// * `path` - スプレッドシートのパス
    /// * `sheet` - 読み込むシート
    ///
    /// # 戻り値
    ///
    /// * `Ok(Dataset)` - ヘッダーとレコード（行順・列順を保持）
    /// * `Err(XlsxToDocxError::DataLoad)` - ファイルが読めない、形式が不正、
    ///   シートが存在しない、ヘッダー行がない場合
    pub fn load(&self, path: &Path, sheet: &SheetSelector) -> Result<Dataset, XlsxToDocxError> {
        let (sheet_name, range) = self.open_range(path, sheet)?;
        let start_row = range.start().map(|(row, _)| row).unwrap_or(0);

        let mut rows = range.rows();
        let header_row = rows.next().ok_or_else(|| {
            XlsxToDocxError::data_load(path, format!("sheet '{}' has no header row", sheet_name))
        })?;
        let headers = self.build_headers(path, header_row)?;

        let mut records = Vec::new();
        for (offset, row) in rows.enumerate() {
            // ヘッダーが1行目、データは2行目から（1始まり）
            let row_number = start_row + offset as u32 + 2;

            let values: Vec<FieldValue> = row.iter().map(convert_cell).collect();
            if values.iter().all(FieldValue::is_missing) {
                debug!(row = row_number, "skipping empty row");
                continue;
            }

            let fields = headers
                .iter()
                .cloned()
                .zip(values.into_iter().chain(std::iter::repeat(FieldValue::Empty)))
                .collect();
            records.push(Record::new(row_number, fields));
        }

        debug!(
            sheet = %sheet_name,
            columns = headers.len(),
            records = records.len(),
            "spreadsheet loaded"
        );

        Ok(Dataset {
            sheet_name,
            headers,
            records,
        })
    }

    /// ヘッダー行（列名）のみを取得する
    pub fn load_headers(
        &self,
        path: &Path,
        sheet: &SheetSelector,
    ) -> Result<Vec<String>, XlsxToDocxError> {
        let (sheet_name, range) = self.open_range(path, sheet)?;
        let header_row = range.rows().next().ok_or_else(|| {
            XlsxToDocxError::data_load(path, format!("sheet '{}' has no header row", sheet_name))
        })?;
        self.build_headers(path, header_row)
    }

    /// ワークブックを開き、選択したシートのセル範囲を取得する
    fn open_range(
        &self,
        path: &Path,
        sheet: &SheetSelector,
    ) -> Result<(String, Range<Data>), XlsxToDocxError> {
        self.security.check_input_file(path).map_err(|e| match e {
            XlsxToDocxError::Io(io) => XlsxToDocxError::data_load(path, io),
            other => other,
        })?;

        let mut workbook =
            open_workbook_auto(path).map_err(|e| XlsxToDocxError::data_load(path, e))?;
        let sheet_names = workbook.sheet_names();

        let sheet_name = match sheet {
            SheetSelector::Index(index) => sheet_names.get(*index).cloned().ok_or_else(|| {
                XlsxToDocxError::data_load(
                    path,
                    format!(
                        "Sheet index {} is out of range (total: {})",
                        index,
                        sheet_names.len()
                    ),
                )
            })?,
            SheetSelector::Name(name) => {
                if !sheet_names.contains(name) {
                    return Err(XlsxToDocxError::data_load(
                        path,
                        format!("Sheet '{}' not found", name),
                    ));
                }
                name.clone()
            }
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| XlsxToDocxError::data_load(path, e))?;

        if range.is_empty() {
            return Err(XlsxToDocxError::data_load(
                path,
                format!("sheet '{}' is empty (no header row)", sheet_name),
            ));
        }

        Ok((sheet_name, range))
    }

    /// ヘッダー行から列名を組み立てる
    ///
    /// 空のヘッダーは`Unnamed: <列番号>`、重複した名前は`.1`, `.2`の接尾辞で区別します。
    fn build_headers(&self, path: &Path, row: &[Data]) -> Result<Vec<String>, XlsxToDocxError> {
        let raw: Vec<String> = row
            .iter()
            .map(|cell| {
                self.formatter
                    .format(&convert_cell(cell))
                    .map(|s| s.trim().to_string())
            })
            .collect::<Result<_, _>>()?;

        if raw.iter().all(String::is_empty) {
            return Err(XlsxToDocxError::data_load(path, "missing header row"));
        }

        let mut seen = HashSet::new();
        let mut headers = Vec::with_capacity(raw.len());
        for (col, name) in raw.into_iter().enumerate() {
            let base = if name.is_empty() {
                let unnamed = format!("Unnamed: {}", col);
                warn!(column = col, "blank header renamed to '{}'", unnamed);
                unnamed
            } else {
                name
            };

            let mut candidate = base.clone();
            let mut suffix = 1;
            while seen.contains(&candidate) {
                candidate = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            if candidate != base {
                warn!(column = col, "duplicate header '{}' renamed to '{}'", base, candidate);
            }

            seen.insert(candidate.clone());
            headers.push(candidate);
        }

        Ok(headers)
    }
}

/// calamineのセル値をフィールド値に変換
pub(crate) fn convert_cell(cell: &Data) -> FieldValue {
    match cell {
        Data::Int(i) => FieldValue::Number(*i as f64),
        Data::Float(f) => FieldValue::Number(*f),
        Data::String(s) => FieldValue::String(s.clone()),
        Data::Bool(b) => FieldValue::Bool(*b),
        Data::DateTime(dt) => {
            if dt.is_datetime() {
                dt.as_datetime()
                    .map(FieldValue::DateTime)
                    .unwrap_or(FieldValue::Number(dt.as_f64()))
            } else {
                FieldValue::Number(dt.as_f64())
            }
        }
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(FieldValue::DateTime)
            .unwrap_or_else(|| FieldValue::String(s.clone())),
        Data::Error(e) => FieldValue::Error(e.to_string()),
        Data::Empty => FieldValue::Empty,
        other => FieldValue::String(other.to_string()),
    }
}

/// ISO 8601形式の日付・日時文字列を解析
fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    s.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| s.parse::<NaiveDate>().ok().map(|d| d.and_time(NaiveTime::MIN)))
}


// 実ファイルを使うテストは統合テスト（tests/）で実装します。
