//! File Naming Module
//!
//! レコードの値から出力ファイル名・サブフォルダ名を組み立てるモジュール。

use crate::error::XlsxToDocxError;
use crate::formatter::ValueFormatter;
use crate::types::Record;

/// ファイル名に使えない文字
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// 出力ファイルの拡張子
pub(crate) const DOCX_EXTENSION: &str = "docx";

/// `{field}`を含む名前パターン
///
/// 例: `"{name}_{category}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NamePattern {
    segments: Vec<PatternSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    Field(String),
}

impl NamePattern {
    /// パターン文字列を解析する
    ///
    /// `{`が閉じていない、`}`が対応していない、フィールド名が空の場合は
    /// `XlsxToDocxError::Config`を返します。
    pub fn parse(pattern: &str) -> Result<Self, XlsxToDocxError> {
        let invalid = |reason: &str| {
            XlsxToDocxError::Config(format!("Invalid name pattern '{}': {}", pattern, reason))
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(invalid("nested '{'")),
                            _ => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(invalid("unclosed '{'"));
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(invalid("empty field name"));
                    }
                    if !literal.is_empty() {
                        segments.push(PatternSegment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(PatternSegment::Field(name.to_string()));
                }
                '}' => return Err(invalid("unmatched '}'")),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(PatternSegment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// パターンが参照するフィールド名
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            PatternSegment::Field(name) => Some(name.as_str()),
            PatternSegment::Literal(_) => None,
        })
    }

    /// レコードの値でパターンを展開する（無害化前）
    ///
    /// 存在しないフィールドは空文字列として扱います。
    pub fn render(
        &self,
        record: &Record,
        formatter: &ValueFormatter,
    ) -> Result<String, XlsxToDocxError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                PatternSegment::Literal(text) => out.push_str(text),
                PatternSegment::Field(name) => {
                    if let Some(value) = record.get(name) {
                        out.push_str(&formatter.format(value)?);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// 出力先の命名規則
#[derive(Debug, Clone)]
pub(crate) struct NamingRule {
    file_name: NamePattern,
    folder: Option<NamePattern>,
}

/// 命名規則を適用した結果（出力ディレクトリからの相対位置）
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NamedTarget {
    /// サブフォルダ名（なしの場合は`None`）
    pub folder: Option<String>,
    /// 拡張子を除いたファイル名
    pub stem: String,
}

impl NamingRule {
    pub fn new(file_name: NamePattern, folder: Option<NamePattern>) -> Self {
        Self { file_name, folder }
    }

    /// レコードの出力先を決定する
    ///
    /// ファイル名が空になった場合は`record_<行番号>`を使用します。
    pub fn resolve(
        &self,
        record: &Record,
        formatter: &ValueFormatter,
    ) -> Result<NamedTarget, XlsxToDocxError> {
        let rendered = self.file_name.render(record, formatter)?;
        let mut stem = sanitize_file_name(strip_docx_extension(&rendered));
        if stem.is_empty() {
            stem = format!("record_{}", record.row());
        }

        let folder = match &self.folder {
            Some(pattern) => {
                let name = sanitize_file_name(&pattern.render(record, formatter)?);
                (!name.is_empty()).then_some(name)
            }
            None => None,
        };

        Ok(NamedTarget { folder, stem })
    }
}

/// パターンに拡張子が含まれていれば取り除く（`.docx.docx`を防ぐ）
fn strip_docx_extension(name: &str) -> &str {
    let suffix_len = DOCX_EXTENSION.len() + 1;
    if name.len() > suffix_len && name.is_char_boundary(name.len() - suffix_len) {
        let (stem, ext) = name.split_at(name.len() - suffix_len);
        if ext.eq_ignore_ascii_case(".docx") {
            return stem;
        }
    }
    name
}

/// ファイル名として使えない文字を`_`に置き換える
///
/// `<>:"/\|?*`と制御文字を置換し、前後の空白と末尾のドットを取り除きます。
pub(crate) fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    replaced
        .trim()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}
