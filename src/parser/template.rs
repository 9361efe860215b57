//! DOCX Template Module
//!
//! Wordテンプレート（ZIPアーカイブ）を読み込み、本文・ヘッダー・フッターのXMLから
//! `{{ name }}`形式のプレースホルダを抽出してコンパイルします。
//!
//! Wordは1つのプレースホルダを複数の`<w:r>`（ラン）に分割して保存することがあるため、
//! 段落（`<w:p>`）単位で`<w:t>`のテキストを連結してからプレースホルダを検出します。
//! 置換後の文字列はプレースホルダが始まる`<w:t>`に書き込み、後続の`<w:t>`からは
//! プレースホルダの残りの部分を取り除きます。

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashSet;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::XlsxToDocxError;
use crate::security::{validate_zip_path, SecurityConfig};

/// 本文パート
const DOCUMENT_PART: &str = "word/document.xml";

/// プレースホルダの開始・終了記号
const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// コンパイル済みのWordテンプレート
///
/// 実行開始時に1回だけ読み込まれ、以降は読み取り専用です。
#[derive(Debug, Clone)]
pub struct DocxTemplate {
    /// テンプレートファイルのパス
    path: PathBuf,
    /// ZIPエントリ（元の順序を保持）
    entries: Vec<TemplateEntry>,
    /// プレースホルダ名（出現順、重複なし）
    placeholders: Vec<String>,
}

/// ZIPエントリ
#[derive(Debug, Clone)]
struct TemplateEntry {
    name: String,
    last_modified: zip::DateTime,
    compression: CompressionMethod,
    unix_mode: Option<u32>,
    is_dir: bool,
    body: EntryBody,
}

#[derive(Debug, Clone)]
enum EntryBody {
    /// そのままコピーするエントリ（画像、スタイル、リレーションなど）
    Raw(Vec<u8>),
    /// プレースホルダを置換するXMLパート
    Part(CompiledPart),
}

/// コンパイル済みのXMLパート
#[derive(Debug, Clone)]
struct CompiledPart {
    tokens: Vec<Token>,
    /// `<w:t>`ごとのテキスト片（`Token::Text`のインデックスで参照）
    texts: Vec<Vec<Segment>>,
}

#[derive(Debug, Clone)]
enum Token {
    /// そのまま出力するXMLイベント
    Xml(Event<'static>),
    /// `<w:t>`のテキスト
    Text(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field {
        /// 前後の空白を除いたプレースホルダ名
        name: String,
        /// テンプレート上の元の記述（例: `{{ name }}`）
        raw: String,
    },
}

/// 段落内で検出したプレースホルダの位置（連結テキスト上のバイト位置）
#[derive(Debug, Clone, PartialEq)]
struct Span {
    start: usize,
    end: usize,
    name: String,
}

impl DocxTemplate {
    /// テンプレートファイルを読み込んでコンパイルする
    ///
    /// # 戻り値
    ///
    /// * `Ok(DocxTemplate)` - コンパイルに成功した場合
    /// * `Err(XlsxToDocxError::Io)` - ファイルを読めない場合
    /// * `Err(XlsxToDocxError::UnboundPlaceholder)` - テンプレートが壊れている場合
    /// * `Err(XlsxToDocxError::SecurityViolation)` - サイズ制限やパス検証に違反した場合
    pub fn open(path: impl AsRef<Path>) -> Result<Self, XlsxToDocxError> {
        let path = path.as_ref();
        SecurityConfig::default().check_input_file(path)?;
        let bytes = std::fs::read(path)?;
        Self::from_bytes(path, bytes)
    }

    /// メモリ上の`.docx`バイト列からテンプレートをコンパイルする
    ///
    /// `path`はエラーメッセージと出力の識別にのみ使用します。
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self, XlsxToDocxError> {
        Self::compile(path.into(), bytes, &SecurityConfig::default())
    }

    fn compile(
        path: PathBuf,
        bytes: Vec<u8>,
        security: &SecurityConfig,
    ) -> Result<Self, XlsxToDocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| XlsxToDocxError::corrupt(&path, format!("not a ZIP archive: {}", e)))?;

        security.check_entry_count(archive.len())?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut placeholders = Vec::new();
        let mut seen = HashSet::new();
        let mut has_document = false;
        let mut total_size = 0u64;

        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| XlsxToDocxError::corrupt(&path, e.to_string()))?;

            let name = file.name().to_string();
            validate_zip_path(&name).map_err(|e| {
                XlsxToDocxError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;
            security.check_entry_size(&name, file.size(), total_size)?;

            // ヘッダーのサイズ申告を信用せず、実際に展開したバイト数で累計する
            let mut data = Vec::new();
            file.by_ref()
                .take(security.max_file_size + 1)
                .read_to_end(&mut data)
                .map_err(|e| {
                    XlsxToDocxError::corrupt(&path, format!("cannot read '{}': {}", name, e))
                })?;
            total_size = security.check_entry_size(&name, data.len() as u64, total_size)?;

            let is_dir = file.is_dir();
            let body = if !is_dir && is_renderable_part(&name) {
                has_document |= name == DOCUMENT_PART;
                let part = compile_part(&data)
                    .map_err(|msg| XlsxToDocxError::corrupt(&path, format!("{}: {}", name, msg)))?;
                for placeholder in part.placeholder_names() {
                    if seen.insert(placeholder.to_string()) {
                        placeholders.push(placeholder.to_string());
                    }
                }
                EntryBody::Part(part)
            } else {
                EntryBody::Raw(data)
            };

            entries.push(TemplateEntry {
                name,
                last_modified: file.last_modified(),
                compression: file.compression(),
                unix_mode: file.unix_mode(),
                is_dir,
                body,
            });
        }

        if !has_document {
            return Err(XlsxToDocxError::corrupt(
                &path,
                format!("missing {}", DOCUMENT_PART),
            ));
        }

        Ok(Self {
            path,
            entries,
            placeholders,
        })
    }

    /// テンプレートファイルのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// テンプレートに含まれるプレースホルダ名（出現順、重複なし）
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// プレースホルダを置換した`.docx`を生成する
    ///
    /// `resolve`はプレースホルダごとに`(名前, 元の記述)`を受け取り、差し込む文字列を返します。
    /// 置換対象以外のZIPエントリは、元のタイムスタンプ・順序のまま書き出すため、
    /// 同じ入力からはバイト単位で同一の文書が得られます。
    pub(crate) fn render<F>(&self, mut resolve: F) -> Result<Vec<u8>, XlsxToDocxError>
    where
        F: FnMut(&str, &str) -> String,
    {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut options = FileOptions::default()
                .compression_method(method)
                .last_modified_time(entry.last_modified);
            if let Some(mode) = entry.unix_mode {
                options = options.unix_permissions(mode);
            }

            if entry.is_dir {
                zip.add_directory(entry.name.clone(), options)?;
                continue;
            }

            zip.start_file(entry.name.clone(), options)?;
            match &entry.body {
                EntryBody::Raw(data) => zip.write_all(data).map_err(zip_write_error)?,
                EntryBody::Part(part) => {
                    let xml = part.render(&mut resolve).map_err(|msg| {
                        XlsxToDocxError::corrupt(&self.path, format!("{}: {}", entry.name, msg))
                    })?;
                    zip.write_all(&xml).map_err(zip_write_error)?;
                }
            }
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// プレースホルダ置換の対象となるパートかどうか
fn zip_write_error(err: std::io::Error) -> XlsxToDocxError {
    XlsxToDocxError::Zip(err.to_string())
}

fn is_renderable_part(name: &str) -> bool {
    if name == DOCUMENT_PART || name == "word/footnotes.xml" || name == "word/endnotes.xml" {
        return true;
    }
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    !file.contains('/')
        && file.ends_with(".xml")
        && (file.starts_with("header") || file.starts_with("footer"))
}

/// XMLパートをトークン列にコンパイル
fn compile_part(xml: &[u8]) -> Result<CompiledPart, String> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut tokens = Vec::new();
    // (テキスト, 対応する<w:t>開始タグのトークン位置)
    let mut nodes: Vec<(String, usize)> = Vec::new();
    let mut open_paragraphs: Vec<Vec<usize>> = Vec::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut open_text: Option<usize> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                match e.name().as_ref() {
                    b"w:p" => open_paragraphs.push(Vec::new()),
                    b"w:t" => open_text = Some(tokens.len()),
                    _ => {}
                }
                tokens.push(Token::Xml(Event::Start(e.into_owned())));
            }
            Ok(Event::End(e)) => {
                match e.name().as_ref() {
                    b"w:p" => {
                        if let Some(group) = open_paragraphs.pop() {
                            groups.push(group);
                        }
                    }
                    b"w:t" => open_text = None,
                    _ => {}
                }
                tokens.push(Token::Xml(Event::End(e.into_owned())));
            }
            Ok(Event::Text(e)) => match open_text {
                Some(start_token) => {
                    let text = e
                        .unescape()
                        .map_err(|err| format!("invalid text content: {}", err))?
                        .into_owned();
                    let id = nodes.len();
                    nodes.push((text, start_token));
                    match open_paragraphs.last_mut() {
                        Some(paragraph) => paragraph.push(id),
                        None => groups.push(vec![id]),
                    }
                    tokens.push(Token::Text(id));
                }
                None => tokens.push(Token::Xml(Event::Text(e.into_owned()))),
            },
            Ok(Event::Eof) => break,
            Ok(other) => tokens.push(Token::Xml(other.into_owned())),
            Err(e) => {
                return Err(format!(
                    "XML parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
        }
        buf.clear();
    }
    groups.append(&mut open_paragraphs);

    let mut texts: Vec<Vec<Segment>> = nodes
        .iter()
        .map(|(text, _)| vec![Segment::Literal(text.clone())])
        .collect();

    for group in &groups {
        let group_texts: Vec<&str> = group.iter().map(|&id| nodes[id].0.as_str()).collect();
        let Some(split) = split_paragraph(&group_texts)? else {
            continue;
        };
        for (&id, (segments, touched)) in group.iter().zip(split) {
            if touched {
                preserve_space(&mut tokens, nodes[id].1);
            }
            texts[id] = segments;
        }
    }

    Ok(CompiledPart { tokens, texts })
}

/// `<w:t>`開始タグに`xml:space="preserve"`を付与する
///
/// 差し込んだ値の前後の空白がWordで削られないようにします。
fn preserve_space(tokens: &mut [Token], index: usize) {
    if let Some(Token::Xml(Event::Start(start))) = tokens.get_mut(index) {
        let present = start
            .attributes()
            .flatten()
            .any(|attr| attr.key.as_ref() == b"xml:space");
        if !present {
            start.push_attribute(("xml:space", "preserve"));
        }
    }
}

/// 段落内の`<w:t>`テキスト列をプレースホルダで分割する
///
/// # 戻り値
///
/// * `Ok(None)` - プレースホルダを含まない段落
/// * `Ok(Some(..))` - 各`<w:t>`のテキスト片と、プレースホルダにかかっているかどうか
/// * `Err(String)` - `{{`が閉じていない、または名前が空の場合
fn split_paragraph(texts: &[&str]) -> Result<Option<Vec<(Vec<Segment>, bool)>>, String> {
    let joined: String = texts.concat();
    if !joined.contains(OPEN) {
        return Ok(None);
    }
    let spans = find_placeholders(&joined)?;
    if spans.is_empty() {
        return Ok(None);
    }

    let mut result = Vec::with_capacity(texts.len());
    let mut node_start = 0;
    for text in texts {
        let node_end = node_start + text.len();
        let mut segments = Vec::new();
        let mut cursor = node_start;
        let mut touched = false;

        for span in spans
            .iter()
            .filter(|span| span.start < node_end && span.end > node_start)
        {
            touched = true;
            if span.start > cursor {
                segments.push(Segment::Literal(joined[cursor..span.start].to_string()));
            }
            if span.start >= node_start {
                segments.push(Segment::Field {
                    name: span.name.clone(),
                    raw: joined[span.start..span.end].to_string(),
                });
            }
            cursor = cursor.max(span.end);
        }
        if cursor < node_end {
            segments.push(Segment::Literal(joined[cursor..node_end].to_string()));
        }

        result.push((segments, touched));
        node_start = node_end;
    }

    Ok(Some(result))
}

/// 連結済みテキストからプレースホルダを検出する
fn find_placeholders(text: &str) -> Result<Vec<Span>, String> {
    let mut spans = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(OPEN) {
        let start = pos + offset;
        let inner_start = start + OPEN.len();
        let close = text[inner_start..]
            .find(CLOSE)
            .map(|offset| inner_start + offset)
            .ok_or_else(|| format!("unclosed placeholder near '{}'", excerpt(&text[start..])))?;
        let end = close + CLOSE.len();

        let name = text[inner_start..close].trim();
        if name.is_empty() {
            return Err(format!("empty placeholder '{}'", &text[start..end]));
        }
        if name.contains('{') || name.contains('}') {
            return Err(format!("malformed placeholder '{}'", &text[start..end]));
        }

        spans.push(Span {
            start,
            end,
            name: name.to_string(),
        });
        pos = end;
    }

    Ok(spans)
}

/// エラーメッセージ用に先頭の数文字を切り出す
fn excerpt(text: &str) -> String {
    const MAX_CHARS: usize = 30;
    let mut out: String = text.chars().take(MAX_CHARS).collect();
    if text.chars().count() > MAX_CHARS {
        out.push('…');
    }
    out
}

impl CompiledPart {
    /// パート内のプレースホルダ名（出現順）
    fn placeholder_names(&self) -> impl Iterator<Item = &str> {
        self.texts.iter().flatten().filter_map(|segment| match segment {
            Segment::Field { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// トークン列をXMLに書き戻す
    fn render<F>(&self, resolve: &mut F) -> Result<Vec<u8>, String>
    where
        F: FnMut(&str, &str) -> String,
    {
        let mut writer = Writer::new(Vec::new());

        for token in &self.tokens {
            match token {
                Token::Xml(event) => writer
                    .write_event(event.clone())
                    .map_err(|e| format!("XML write error: {}", e))?,
                Token::Text(id) => {
                    let mut text = String::new();
                    for segment in &self.texts[*id] {
                        match segment {
                            Segment::Literal(s) => text.push_str(s),
                            Segment::Field { name, raw } => text.push_str(&resolve(name, raw)),
                        }
                    }
                    writer
                        .write_event(Event::Text(BytesText::new(&text)))
                        .map_err(|e| format!("XML write error: {}", e))?;
                }
            }
        }

        Ok(writer.into_inner())
    }
}
