//! テストフィクスチャ生成ヘルパー
//!
//! スプレッドシートは`rust_xlsxwriter`、Wordテンプレートは`zip::ZipWriter`で
//! メモリ上に組み立てます。

#![allow(dead_code)]

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{DateTime, ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// 段落（ランのリスト）から`word/document.xml`を組み立てる
pub fn document_xml(paragraphs: &[&[&str]]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|runs| {
            let runs: String = runs
                .iter()
                .map(|text| format!("<w:r><w:t>{}</w:t></w:r>", text))
                .collect();
            format!("<w:p>{}</w:p>", runs)
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
}

/// 任意のパートからなる`.docx`を組み立てる
pub fn docx_from_parts(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .last_modified_time(DateTime::from_date_and_time(2024, 4, 1, 9, 0, 0).unwrap());
    for (name, content) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// 1段落1ランの単純なテンプレート
pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let runs: Vec<[&str; 1]> = paragraphs.iter().map(|p| [*p]).collect();
    let paragraphs: Vec<&[&str]> = runs.iter().map(|r| &r[..]).collect();
    docx_with_runs(&paragraphs)
}

/// プレースホルダが複数のランに分かれたテンプレート
pub fn docx_with_runs(paragraphs: &[&[&str]]) -> Vec<u8> {
    let document = document_xml(paragraphs);
    docx_from_parts(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("word/document.xml", document.as_str()),
    ])
}

/// テンプレートをファイルに書き出す
pub fn write_template(dir: &Path, name: &str, paragraphs: &[&str]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, docx(paragraphs)).unwrap();
    path
}

/// 文字列セルだけのワークブック（空文字列のセルは書き込まない）
pub fn workbook(rows: &[&[&str]]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(r as u32, c as u16, *value)?;
            }
        }
    }
    workbook.save_to_buffer()
}

/// `{name, category, amount}`の3行からなる基本のワークブック
///
/// 2行目（Alice, A）は`amount`が空、4行目（Carol, C）はテンプレート対応表にない値です。
pub fn generate_basic_records() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Records")?;

    worksheet.write_string(0, 0, "name")?;
    worksheet.write_string(0, 1, "category")?;
    worksheet.write_string(0, 2, "amount")?;

    worksheet.write_string(1, 0, "Alice")?;
    worksheet.write_string(1, 1, "A")?;

    worksheet.write_string(2, 0, "Bob")?;
    worksheet.write_string(2, 1, "B")?;
    worksheet.write_number(2, 2, 1200.0)?;

    worksheet.write_string(3, 0, "Carol")?;
    worksheet.write_string(3, 1, "C")?;
    worksheet.write_number(3, 2, 15.5)?;

    workbook.save_to_buffer()
}

/// 日付・数値・論理値を含むワークブック
pub fn generate_typed_values() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    worksheet.write_string(0, 0, "name")?;
    worksheet.write_string(0, 1, "date")?;
    worksheet.write_string(0, 2, "count")?;
    worksheet.write_string(0, 3, "ratio")?;
    worksheet.write_string(0, 4, "active")?;

    worksheet.write_string(1, 0, "Dan")?;
    // 45658 = 2025-01-01
    worksheet.write_number_with_format(1, 1, 45658.0, &date_format)?;
    worksheet.write_number(1, 2, 3.0)?;
    worksheet.write_number(1, 3, 0.25)?;
    worksheet.write_boolean(1, 4, true)?;

    workbook.save_to_buffer()
}

/// ワークブックをファイルに書き出す
pub fn write_workbook(dir: &Path, name: &str, bytes: Vec<u8>) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// 出力文書の`word/document.xml`を読み出す
pub fn read_document(path: &Path) -> String {
    let bytes = fs::read(path).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    xml
}

/// XMLからテキストだけを取り出す（段落ごとに改行）
pub fn document_text(path: &Path) -> String {
    let xml = read_document(path).replace("</w:p>", "\n");
    let mut text = String::new();
    let mut in_tag = false;
    for c in xml.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// ディレクトリ内のファイル名（ソート済み）
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
