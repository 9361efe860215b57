//! Document Emitter Module
//!
//! 差し込み済み文書を出力ディレクトリへ書き出すモジュール。
//! ファイル名の決定と名前衝突の処理を担当します。

mod naming;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::api::NameCollision;
use crate::error::XlsxToDocxError;
use crate::formatter::ValueFormatter;
use crate::types::{BindingResult, Record};

pub(crate) use naming::{NamePattern, NamingRule};

use naming::DOCX_EXTENSION;

/// `NameCollision::Rename`で試す連番の上限
const MAX_RENAME_ATTEMPTS: u32 = 10_000;

/// 文書エミッター
#[derive(Debug, Clone)]
pub(crate) struct DocumentEmitter {
    output_dir: PathBuf,
    naming: NamingRule,
    collision: NameCollision,
}

impl DocumentEmitter {
    pub fn new(output_dir: PathBuf, naming: NamingRule, collision: NameCollision) -> Self {
        Self {
            output_dir,
            naming,
            collision,
        }
    }

    /// 文書を1件書き出す
    ///
    /// # 戻り値
    ///
    /// * `Ok(PathBuf)` - 書き出したファイルのパス
    /// * `Err(XlsxToDocxError::Write)` - 書き込めない場合、または
    ///   `NameCollision::Fail`で同名のファイルが既に存在する場合
    pub fn emit(
        &self,
        record: &Record,
        result: &BindingResult,
        formatter: &ValueFormatter,
    ) -> Result<PathBuf, XlsxToDocxError> {
        let target = self.naming.resolve(record, formatter)?;

        let dir = match &target.folder {
            Some(folder) => self.output_dir.join(folder),
            None => self.output_dir.clone(),
        };
        fs::create_dir_all(&dir).map_err(|source| XlsxToDocxError::Write {
            path: dir.clone(),
            source,
        })?;

        let path = match self.collision {
            NameCollision::Overwrite => {
                let path = docx_path(&dir, &target.stem);
                fs::write(&path, result.bytes()).map_err(|source| XlsxToDocxError::Write {
                    path: path.clone(),
                    source,
                })?;
                path
            }
            NameCollision::Fail => {
                let path = docx_path(&dir, &target.stem);
                write_new(&path, result.bytes())?;
                path
            }
            NameCollision::Rename => self.write_renamed(&dir, &target.stem, result.bytes())?,
        };

        debug!(row = record.row(), path = %path.display(), "document written");
        Ok(path)
    }

    /// 空いている名前（`name`, `name_1`, `name_2`, ...）を探して書き出す
    fn write_renamed(
        &self,
        dir: &Path,
        stem: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, XlsxToDocxError> {
        for n in 0..=MAX_RENAME_ATTEMPTS {
            let path = if n == 0 {
                docx_path(dir, stem)
            } else {
                docx_path(dir, &format!("{}_{}", stem, n))
            };
            match write_new(&path, bytes) {
                Ok(()) => return Ok(path),
                Err(XlsxToDocxError::Write { source, .. })
                    if source.kind() == io::ErrorKind::AlreadyExists =>
                {
                    continue
                }
                Err(e) => return Err(e),
            }
        }

        let path = docx_path(dir, stem);
        Err(XlsxToDocxError::Write {
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("no free name after {} attempts", MAX_RENAME_ATTEMPTS),
            ),
            path,
        })
    }
}

fn docx_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.{}", stem, DOCX_EXTENSION))
}

/// 既存ファイルを上書きせずに書き出す
fn write_new(path: &Path, bytes: &[u8]) -> Result<(), XlsxToDocxError> {
    let to_write_error = |source: io::Error| XlsxToDocxError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(to_write_error)?;
    file.write_all(bytes).map_err(to_write_error)?;
    Ok(())
}
