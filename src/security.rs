//! Security Module
//!
//! 入力ファイルに対するセキュリティ制限を実装するモジュール。
//! 巨大な入力、ZIP bomb、パストラバーサルを含むテンプレートを拒否します。

use std::path::Path;

use crate::error::XlsxToDocxError;

/// セキュリティ設定
///
/// スプレッドシートとテンプレート（ZIPアーカイブ）の処理制限を定義します。
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// テンプレート展開後の最大合計サイズ（バイト）
    /// デフォルト: 512MB
    pub max_decompressed_size: u64,
    /// テンプレートZIP内の最大エントリ数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// テンプレート内の単一エントリの最大サイズ（バイト）
    /// デフォルト: 100MB
    pub max_file_size: u64,
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 2GB
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 536_870_912, // 512MB
            max_file_count: 10_000,
            max_file_size: 104_857_600,         // 100MB
            max_input_file_size: 2_147_483_648, // 2GB
        }
    }
}

impl SecurityConfig {
    /// 入力ファイルのサイズを検証する
    ///
    /// # 戻り値
    ///
    /// * `Ok(u64)` - ファイルサイズ（バイト）
    /// * `Err(XlsxToDocxError::Io)` - メタデータを取得できない場合
    /// * `Err(XlsxToDocxError::SecurityViolation)` - 上限を超えた場合
    pub fn check_input_file(&self, path: &Path) -> Result<u64, XlsxToDocxError> {
        let size = std::fs::metadata(path)?.len();
        if size > self.max_input_file_size {
            return Err(XlsxToDocxError::SecurityViolation(format!(
                "Input file '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                path.display(),
                size,
                self.max_input_file_size
            )));
        }
        Ok(size)
    }

    /// ZIPエントリ数を検証する
    pub fn check_entry_count(&self, count: usize) -> Result<(), XlsxToDocxError> {
        if count > self.max_file_count {
            return Err(XlsxToDocxError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                count, self.max_file_count
            )));
        }
        Ok(())
    }

    /// ZIPエントリのサイズを検証し、展開後サイズの累計を返す
    pub fn check_entry_size(
        &self,
        name: &str,
        size: u64,
        total_so_far: u64,
    ) -> Result<u64, XlsxToDocxError> {
        if size > self.max_file_size {
            return Err(XlsxToDocxError::SecurityViolation(format!(
                "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                name, size, self.max_file_size
            )));
        }

        let total = total_so_far.checked_add(size).ok_or_else(|| {
            XlsxToDocxError::SecurityViolation(
                "Total decompressed size calculation overflow".to_string(),
            )
        })?;

        if total > self.max_decompressed_size {
            return Err(XlsxToDocxError::SecurityViolation(format!(
                "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                total, self.max_decompressed_size
            )));
        }
        Ok(total)
    }
}

/// ZIPエントリのパスを検証
///
/// パストラバーサル攻撃を防ぐため、ZIP内のパスを検証します。
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`、絶対パス、バックスラッシュを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.split('/').any(|component| component == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}
