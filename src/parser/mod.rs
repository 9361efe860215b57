//! Parser Module
//!
//! 入力ファイルの解析を担当するモジュール。
//! スプレッドシートはcalamineでレコード列に、WordテンプレートはZIP + quick-xmlで
//! コンパイル済みテンプレートに変換します。

mod template;
mod workbook;

pub use template::DocxTemplate;
pub(crate) use workbook::{Dataset, RecordLoader};
