//! xlsxdocgen - Batch Word document generator driven by Excel data
//!
//! This crate reads rows from a spreadsheet and fills `{{ name }}` placeholders
//! in Word (`.docx`) templates, writing one document per row. The template for
//! each row is chosen from the value of a selector column, and fields without a
//! value receive a configurable default marker instead of failing the row.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xlsxdocgen::{GeneratorBuilder, NameCollision, SelectorRule, TemplateMap};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // category列の値でテンプレートを切り替える
//!     let map = TemplateMap::new().with_rule(
//!         SelectorRule::new("category")
//!             .route("A", "templates/tplA.docx")
//!             .route("B", "templates/tplB.docx"),
//!     );
//!
//!     let generator = GeneratorBuilder::new()
//!         .with_excel_path("data.xlsx")
//!         .with_template_map(map)
//!         .with_output_dir("out")
//!         .with_missing_placeholder("N/A")
//!         .with_name_collision(NameCollision::Overwrite)
//!         .with_file_name("{name}_{category}")
//!         .build()?;
//!
//!     let summary = generator.run()?;
//!     println!("{} documents generated", summary.generated.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Config File
//!
//! ```rust,no_run
//! use xlsxdocgen::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 相対パスは設定ファイルのディレクトリから解決される
//!     let config = Config::load("jobs/config.json")?;
//!     let summary = config.into_builder().build()?.run()?;
//!
//!     for failure in &summary.failures {
//!         eprintln!("row {}: {}", failure.row, failure.error);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Inspecting Inputs
//!
//! ```rust,no_run
//! use xlsxdocgen::{DocxTemplate, Generator, SheetSelector};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let columns = Generator::fields("data.xlsx", &SheetSelector::Index(0))?;
//!     let template = DocxTemplate::open("templates/tplA.docx")?;
//!
//!     for name in template.placeholders() {
//!         if !columns.contains(name) {
//!             println!("placeholder '{}' has no matching column", name);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod api;
mod binder;
mod builder;
mod config;
mod error;
mod formatter;
mod output;
mod parser;
mod security;
mod selector;
mod types;

// 公開API
pub use api::{DateFormat, MissingFieldPolicy, NameCollision, RecordErrorPolicy, SheetSelector};
pub use builder::{Generator, GeneratorBuilder, RecordFailure, RunSummary};
pub use config::Config;
pub use error::XlsxToDocxError;
pub use parser::DocxTemplate;
pub use selector::{SelectorRule, TemplateMap};
pub use types::{BindingResult, FieldValue, Record};
