//! Integration Tests for xlsxdocgen
//!
//! スプレッドシート読み込みから文書書き出しまでのパイプライン全体を検証します。

mod fixtures;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use xlsxdocgen::{
    Config, GeneratorBuilder, NameCollision, RecordErrorPolicy, SelectorRule, TemplateMap,
    XlsxToDocxError,
};

/// 基本シナリオ: {name, category, amount}の3行、A/Bの2テンプレート
struct BasicSetup {
    dir: TempDir,
    excel: PathBuf,
    tpl_a: PathBuf,
    tpl_b: PathBuf,
}

impl BasicSetup {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let excel = fixtures::write_workbook(
            dir.path(),
            "data.xlsx",
            fixtures::generate_basic_records().unwrap(),
        );
        let tpl_a = fixtures::write_template(
            dir.path(),
            "tplA.docx",
            &["Template A", "Name: {{ name }}", "Amount: {{amount}}"],
        );
        let tpl_b = fixtures::write_template(
            dir.path(),
            "tplB.docx",
            &["Template B", "Dear {{name}}, you owe {{amount}}."],
        );
        Self {
            dir,
            excel,
            tpl_a,
            tpl_b,
        }
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn map(&self) -> TemplateMap {
        TemplateMap::new().with_rule(
            SelectorRule::new("category")
                .route("A", &self.tpl_a)
                .route("B", &self.tpl_b),
        )
    }

    fn builder(&self) -> GeneratorBuilder {
        GeneratorBuilder::new()
            .with_excel_path(&self.excel)
            .with_template_map(self.map())
            .with_output_dir(self.out())
            .with_missing_placeholder("N/A")
            .with_name_collision(NameCollision::Overwrite)
            .with_file_name("{name}_{category}")
    }
}

#[test]
fn test_basic_scenario() {
    let setup = BasicSetup::new();
    let summary = setup.builder().build().unwrap().run().unwrap();

    assert_eq!(summary.generated.len(), 2);
    assert_eq!(summary.total(), 3);
    assert!(!summary.is_success());

    // category=A, amountなし → tplA、amountは既定値
    let alice = setup.out().join("Alice_A.docx");
    assert_eq!(summary.generated[0], alice);
    assert_eq!(
        fixtures::document_text(&alice),
        "Template A\nName: Alice\nAmount: N/A"
    );

    // category=B → tplB、整数値は".0"なし
    let bob = setup.out().join("Bob_B.docx");
    assert_eq!(
        fixtures::document_text(&bob),
        "Template B\nDear Bob, you owe 1200."
    );
}

#[test]
fn test_unmapped_selector_reports_template_not_found() {
    let setup = BasicSetup::new();
    let summary = setup.builder().build().unwrap().run().unwrap();

    assert_eq!(summary.failures.len(), 1);
    let failure = &summary.failures[0];
    assert_eq!(failure.row, 4);
    match &failure.error {
        XlsxToDocxError::TemplateNotFound { row, key } => {
            assert_eq!(*row, 4);
            assert!(key.contains("category"));
            assert!(key.contains("\"C\""));
        }
        other => panic!("Expected TemplateNotFound, got {:?}", other),
    }

    // Carolの文書は書き出されない
    assert_eq!(
        fixtures::list_files(&setup.out()),
        vec!["Alice_A.docx", "Bob_B.docx"]
    );
}

#[test]
fn test_overwrite_is_idempotent() {
    let setup = BasicSetup::new();
    let generator = setup.builder().build().unwrap();

    let first = generator.run().unwrap();
    let first_bytes: Vec<Vec<u8>> = first
        .generated
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();

    let second = generator.run().unwrap();
    let second_bytes: Vec<Vec<u8>> = second
        .generated
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();

    assert_eq!(first.generated, second.generated);
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(fixtures::list_files(&setup.out()).len(), 2);
}

#[test]
fn test_rename_on_second_run() {
    let setup = BasicSetup::new();
    let generator = setup
        .builder()
        .with_name_collision(NameCollision::Rename)
        .build()
        .unwrap();

    generator.run().unwrap();
    let second = generator.run().unwrap();

    assert_eq!(
        second.generated,
        vec![
            setup.out().join("Alice_A_1.docx"),
            setup.out().join("Bob_B_1.docx"),
        ]
    );
}

#[test]
fn test_fail_on_second_run() {
    let setup = BasicSetup::new();
    let generator = setup
        .builder()
        .with_name_collision(NameCollision::Fail)
        .build()
        .unwrap();

    generator.run().unwrap();
    let second = generator.run().unwrap();

    assert!(second.generated.is_empty());
    let write_failures = second
        .failures
        .iter()
        .filter(|f| matches!(f.error, XlsxToDocxError::Write { .. }))
        .count();
    assert_eq!(write_failures, 2);
}

#[test]
fn test_abort_policy_stops_at_first_failure() {
    let setup = BasicSetup::new();
    let result = setup
        .builder()
        .with_record_error_policy(RecordErrorPolicy::Abort)
        .build()
        .unwrap()
        .run();

    match result {
        Err(XlsxToDocxError::Record { row, source }) => {
            assert_eq!(row, 4);
            assert!(matches!(*source, XlsxToDocxError::TemplateNotFound { .. }));
        }
        other => panic!("Expected Record error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_keep_missing_leaves_placeholder() {
    let setup = BasicSetup::new();
    setup.builder().keep_missing(true).build().unwrap().run().unwrap();

    let text = fixtures::document_text(&setup.out().join("Alice_A.docx"));
    assert!(text.contains("Amount: {{amount}}"));
    assert!(!text.contains("N/A"));
}

#[test]
fn test_fallback_template() {
    let setup = BasicSetup::new();
    let fallback = fixtures::write_template(setup.dir.path(), "default.docx", &["Default {{name}}"]);
    let summary = setup
        .builder()
        .with_template_map(setup.map().with_fallback(&fallback))
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(
        fixtures::document_text(&setup.out().join("Carol_C.docx")),
        "Default Carol"
    );
}

#[test]
fn test_selector_priority() {
    let setup = BasicSetup::new();
    let special =
        fixtures::write_template(setup.dir.path(), "special.docx", &["Special {{name}}"]);
    let map = TemplateMap::new()
        .with_rule(SelectorRule::new("name").route("Bob", &special))
        .with_rule(
            SelectorRule::new("category")
                .route("A", &setup.tpl_a)
                .route("B", &setup.tpl_b),
        );

    setup.builder().with_template_map(map).build().unwrap().run().unwrap();

    assert_eq!(
        fixtures::document_text(&setup.out().join("Bob_B.docx")),
        "Special Bob"
    );
    assert!(fixtures::document_text(&setup.out().join("Alice_A.docx")).starts_with("Template A"));
}

#[test]
fn test_folder_per_category() {
    let setup = BasicSetup::new();
    setup
        .builder()
        .with_file_name("{name}")
        .with_folder("{category}")
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert!(setup.out().join("A").join("Alice.docx").exists());
    assert!(setup.out().join("B").join("Bob.docx").exists());
    assert!(!setup.out().join("C").exists());
}

#[test]
fn test_placeholder_split_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let excel = fixtures::write_workbook(
        dir.path(),
        "data.xlsx",
        fixtures::workbook(&[&["name", "city"], &["Eve", "Kyoto"]]).unwrap(),
    );
    let template = dir.path().join("split.docx");
    fs::write(
        &template,
        fixtures::docx_with_runs(&[&["Hello {", "{ na", "me }", "} from {{city}}!"]]),
    )
    .unwrap();

    let summary = GeneratorBuilder::new()
        .with_excel_path(&excel)
        .with_template_map(TemplateMap::new().with_fallback(&template))
        .with_output_dir(dir.path().join("out"))
        .with_file_name("{name}")
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(
        fixtures::document_text(&summary.generated[0]),
        "Hello Eve from Kyoto!"
    );
}

#[test]
fn test_special_characters_are_escaped() {
    let dir = tempfile::tempdir().unwrap();
    let excel = fixtures::write_workbook(
        dir.path(),
        "data.xlsx",
        fixtures::workbook(&[&["name", "company"], &["Frank", "A & B <Ltd>"]]).unwrap(),
    );
    let template = fixtures::write_template(dir.path(), "t.docx", &["{{company}}"]);

    let summary = GeneratorBuilder::new()
        .with_excel_path(&excel)
        .with_template_map(TemplateMap::new().with_fallback(&template))
        .with_output_dir(dir.path().join("out"))
        .with_file_name("{company}")
        .build()
        .unwrap()
        .run()
        .unwrap();

    let path = &summary.generated[0];
    assert_eq!(path.file_name().unwrap(), "A & B _Ltd_.docx");
    assert!(fixtures::read_document(path).contains("A &amp; B &lt;Ltd&gt;"));
}

#[test]
fn test_corrupt_template_fails_only_its_records() {
    let setup = BasicSetup::new();
    let broken = setup.dir.path().join("broken.docx");
    fs::write(&broken, b"this is not a zip archive").unwrap();
    let map = TemplateMap::new().with_rule(
        SelectorRule::new("category")
            .route("A", &setup.tpl_a)
            .route("B", &broken),
    );

    let summary = setup.builder().with_template_map(map).build().unwrap().run().unwrap();

    assert_eq!(summary.generated, vec![setup.out().join("Alice_A.docx")]);
    let rows: Vec<u32> = summary.failures.iter().map(|f| f.row).collect();
    assert_eq!(rows, vec![3, 4]);
    assert!(matches!(
        summary.failures[0].error,
        XlsxToDocxError::UnboundPlaceholder { .. }
    ));
}

#[test]
fn test_missing_template_file_fails_only_its_records() {
    let setup = BasicSetup::new();
    let gone = setup.dir.path().join("gone.docx");
    let map = TemplateMap::new().with_rule(
        SelectorRule::new("category")
            .route("A", &setup.tpl_a)
            .route("B", &gone),
    );
    let summary = setup
        .builder()
        .with_template_map(map)
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(summary.generated, vec![setup.out().join("Alice_A.docx")]);
    assert_eq!(summary.failures.len(), 2);

    let bob = &summary.failures[0];
    assert_eq!(bob.row, 3);
    match &bob.error {
        XlsxToDocxError::UnboundPlaceholder { template, message } => {
            assert_eq!(template, &gone);
            assert!(message.contains("cannot read template file"));
        }
        other => panic!("Expected UnboundPlaceholder, got {:?}", other),
    }
    assert!(matches!(
        summary.failures[1].error,
        XlsxToDocxError::TemplateNotFound { row: 4, .. }
    ));
}

#[test]
fn test_unused_missing_template_does_not_stop_run() {
    let setup = BasicSetup::new();
    let map = setup.map().with_rule(
        SelectorRule::new("category").route("Z", setup.dir.path().join("gone.docx")),
    );
    let summary = setup
        .builder()
        .with_template_map(map)
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(summary.generated.len(), 2);
    assert_eq!(summary.failures.len(), 1);
}

#[test]
fn test_overwrite_within_run_reports_replaced_row() {
    let setup = BasicSetup::new();
    let summary = setup
        .builder()
        .with_file_name("report")
        .build()
        .unwrap()
        .run()
        .unwrap();

    let report = setup.out().join("report.docx");
    assert_eq!(summary.generated, vec![report.clone(), report.clone()]);
    assert_eq!(summary.overwritten_rows, vec![2]);
    assert_eq!(fixtures::list_files(&setup.out()), vec!["report.docx"]);
    assert!(fixtures::document_text(&report).starts_with("Template B"));
}

#[test]
fn test_no_readable_template_is_fatal() {
    let setup = BasicSetup::new();
    let map = TemplateMap::new().with_fallback(setup.dir.path().join("nope.docx"));
    let result = setup.builder().with_template_map(map).build().unwrap().run();

    assert!(matches!(result, Err(XlsxToDocxError::Config(_))));
    assert!(!setup.out().exists());
}

#[test]
fn test_missing_excel_is_data_load_error() {
    let setup = BasicSetup::new();
    let result = setup
        .builder()
        .with_excel_path(setup.dir.path().join("missing.xlsx"))
        .build()
        .unwrap()
        .run();

    assert!(matches!(result, Err(XlsxToDocxError::DataLoad { .. })));
}

#[test]
fn test_config_file_pipeline() {
    let setup = BasicSetup::new();
    let config_path = setup.dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{
            "excel_path": "data.xlsx",
            "sheet": "Records",
            "template_map": {
                "rules": [{ "field": "category", "routes": { "A": "tplA.docx", "B": "tplB.docx" } }]
            },
            "output_dir": "out",
            "missing_placeholder": "-",
            "on_name_collision": "overwrite",
            "file_name": "{name}"
        }"#,
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    let summary = config.into_builder().build().unwrap().run().unwrap();

    assert_eq!(summary.generated.len(), 2);
    assert_eq!(
        fixtures::document_text(&setup.out().join("Alice.docx")),
        "Template A\nName: Alice\nAmount: -"
    );
}

#[test]
fn test_list_fields_and_placeholders() {
    let setup = BasicSetup::new();
    let fields =
        xlsxdocgen::Generator::fields(&setup.excel, &xlsxdocgen::SheetSelector::Index(0)).unwrap();
    assert_eq!(fields, vec!["name", "category", "amount"]);

    let template = xlsxdocgen::DocxTemplate::open(&setup.tpl_b).unwrap();
    assert_eq!(template.placeholders(), &["name", "amount"]);
    assert_eq!(template.path(), Path::new(&setup.tpl_b));
}
