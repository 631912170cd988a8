//! Command-line contract tests
//!
//! Run with: cargo test -p overlay-cli --test cli_export

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use overlay_cli::run_export;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_letter_pdf(dir: &Path, name: &str) -> PathBuf {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal("Lease")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    doc.save(&path).unwrap();
    path
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

const ELEMENTS: &str = r##"{
    "text": [{ "page": 1, "x": 72, "y": 100, "value": "Approved", "size": 14 }],
    "annotations": [
        { "type": "rectangle", "page": 1, "x": 10, "y": 10, "width": 50, "height": 30, "color": "#ff0000" }
    ]
}"##;

#[test]
fn test_export_writes_edited_copy_next_to_input() {
    let dir = TempDir::new().unwrap();
    let pdf = write_letter_pdf(dir.path(), "lease.pdf");
    let elements = write_file(dir.path(), "elements.json", ELEMENTS);

    let exported = run_export(&pdf, &elements, None, None).unwrap();
    assert_eq!(exported.path, dir.path().join("lease-edited.pdf"));
    assert_eq!(exported.report.text_embedded, 1);
    assert_eq!(exported.report.annotations_drawn, 1);

    let doc = Document::load(&exported.path).unwrap();
    let text = doc.extract_text(&[1]).unwrap();
    assert!(text.contains("Lease"));
    assert!(text.contains("Approved"));
}

#[test]
fn test_export_honors_out_dir_and_config_suffix() {
    let dir = TempDir::new().unwrap();
    let pdf = write_letter_pdf(dir.path(), "lease.pdf");
    let elements = write_file(dir.path(), "elements.json", ELEMENTS);
    let config = write_file(dir.path(), "editor.toml", "output_suffix = \"-signed\"\n");
    let out_dir = dir.path().join("out");

    let exported = run_export(&pdf, &elements, Some(&config), Some(&out_dir)).unwrap();
    assert_eq!(exported.path, out_dir.join("lease-signed.pdf"));
    assert!(exported.path.is_file());
}

#[test]
fn test_unknown_field_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let pdf = write_letter_pdf(dir.path(), "plain.pdf");
    let elements = write_file(
        dir.path(),
        "elements.json",
        r#"{ "fields": [{ "name": "ghost", "value": "boo" }] }"#,
    );

    let exported = run_export(&pdf, &elements, None, None).unwrap();
    assert_eq!(exported.report.fields_applied, 0);
    assert_eq!(exported.report.skipped.len(), 1);
    assert_eq!(exported.report.skipped[0].item, "ghost");
}

#[test]
fn test_missing_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let elements = write_file(dir.path(), "elements.json", "{}");

    let err = run_export(&dir.path().join("nope.pdf"), &elements, None, None).unwrap_err();
    assert!(format!("{err:#}").contains("file does not exist"));
}

#[test]
fn test_malformed_elements_are_rejected() {
    let dir = TempDir::new().unwrap();
    let pdf = write_letter_pdf(dir.path(), "lease.pdf");
    let elements = write_file(
        dir.path(),
        "elements.json",
        r#"{ "annotations": [{ "type": "freeform", "points": [1, 2, 3] }] }"#,
    );

    let err = run_export(&pdf, &elements, None, None).unwrap_err();
    assert!(format!("{err:#}").contains("points"));
    assert!(!dir.path().join("lease-edited.pdf").exists());
}

#[test]
fn test_info_subcommand_succeeds() {
    let dir = TempDir::new().unwrap();
    let pdf = write_letter_pdf(dir.path(), "lease.pdf");
    overlay_cli::run(["overlay-cli".into(), "info".into(), pdf.into_os_string()]).unwrap();
}
