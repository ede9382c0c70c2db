use std::path::{Path, PathBuf};

use assert_cmd::Command;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use predicates::prelude::*;
use tempfile::TempDir;

/// One-page PDF whose text layer holds `lines`.
fn text_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("TL", vec![14.into()]),
        Operation::new("Td", vec![40.into(), 780.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut data = Vec::new();
    doc.save_to(&mut data).unwrap();
    data
}

fn receipt_pdf(dir: &Path) -> PathBuf {
    let path = dir.join("receipt.pdf");
    let pdf = text_pdf(&[
        "GREENLEAF GROCERY",
        "Date: 03/14/2024",
        "Organic Bananas 3.49",
        "Whole Milk 4.29",
        "TOTAL 27.85",
    ]);
    std::fs::write(&path, pdf).unwrap();
    path
}

/// `rcpt` with configuration and database isolated in `dir`.
fn rcpt(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("rcpt").unwrap();
    cmd.env("XDG_CONFIG_HOME", dir.path())
        .env("RCPT_DATABASE_PATH", dir.path().join("receipts.db"))
        .env_remove("RCPT_OCR_MODEL_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    rcpt(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_process_missing_file() {
    let dir = TempDir::new().unwrap();
    rcpt(&dir)
        .args(["process", "does-not-exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_process_rejects_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "TOTAL 9.99").unwrap();

    rcpt(&dir)
        .arg("process")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file type"));
}

#[test]
fn test_process_text_pdf_as_json() {
    let dir = TempDir::new().unwrap();
    let pdf = receipt_pdf(dir.path());

    rcpt(&dir)
        .args(["process", "--text-only"])
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains("pdf_text_layer"))
        .stdout(predicate::str::contains("GREENLEAF"));
}

#[test]
fn test_process_save_then_export() {
    let dir = TempDir::new().unwrap();
    let pdf = receipt_pdf(dir.path());

    rcpt(&dir)
        .args(["process", "--text-only", "--save", "--format", "text"])
        .arg(&pdf)
        .assert()
        .success()
        .stderr(predicate::str::contains("Saved receipt #1"));

    rcpt(&dir)
        .args(["export", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("id,vendor,transaction_date,amount"))
        .stdout(predicate::str::contains("2024-03-14,27.85"));

    rcpt(&dir)
        .args(["export", "--format", "json", "--min-amount", "100"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]"));
}

#[test]
fn test_export_rejects_inverted_range() {
    let dir = TempDir::new().unwrap();
    rcpt(&dir)
        .args(["export", "--min-amount", "10", "--max-amount", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("amount_max"));
}

#[test]
fn test_config_init_get_set() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("rcpt.json");
    let config = config.to_str().unwrap();

    rcpt(&dir)
        .args(["--config", config, "config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    rcpt(&dir)
        .args(["--config", config, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    rcpt(&dir)
        .args(["--config", config, "config", "get", "server.port"])
        .assert()
        .success()
        .stdout(predicate::str::diff("8501\n"));

    rcpt(&dir)
        .args(["--config", config, "config", "set", "extraction.review_threshold", "0.8"])
        .assert()
        .success();

    rcpt(&dir)
        .args(["--config", config, "config", "get", "extraction.review_threshold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.8"));

    rcpt(&dir)
        .args(["--config", config, "config", "get", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));
}
