//! Golden tests for the composer.json merge.

use deploykit::manifest::{merge_manifest, ManifestEdit};
use deploykit::mutator::{MutateError, MutationMode};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn write_manifest(content: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("composer.json");
    fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn test_merge_preserves_unrelated_keys_and_order() {
    let (_dir, path) = write_manifest(r#"{"scripts":{"build":"x"},"other":{"k":1}}"#);
    let edit = ManifestEdit::default().script("dev", json!("npm run dev"));

    let report = merge_manifest(&path, &edit, MutationMode::Write).unwrap();
    assert!(report.modified);
    assert_eq!(report.changes, vec!["scripts.dev".to_string()]);

    let expected = r#"{
    "scripts": {
        "build": "x",
        "dev": "npm run dev"
    },
    "other": {
        "k": 1
    }
}
"#;
    assert_eq!(fs::read_to_string(&path).unwrap(), expected);

    let report = merge_manifest(&path, &edit, MutationMode::Write).unwrap();
    assert!(!report.modified);
    assert_eq!(fs::read_to_string(&path).unwrap(), expected);
}

#[test]
fn test_merge_adds_dont_discover_once() {
    let (_dir, path) = write_manifest(
        r#"{
    "name": "laravel/laravel",
    "extra": {
        "laravel": {
            "dont-discover": ["barryvdh/laravel-debugbar"]
        }
    }
}
"#,
    );
    let edit = ManifestEdit::default().dont_discover("laravel/telescope");

    merge_manifest(&path, &edit, MutationMode::Write).unwrap();
    merge_manifest(&path, &edit, MutationMode::Write).unwrap();

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        doc["extra"]["laravel"]["dont-discover"],
        json!(["barryvdh/laravel-debugbar", "laravel/telescope"])
    );
}

#[test]
fn test_unchanged_manifest_keeps_original_formatting() {
    // Two-space indent survives because nothing structural changed
    let original = "{\n  \"scripts\": {\n    \"deploy\": [\"a\"]\n  }\n}\n";
    let (_dir, path) = write_manifest(original);
    let edit = ManifestEdit::default().script("deploy", json!(["a"]));

    let report = merge_manifest(&path, &edit, MutationMode::Write).unwrap();
    assert!(!report.modified);
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn test_check_mode_reports_without_writing() {
    let original = r#"{"name":"app"}"#;
    let (_dir, path) = write_manifest(original);
    let edit = ManifestEdit::default().script("deploy", json!(["a"]));

    let report = merge_manifest(&path, &edit, MutationMode::Check).unwrap();
    assert!(report.modified);
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn test_invalid_json_is_malformed_target() {
    let (_dir, path) = write_manifest("{ not json");
    let edit = ManifestEdit::default().script("deploy", json!([]));

    let err = merge_manifest(&path, &edit, MutationMode::Write).unwrap_err();
    assert!(matches!(err, MutateError::MalformedTarget { .. }));
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn test_missing_manifest() {
    let dir = TempDir::new().unwrap();
    let edit = ManifestEdit::default().script("deploy", json!([]));
    let err = merge_manifest(&dir.path().join("composer.json"), &edit, MutationMode::Write)
        .unwrap_err();
    assert!(matches!(err, MutateError::MissingTarget { .. }));
}
