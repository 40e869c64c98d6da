//! Structured merge into `composer.json`.
//!
//! The manifest is parsed, mutated as a JSON document and re-serialized; it
//! is never patched as text. Key order is preserved (`serde_json` is built
//! with `preserve_order`) and new keys land at the end of their object.

use crate::edit::atomic_write;
use crate::mutator::{MutateError, MutationMode};
use crate::patch::PatchError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Changes to merge into a Composer manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestEdit {
    /// `scripts.<name>` entries, inserted or replaced when different.
    pub scripts: Vec<(String, Value)>,
    /// Packages appended to `extra.laravel.dont-discover` when absent.
    pub dont_discover: Vec<String>,
}

impl ManifestEdit {
    pub fn script(mut self, name: impl Into<String>, value: Value) -> Self {
        self.scripts.push((name.into(), value));
        self
    }

    pub fn dont_discover(mut self, package: impl Into<String>) -> Self {
        self.dont_discover.push(package.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty() && self.dont_discover.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestReport {
    pub path: PathBuf,
    /// Human-readable description of each change, e.g. `scripts.deploy`.
    pub changes: Vec<String>,
    pub modified: bool,
}

/// Merge `edit` into the manifest at `path`.
pub fn merge_manifest(
    path: &Path,
    edit: &ManifestEdit,
    mode: MutationMode,
) -> Result<ManifestReport, MutateError> {
    if !path.exists() {
        return Err(MutateError::MissingTarget {
            path: path.to_path_buf(),
        });
    }

    let original = fs::read_to_string(path).map_err(|source| MutateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let malformed = |reason: String| MutateError::MalformedTarget {
        path: path.to_path_buf(),
        source: PatchError::MalformedTarget {
            rule: "composer-manifest".to_string(),
            reason,
        },
    };

    let mut document: Value =
        serde_json::from_str(&original).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
    let changes = apply_edit(&mut document, edit).map_err(malformed)?;

    let rendered = render(&document).map_err(|e| malformed(e.to_string()))?;
    // Only structural changes count; formatting drift alone is left alone
    let modified = !changes.is_empty();

    if modified && mode == MutationMode::Write {
        atomic_write(path, rendered.as_bytes()).map_err(|source| MutateError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), changes = changes.len(), "manifest updated");
    }

    Ok(ManifestReport {
        path: path.to_path_buf(),
        changes,
        modified,
    })
}

/// Apply `edit` to an in-memory manifest, returning what changed.
pub fn apply_edit(document: &mut Value, edit: &ManifestEdit) -> Result<Vec<String>, String> {
    let root = document
        .as_object_mut()
        .ok_or_else(|| "manifest root is not an object".to_string())?;
    let mut changes = Vec::new();

    if !edit.scripts.is_empty() {
        let scripts = object_entry(root, "scripts")?;
        for (name, value) in &edit.scripts {
            if scripts.get(name) != Some(value) {
                scripts.insert(name.clone(), value.clone());
                changes.push(format!("scripts.{name}"));
            }
        }
    }

    if !edit.dont_discover.is_empty() {
        let extra = object_entry(root, "extra")?;
        let laravel = object_entry(extra, "laravel")?;
        let list = laravel
            .entry("dont-discover")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| "extra.laravel.dont-discover is not an array".to_string())?;

        for package in &edit.dont_discover {
            if !list.iter().any(|v| v.as_str() == Some(package.as_str())) {
                list.push(Value::String(package.clone()));
                changes.push(format!("extra.laravel.dont-discover += {package}"));
            }
        }
    }

    Ok(changes)
}

fn object_entry<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Map<String, Value>, String> {
    map.entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| format!("'{key}' is not an object"))
}

/// Composer-style pretty JSON: four-space indent, trailing newline.
pub fn render(document: &Value) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(String::from_utf8(buf).expect("serde_json only emits UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deploy_edit() -> ManifestEdit {
        ManifestEdit::default()
            .script("deploy", json!(["@php artisan migrate --force"]))
            .dont_discover("laravel/telescope")
    }

    #[test]
    fn test_apply_edit_creates_missing_sections() {
        let mut doc = json!({"name": "laravel/laravel"});
        let changes = apply_edit(&mut doc, &deploy_edit()).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(doc["scripts"]["deploy"][0], "@php artisan migrate --force");
        assert_eq!(doc["extra"]["laravel"]["dont-discover"][0], "laravel/telescope");
    }

    #[test]
    fn test_apply_edit_is_idempotent() {
        let mut doc = json!({"scripts": {}});
        apply_edit(&mut doc, &deploy_edit()).unwrap();
        let changes = apply_edit(&mut doc, &deploy_edit()).unwrap();
        assert!(changes.is_empty());
        assert_eq!(doc["extra"]["laravel"]["dont-discover"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_apply_edit_replaces_different_script() {
        let mut doc = json!({"scripts": {"deploy": "old"}});
        let changes = apply_edit(&mut doc, &deploy_edit()).unwrap();
        assert!(changes.contains(&"scripts.deploy".to_string()));
    }

    #[test]
    fn test_apply_edit_rejects_wrong_types() {
        let mut doc = json!({"scripts": []});
        assert!(apply_edit(&mut doc, &deploy_edit()).is_err());

        let mut doc = json!([1, 2]);
        assert!(apply_edit(&mut doc, &deploy_edit()).is_err());

        let mut doc = json!({"extra": {"laravel": {"dont-discover": "x"}}});
        let edit = ManifestEdit::default().dont_discover("laravel/telescope");
        assert!(apply_edit(&mut doc, &edit).is_err());
    }

    #[test]
    fn test_render_uses_composer_layout() {
        let rendered = render(&json!({"a": {"b": 1}})).unwrap();
        assert_eq!(rendered, "{\n    \"a\": {\n        \"b\": 1\n    }\n}\n");
    }
}
