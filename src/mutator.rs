//! File mutator - loads one target file, runs an ordered rule list over it
//! and writes the result back at most once.
//!
//! Rules see the effects of earlier rules in the same call. Preconditions,
//! on the other hand, are checked against the file as it was loaded, so a
//! rule that rewrites the precondition line cannot disable its siblings.

use crate::edit::{atomic_write, EditError};
use crate::patch::{apply_rule, PatchError, PatchOutcome, PatchRule};
use similar::{ChangeTag, TextDiff};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Missing file is a hard error.
    Required,
    /// Missing file is logged and skipped.
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMode {
    Write,
    /// Evaluate every rule but never touch the disk.
    Check,
}

#[derive(Error, Debug)]
pub enum MutateError {
    #[error("required file is missing: {}", path.display())]
    MissingTarget { path: PathBuf },

    #[error("malformed target {}: {source}", path.display())]
    MalformedTarget {
        path: PathBuf,
        #[source]
        source: PatchError,
    },

    /// A rule that could never be satisfied, whatever the file holds.
    #[error("invalid rule for {}: {source}", path.display())]
    InvalidRule {
        path: PathBuf,
        #[source]
        source: PatchError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: EditError,
    },
}

/// What a mutator call did to its file. Purely observational.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationReport {
    pub path: PathBuf,
    /// Ids of rules that changed the text, in application order.
    pub fired: Vec<String>,
    /// Ids of rules that did nothing, with the reason.
    pub skipped: Vec<(String, String)>,
    /// Whether the final text differs from what was loaded.
    pub modified: bool,
    /// Optional target that did not exist.
    pub missing: bool,
    original: String,
    patched: String,
}

impl MutationReport {
    fn missing(path: PathBuf) -> Self {
        Self {
            path,
            missing: true,
            ..Self::default()
        }
    }

    /// Unified-style diff between loaded and patched text.
    pub fn diff(&self) -> String {
        let mut out = String::new();
        if !self.modified {
            return out;
        }
        let _ = writeln!(out, "--- {} (original)", self.path.display());
        let _ = writeln!(out, "+++ {} (patched)", self.path.display());
        let diff = TextDiff::from_lines(&self.original, &self.patched);
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
                ChangeTag::Equal => ' ',
            };
            let _ = write!(out, "{sign}{change}");
            if change.missing_newline() {
                out.push('\n');
            }
        }
        out
    }
}

/// Ordered rule list bound to one file.
#[derive(Debug, Clone)]
pub struct FileMutator {
    path: PathBuf,
    requirement: Requirement,
    rules: Vec<PatchRule>,
}

impl FileMutator {
    pub fn new(path: impl Into<PathBuf>, requirement: Requirement) -> Self {
        Self {
            path: path.into(),
            requirement,
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: PatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = PatchRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run(&self, mode: MutationMode) -> Result<MutationReport, MutateError> {
        if !self.path.exists() {
            return match self.requirement {
                Requirement::Required => Err(MutateError::MissingTarget {
                    path: self.path.clone(),
                }),
                Requirement::Optional => {
                    tracing::warn!(path = %self.path.display(), "optional file missing, skipping");
                    Ok(MutationReport::missing(self.path.clone()))
                }
            };
        }

        let original = fs::read_to_string(&self.path).map_err(|source| MutateError::Io {
            path: self.path.clone(),
            source,
        })?;

        let (patched, fired, skipped) = self.apply_all(&original)?;
        let modified = patched != original;

        if modified && mode == MutationMode::Write {
            atomic_write(&self.path, patched.as_bytes()).map_err(|source| MutateError::Write {
                path: self.path.clone(),
                source,
            })?;
            tracing::info!(path = %self.path.display(), rules = fired.len(), "file updated");
        }

        Ok(MutationReport {
            path: self.path.clone(),
            fired,
            skipped,
            modified,
            missing: false,
            original,
            patched,
        })
    }

    #[allow(clippy::type_complexity)]
    fn apply_all(
        &self,
        original: &str,
    ) -> Result<(String, Vec<String>, Vec<(String, String)>), MutateError> {
        let mut current = original.to_string();
        let mut fired = Vec::new();
        let mut skipped = Vec::new();

        for rule in &self.rules {
            if let Some(condition) = &rule.precondition {
                if !condition.holds(original) {
                    tracing::debug!(rule = %rule.id, "precondition not met");
                    skipped.push((rule.id.to_string(), format!("requires {condition}")));
                    continue;
                }
            }

            match apply_rule(&current, rule) {
                Ok(PatchOutcome::Applied(next)) => {
                    tracing::debug!(rule = %rule.id, kind = rule.transform.kind(), "rule fired");
                    current = next;
                    fired.push(rule.id.to_string());
                }
                Ok(PatchOutcome::AlreadyApplied { reason }) => {
                    tracing::debug!(rule = %rule.id, %reason, "rule skipped");
                    skipped.push((rule.id.to_string(), reason));
                }
                Err(source @ PatchError::InvalidRule { .. }) => {
                    return Err(MutateError::InvalidRule {
                        path: self.path.clone(),
                        source,
                    })
                }
                Err(source) => {
                    return Err(MutateError::MalformedTarget {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
        }

        Ok((current, fired, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Condition;

    const FRESH_ENV: &str = "APP_NAME=Laravel\nDB_CONNECTION=sqlite\n# DB_HOST=127.0.0.1\n# DB_PORT=3306\n";

    fn db_rules() -> Vec<PatchRule> {
        let sqlite = Condition::LineEquals("DB_CONNECTION=sqlite".into());
        vec![
            PatchRule::replace_key("db-connection", "DB_CONNECTION", "pgsql").when(sqlite.clone()),
            PatchRule::replace_key("db-host", "DB_HOST", "127.0.0.1").when(sqlite.clone()),
            PatchRule::replace_key("db-port", "DB_PORT", "5432").when(sqlite),
        ]
    }

    #[test]
    fn test_required_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileMutator::new(dir.path().join(".env"), Requirement::Required)
            .rules(db_rules())
            .run(MutationMode::Write);
        assert!(matches!(result, Err(MutateError::MissingTarget { .. })));
    }

    #[test]
    fn test_optional_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = FileMutator::new(dir.path().join(".env.example"), Requirement::Optional)
            .rules(db_rules())
            .run(MutationMode::Write)
            .unwrap();
        assert!(report.missing);
        assert!(!report.modified);
        assert!(!dir.path().join(".env.example").exists());
    }

    #[test]
    fn test_preconditions_see_loaded_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, FRESH_ENV).unwrap();

        let report = FileMutator::new(&path, Requirement::Required)
            .rules(db_rules())
            .run(MutationMode::Write)
            .unwrap();

        assert_eq!(report.fired, vec!["db-connection", "db-host", "db-port"]);
        assert!(report.modified);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "APP_NAME=Laravel\nDB_CONNECTION=pgsql\nDB_HOST=127.0.0.1\nDB_PORT=5432\n"
        );
    }

    #[test]
    fn test_second_run_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, FRESH_ENV).unwrap();

        let mutator = FileMutator::new(&path, Requirement::Required).rules(db_rules());
        mutator.run(MutationMode::Write).unwrap();
        let first = fs::read(&path).unwrap();

        let report = mutator.run(MutationMode::Write).unwrap();
        assert!(!report.modified);
        assert!(report.fired.is_empty());
        assert_eq!(report.skipped.len(), 3);
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_check_mode_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, FRESH_ENV).unwrap();

        let report = FileMutator::new(&path, Requirement::Required)
            .rules(db_rules())
            .run(MutationMode::Check)
            .unwrap();

        assert!(report.modified);
        assert_eq!(fs::read_to_string(&path).unwrap(), FRESH_ENV);
        let diff = report.diff();
        assert!(diff.contains("-DB_CONNECTION=sqlite"));
        assert!(diff.contains("+DB_CONNECTION=pgsql"));
    }

    #[test]
    fn test_malformed_target_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("providers.php");
        fs::write(&path, "<?php\n\n// no array here\n").unwrap();

        let result = FileMutator::new(&path, Requirement::Required)
            .rule(PatchRule::insert_before_closing(
                "provider",
                "return [",
                "];",
                "X::class",
                "X::class,",
            ))
            .run(MutationMode::Write);

        assert!(matches!(result, Err(MutateError::MalformedTarget { .. })));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "<?php\n\n// no array here\n"
        );
    }

    #[test]
    fn test_invalid_rule_is_not_blamed_on_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, FRESH_ENV).unwrap();

        let result = FileMutator::new(&path, Requirement::Required)
            .rule(PatchRule::replace_key("redis", "REDIS_CLIENT", "phpredis\rX=1"))
            .run(MutationMode::Write);

        let err = result.unwrap_err();
        assert!(matches!(err, MutateError::InvalidRule { .. }));
        assert!(err.to_string().starts_with("invalid rule for"));
        assert_eq!(fs::read_to_string(&path).unwrap(), FRESH_ENV);
    }
}
