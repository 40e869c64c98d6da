//! Stub publisher - copies template files and directory trees into the
//! target project.
//!
//! Existing destinations are skipped unless `force` is set, in which case
//! they are replaced wholesale (no merging of directory trees). The one
//! exception is the prepend-merge kind, used for the shared documentation
//! file: it is idempotent by marker and ignores `force`.

use crate::edit::{atomic_write, EditError};
use crate::install::Subsystem;
use crate::safety::{ProjectGuard, SafetyError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Line placed between new and existing content on a prepend merge.
pub const MERGE_DIVIDER: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubKind {
    File,
    Directory,
    /// Prepend stub content to an existing file unless `marker` is present.
    PrependMerge { marker: &'static str },
}

/// One publishable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubEntry {
    /// Relative to the stub root.
    pub source: &'static str,
    /// Relative to the project root.
    pub destination: &'static str,
    pub label: &'static str,
    pub kind: StubKind,
    /// Only published when this subsystem is selected.
    pub gate: Option<Subsystem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PublishOutcome should be reported"]
pub enum PublishOutcome {
    Published { destination: PathBuf },
    Overwritten { destination: PathBuf },
    Merged { destination: PathBuf },
    Skipped { destination: PathBuf, reason: String },
}

impl PublishOutcome {
    pub fn destination(&self) -> &Path {
        match self {
            PublishOutcome::Published { destination }
            | PublishOutcome::Overwritten { destination }
            | PublishOutcome::Merged { destination }
            | PublishOutcome::Skipped { destination, .. } => destination,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PublishOutcome::Skipped { .. })
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Published { destination } => {
                write!(f, "published {}", destination.display())
            }
            PublishOutcome::Overwritten { destination } => {
                write!(f, "overwrote {}", destination.display())
            }
            PublishOutcome::Merged { destination } => {
                write!(f, "merged into {}", destination.display())
            }
            PublishOutcome::Skipped {
                destination,
                reason,
            } => write!(f, "skipped {} ({})", destination.display(), reason),
        }
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("stub source is missing: {}", path.display())]
    MissingSource { path: PathBuf },

    #[error("refusing to publish '{label}': {source}")]
    Unsafe {
        label: String,
        #[source]
        source: SafetyError,
    },

    #[error("failed to publish '{label}' to {}: {source}", destination.display())]
    Io {
        label: String,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct StubPublisher {
    stub_root: PathBuf,
    guard: ProjectGuard,
    force: bool,
}

impl StubPublisher {
    pub fn new(stub_root: impl Into<PathBuf>, guard: ProjectGuard, force: bool) -> Self {
        Self {
            stub_root: stub_root.into(),
            guard,
            force,
        }
    }

    pub fn publish(&self, entry: &StubEntry) -> Result<PublishOutcome, PublishError> {
        let (source, destination) = self.resolve(entry)?;
        let io_err = |source: std::io::Error| PublishError::Io {
            label: entry.label.to_string(),
            destination: destination.clone(),
            source,
        };

        let outcome = match entry.kind {
            StubKind::File => self.publish_file(&source, &destination).map_err(io_err)?,
            StubKind::Directory => self.publish_dir(&source, &destination).map_err(io_err)?,
            StubKind::PrependMerge { marker } => {
                prepend_merge(&source, &destination, marker).map_err(io_err)?
            }
        };

        tracing::debug!(stub = entry.label, %outcome, "stub processed");
        Ok(outcome)
    }

    /// What `publish` would do, without touching the disk.
    pub fn preview(&self, entry: &StubEntry) -> Result<PublishOutcome, PublishError> {
        let (_, destination) = self.resolve(entry)?;

        if !destination.exists() {
            return Ok(PublishOutcome::Published { destination });
        }

        Ok(match entry.kind {
            StubKind::PrependMerge { marker } => {
                let existing = fs::read_to_string(&destination).map_err(|e| PublishError::Io {
                    label: entry.label.to_string(),
                    destination: destination.clone(),
                    source: e,
                })?;
                if existing.contains(marker) {
                    PublishOutcome::Skipped {
                        destination,
                        reason: "marker present".to_string(),
                    }
                } else {
                    PublishOutcome::Merged { destination }
                }
            }
            _ if self.force => PublishOutcome::Overwritten { destination },
            _ => PublishOutcome::Skipped {
                destination,
                reason: "already exists".to_string(),
            },
        })
    }

    fn resolve(&self, entry: &StubEntry) -> Result<(PathBuf, PathBuf), PublishError> {
        let source = self.stub_root.join(entry.source);
        let source_ok = match entry.kind {
            StubKind::Directory => source.is_dir(),
            _ => source.is_file(),
        };
        if !source_ok {
            return Err(PublishError::MissingSource { path: source });
        }

        let destination =
            self.guard
                .validate_path(entry.destination)
                .map_err(|source| PublishError::Unsafe {
                    label: entry.label.to_string(),
                    source,
                })?;

        Ok((source, destination))
    }

    fn publish_file(&self, source: &Path, destination: &Path) -> std::io::Result<PublishOutcome> {
        let existed = destination.exists();
        if existed && !self.force {
            return Ok(PublishOutcome::Skipped {
                destination: destination.to_path_buf(),
                reason: "already exists".to_string(),
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        if destination.is_dir() {
            fs::remove_dir_all(destination)?;
        }
        // An overwritten file keeps its mode; a new one takes the stub's
        let fresh = !destination.is_file();

        let content = fs::read(source)?;
        atomic_write(destination, &content).map_err(into_io)?;
        if fresh {
            fs::set_permissions(destination, fs::metadata(source)?.permissions())?;
        }

        Ok(if existed {
            PublishOutcome::Overwritten {
                destination: destination.to_path_buf(),
            }
        } else {
            PublishOutcome::Published {
                destination: destination.to_path_buf(),
            }
        })
    }

    fn publish_dir(&self, source: &Path, destination: &Path) -> std::io::Result<PublishOutcome> {
        let existed = destination.exists();
        if existed && !self.force {
            return Ok(PublishOutcome::Skipped {
                destination: destination.to_path_buf(),
                reason: "already exists".to_string(),
            });
        }

        if existed {
            if destination.is_dir() {
                fs::remove_dir_all(destination)?;
            } else {
                fs::remove_file(destination)?;
            }
        }

        copy_tree(source, destination)?;

        Ok(if existed {
            PublishOutcome::Overwritten {
                destination: destination.to_path_buf(),
            }
        } else {
            PublishOutcome::Published {
                destination: destination.to_path_buf(),
            }
        })
    }
}

/// Recursively copy `source` to `destination`, keeping relative layout.
pub fn copy_tree(source: &Path, destination: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn prepend_merge(
    source: &Path,
    destination: &Path,
    marker: &str,
) -> std::io::Result<PublishOutcome> {
    let stub = fs::read_to_string(source)?;

    if !destination.exists() {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(destination, stub.as_bytes()).map_err(into_io)?;
        fs::set_permissions(destination, fs::metadata(source)?.permissions())?;
        return Ok(PublishOutcome::Published {
            destination: destination.to_path_buf(),
        });
    }

    let existing = fs::read_to_string(destination)?;
    if existing.contains(marker) {
        return Ok(PublishOutcome::Skipped {
            destination: destination.to_path_buf(),
            reason: "marker present".to_string(),
        });
    }

    let merged = merged_document(&stub, &existing);
    atomic_write(destination, merged.as_bytes()).map_err(into_io)?;

    Ok(PublishOutcome::Merged {
        destination: destination.to_path_buf(),
    })
}

/// `stub` placed ahead of `existing`, separated by [`MERGE_DIVIDER`].
pub fn merged_document(stub: &str, existing: &str) -> String {
    format!(
        "{}\n\n{MERGE_DIVIDER}\n\n{existing}",
        stub.trim_end_matches(['\r', '\n'])
    )
}

fn into_io(err: EditError) -> std::io::Error {
    match err {
        EditError::Io(e) => e,
        other => std::io::Error::other(other.to_string()),
    }
}
