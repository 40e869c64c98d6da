use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Directories the installer must never write into; they belong to the
/// package managers.
const FORBIDDEN_DIRS: &[&str] = &["vendor", "node_modules"];

/// Boundary checks that keep every write inside the target project.
#[derive(Debug, Clone)]
pub struct ProjectGuard {
    /// Canonical path to project root
    project_root: PathBuf,
    /// Canonical-rooted directories that are off limits
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside project: {path} (project: {project})")]
    OutsideProject { path: PathBuf, project: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Refusing to target the project root itself")]
    ProjectRoot,

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl ProjectGuard {
    /// Create a guard for the given root.
    ///
    /// The root is canonicalized so symlinked checkouts compare correctly.
    pub fn new(project_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let project_root = project_root.as_ref().canonicalize()?;
        let forbidden_paths = FORBIDDEN_DIRS
            .iter()
            .map(|dir| project_root.join(dir))
            .collect();

        Ok(Self {
            project_root,
            forbidden_paths,
        })
    }

    /// Check that `path` is a safe write target and return its resolved
    /// absolute form.
    ///
    /// The path does not need to exist yet: the deepest existing ancestor is
    /// canonicalized (resolving symlinks) and the missing tail re-attached.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        };

        let resolved = resolve_with_missing_tail(&absolute).ok_or_else(|| {
            SafetyError::OutsideProject {
                path: absolute.clone(),
                project: self.project_root.clone(),
            }
        })??;

        self.check_resolved(&resolved)?;

        Ok(resolved)
    }

    fn check_resolved(&self, resolved: &Path) -> Result<(), SafetyError> {
        if !resolved.starts_with(&self.project_root) {
            return Err(SafetyError::OutsideProject {
                path: resolved.to_path_buf(),
                project: self.project_root.clone(),
            });
        }

        if resolved == self.project_root {
            return Err(SafetyError::ProjectRoot);
        }

        for forbidden in &self.forbidden_paths {
            if resolved.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: resolved.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}

/// Canonicalize the deepest existing ancestor of `path` and append the rest.
///
/// Returns `None` when the missing tail contains `..`, which cannot be
/// resolved without the directories existing.
fn resolve_with_missing_tail(path: &Path) -> Option<Result<PathBuf, SafetyError>> {
    let mut existing = path;
    let mut tail = Vec::new();

    while !existing.exists() {
        let name = existing.file_name()?;
        tail.push(name.to_os_string());
        existing = existing.parent()?;
    }

    if path
        .strip_prefix(existing)
        .ok()?
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return None;
    }

    let mut resolved = match existing.canonicalize() {
        Ok(p) => p,
        Err(e) => return Some(Err(e.into())),
    };
    for name in tail.iter().rev() {
        resolved.push(name);
    }
    Some(Ok(resolved))
}
