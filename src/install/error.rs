use crate::config::ConfigError;
use crate::mutator::MutateError;
use crate::patch::PatchError;
use crate::publish::PublishError;
use crate::safety::SafetyError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal installer failures. Every variant aborts the run; already-applied
/// steps are left in place since each one is safe to re-run.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("required file is missing: {}", path.display())]
    MissingTarget { path: PathBuf },

    #[error("cannot patch {}: {reason}", path.display())]
    MalformedTarget { path: PathBuf, reason: String },

    #[error("command `{command}` failed: {status}")]
    ExternalCommandFailure { command: String, status: String },

    #[error("invalid project name '{0}': nothing left after sanitizing")]
    InvalidProjectName(String),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Mutate(MutateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MutateError> for InstallError {
    fn from(err: MutateError) -> Self {
        match err {
            MutateError::MissingTarget { path } => InstallError::MissingTarget { path },
            MutateError::MalformedTarget { path, source } => InstallError::MalformedTarget {
                path,
                reason: match source {
                    PatchError::MalformedTarget { reason, .. } => reason,
                    other => other.to_string(),
                },
            },
            other => InstallError::Mutate(other),
        }
    }
}
