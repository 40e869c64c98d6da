//! deploykit: idempotent installer that prepares a Laravel application for
//! container deployment.
//!
//! The installer runs Composer, publishes stub files and applies guarded
//! text edits to project files. A second run on an installed project
//! changes nothing.
//!
//! # Architecture
//!
//! All text edits compile down to a single primitive: [`TextEdit`], a
//! verified byte-span replacement. A [`PatchRule`] decides *where* the span
//! is and whether it is already applied; the [`FileMutator`] runs an ordered
//! rule list over one file and writes it back at most once.
//!
//! # Safety
//!
//! - Every rule carries its own guard; re-applying it is a no-op
//! - Atomic file writes (tempfile + fsync + rename)
//! - Project boundary enforcement for every write
//! - Malformed targets abort before anything is written
//!
//! # Example
//!
//! ```
//! use deploykit::patch::{patch_text, PatchRule};
//!
//! let rule = PatchRule::replace_key("queue", "QUEUE_CONNECTION", "redis");
//! let env = "QUEUE_CONNECTION=database\n";
//!
//! let patched = patch_text(env, &rule).unwrap();
//! assert_eq!(patched, "QUEUE_CONNECTION=redis\n");
//! assert_eq!(patch_text(&patched, &rule).unwrap(), patched);
//! ```

pub mod config;
pub mod edit;
pub mod install;
pub mod manifest;
pub mod mutator;
pub mod patch;
pub mod publish;
pub mod safety;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, InstallerConfig};
pub use edit::{atomic_write, EditError, TextEdit};
pub use install::{InstallChoice, InstallError, InstallSummary, Installer, Subsystem};
pub use manifest::{merge_manifest, ManifestEdit, ManifestReport};
pub use mutator::{FileMutator, MutateError, MutationMode, MutationReport, Requirement};
pub use patch::{PatchError, PatchOutcome, PatchRule, Transform};
pub use publish::{PublishError, PublishOutcome, StubEntry, StubKind, StubPublisher};
pub use safety::{ProjectGuard, SafetyError};
