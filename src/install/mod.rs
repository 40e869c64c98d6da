//! The installer proper: choice resolution, the catalog of stubs and rules,
//! external commands, and the run that ties them together.

pub mod catalog;
pub mod choice;
pub mod error;
pub mod orchestrator;
pub mod runner;
pub mod secrets;
pub mod subsystem;

pub use choice::{
    resolve_choice, sanitize_project_name, ChoiceArgs, DialoguerPrompter, InstallChoice, Prompter,
};
pub use error::InstallError;
pub use orchestrator::{InstallSummary, Installer, StatusReport, Step};
pub use runner::{CommandRunner, CommandSpec, ProcessRunner};
pub use secrets::ReverbCredentials;
pub use subsystem::{Subsystem, ALWAYS_ON_PACKAGE};
