use crate::install::error::InstallError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A program and its arguments, run from the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Seam between the installer and the outside world.
pub trait CommandRunner {
    fn run(&mut self, command: &CommandSpec) -> Result<(), InstallError>;
}

/// Runs commands as child processes, blocking until each one exits.
///
/// Output is inherited so the user sees Composer's progress directly.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    working_dir: PathBuf,
}

impl ProcessRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&mut self, command: &CommandSpec) -> Result<(), InstallError> {
        tracing::info!(%command, "running");
        let status = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| InstallError::ExternalCommandFailure {
                command: command.to_string(),
                status: format!("failed to start: {e}"),
            })?;

        if !status.success() {
            return Err(InstallError::ExternalCommandFailure {
                command: command.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}
