//! Resolution of what a run installs.
//!
//! Flags always win over prompts: `--all` skips prompting entirely, any
//! explicit subsystem flag skips the remaining subsystem prompt, and
//! `--no-interaction` treats everything unset as "no".

use crate::install::error::InstallError;
use crate::install::subsystem::Subsystem;
use dialoguer::{Input, MultiSelect};
use std::collections::BTreeMap;

/// Immutable answer to "what should this run install?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallChoice {
    /// Sanitized name, safe for database and identifier use.
    pub project_name: String,
    /// Name as given by the user.
    pub display_name: String,
    subsystems: BTreeMap<Subsystem, bool>,
    pub force: bool,
}

impl InstallChoice {
    pub fn new(
        display_name: impl Into<String>,
        selected: impl IntoIterator<Item = Subsystem>,
        force: bool,
    ) -> Result<Self, InstallError> {
        let display_name = display_name.into();
        let project_name = sanitize_project_name(&display_name);
        if project_name.is_empty() || project_name.chars().all(|c| c == '_') {
            return Err(InstallError::InvalidProjectName(display_name));
        }

        let mut subsystems: BTreeMap<Subsystem, bool> =
            Subsystem::ALL.into_iter().map(|s| (s, false)).collect();
        for subsystem in selected {
            subsystems.insert(subsystem, true);
        }

        Ok(Self {
            project_name,
            display_name,
            subsystems,
            force,
        })
    }

    pub fn is_selected(&self, subsystem: Subsystem) -> bool {
        self.subsystems.get(&subsystem).copied().unwrap_or(false)
    }

    /// Selected subsystems in [`Subsystem::ALL`] order.
    pub fn selected(&self) -> impl Iterator<Item = Subsystem> + '_ {
        self.subsystems
            .iter()
            .filter(|(_, on)| **on)
            .map(|(subsystem, _)| *subsystem)
    }

    pub fn subsystems(&self) -> &BTreeMap<Subsystem, bool> {
        &self.subsystems
    }
}

/// Map a free-form project name onto `[a-z0-9_]`.
///
/// Surrounding whitespace is dropped; the rest is lowercased and every other
/// character becomes `_`, one for one.
pub fn sanitize_project_name(name: &str) -> String {
    name.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Raw user input, before prompting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceArgs {
    pub project_name: Option<String>,
    pub subsystems: Vec<Subsystem>,
    pub all: bool,
    pub force: bool,
    pub no_interaction: bool,
}

/// Interactive questions the resolver may ask.
pub trait Prompter {
    fn project_name(&mut self, default: &str) -> Result<String, InstallError>;
    fn subsystems(&mut self, options: &[Subsystem]) -> Result<Vec<Subsystem>, InstallError>;
}

/// Terminal prompts via dialoguer.
#[derive(Debug, Default)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn project_name(&mut self, default: &str) -> Result<String, InstallError> {
        Input::<String>::new()
            .with_prompt("Project name")
            .default(default.to_string())
            .interact_text()
            .map_err(|e| InstallError::Prompt(e.to_string()))
    }

    fn subsystems(&mut self, options: &[Subsystem]) -> Result<Vec<Subsystem>, InstallError> {
        let labels: Vec<&str> = options.iter().map(|s| s.label()).collect();
        let picked = MultiSelect::new()
            .with_prompt("Optional subsystems (space to toggle, enter to confirm)")
            .items(&labels)
            .interact()
            .map_err(|e| InstallError::Prompt(e.to_string()))?;
        Ok(picked.into_iter().map(|idx| options[idx]).collect())
    }
}

/// Build the [`InstallChoice`] for a run.
///
/// `default_name` is used when no name was given and prompting is off, and
/// as the prompt default otherwise.
pub fn resolve_choice(
    args: &ChoiceArgs,
    default_name: &str,
    prompter: &mut dyn Prompter,
) -> Result<InstallChoice, InstallError> {
    let name = match &args.project_name {
        Some(name) => name.clone(),
        None if args.no_interaction => default_name.to_string(),
        None => prompter.project_name(default_name)?,
    };

    let selected: Vec<Subsystem> = if args.all {
        Subsystem::ALL.to_vec()
    } else if !args.subsystems.is_empty() || args.no_interaction {
        args.subsystems.clone()
    } else {
        prompter.subsystems(&Subsystem::ALL)?
    };

    let choice = InstallChoice::new(name, selected, args.force)?;
    tracing::info!(
        project = %choice.project_name,
        subsystems = ?choice.selected().collect::<Vec<_>>(),
        "install choice resolved"
    );
    Ok(choice)
}
