//! Sequential install run.
//!
//! Packages, stubs, source edits, the manifest, then the environment files.
//! Environment edits go last so that a failure anywhere earlier leaves `.env`
//! untouched. Nothing is rolled back; every step is safe to repeat.

use crate::config::InstallerConfig;
use crate::install::catalog::{self, ENV_EXAMPLE_FILE, ENV_FILE, MANIFEST_FILE};
use crate::install::choice::InstallChoice;
use crate::install::error::InstallError;
use crate::install::runner::{CommandRunner, CommandSpec};
use crate::install::secrets::ReverbCredentials;
use crate::install::subsystem::{Subsystem, ALWAYS_ON_PACKAGE};
use crate::manifest::{merge_manifest, ManifestReport};
use crate::mutator::{FileMutator, MutationMode, MutationReport, Requirement};
use crate::publish::{PublishOutcome, StubEntry, StubPublisher};
use crate::safety::ProjectGuard;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Packages,
    Stubs,
    Providers,
    Routes,
    Manifest,
    Environment,
    ConfigClear,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Packages => "packages",
            Step::Stubs => "stubs",
            Step::Providers => "providers",
            Step::Routes => "routes",
            Step::Manifest => "manifest",
            Step::Environment => "environment",
            Step::ConfigClear => "config-clear",
        };
        f.write_str(name)
    }
}

/// Everything a completed run did.
#[derive(Debug, Clone)]
pub struct InstallSummary {
    /// Phases in the order they completed.
    pub trace: Vec<Step>,
    pub commands: Vec<CommandSpec>,
    pub stubs: Vec<PublishOutcome>,
    /// Providers, routes, `.env`, `.env.example`, in that order.
    pub files: Vec<MutationReport>,
    pub manifest: ManifestReport,
    pub config_cleared: bool,
}

impl InstallSummary {
    pub fn modified_files(&self) -> usize {
        self.files.iter().filter(|r| r.modified).count() + usize::from(self.manifest.modified)
    }

    pub fn published_stubs(&self) -> usize {
        self.stubs.iter().filter(|o| !o.is_skipped()).count()
    }

    /// Commands the user still has to run by hand.
    pub fn next_steps(&self) -> Vec<String> {
        vec!["php artisan migrate".to_string()]
    }
}

/// Read-only view of what [`Installer::run`] would do.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub commands: Vec<CommandSpec>,
    pub stubs: Vec<(&'static StubEntry, PublishOutcome)>,
    pub files: Vec<MutationReport>,
    pub manifest: ManifestReport,
}

impl StatusReport {
    /// True when a run would change nothing on disk.
    pub fn is_up_to_date(&self) -> bool {
        self.stubs.iter().all(|(_, o)| o.is_skipped())
            && self.files.iter().all(|r| !r.modified)
            && !self.manifest.modified
    }
}

pub struct Installer<R: CommandRunner> {
    guard: ProjectGuard,
    stub_root: PathBuf,
    config: InstallerConfig,
    runner: R,
}

impl<R: CommandRunner> Installer<R> {
    pub fn new(
        project_root: impl AsRef<Path>,
        stub_root: impl Into<PathBuf>,
        config: InstallerConfig,
        runner: R,
    ) -> Result<Self, InstallError> {
        Ok(Self {
            guard: ProjectGuard::new(project_root)?,
            stub_root: stub_root.into(),
            config,
            runner,
        })
    }

    pub fn project_root(&self) -> &Path {
        self.guard.project_root()
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    pub fn run(&mut self, choice: &InstallChoice) -> Result<InstallSummary, InstallError> {
        let mut trace = Vec::new();
        let reverb = ReverbCredentials::generate();

        let commands = self.package_commands(choice);
        for command in &commands {
            self.runner.run(command)?;
        }
        trace.push(Step::Packages);
        tracing::info!(commands = commands.len(), "packages installed");

        let publisher = StubPublisher::new(&self.stub_root, self.guard.clone(), choice.force);
        let mut stubs = Vec::new();
        for entry in catalog::stubs_for(choice) {
            stubs.push(publisher.publish(entry)?);
        }
        trace.push(Step::Stubs);
        tracing::info!(stubs = stubs.len(), "stubs processed");

        let mut files = Vec::new();
        files.push(self.providers(choice)?.run(MutationMode::Write)?);
        trace.push(Step::Providers);
        files.push(self.routes()?.run(MutationMode::Write)?);
        trace.push(Step::Routes);

        let manifest = merge_manifest(
            &self.guard.validate_path(MANIFEST_FILE)?,
            &catalog::manifest_edit(choice),
            MutationMode::Write,
        )?;
        trace.push(Step::Manifest);

        let [env, example] = self.environment(choice, &reverb)?;
        let env = env.run(MutationMode::Write)?;
        let env_modified = env.modified;
        files.push(env);
        files.push(example.run(MutationMode::Write)?);
        trace.push(Step::Environment);

        let config_cleared = if env_modified {
            self.runner.run(&self.config_clear_command())?;
            trace.push(Step::ConfigClear);
            true
        } else {
            tracing::debug!("environment unchanged, config cache left alone");
            false
        };

        Ok(InstallSummary {
            trace,
            commands,
            stubs,
            files,
            manifest,
            config_cleared,
        })
    }

    /// Evaluate the whole plan without running commands or writing files.
    pub fn status(&self, choice: &InstallChoice) -> Result<StatusReport, InstallError> {
        let reverb = ReverbCredentials::generate();
        let publisher = StubPublisher::new(&self.stub_root, self.guard.clone(), choice.force);

        let mut stubs = Vec::new();
        for entry in catalog::stubs_for(choice) {
            stubs.push((entry, publisher.preview(entry)?));
        }

        let [env, example] = self.environment(choice, &reverb)?;
        let files = vec![
            self.providers(choice)?.run(MutationMode::Check)?,
            self.routes()?.run(MutationMode::Check)?,
            env.run(MutationMode::Check)?,
            example.run(MutationMode::Check)?,
        ];

        let manifest = merge_manifest(
            &self.guard.validate_path(MANIFEST_FILE)?,
            &catalog::manifest_edit(choice),
            MutationMode::Check,
        )?;

        Ok(StatusReport {
            commands: self.package_commands(choice),
            stubs,
            files,
            manifest,
        })
    }

    /// Composer and artisan invocations for `choice`, in run order.
    pub fn package_commands(&self, choice: &InstallChoice) -> Vec<CommandSpec> {
        let tools = &self.config.tools;
        let mut commands = vec![CommandSpec::new(
            tools.composer.as_str(),
            ["require", ALWAYS_ON_PACKAGE],
        )];

        for subsystem in Subsystem::ALL {
            if !choice.is_selected(subsystem) {
                continue;
            }
            let mut require = vec!["require"];
            if subsystem.dev_only() {
                require.push("--dev");
            }
            require.push(subsystem.package());
            commands.push(CommandSpec::new(tools.composer.as_str(), require));

            let mut artisan = vec!["artisan"];
            artisan.extend_from_slice(subsystem.install_command());
            commands.push(CommandSpec::new(tools.php.as_str(), artisan));
        }
        commands
    }

    pub fn config_clear_command(&self) -> CommandSpec {
        CommandSpec::new(self.config.tools.php.as_str(), ["artisan", "config:clear"])
    }

    fn providers(&self, choice: &InstallChoice) -> Result<FileMutator, InstallError> {
        Ok(FileMutator::new(
            self.guard.validate_path(catalog::PROVIDERS_FILE)?,
            Requirement::Required,
        )
        .rules(catalog::provider_rules(choice)))
    }

    fn routes(&self) -> Result<FileMutator, InstallError> {
        Ok(FileMutator::new(
            self.guard.validate_path(catalog::ROUTES_FILE)?,
            Requirement::Required,
        )
        .rules(catalog::route_rules()))
    }

    fn environment(
        &self,
        choice: &InstallChoice,
        reverb: &ReverbCredentials,
    ) -> Result<[FileMutator; 2], InstallError> {
        let env = FileMutator::new(self.guard.validate_path(ENV_FILE)?, Requirement::Required)
            .rules(catalog::env_rules(choice, &self.config, reverb, false));
        let example = FileMutator::new(
            self.guard.validate_path(ENV_EXAMPLE_FILE)?,
            Requirement::Optional,
        )
        .rules(catalog::env_rules(choice, &self.config, reverb, true));
        Ok([env, example])
    }
}
