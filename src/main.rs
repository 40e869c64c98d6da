use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Args, Command, FromArgMatches, Parser, Subcommand};
use colored::Colorize;
use deploykit::config::{self, InstallerConfig};
use deploykit::install::{
    resolve_choice, ChoiceArgs, DialoguerPrompter, InstallChoice, InstallSummary, Installer,
    ProcessRunner, StatusReport, Subsystem,
};
use deploykit::mutator::MutationReport;
use deploykit::publish::PublishOutcome;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deploykit")]
#[command(about = "Prepare a Laravel application for container deployment", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install packages, publish stubs and patch project files
    Install {
        /// Project name (defaults to the project directory name)
        project_name: Option<String>,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Overwrite stubs that already exist
        #[arg(long)]
        force: bool,

        /// Never prompt; unset options mean "no"
        #[arg(short = 'n', long)]
        no_interaction: bool,
    },

    /// Show what an install would change, without changing anything
    Status {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Show unified diff of pending file changes
        #[arg(short, long)]
        diff: bool,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Path to the Laravel project (auto-detected if not specified)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Installer config file (default: <project>/deploykit.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the stub templates
    #[arg(long)]
    stubs: Option<PathBuf>,
}

/// One `--<name>` flag per [`Subsystem`], plus `--all`.
struct SelectionArgs {
    subsystems: Vec<Subsystem>,
    all: bool,
}

impl FromArgMatches for SelectionArgs {
    fn from_arg_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        Ok(Self {
            subsystems: Subsystem::ALL
                .into_iter()
                .filter(|s| matches.get_flag(s.name()))
                .collect(),
            all: matches.get_flag("all"),
        })
    }

    fn update_from_arg_matches(&mut self, matches: &ArgMatches) -> Result<(), clap::Error> {
        *self = Self::from_arg_matches(matches)?;
        Ok(())
    }
}

impl Args for SelectionArgs {
    fn augment_args(cmd: Command) -> Command {
        Subsystem::ALL
            .into_iter()
            .fold(cmd, |cmd, subsystem| {
                cmd.arg(
                    Arg::new(subsystem.name())
                        .long(subsystem.name())
                        .action(ArgAction::SetTrue)
                        .help(format!("Install {}", subsystem.label())),
                )
            })
            .arg(
                Arg::new("all")
                    .long("all")
                    .action(ArgAction::SetTrue)
                    .help("Install every optional subsystem"),
            )
    }

    fn augment_args_for_update(cmd: Command) -> Command {
        Self::augment_args(cmd)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Install {
            project_name,
            target,
            selection,
            force,
            no_interaction,
        } => cmd_install(
            &target,
            ChoiceArgs {
                project_name,
                subsystems: selection.subsystems,
                all: selection.all,
                force,
                no_interaction,
            },
        ),

        Commands::Status {
            target,
            selection,
            diff,
        } => cmd_status(&target, &selection, diff),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

/// Resolve the project root.
///
/// Priority order:
/// 1. Explicit --path flag
/// 2. Nearest ancestor of the current directory holding both `artisan` and
///    `composer.json`
fn resolve_project(cli_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_path {
        return path
            .canonicalize()
            .with_context(|| format!("project path {} does not exist", path.display()));
    }

    let current = env::current_dir()?;
    if let Some(root) = current
        .ancestors()
        .find(|dir| dir.join("artisan").is_file() && dir.join("composer.json").is_file())
    {
        println!(
            "{}",
            format!("Auto-detected project: {}", root.display()).dimmed()
        );
        return Ok(root.to_path_buf());
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}",
        "Could not find a Laravel project (no artisan + composer.json found).".red(),
        "Try one of:".bold(),
        "1. cd into your project: cd /path/to/app && deploykit install",
        "2. Specify explicitly: deploykit install --path /path/to/app"
    )
}

fn load_config(target: &TargetArgs, project: &Path) -> Result<InstallerConfig> {
    let config = match &target.config {
        Some(path) => config::load_from_path(path)?,
        None => config::load_from_project(project)?,
    };
    Ok(config)
}

/// `--stubs`, then `stubs.dir` from config, then the bundled stub directory.
fn resolve_stub_root(target: &TargetArgs, project: &Path, config: &InstallerConfig) -> PathBuf {
    if let Some(dir) = &target.stubs {
        return dir.clone();
    }
    if let Some(dir) = &config.stubs.dir {
        return project.join(dir);
    }
    Path::new(env!("CARGO_MANIFEST_DIR")).join("stubs")
}

fn directory_name(project: &Path) -> String {
    project
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "laravel".to_string())
}

fn installer(target: &TargetArgs) -> Result<Installer<ProcessRunner>> {
    let project = resolve_project(target.path.as_deref())?;
    let config = load_config(target, &project)?;
    let stub_root = resolve_stub_root(target, &project, &config);
    tracing::debug!(project = %project.display(), stubs = %stub_root.display(), "resolved paths");
    Ok(Installer::new(
        &project,
        stub_root,
        config,
        ProcessRunner::new(&project),
    )?)
}

fn cmd_install(target: &TargetArgs, args: ChoiceArgs) -> Result<()> {
    let mut installer = installer(target)?;
    let default_name = directory_name(installer.project_root());
    let choice = resolve_choice(&args, &default_name, &mut DialoguerPrompter)?;

    println!("Project: {}", installer.project_root().display());
    println!("Name: {}", choice.project_name);
    print_selection(&choice);
    println!();

    let summary = installer.run(&choice)?;
    print_summary(&summary);
    Ok(())
}

fn cmd_status(target: &TargetArgs, selection: &SelectionArgs, show_diff: bool) -> Result<()> {
    let installer = installer(target)?;
    let args = ChoiceArgs {
        subsystems: selection.subsystems.clone(),
        all: selection.all,
        no_interaction: true,
        ..ChoiceArgs::default()
    };
    let default_name = directory_name(installer.project_root());
    let choice = resolve_choice(&args, &default_name, &mut DialoguerPrompter)?;

    println!("{}", "Install Status Report".bold());
    println!("Project: {}", installer.project_root().display());
    print_selection(&choice);
    println!();

    let report = installer.status(&choice)?;
    print_status(&report, show_diff);
    Ok(())
}

fn print_selection(choice: &InstallChoice) {
    let selected: Vec<String> = choice.selected().map(|s| s.to_string()).collect();
    if selected.is_empty() {
        println!("Subsystems: {}", "none".dimmed());
    } else {
        println!("Subsystems: {}", selected.join(", "));
    }
}

fn print_stub(outcome: &PublishOutcome) {
    match outcome {
        PublishOutcome::Skipped { .. } => println!("{} {}", "⊙".yellow(), outcome),
        _ => println!("{} {}", "✓".green(), outcome),
    }
}

fn print_file(report: &MutationReport, pending: bool) {
    let path = report.path.display();
    if report.missing {
        println!("{} {}: not present, skipped", "⊙".yellow(), path);
    } else if report.fired.is_empty() {
        println!("{} {}: already up to date", "⊙".yellow(), path);
    } else {
        let verb = if pending { "would apply" } else { "applied" };
        println!(
            "{} {}: {} {}",
            "✓".green(),
            path,
            verb,
            report.fired.join(", ")
        );
    }
}

fn print_summary(summary: &InstallSummary) {
    println!();
    for outcome in &summary.stubs {
        print_stub(outcome);
    }
    for report in &summary.files {
        print_file(report, false);
    }
    if summary.manifest.modified {
        println!(
            "{} {}: updated {}",
            "✓".green(),
            summary.manifest.path.display(),
            summary.manifest.changes.join(", ")
        );
    } else {
        println!(
            "{} {}: already up to date",
            "⊙".yellow(),
            summary.manifest.path.display()
        );
    }
    if summary.config_cleared {
        println!("{} configuration cache cleared", "✓".green());
    }

    println!();
    println!("{}", "Summary:".bold());
    println!(
        "  {} commands run",
        format!("{}", summary.commands.len()).green()
    );
    println!(
        "  {} stubs published",
        format!("{}", summary.published_stubs()).green()
    );
    println!(
        "  {} files modified",
        format!("{}", summary.modified_files()).green()
    );

    println!();
    println!("{}", "Next steps:".bold());
    for step in summary.next_steps() {
        println!("  {}", step.cyan());
    }
}

fn print_status(report: &StatusReport, show_diff: bool) {
    println!("{}", "Commands:".bold());
    for command in &report.commands {
        println!("  {}", command);
    }
    println!();

    println!("{}", "Stubs:".bold());
    for (entry, outcome) in &report.stubs {
        match outcome {
            PublishOutcome::Skipped { reason, .. } => {
                println!("{} {} ({})", "⊙".yellow(), entry.label, reason.dimmed())
            }
            _ => println!("{} {}: {}", "✓".green(), entry.label, outcome),
        }
    }
    println!();

    println!("{}", "Files:".bold());
    for file in &report.files {
        print_file(file, true);
        if show_diff && file.modified {
            display_diff(&file.diff());
        }
    }
    if report.manifest.modified {
        println!(
            "{} {}: would update {}",
            "✓".green(),
            report.manifest.path.display(),
            report.manifest.changes.join(", ")
        );
    } else {
        println!(
            "{} {}: already up to date",
            "⊙".yellow(),
            report.manifest.path.display()
        );
    }

    println!();
    if report.is_up_to_date() {
        println!("{}", "Project is up to date.".green().bold());
    } else {
        println!("{}", "Pending changes; run `deploykit install`.".yellow());
    }
}

/// Colorize a unified diff produced by [`MutationReport::diff`].
fn display_diff(diff: &str) {
    println!();
    for line in diff.lines() {
        let styled = if line.starts_with("---") || line.starts_with("+++") {
            line.dimmed()
        } else if line.starts_with('-') {
            line.red()
        } else if line.starts_with('+') {
            line.green()
        } else {
            line.normal()
        };
        println!("{}", styled);
    }
    println!();
}
