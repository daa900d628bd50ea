//! `hugo-pipeline` command-line entry point.
//!
//! Reads `hugo-pipeline.toml` from the project directory, layers command-line
//! overrides on top, then either lists the plan or applies it.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use hugo_pipeline::apply::{PreconditionFailed, apply};
use hugo_pipeline::core::plan::build_plan;
use hugo_pipeline::exit_codes;
use hugo_pipeline::io::config::{
    CONFIG_FILE_NAME, ConfigOverrides, GitBackend, PipelineConfig, apply_overrides, init_config,
    load_config,
};
use hugo_pipeline::io::git::CliGit;
use hugo_pipeline::io::native_git::NativeGit;
use hugo_pipeline::logging;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "hugo-pipeline",
    version,
    about = "Scaffold a Hugo site with a theme submodule into a CDK project"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter `hugo-pipeline.toml` into the project directory.
    Init {
        /// Project directory.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Domain written into the starter config.
        #[arg(long, default_value = "example.com")]
        domain: String,
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the ordered steps without touching the project.
    Plan(Target),
    /// Apply the plan to the project directory.
    Apply {
        #[command(flatten)]
        target: Target,
        /// Git implementation used for the repository and submodule steps.
        #[arg(long, value_enum)]
        git_backend: Option<BackendArg>,
    },
}

#[derive(Args)]
struct Target {
    /// Project directory holding `hugo-pipeline.toml`.
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(Args, Default)]
struct OverrideArgs {
    /// Project name (defaults to the directory name).
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    sub_domain: Option<String>,
    /// Theme repository URL.
    #[arg(long)]
    theme_repo: Option<String>,
    #[arg(long)]
    theme_branch: Option<String>,
    /// Submodule path, ending in `themes/<name>`.
    #[arg(long)]
    theme_structure: Option<String>,
    #[arg(long)]
    theme_config_file: Option<String>,
    #[arg(long)]
    dev_command: Option<String>,
    /// Skip the sample entry point and test.
    #[arg(long)]
    no_sample_code: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Native,
    Cli,
}

impl From<BackendArg> for GitBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Native => GitBackend::Native,
            BackendArg::Cli => GitBackend::Cli,
        }
    }
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { dir, domain, force } => cmd_init(dir, &domain, force),
        Command::Plan(target) => cmd_plan(target),
        Command::Apply {
            target,
            git_backend,
        } => cmd_apply(target, git_backend),
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<PreconditionFailed>().is_some() {
        exit_codes::PRECONDITION
    } else {
        exit_codes::FAILED
    }
}

fn cmd_init(dir: PathBuf, domain: &str, force: bool) -> Result<()> {
    let path = dir.join(CONFIG_FILE_NAME);
    init_config(&path, domain, force)?;
    println!("init: wrote {}", path.display());
    Ok(())
}

fn cmd_plan(target: Target) -> Result<()> {
    let (root, cfg) = resolve(target, None)?;
    let project_name = cfg.options.project_name(&root);
    let plan = build_plan(&cfg.options, &project_name)?;
    for step in &plan.steps {
        println!("plan: {step}");
    }
    Ok(())
}

fn cmd_apply(target: Target, git_backend: Option<BackendArg>) -> Result<()> {
    let (root, cfg) = resolve(target, git_backend.map(GitBackend::from))?;
    let project_name = cfg.options.project_name(&root);
    let plan = build_plan(&cfg.options, &project_name)?;
    debug!(backend = ?cfg.git.backend, root = %root.display(), "applying plan");

    let report = match cfg.git.backend {
        GitBackend::Native => apply(&plan, &root, &project_name, &NativeGit::new(&root))?,
        GitBackend::Cli => apply(
            &plan,
            &root,
            &project_name,
            &CliGit::new(&root, cfg.git.limits()),
        )?,
    };
    for entry in &report.steps {
        println!("apply: {} {}", entry.step, entry.outcome);
    }
    Ok(())
}

/// Canonical project root plus the merged, validated config.
fn resolve(target: Target, git_backend: Option<GitBackend>) -> Result<(PathBuf, PipelineConfig)> {
    let root = fs::canonicalize(&target.dir)
        .with_context(|| format!("resolve project directory {}", target.dir.display()))?;
    let cfg = load_config(&root.join(CONFIG_FILE_NAME))?;
    let args = target.overrides;
    let overrides = ConfigOverrides {
        name: args.name,
        domain: args.domain,
        sub_domain: args.sub_domain,
        theme_repo: args.theme_repo,
        theme_branch: args.theme_branch,
        theme_structure: args.theme_structure,
        theme_config_file: args.theme_config_file,
        dev_command: args.dev_command,
        no_sample_code: args.no_sample_code,
        git_backend,
    };
    let cfg = apply_overrides(cfg, &overrides)?;
    Ok((root, cfg))
}
