//! Pipeline configuration stored in `<project>/hugo-pipeline.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use super::process::{CommandLimits, DEFAULT_COMMAND_TIMEOUT, DEFAULT_OUTPUT_LIMIT_BYTES};
use crate::core::options::PipelineOptions;

pub const CONFIG_FILE_NAME: &str = "hugo-pipeline.toml";

/// Pipeline configuration (TOML).
///
/// Site options sit at the top level; git backend settings live under `[git]`.
/// Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(flatten)]
    pub options: PipelineOptions,

    pub git: GitConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GitBackend {
    /// In-process libgit2.
    #[default]
    Native,
    /// The `git` executable.
    Cli,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    pub backend: GitBackend,

    /// Wall-clock budget for one `git` command (CLI backend).
    pub command_timeout_secs: u64,

    /// Captured stdout/stderr beyond this many bytes is discarded (CLI backend).
    pub output_limit_bytes: usize,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            backend: GitBackend::default(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl GitConfig {
    pub fn limits(&self) -> CommandLimits {
        CommandLimits {
            timeout: Duration::from_secs(self.command_timeout_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.git.command_timeout_secs == 0 {
            return Err(anyhow!("git.command_timeout_secs must be > 0"));
        }
        if self.git.output_limit_bytes == 0 {
            return Err(anyhow!("git.output_limit_bytes must be > 0"));
        }
        self.options.validate()
    }
}

/// Command-line values layered over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub sub_domain: Option<String>,
    pub theme_repo: Option<String>,
    pub theme_branch: Option<String>,
    pub theme_structure: Option<String>,
    pub theme_config_file: Option<String>,
    pub dev_command: Option<String>,
    pub no_sample_code: bool,
    pub git_backend: Option<GitBackend>,
}

/// Apply overrides to a loaded config and validate the result.
pub fn apply_overrides(mut base: PipelineConfig, overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let options = &mut base.options;
    if let Some(name) = &overrides.name {
        options.name = Some(name.clone());
    }
    if let Some(domain) = &overrides.domain {
        options.domain = domain.clone();
    }
    if let Some(sub_domain) = &overrides.sub_domain {
        options.sub_domain = sub_domain.clone();
    }
    if let Some(repo) = &overrides.theme_repo {
        options.hugo_theme_git_repo = repo.clone();
    }
    if let Some(branch) = &overrides.theme_branch {
        options.hugo_theme_git_repo_branch = branch.clone();
    }
    if let Some(structure) = &overrides.theme_structure {
        options.hugo_theme_submodule_structure = structure.clone();
    }
    if let Some(file) = &overrides.theme_config_file {
        options.hugo_theme_config_file = file.clone();
    }
    if let Some(cmd) = &overrides.dev_command {
        options.hugo_theme_dev_command = Some(cmd.clone());
    }
    if overrides.no_sample_code {
        options.sample_code = false;
    }
    if let Some(backend) = overrides.git_backend {
        base.git.backend = backend;
    }
    base.validate()?;
    Ok(base)
}

/// Load config from a TOML file.
///
/// A missing file yields `PipelineConfig::default()`. Validation is left to the
/// caller because `domain` usually arrives through overrides.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        return Ok(PipelineConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Write a commented starter config for `domain`.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn init_config(path: &Path, domain: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    let contents = STARTER_CONFIG.replace("{domain}", domain);
    let parsed: PipelineConfig = toml::from_str(&contents).context("parse starter config")?;
    parsed.validate()?;
    write_atomic(path, &contents)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

const STARTER_CONFIG: &str = r#"# Hugo pipeline settings. Every key except `domain` is optional.

domain = "{domain}"
sub_domain = "dev"

hugo_theme_git_repo = "https://github.com/apvarun/blist-hugo-theme.git"
hugo_theme_git_repo_branch = "main"
hugo_theme_submodule_structure = "blog/themes/blist"
hugo_theme_config_file = "config.toml"
# hugo_theme_dev_command = "npm --prefix blog run start"

sample_code = true

[git]
# "native" (libgit2) or "cli" (the git executable)
backend = "native"
command_timeout_secs = 60
output_limit_bytes = 10485760
"#;
