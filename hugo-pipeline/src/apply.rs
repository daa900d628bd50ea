//! Reconciler: walks a [`Plan`] against a project directory.
//!
//! Every step first checks whether its artifact is already in place and only
//! then mutates the project, so a second run over a scaffolded project only
//! re-runs the branch pin and the temporary repository bookkeeping.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::core::plan::{ManagedFile, Overwrite, Plan, Step};
use crate::io::fs::{
    copy_file, copy_tree, create_dir, file_contains, find_file_containing, read_optional,
    remove_dir, write_if_changed,
};
use crate::io::git::Vcs;
use crate::io::gitignore::ensure_patterns;
use crate::io::manifest::PackageManifest;

/// A directory the plan depends on is missing.
///
/// Raised before anything user-visible is written past the failing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconditionFailed {
    pub what: String,
    pub path: PathBuf,
}

impl fmt::Display for PreconditionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not found at {}", self.what, self.path.display())
    }
}

impl std::error::Error for PreconditionFailed {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The project was changed.
    Applied,
    /// A check passed; nothing to change.
    Verified,
    /// The gate found the artifact already in place (or nothing to act on).
    Skipped(String),
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Applied => write!(f, "applied"),
            StepOutcome::Verified => write!(f, "ok"),
            StepOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub steps: Vec<StepReport>,
}

impl ApplyReport {
    pub fn applied(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Applied)
            .count()
    }
}

/// Apply `plan` to the project at `root`.
///
/// Stops at the first failing step. A repository created by this run is
/// removed again on both success and failure.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn apply<V: Vcs>(plan: &Plan, root: &Path, project_name: &str, vcs: &V) -> Result<ApplyReport> {
    let mut reconciler = Reconciler {
        root,
        project_name,
        vcs,
        initialized_repo: false,
    };
    let mut report = ApplyReport::default();

    for step in &plan.steps {
        let outcome = match reconciler.apply_step(step) {
            Ok(outcome) => outcome,
            Err(err) => {
                reconciler.discard_temporary_repository();
                return Err(err.context(format!("step failed: {step}")));
            }
        };
        match &outcome {
            StepOutcome::Skipped(reason) => info!(%step, %reason, "skipped"),
            other => info!(%step, outcome = %other, "done"),
        }
        report.steps.push(StepReport {
            step: step.to_string(),
            outcome,
        });
    }

    info!(applied = report.applied(), total = report.steps.len(), "plan applied");
    Ok(report)
}

struct Reconciler<'a, V: Vcs> {
    root: &'a Path,
    project_name: &'a str,
    vcs: &'a V,
    initialized_repo: bool,
}

impl<V: Vcs> Reconciler<'_, V> {
    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn apply_step(&mut self, step: &Step) -> Result<StepOutcome> {
        match step {
            Step::EnsureRepository => self.ensure_repository(),
            Step::AttachSubmodule { url, path } => self.attach_submodule(url, path),
            Step::PinBranch { path, branch } => self.pin_branch(path, branch),
            Step::RequireDir { path, what } => self.require_dir(path, what),
            Step::CopyExampleSite {
                from,
                to,
                theme_name,
                config_files,
                relocated_config,
            } => self.copy_example_site(from, to, theme_name, config_files, relocated_config),
            Step::CreateDirs { paths } => self.create_dirs(paths),
            Step::MoveFile { from, to } => self.move_file(from, to),
            Step::WriteFile(file) => self.write_file(file),
            Step::IgnorePatterns { patterns } => {
                let added = ensure_patterns(&self.path(".gitignore"), patterns)?;
                Ok(if added.is_empty() {
                    StepOutcome::Skipped("patterns present".to_string())
                } else {
                    StepOutcome::Applied
                })
            }
            Step::MirrorFile { from, to } => self.mirror_file(from, to),
            Step::SetScript { name, command } => {
                self.edit_manifest(|manifest| manifest.set_script(name, command))
            }
            Step::AddDependency { name } => {
                self.edit_manifest(|manifest| manifest.add_dependency(name))
            }
            Step::EmitSampleCode {
                srcdir,
                marker,
                entrypoint,
                test,
            } => self.emit_sample_code(srcdir, marker, entrypoint, test),
            Step::RemoveTemporaryRepository => self.remove_temporary_repository(),
        }
    }

    fn ensure_repository(&mut self) -> Result<StepOutcome> {
        if self.path(".git").exists() {
            return Ok(StepOutcome::Skipped("repository exists".to_string()));
        }
        self.vcs.init()?;
        self.initialized_repo = true;
        Ok(StepOutcome::Applied)
    }

    fn attach_submodule(&self, url: &str, path: &str) -> Result<StepOutcome> {
        if declares_submodule(self.root, path)? {
            return Ok(StepOutcome::Skipped(
                ".gitmodules already declares it".to_string(),
            ));
        }
        self.vcs.add_submodule(url, path)?;
        Ok(StepOutcome::Applied)
    }

    fn pin_branch(&self, path: &str, branch: &str) -> Result<StepOutcome> {
        // Both operations are idempotent; no gate.
        self.vcs.set_submodule_branch(path, branch)?;
        self.vcs.checkout_branch(path, branch)?;
        Ok(StepOutcome::Applied)
    }

    fn require_dir(&self, path: &str, what: &str) -> Result<StepOutcome> {
        let dir = self.path(path);
        if !dir.is_dir() {
            return Err(PreconditionFailed {
                what: what.to_string(),
                path: dir,
            }
            .into());
        }
        Ok(StepOutcome::Verified)
    }

    fn copy_example_site(
        &self,
        from: &str,
        to: &str,
        theme_name: &str,
        config_files: &[String],
        relocated_config: &str,
    ) -> Result<StepOutcome> {
        if self.path(relocated_config).exists() {
            return Ok(StepOutcome::Skipped(format!("{relocated_config} exists")));
        }
        let declaration = theme_declaration(theme_name)?;
        for file in config_files {
            if let Some(contents) = read_optional(&self.path(file))?
                && declaration.is_match(&contents)
            {
                return Ok(StepOutcome::Skipped(format!(
                    "{file} already declares theme {theme_name}"
                )));
            }
        }
        let copied = copy_tree(&self.path(from), &self.path(to))?;
        debug!(copied, "example site copied");
        Ok(StepOutcome::Applied)
    }

    fn create_dirs(&self, paths: &[String]) -> Result<StepOutcome> {
        let mut created = false;
        for rel in paths {
            let dir = self.path(rel);
            if !dir.is_dir() {
                create_dir(&dir)?;
                created = true;
            }
        }
        Ok(if created {
            StepOutcome::Applied
        } else {
            StepOutcome::Skipped("directories exist".to_string())
        })
    }

    fn move_file(&self, from: &str, to: &str) -> Result<StepOutcome> {
        let target = self.path(to);
        if target.exists() {
            return Ok(StepOutcome::Skipped(format!("{to} exists")));
        }
        let source = self.path(from);
        if !source.is_file() {
            warn!(from, to, "nothing to move; site config missing");
            return Ok(StepOutcome::Skipped(format!("{from} missing")));
        }
        crate::io::fs::move_file(&source, &target)?;
        Ok(StepOutcome::Applied)
    }

    fn write_file(&self, file: &ManagedFile) -> Result<StepOutcome> {
        let target = self.path(&file.path);
        if let Overwrite::UnlessContains(marker) = &file.overwrite
            && file_contains(&target, marker)?
        {
            return Ok(StepOutcome::Skipped(format!("{} already set up", file.path)));
        }
        Ok(if write_if_changed(&target, &file.contents)? {
            StepOutcome::Applied
        } else {
            StepOutcome::Skipped("up to date".to_string())
        })
    }

    fn emit_sample_code(
        &self,
        srcdir: &str,
        marker: &str,
        entrypoint: &ManagedFile,
        test: &ManagedFile,
    ) -> Result<StepOutcome> {
        if let Some(existing) = find_file_containing(&self.path(srcdir), "ts", marker)? {
            let rel = existing.strip_prefix(self.root).unwrap_or(&existing);
            return Ok(StepOutcome::Skipped(format!(
                "{} already uses {marker}",
                rel.display()
            )));
        }
        let wrote_entrypoint = self.write_file(entrypoint)? == StepOutcome::Applied;
        let wrote_test = self.write_file(test)? == StepOutcome::Applied;
        Ok(if wrote_entrypoint || wrote_test {
            StepOutcome::Applied
        } else {
            StepOutcome::Skipped("up to date".to_string())
        })
    }

    fn mirror_file(&self, from: &str, to: &str) -> Result<StepOutcome> {
        let target = self.path(to);
        if target.exists() {
            return Ok(StepOutcome::Skipped(format!("{to} exists")));
        }
        let source = self.path(from);
        if !source.is_file() {
            return Ok(StepOutcome::Skipped(format!("theme has no {from}")));
        }
        copy_file(&source, &target)?;
        Ok(StepOutcome::Applied)
    }

    fn edit_manifest(
        &self,
        edit: impl FnOnce(&mut PackageManifest) -> Result<bool>,
    ) -> Result<StepOutcome> {
        let mut manifest =
            PackageManifest::load_or_new(&self.path("package.json"), self.project_name)?;
        let changed = edit(&mut manifest)?;
        let written = manifest.save()?;
        Ok(if changed || written {
            StepOutcome::Applied
        } else {
            StepOutcome::Skipped("already declared".to_string())
        })
    }

    fn remove_temporary_repository(&mut self) -> Result<StepOutcome> {
        if !self.initialized_repo {
            return Ok(StepOutcome::Skipped(
                "repository was not created by this run".to_string(),
            ));
        }
        remove_dir(&self.path(".git"))?;
        self.initialized_repo = false;
        Ok(StepOutcome::Applied)
    }

    fn discard_temporary_repository(&mut self) {
        if !self.initialized_repo {
            return;
        }
        if let Err(err) = remove_dir(&self.path(".git")) {
            warn!(error = %format!("{err:#}"), "failed to remove temporary repository");
        }
        self.initialized_repo = false;
    }
}

/// Matches `theme = "<name>"` (TOML), `theme: <name>` (YAML) and `"theme": "<name>"` (JSON).
///
/// Quotes must be balanced; TOML requires them.
fn theme_declaration(theme_name: &str) -> Result<Regex> {
    let name = regex::escape(theme_name);
    let toml = format!(r#"theme\s*=\s*(?:"{name}"|'{name}')"#);
    let yaml = format!(r#"theme\s*:\s*(?:{name}|"{name}"|'{name}')"#);
    let json = format!(r#""theme"\s*:\s*"{name}"\s*,?"#);
    let pattern = format!(r"(?m)^\s*(?:{toml}|{yaml}|{json})\s*$");
    Regex::new(&pattern).with_context(|| format!("build theme pattern for {theme_name}"))
}

/// True when `.gitmodules` has a `[submodule "<path>"]` section.
fn declares_submodule(root: &Path, path: &str) -> Result<bool> {
    let header = format!("[submodule \"{path}\"]");
    Ok(read_optional(&root.join(".gitmodules"))?
        .is_some_and(|contents| contents.lines().any(|line| line.trim() == header)))
}
