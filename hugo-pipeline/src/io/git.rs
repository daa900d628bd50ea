//! Version-control seam for the pipeline, plus the `git` CLI backend.
//!
//! The reconciler only needs four operations. [`Vcs`] keeps them behind a
//! trait so the library backend ([`super::native_git::NativeGit`]), this
//! subprocess backend, and test fakes are interchangeable.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument};

use super::process::{CommandLimits, CommandOutput, run_command_with_timeout};

/// Git operations used while scaffolding. Paths are relative to the project root.
pub trait Vcs {
    /// Create a repository at the project root.
    fn init(&self) -> Result<()>;

    /// Clone `url` as a submodule at `path` and stage it.
    fn add_submodule(&self, url: &str, path: &str) -> Result<()>;

    /// Record `branch` as the tracked branch of the submodule at `path`.
    fn set_submodule_branch(&self, path: &str, branch: &str) -> Result<()>;

    /// Check out `branch` inside the repository at `path`.
    fn checkout_branch(&self, path: &str, branch: &str) -> Result<()>;
}

/// Whether a command must print something on stdout to count as successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Exit status alone decides.
    ExitCode,
    /// Success also requires non-empty stdout.
    Output,
}

/// [`Vcs`] backend shelling out to the `git` executable.
#[derive(Debug, Clone)]
pub struct CliGit {
    workdir: PathBuf,
    limits: CommandLimits,
}

impl CliGit {
    pub fn new(workdir: impl Into<PathBuf>, limits: CommandLimits) -> Self {
        Self {
            workdir: workdir.into(),
            limits,
        }
    }

    fn run_checked(&self, dir: &Path, args: &[&str], expect: Expect) -> Result<String> {
        let output = self.run(dir, args)?;
        let command = format!("git {}", args.join(" "));
        if output.timed_out {
            return Err(anyhow!(
                "{command} timed out after {}s in {}",
                self.limits.timeout.as_secs(),
                dir.display()
            ));
        }
        if !output.success() {
            return Err(anyhow!(
                "{command} failed in {}: {}",
                dir.display(),
                output.stderr_text()
            ));
        }
        let stdout = output.stdout_text();
        if expect == Expect::Output && stdout.is_empty() {
            return Err(anyhow!(
                "{command} produced no output in {}",
                dir.display()
            ));
        }
        Ok(stdout)
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(dir);
        run_command_with_timeout(cmd, self.limits)
            .map_err(|err| err.context(format!("spawn git {} in {}", args.join(" "), dir.display())))
    }
}

impl Vcs for CliGit {
    #[instrument(skip_all)]
    fn init(&self) -> Result<()> {
        debug!(workdir = %self.workdir.display(), "git init");
        self.run_checked(&self.workdir, &["init"], Expect::Output)?;
        Ok(())
    }

    /// Clones first so the theme repository lives inside `path`; `submodule add`
    /// then stages the existing checkout instead of absorbing it into `.git/modules`.
    #[instrument(skip_all, fields(url, path))]
    fn add_submodule(&self, url: &str, path: &str) -> Result<()> {
        if !self.workdir.join(path).join(".git").exists() {
            debug!(url, path, "git clone");
            self.run_checked(&self.workdir, &["clone", url, path], Expect::ExitCode)?;
        }
        debug!(url, path, "git submodule add");
        self.run_checked(
            &self.workdir,
            &["submodule", "add", url, path],
            Expect::ExitCode,
        )?;
        Ok(())
    }

    #[instrument(skip_all, fields(path, branch))]
    fn set_submodule_branch(&self, path: &str, branch: &str) -> Result<()> {
        debug!(path, branch, "git submodule set-branch");
        self.run_checked(
            &self.workdir,
            &["submodule", "set-branch", "--branch", branch, path],
            Expect::ExitCode,
        )?;
        Ok(())
    }

    #[instrument(skip_all, fields(path, branch))]
    fn checkout_branch(&self, path: &str, branch: &str) -> Result<()> {
        debug!(path, branch, "git checkout");
        let dir = self.workdir.join(path);
        self.run_checked(&dir, &["checkout", branch], Expect::ExitCode)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_git_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = CliGit::new(temp.path(), CommandLimits::default());

        git.init().expect("git init");
        assert!(temp.path().join(".git").is_dir());
    }

    #[test]
    fn failures_carry_command_and_workdir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = CliGit::new(temp.path(), CommandLimits::default());
        git.init().expect("git init");

        let err = git.checkout_branch("", "does-not-exist").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("git checkout does-not-exist failed"), "{msg}");
        assert!(msg.contains(&temp.path().display().to_string()), "{msg}");
    }

    #[test]
    fn expect_output_rejects_silent_success() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = CliGit::new(temp.path(), CommandLimits::default());
        git.init().expect("git init");

        // Clean, empty repo: exits 0 and prints nothing.
        let err = git
            .run_checked(temp.path(), &["status", "--short"], Expect::Output)
            .unwrap_err();
        assert!(err.to_string().contains("produced no output"));
        git.run_checked(temp.path(), &["status", "--short"], Expect::ExitCode)
            .expect("exit code only");
    }
}
