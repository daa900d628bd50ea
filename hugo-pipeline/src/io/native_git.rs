//! [`Vcs`] backend over libgit2.
//!
//! The submodule is created with its repository inside the submodule
//! directory rather than under `.git/modules`, so the theme checkout survives
//! removal of a temporary top-level `.git`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::Repository;
use git2::build::CheckoutBuilder;
use tracing::{debug, instrument};

use super::git::Vcs;

#[derive(Debug, Clone)]
pub struct NativeGit {
    workdir: PathBuf,
}

impl NativeGit {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(&self.workdir)
            .with_context(|| format!("open repository {}", self.workdir.display()))
    }
}

impl Vcs for NativeGit {
    #[instrument(skip_all)]
    fn init(&self) -> Result<()> {
        debug!(workdir = %self.workdir.display(), "init repository");
        Repository::init(&self.workdir)
            .with_context(|| format!("init repository {}", self.workdir.display()))?;
        Ok(())
    }

    #[instrument(skip_all, fields(url, path))]
    fn add_submodule(&self, url: &str, path: &str) -> Result<()> {
        let repo = self.open()?;
        debug!(url, path, "adding submodule");
        let mut submodule = repo
            .submodule(url, Path::new(path), false)
            .with_context(|| format!("set up submodule {path} in {}", self.workdir.display()))?;
        submodule
            .clone(None)
            .with_context(|| format!("clone {url} into {}", self.workdir.join(path).display()))?;
        submodule
            .add_finalize()
            .with_context(|| format!("finalize submodule {path}"))?;
        Ok(())
    }

    #[instrument(skip_all, fields(path, branch))]
    fn set_submodule_branch(&self, path: &str, branch: &str) -> Result<()> {
        let mut repo = self.open()?;
        debug!(path, branch, "setting submodule branch");
        repo.submodule_set_branch(path, branch)
            .with_context(|| format!("set branch {branch} for submodule {path}"))?;
        Ok(())
    }

    #[instrument(skip_all, fields(path, branch))]
    fn checkout_branch(&self, path: &str, branch: &str) -> Result<()> {
        let dir = self.workdir.join(path);
        let repo = Repository::open(&dir)
            .with_context(|| format!("open repository {}", dir.display()))?;
        let local_ref = format!("refs/heads/{branch}");

        if repo.find_reference(&local_ref).is_err() {
            debug!(branch, "creating local branch from origin");
            let remote = repo
                .find_reference(&format!("refs/remotes/origin/{branch}"))
                .with_context(|| format!("branch {branch} not found in {}", dir.display()))?;
            let commit = remote.peel_to_commit()?;
            let mut created = repo
                .branch(branch, &commit, false)
                .with_context(|| format!("create branch {branch} in {}", dir.display()))?;
            let upstream = format!("origin/{branch}");
            created.set_upstream(Some(upstream.as_str()))?;
        }

        let commit = repo.find_reference(&local_ref)?.peel_to_commit()?;
        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))
            .with_context(|| format!("checkout {branch} in {}", dir.display()))?;
        repo.set_head(&local_ref)
            .with_context(|| format!("set HEAD to {branch} in {}", dir.display()))?;
        Ok(())
    }
}
