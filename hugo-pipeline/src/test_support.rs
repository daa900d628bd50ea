//! Test-only helpers: a local theme repository and a scripted [`Vcs`].

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use git2::{IndexAddOption, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

use crate::io::git::Vcs;

/// Shape of a generated theme.
#[derive(Debug, Clone)]
pub struct ThemeSpec {
    pub example_site: bool,
    pub package_json: bool,
    pub package_lock: bool,
    pub branch: String,
}

impl Default for ThemeSpec {
    fn default() -> Self {
        Self {
            example_site: true,
            package_json: true,
            package_lock: true,
            branch: "main".to_string(),
        }
    }
}

pub const THEME_CONFIG: &str = "baseURL = \"https://example.org/\"\ntheme = \"blist\"\n";
pub const THEME_PACKAGE_JSON: &str = "{\n  \"name\": \"blist\",\n  \"scripts\": {\n    \"start\": \"hugo server\"\n  }\n}\n";

/// Write the theme's files into `dir`.
pub fn write_theme_files(dir: &Path, spec: &ThemeSpec) -> Result<()> {
    fs::create_dir_all(dir.join("layouts")).context("create layouts")?;
    fs::write(dir.join("layouts/index.html"), "<html></html>\n").context("write layout")?;
    fs::write(dir.join("README.md"), "# blist\n").context("write readme")?;
    if spec.example_site {
        let site = dir.join("exampleSite");
        fs::create_dir_all(site.join("content/posts")).context("create example content")?;
        fs::write(site.join("config.toml"), THEME_CONFIG).context("write example config")?;
        fs::write(site.join("content/posts/hello.md"), "# Hello\n").context("write post")?;
    }
    if spec.package_json {
        fs::write(dir.join("package.json"), THEME_PACKAGE_JSON).context("write package.json")?;
    }
    if spec.package_lock {
        fs::write(dir.join("package-lock.json"), "{\"lockfileVersion\": 3}\n")
            .context("write package-lock.json")?;
    }
    Ok(())
}

/// A theme published as a local git repository with one commit on `spec.branch`.
pub struct ThemeFixture {
    dir: TempDir,
}

impl ThemeFixture {
    pub fn new(spec: &ThemeSpec) -> Result<Self> {
        let dir = tempfile::tempdir().context("theme tempdir")?;
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(&spec.branch);
        let repo = Repository::init_opts(dir.path(), &opts).context("init theme repo")?;

        write_theme_files(dir.path(), spec)?;

        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = Signature::now("Theme Author", "theme@example.com")?;
        repo.commit(Some("HEAD"), &sig, &sig, "initial theme", &tree, &[])
            .context("commit theme")?;
        Ok(Self { dir })
    }

    /// Clone URL for the fixture (a local path).
    pub fn url(&self) -> String {
        self.dir.path().display().to_string()
    }
}

/// [`Vcs`] fake that records calls and materializes the theme on `add_submodule`.
pub struct ScriptedVcs {
    root: PathBuf,
    theme: ThemeSpec,
    fail_on: Option<&'static str>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedVcs {
    pub fn new(root: &Path, theme: ThemeSpec) -> Self {
        Self {
            root: root.to_path_buf(),
            theme,
            fail_on: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Make the named operation (`init`, `add_submodule`, ...) fail.
    pub fn failing(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, op: &'static str, call: String) -> Result<()> {
        self.calls.borrow_mut().push(call);
        if self.fail_on == Some(op) {
            bail!("scripted failure in {op}");
        }
        Ok(())
    }
}

impl Vcs for ScriptedVcs {
    fn init(&self) -> Result<()> {
        self.record("init", "init".to_string())?;
        fs::create_dir_all(self.root.join(".git")).context("create .git")?;
        Ok(())
    }

    fn add_submodule(&self, url: &str, path: &str) -> Result<()> {
        self.record("add_submodule", format!("add_submodule {url} {path}"))?;
        let gitmodules = self.root.join(".gitmodules");
        let mut contents = fs::read_to_string(&gitmodules).unwrap_or_default();
        contents.push_str(&format!(
            "[submodule \"{path}\"]\n\tpath = {path}\n\turl = {url}\n"
        ));
        fs::write(&gitmodules, contents).context("write .gitmodules")?;
        write_theme_files(&self.root.join(path), &self.theme)
    }

    fn set_submodule_branch(&self, path: &str, branch: &str) -> Result<()> {
        self.record("set_submodule_branch", format!("set_submodule_branch {path} {branch}"))?;
        // Entries are appended, so the last section belongs to the newest submodule.
        let gitmodules = self.root.join(".gitmodules");
        let mut contents = fs::read_to_string(&gitmodules).context("read .gitmodules")?;
        let line = format!("\tbranch = {branch}\n");
        if contents.contains(&line) {
            return Ok(());
        }
        contents.push_str(&line);
        fs::write(&gitmodules, contents).context("write .gitmodules")
    }

    fn checkout_branch(&self, path: &str, branch: &str) -> Result<()> {
        self.record("checkout_branch", format!("checkout_branch {path} {branch}"))
    }
}
