//! Pipeline options and the site layout derived from them.
//!
//! Every path the procedure touches is computed here from the options, as a
//! `/`-separated path relative to the project root. Nothing in this module
//! looks at the filesystem.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// npm package providing the `HugoPipeline` CDK construct.
pub const COMPANION_PACKAGE: &str = "@mavogel/cdk-hugo-pipeline";

pub const DEFAULT_SUB_DOMAIN: &str = "dev";
pub const DEFAULT_THEME_GIT_REPO: &str = "https://github.com/apvarun/blist-hugo-theme.git";
pub const DEFAULT_THEME_GIT_REPO_BRANCH: &str = "main";
pub const DEFAULT_THEME_SUBMODULE_STRUCTURE: &str = "blog/themes/blist";
pub const DEFAULT_THEME_CONFIG_FILE: &str = "config.toml";

/// Directory inside a theme that holds its example site.
pub const EXAMPLE_SITE_DIR: &str = "exampleSite";

/// Hugo configuration environments, in the order their directories are created.
pub const CONFIG_ENVIRONMENTS: [&str; 3] = ["_default", "development", "production"];

/// User-facing options for wiring a Hugo blog into the project.
///
/// Missing keys fall back to the documented defaults; only `domain` has no
/// usable default and is rejected by [`PipelineOptions::validate`] when empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineOptions {
    /// Project name used for the sample stack id. Defaults to the output directory name.
    pub name: Option<String>,

    /// Domain name of the website.
    pub domain: String,

    /// Subdomain used for the development environment.
    pub sub_domain: String,

    /// URL of the Hugo theme git repository.
    pub hugo_theme_git_repo: String,

    /// Branch of the theme repository to track.
    pub hugo_theme_git_repo_branch: String,

    /// Submodule path of the theme, ending in `themes/<theme-name>`.
    pub hugo_theme_submodule_structure: String,

    /// File name of the Hugo configuration shipped by the theme's example site.
    pub hugo_theme_config_file: String,

    /// Command starting the Hugo development server. Derived from the layout when unset.
    pub hugo_theme_dev_command: Option<String>,

    /// Emit `src/main.ts` and a placeholder test.
    pub sample_code: bool,

    pub srcdir: String,
    pub testdir: String,
    pub app_entrypoint: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            name: None,
            domain: String::new(),
            sub_domain: DEFAULT_SUB_DOMAIN.to_string(),
            hugo_theme_git_repo: DEFAULT_THEME_GIT_REPO.to_string(),
            hugo_theme_git_repo_branch: DEFAULT_THEME_GIT_REPO_BRANCH.to_string(),
            hugo_theme_submodule_structure: DEFAULT_THEME_SUBMODULE_STRUCTURE.to_string(),
            hugo_theme_config_file: DEFAULT_THEME_CONFIG_FILE.to_string(),
            hugo_theme_dev_command: None,
            sample_code: true,
            srcdir: "src".to_string(),
            testdir: "test".to_string(),
            app_entrypoint: "main.ts".to_string(),
        }
    }
}

impl PipelineOptions {
    /// Options for `domain` with every other field defaulted.
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            bail!("domain must be set");
        }
        if !is_hostname(self.domain.trim()) {
            bail!("domain must be a hostname: '{}'", self.domain);
        }
        if self.sub_domain.trim().is_empty() {
            bail!("sub_domain must not be empty");
        }
        if !is_hostname(self.sub_domain.trim()) {
            bail!("sub_domain must be a hostname label: '{}'", self.sub_domain);
        }
        if self.hugo_theme_git_repo.trim().is_empty() {
            bail!("hugo_theme_git_repo must not be empty");
        }
        if self.hugo_theme_git_repo_branch.trim().is_empty() {
            bail!("hugo_theme_git_repo_branch must not be empty");
        }
        if self.hugo_theme_config_file.trim().is_empty()
            || self.hugo_theme_config_file.contains('/')
        {
            bail!("hugo_theme_config_file must be a plain file name");
        }
        if !self.app_entrypoint.ends_with(".ts") {
            bail!("app_entrypoint must be a .ts file");
        }
        SiteLayout::new(self)?;
        Ok(())
    }

    /// Resolve the project name, falling back to the last component of `root`.
    pub fn project_name(&self, root: &Path) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string())
    }

    /// Resource name used by the sample stack: the domain with dots replaced by hyphens.
    pub fn normalized_site_name(&self) -> String {
        self.domain.trim().replace('.', "-")
    }

    /// Dev server command, either configured or derived from the layout.
    pub fn dev_command(&self, layout: &SiteLayout) -> String {
        if let Some(cmd) = self
            .hugo_theme_dev_command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
        {
            return cmd.to_string();
        }
        match &layout.top_folder {
            Some(top) => format!("npm --prefix {top} run start"),
            None => "npm run start".to_string(),
        }
    }
}

/// Paths derived from [`PipelineOptions`], relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    /// Theme submodule path, e.g. `blog/themes/blist`.
    pub submodule_path: String,
    /// Last component of the submodule path.
    pub theme_name: String,
    /// Folder holding the Hugo site when the theme is nested under one (`blog`).
    pub top_folder: Option<String>,
    /// Configuration file name (e.g. `config.toml`).
    pub config_file: String,
}

impl SiteLayout {
    pub fn new(options: &PipelineOptions) -> Result<Self> {
        let raw = options.hugo_theme_submodule_structure.trim();
        let mut components = Vec::new();
        for part in raw.split('/') {
            match part {
                "" | "." => continue,
                ".." => bail!("hugo_theme_submodule_structure must not contain '..': {raw}"),
                other => components.push(other),
            }
        }
        if components.len() < 2 || components[components.len() - 2] != "themes" {
            bail!("hugo_theme_submodule_structure must end in themes/<theme-name>: '{raw}'");
        }

        let theme_name = components[components.len() - 1].to_string();
        let top = &components[..components.len() - 2];
        let top_folder = (!top.is_empty()).then(|| top.join("/"));

        Ok(Self {
            submodule_path: components.join("/"),
            theme_name,
            top_folder,
            config_file: options.hugo_theme_config_file.trim().to_string(),
        })
    }

    /// Path inside the Hugo content root (the top folder, or the project root).
    pub fn content_path(&self, rel: &str) -> String {
        join(self.top_folder.as_deref().unwrap_or(""), rel)
    }

    /// Path inside the theme submodule.
    pub fn theme_path(&self, rel: &str) -> String {
        join(&self.submodule_path, rel)
    }

    pub fn content_root(&self) -> String {
        self.top_folder.clone().unwrap_or_default()
    }

    pub fn example_site(&self) -> String {
        self.theme_path(EXAMPLE_SITE_DIR)
    }

    pub fn config_root(&self) -> String {
        self.content_path("config")
    }

    /// Configuration directory for one environment, e.g. `blog/config/production`.
    pub fn config_dir(&self, environment: &str) -> String {
        join(&self.config_root(), environment)
    }

    /// Configuration file for one environment.
    pub fn env_config_file(&self, environment: &str) -> String {
        join(&self.config_dir(environment), &self.config_file)
    }

    /// Environment-agnostic configuration file as copied from the example site.
    pub fn root_config_file(&self) -> String {
        self.content_path(&self.config_file)
    }

    /// Hugo build command for `environment`, scoped to the top folder when there is one.
    pub fn hugo_build_command(&self, environment: &str) -> String {
        let mut cmd = format!("hugo --gc --minify --cleanDestinationDir --environment {environment}");
        if let Some(top) = &self.top_folder {
            cmd.push_str(&format!(" --source {top}"));
        }
        cmd
    }
}

/// Dot-separated labels of ASCII letters, digits and inner hyphens.
fn is_hostname(value: &str) -> bool {
    static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)*$")
            .expect("hostname pattern")
    });
    HOSTNAME_RE.is_match(value)
}

fn join(base: &str, rel: &str) -> String {
    match (base.is_empty(), rel.is_empty()) {
        (true, _) => rel.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{rel}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_nests_theme_under_blog() {
        let options = PipelineOptions::for_domain("example.com");
        let layout = SiteLayout::new(&options).expect("layout");

        assert_eq!(layout.submodule_path, "blog/themes/blist");
        assert_eq!(layout.theme_name, "blist");
        assert_eq!(layout.top_folder.as_deref(), Some("blog"));
        assert_eq!(layout.example_site(), "blog/themes/blist/exampleSite");
        assert_eq!(layout.root_config_file(), "blog/config.toml");
        assert_eq!(
            layout.env_config_file("development"),
            "blog/config/development/config.toml"
        );
    }

    #[test]
    fn theme_directly_under_themes_uses_project_root() {
        let options = PipelineOptions {
            hugo_theme_submodule_structure: "/themes/papermod/".to_string(),
            hugo_theme_config_file: "hugo.toml".to_string(),
            ..PipelineOptions::for_domain("example.com")
        };
        let layout = SiteLayout::new(&options).expect("layout");

        assert_eq!(layout.submodule_path, "themes/papermod");
        assert_eq!(layout.top_folder, None);
        assert_eq!(layout.content_root(), "");
        assert_eq!(layout.root_config_file(), "hugo.toml");
        assert_eq!(layout.env_config_file("_default"), "config/_default/hugo.toml");
        assert_eq!(options.dev_command(&layout), "npm run start");
        assert_eq!(
            layout.hugo_build_command("production"),
            "hugo --gc --minify --cleanDestinationDir --environment production"
        );
    }

    #[test]
    fn rejects_structure_without_themes_dir() {
        let options = PipelineOptions {
            hugo_theme_submodule_structure: "blog/blist".to_string(),
            ..PipelineOptions::for_domain("example.com")
        };
        let err = SiteLayout::new(&options).unwrap_err();
        assert!(err.to_string().contains("themes/<theme-name>"));
    }

    #[test]
    fn rejects_parent_components() {
        let options = PipelineOptions {
            hugo_theme_submodule_structure: "../themes/blist".to_string(),
            ..PipelineOptions::for_domain("example.com")
        };
        assert!(SiteLayout::new(&options).is_err());
    }

    #[test]
    fn validate_requires_domain() {
        let err = PipelineOptions::default().validate().unwrap_err();
        assert!(err.to_string().contains("domain"));
    }

    #[test]
    fn validate_rejects_characters_outside_hostnames() {
        let quoted = PipelineOptions::for_domain("exa'mple.com");
        assert!(quoted.validate().unwrap_err().to_string().contains("hostname"));

        let spaced = PipelineOptions {
            sub_domain: "my sub".to_string(),
            ..PipelineOptions::for_domain("example.com")
        };
        assert!(spaced.validate().is_err());

        let dotted = PipelineOptions::for_domain("example.com.");
        assert!(dotted.validate().is_err());

        let ok = PipelineOptions {
            sub_domain: "preview-2".to_string(),
            ..PipelineOptions::for_domain("blog.example.co.uk")
        };
        ok.validate().expect("valid");
    }

    #[test]
    fn dev_command_defaults_to_top_folder_prefix() {
        let options = PipelineOptions::for_domain("example.com");
        let layout = SiteLayout::new(&options).expect("layout");
        assert_eq!(options.dev_command(&layout), "npm --prefix blog run start");

        let custom = PipelineOptions {
            hugo_theme_dev_command: Some("hugo server -s blog".to_string()),
            ..options
        };
        assert_eq!(custom.dev_command(&layout), "hugo server -s blog");
    }

    #[test]
    fn project_name_falls_back_to_directory_name() {
        let options = PipelineOptions::for_domain("example.com");
        assert_eq!(options.project_name(Path::new("/tmp/my-blog")), "my-blog");

        let named = PipelineOptions {
            name: Some("site".to_string()),
            ..options
        };
        assert_eq!(named.project_name(Path::new("/tmp/my-blog")), "site");
    }

    #[test]
    fn normalized_site_name_replaces_dots() {
        let options = PipelineOptions::for_domain("blog.example.co.uk");
        assert_eq!(options.normalized_site_name(), "blog-example-co-uk");
    }
}
