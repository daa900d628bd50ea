//! Planning: options in, ordered list of steps out.
//!
//! Each [`Step`] describes one managed artifact or mutation together with the
//! information its gate needs. The planner never touches the filesystem; the
//! reconciler in [`crate::apply`] evaluates the gates against a project.

use std::fmt;

use anyhow::Result;

use super::options::{COMPANION_PACKAGE, CONFIG_ENVIRONMENTS, PipelineOptions, SiteLayout};
use super::sample_code::{PLACEHOLDER_ASSERTION, render_sample_code, test_file_name};

/// Files a theme may ship that the dev command needs next to the site.
pub const MIRRORED_THEME_FILES: [&str; 2] = ["package.json", "package-lock.json"];

pub const DEV_SCRIPT: &str = "dev";
pub const BUILD_DEV_SCRIPT: &str = "build-dev";
pub const BUILD_PROD_SCRIPT: &str = "build-prod";

/// Overwrite policy for a [`ManagedFile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overwrite {
    /// Declarative content: rewritten whenever it differs, untouched otherwise.
    Always,
    /// Left alone when the existing file already contains the marker.
    UnlessContains(String),
}

/// A text file whose content is owned by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    pub path: String,
    pub contents: String,
    pub overwrite: Overwrite,
}

/// One unit of work, applied in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Initialize a repository when the project has no `.git`.
    EnsureRepository,
    /// Add the theme as a submodule unless `.gitmodules` already declares `path`.
    AttachSubmodule { url: String, path: String },
    /// Track `branch` for the submodule and check it out.
    PinBranch { path: String, branch: String },
    /// Fail unless `path` is a directory.
    RequireDir { path: String, what: String },
    /// Copy the example site over the content root unless it was copied before.
    CopyExampleSite {
        from: String,
        to: String,
        theme_name: String,
        /// Config files probed for a `theme = "<name>"` declaration.
        config_files: Vec<String>,
        /// Relocated config; its presence alone means the copy already happened.
        relocated_config: String,
    },
    CreateDirs { paths: Vec<String> },
    /// Move `from` to `to` unless `to` exists.
    MoveFile { from: String, to: String },
    WriteFile(ManagedFile),
    /// Ensure each pattern is a line of the project `.gitignore`.
    IgnorePatterns { patterns: Vec<String> },
    /// Copy `from` to `to` when `to` is missing and `from` exists.
    MirrorFile { from: String, to: String },
    SetScript { name: String, command: String },
    AddDependency { name: String },
    /// Emit the sample entry point and test unless any TypeScript file under
    /// `srcdir` already references `marker`.
    EmitSampleCode {
        srcdir: String,
        marker: String,
        entrypoint: ManagedFile,
        test: ManagedFile,
    },
    /// Remove `.git` again if this run created it.
    RemoveTemporaryRepository,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::EnsureRepository => write!(f, "ensure git repository"),
            Step::AttachSubmodule { url, path } => write!(f, "attach submodule {url} at {path}"),
            Step::PinBranch { path, branch } => write!(f, "pin {path} to branch {branch}"),
            Step::RequireDir { path, what } => write!(f, "require {what} at {path}"),
            Step::CopyExampleSite { from, to, .. } => {
                let to = if to.is_empty() { "." } else { to.as_str() };
                write!(f, "copy example site {from} -> {to}")
            }
            Step::CreateDirs { paths } => write!(f, "create directories {}", paths.join(", ")),
            Step::MoveFile { from, to } => write!(f, "move {from} -> {to}"),
            Step::WriteFile(file) => write!(f, "write {}", file.path),
            Step::IgnorePatterns { patterns } => {
                write!(f, "ignore {}", patterns.join(", "))
            }
            Step::MirrorFile { from, to } => write!(f, "mirror {from} -> {to}"),
            Step::SetScript { name, command } => write!(f, "set script {name} = {command}"),
            Step::AddDependency { name } => write!(f, "add dependency {name}"),
            Step::EmitSampleCode {
                entrypoint, test, ..
            } => write!(f, "emit sample code {}, {}", entrypoint.path, test.path),
            Step::RemoveTemporaryRepository => write!(f, "remove temporary git repository"),
        }
    }
}

/// Ordered steps plus the layout they were derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub layout: SiteLayout,
    pub steps: Vec<Step>,
}

/// Build the plan for `options`. `project_name` feeds the sample stack id.
pub fn build_plan(options: &PipelineOptions, project_name: &str) -> Result<Plan> {
    options.validate()?;
    let layout = SiteLayout::new(options)?;
    let domain = options.domain.trim();
    let sub_domain = options.sub_domain.trim();

    let mut steps = vec![
        Step::EnsureRepository,
        Step::AttachSubmodule {
            url: options.hugo_theme_git_repo.trim().to_string(),
            path: layout.submodule_path.clone(),
        },
        Step::PinBranch {
            path: layout.submodule_path.clone(),
            branch: options.hugo_theme_git_repo_branch.trim().to_string(),
        },
        Step::RequireDir {
            path: layout.example_site(),
            what: "theme example site".to_string(),
        },
        Step::CopyExampleSite {
            from: layout.example_site(),
            to: layout.content_root(),
            theme_name: layout.theme_name.clone(),
            config_files: vec![layout.root_config_file(), layout.env_config_file("_default")],
            relocated_config: layout.env_config_file("_default"),
        },
        Step::CreateDirs {
            paths: CONFIG_ENVIRONMENTS
                .iter()
                .map(|env| layout.config_dir(env))
                .collect(),
        },
        Step::MoveFile {
            from: layout.root_config_file(),
            to: layout.env_config_file("_default"),
        },
        Step::WriteFile(ManagedFile {
            path: layout.env_config_file("development"),
            contents: environment_config(
                &format!("https://{sub_domain}.{domain}"),
                "public-development",
            ),
            overwrite: Overwrite::Always,
        }),
        Step::WriteFile(ManagedFile {
            path: layout.env_config_file("production"),
            contents: environment_config(&format!("https://{domain}"), "public-production"),
            overwrite: Overwrite::Always,
        }),
        Step::IgnorePatterns {
            patterns: theme_ignore_patterns(&layout),
        },
    ];

    for file in MIRRORED_THEME_FILES {
        steps.push(Step::MirrorFile {
            from: layout.theme_path(file),
            to: layout.content_path(file),
        });
    }

    steps.push(Step::SetScript {
        name: DEV_SCRIPT.to_string(),
        command: options.dev_command(&layout),
    });
    steps.push(Step::SetScript {
        name: BUILD_DEV_SCRIPT.to_string(),
        command: layout.hugo_build_command("development"),
    });
    steps.push(Step::SetScript {
        name: BUILD_PROD_SCRIPT.to_string(),
        command: layout.hugo_build_command("production"),
    });
    steps.push(Step::AddDependency {
        name: COMPANION_PACKAGE.to_string(),
    });

    if options.sample_code {
        let code = render_sample_code(options, &layout, project_name)?;
        let srcdir = options.srcdir.trim_matches('/');
        let testdir = options.testdir.trim_matches('/');
        steps.push(Step::EmitSampleCode {
            srcdir: srcdir.to_string(),
            marker: COMPANION_PACKAGE.to_string(),
            entrypoint: ManagedFile {
                path: format!("{srcdir}/{}", options.app_entrypoint),
                contents: code.entrypoint,
                overwrite: Overwrite::Always,
            },
            test: ManagedFile {
                path: format!("{testdir}/{}", test_file_name(&options.app_entrypoint)),
                contents: code.test,
                overwrite: Overwrite::UnlessContains(PLACEHOLDER_ASSERTION.to_string()),
            },
        });
    }

    steps.push(Step::RemoveTemporaryRepository);

    Ok(Plan { layout, steps })
}

/// Per-environment Hugo config overriding the base URL and publish directory.
pub fn environment_config(base_url: &str, publish_dir: &str) -> String {
    format!("baseurl = \"{base_url}\"\npublishDir = \"{publish_dir}\"\n")
}

/// Build artifacts Hugo leaves inside the theme checkout.
pub fn theme_ignore_patterns(layout: &SiteLayout) -> Vec<String> {
    ["public*", "resources/_gen", ".DS_Store", ".hugo_build.lock"]
        .iter()
        .map(|rel| layout.theme_path(rel))
        .collect()
}
