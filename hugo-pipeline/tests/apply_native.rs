//! End-to-end scaffolding with the libgit2 backend against a local theme repository.

use std::fs;
use std::path::Path;

use hugo_pipeline::apply::{StepOutcome, apply};
use hugo_pipeline::core::options::PipelineOptions;
use hugo_pipeline::core::plan::{Plan, build_plan};
use hugo_pipeline::io::native_git::NativeGit;
use hugo_pipeline::test_support::{ThemeFixture, ThemeSpec};

fn plan_for(theme: &ThemeFixture) -> Plan {
    let options = PipelineOptions {
        sub_domain: "my-sub".to_string(),
        hugo_theme_git_repo: theme.url(),
        ..PipelineOptions::for_domain("example.com")
    };
    build_plan(&options, "my-blog").expect("plan")
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap_or_else(|_| panic!("read {rel}"))
}

#[test]
fn native_backend_scaffolds_site() {
    let theme = ThemeFixture::new(&ThemeSpec::default()).expect("theme");
    let project = tempfile::tempdir().expect("tempdir");
    let root = project.path();

    apply(&plan_for(&theme), root, "my-blog", &NativeGit::new(root)).expect("apply");

    assert!(!root.join(".git").exists(), "temporary repository removed");
    assert!(root.join("blog/themes/blist/.git").exists(), "theme keeps its repository");
    assert!(root.join("blog/themes/blist/layouts/index.html").is_file());

    let gitmodules = read(root, ".gitmodules");
    assert!(gitmodules.contains("[submodule \"blog/themes/blist\"]"));
    assert!(gitmodules.contains("branch = main"));

    assert_eq!(
        read(root, "blog/config/development/config.toml"),
        "baseurl = \"https://my-sub.example.com\"\npublishDir = \"public-development\"\n"
    );
    assert!(read(root, "blog/config/_default/config.toml").contains("theme = \"blist\""));
    assert!(root.join("blog/content/posts/hello.md").is_file());
    assert!(root.join("blog/package.json").is_file());

    let manifest: serde_json::Value =
        serde_json::from_str(&read(root, "package.json")).expect("manifest json");
    assert_eq!(manifest["scripts"]["dev"], "npm --prefix blog run start");
    assert_eq!(
        manifest["scripts"]["build-prod"],
        "hugo --gc --minify --cleanDestinationDir --environment production --source blog"
    );
    assert_eq!(manifest["dependencies"]["@mavogel/cdk-hugo-pipeline"], "*");
}

#[test]
fn native_backend_rerun_is_idempotent() {
    let theme = ThemeFixture::new(&ThemeSpec::default()).expect("theme");
    let project = tempfile::tempdir().expect("tempdir");
    let root = project.path();
    let plan = plan_for(&theme);

    apply(&plan, root, "my-blog", &NativeGit::new(root)).expect("first apply");
    let gitignore = read(root, ".gitignore");
    let manifest = read(root, "package.json");
    let main_ts = read(root, "src/main.ts");

    let report = apply(&plan, root, "my-blog", &NativeGit::new(root)).expect("second apply");

    let gitmodules = read(root, ".gitmodules");
    assert_eq!(gitmodules.matches("[submodule ").count(), 1, "{gitmodules}");
    assert_eq!(gitmodules.matches("branch = main").count(), 1, "{gitmodules}");
    assert_eq!(read(root, ".gitignore"), gitignore);
    assert_eq!(read(root, "package.json"), manifest);
    assert_eq!(read(root, "src/main.ts"), main_ts);
    assert!(!root.join(".git").exists());

    let attach = report
        .steps
        .iter()
        .find(|s| s.step.starts_with("attach submodule"))
        .expect("attach step");
    assert!(matches!(attach.outcome, StepOutcome::Skipped(_)));
}

#[test]
fn project_repository_is_left_in_place() {
    let theme = ThemeFixture::new(&ThemeSpec::default()).expect("theme");
    let project = tempfile::tempdir().expect("tempdir");
    let root = project.path();
    git2::Repository::init(root).expect("init project");

    apply(&plan_for(&theme), root, "my-blog", &NativeGit::new(root)).expect("apply");

    let repo = git2::Repository::open(root).expect("open project");
    assert!(repo.find_submodule("blog/themes/blist").is_ok());
}
