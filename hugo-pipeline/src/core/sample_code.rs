//! Sample application sources emitted next to the Hugo site.
//!
//! Rendering is pure: the planner decides where the files go and under which
//! overwrite policy.

use anyhow::Result;
use minijinja::{AutoEscape, Environment, context};

use super::options::{COMPANION_PACKAGE, PipelineOptions, SiteLayout};

const MAIN_TEMPLATE: &str = include_str!("templates/main.ts.jinja");
const TEST_TEMPLATE: &str = include_str!("templates/main.test.ts.jinja");

/// Assertion written into the placeholder test; also marks the file as untouched.
pub const PLACEHOLDER_ASSERTION: &str = "expect(true).toBe(true);";

/// Build command handed to the construct, run inside the Hugo project path.
const CONSTRUCT_BUILD_COMMAND: &str = "hugo --gc --cleanDestinationDir --minify";

/// Rendered sample sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCode {
    pub entrypoint: String,
    pub test: String,
}

struct SampleEngine {
    env: Environment<'static>,
}

impl SampleEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_filter("ts_string", ts_string);
        env.add_template("main", MAIN_TEMPLATE)?;
        env.add_template("main.test", TEST_TEMPLATE)?;
        Ok(Self { env })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let mut rendered = self.env.get_template(name)?.render(ctx)?;
        rendered.push('\n');
        Ok(rendered)
    }
}

/// Render the entry point and placeholder test for `options`.
pub fn render_sample_code(
    options: &PipelineOptions,
    layout: &SiteLayout,
    project_name: &str,
) -> Result<SampleCode> {
    let engine = SampleEngine::new()?;
    let entrypoint = engine.render(
        "main",
        context! {
            companion_package => COMPANION_PACKAGE,
            site_name => options.normalized_site_name(),
            domain => options.domain.trim(),
            sub_domain => options.sub_domain.trim(),
            project_name => project_name,
            hugo_project_path => hugo_project_path(layout),
            hugo_build_command => CONSTRUCT_BUILD_COMMAND,
        },
    )?;
    let test = engine.render(
        "main.test",
        context! { placeholder_assertion => PLACEHOLDER_ASSERTION },
    )?;
    Ok(SampleCode { entrypoint, test })
}

/// Escape `value` for a single-quoted TypeScript string literal.
fn ts_string(value: String) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Test file name for an entry point: `main.ts` becomes `main.test.ts`.
pub fn test_file_name(app_entrypoint: &str) -> String {
    let stem = app_entrypoint
        .rsplit('/')
        .next()
        .unwrap_or(app_entrypoint)
        .trim_end_matches(".ts");
    format!("{stem}.test.ts")
}

// The construct resolves the path from its own location inside node_modules.
fn hugo_project_path(layout: &SiteLayout) -> String {
    match &layout.top_folder {
        Some(top) => format!("../../../../{top}"),
        None => "../../../..".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(domain: &str, sub_domain: &str) -> SampleCode {
        let options = PipelineOptions {
            sub_domain: sub_domain.to_string(),
            ..PipelineOptions::for_domain(domain)
        };
        let layout = SiteLayout::new(&options).expect("layout");
        render_sample_code(&options, &layout, "my-app").expect("render")
    }

    #[test]
    fn entrypoint_uses_companion_construct_and_normalized_name() {
        let code = render("example.com", "my-sub");

        assert!(
            code.entrypoint
                .contains("import { HugoPipeline } from '@mavogel/cdk-hugo-pipeline';")
        );
        assert!(
            code.entrypoint
                .contains("new HugoPipeline(this, 'example-com', {")
        );
        assert!(code.entrypoint.contains("siteSubDomain: 'my-sub',"));
        assert!(code.entrypoint.contains("hugoProjectPath: '../../../../blog',"));
        assert!(code.entrypoint.contains(
            "new MyStack(app, 'my-app-dev', { env: devEnv, domainName: 'example.com' });"
        ));
        assert!(code.entrypoint.contains("process.env.CDK_DEFAULT_ACCOUNT"));
        assert!(code.entrypoint.ends_with("app.synth();\n"));
    }

    #[test]
    fn test_source_is_a_tautology() {
        let code = render("example.com", "dev");
        assert_eq!(
            code.test,
            "test('Snapshot', () => {\n  expect(true).toBe(true);\n});\n"
        );
    }

    #[test]
    fn project_name_is_escaped_in_stack_id() {
        let options = PipelineOptions::for_domain("example.com");
        let layout = SiteLayout::new(&options).expect("layout");
        let code = render_sample_code(&options, &layout, "bob's blog").expect("render");
        assert!(code.entrypoint.contains("new MyStack(app, 'bob\\'s blog-dev', {"));
    }

    #[test]
    fn ts_string_escapes_quotes_and_backslashes() {
        assert_eq!(ts_string("a'b\\c\nd".to_string()), "a\\'b\\\\c\\nd");
        assert_eq!(ts_string("example-com".to_string()), "example-com");
    }

    #[test]
    fn test_file_name_strips_extension() {
        assert_eq!(test_file_name("main.ts"), "main.test.ts");
        assert_eq!(test_file_name("app/blog.ts"), "blog.test.ts");
    }
}
