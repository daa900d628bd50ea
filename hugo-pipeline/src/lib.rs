//! Scaffold a Hugo static site, pulled in as a theme submodule, into a CDK
//! TypeScript project.
//!
//! The crate splits the work in two:
//!
//! - **[`core`]**: pure planning. Options are validated and turned into an
//!   ordered list of [`core::plan::Step`]s. No I/O.
//! - **[`apply`]**: the reconciler. Each step's gate is evaluated against the
//!   project directory and only missing artifacts are produced, so running the
//!   same plan twice is safe.
//!
//! Side effects (filesystem, git backends, `package.json`, config) live in [`io`].

pub mod apply;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
