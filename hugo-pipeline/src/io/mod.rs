//! Side-effecting helpers: filesystem, git backends, package manifest, config.

pub mod config;
pub mod fs;
pub mod git;
pub mod gitignore;
pub mod manifest;
pub mod native_git;
pub mod process;
