//! Host project `package.json`: scripts and dependencies.
//!
//! The manifest is edited as a JSON document so keys the pipeline does not
//! own (and their order) survive untouched.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};
use tracing::debug;

/// Version written for a dependency the manifest does not declare yet.
pub const ANY_VERSION: &str = "*";

#[derive(Debug, Clone)]
pub struct PackageManifest {
    path: PathBuf,
    doc: Value,
    dirty: bool,
}

impl PackageManifest {
    /// Load `path`, or start a minimal manifest named `name` when it is missing.
    pub fn load_or_new(path: &Path, name: &str) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "creating new package manifest");
            let mut doc = Map::new();
            doc.insert("name".to_string(), Value::String(name.to_string()));
            return Ok(Self {
                path: path.to_path_buf(),
                doc: Value::Object(doc),
                dirty: true,
            });
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let doc: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse {}", path.display()))?;
        if !doc.is_object() {
            return Err(anyhow!("{} is not a JSON object", path.display()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            doc,
            dirty: false,
        })
    }

    pub fn script(&self, name: &str) -> Option<&str> {
        self.doc.get("scripts")?.get(name)?.as_str()
    }

    pub fn dependency(&self, name: &str) -> Option<&str> {
        self.doc.get("dependencies")?.get(name)?.as_str()
    }

    /// Set script `name`. Returns whether the manifest changed.
    pub fn set_script(&mut self, name: &str, command: &str) -> Result<bool> {
        if self.script(name) == Some(command) {
            return Ok(false);
        }
        let scripts = self.section("scripts")?;
        scripts.insert(name.to_string(), Value::String(command.to_string()));
        self.dirty = true;
        Ok(true)
    }

    /// Declare a runtime dependency, keeping any version already present.
    pub fn add_dependency(&mut self, name: &str) -> Result<bool> {
        if self.dependency(name).is_some() {
            return Ok(false);
        }
        let deps = self.section("dependencies")?;
        deps.insert(name.to_string(), Value::String(ANY_VERSION.to_string()));
        self.dirty = true;
        Ok(true)
    }

    /// Write the manifest if anything changed. Returns whether it wrote.
    pub fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let mut buf = serde_json::to_string_pretty(&self.doc).context("serialize package.json")?;
        buf.push('\n');
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&self.path, buf).with_context(|| format!("write {}", self.path.display()))?;
        self.dirty = false;
        Ok(true)
    }

    fn section(&mut self, key: &str) -> Result<&mut Map<String, Value>> {
        let root = self
            .doc
            .as_object_mut()
            .ok_or_else(|| anyhow!("package manifest is not a JSON object"))?;
        let entry = root
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        entry
            .as_object_mut()
            .ok_or_else(|| anyhow!("\"{key}\" in package manifest is not an object"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_minimal_manifest_when_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("package.json");

        let mut manifest = PackageManifest::load_or_new(&path, "my-blog").expect("load");
        manifest.set_script("dev", "npm --prefix blog run start").expect("script");
        assert!(manifest.save().expect("save"));

        let written = fs::read_to_string(&path).expect("read");
        assert_eq!(
            written,
            "{\n  \"name\": \"my-blog\",\n  \"scripts\": {\n    \"dev\": \"npm --prefix blog run start\"\n  }\n}\n"
        );
    }

    #[test]
    fn keeps_unrelated_keys_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("package.json");
        fs::write(
            &path,
            r#"{"name":"app","version":"1.0.0","scripts":{"test":"jest"},"dependencies":{"@mavogel/cdk-hugo-pipeline":"^0.1.0"}}"#,
        )
        .expect("seed");

        let mut manifest = PackageManifest::load_or_new(&path, "ignored").expect("load");
        assert!(manifest.set_script("build-dev", "hugo").expect("script"));
        assert!(
            !manifest
                .add_dependency("@mavogel/cdk-hugo-pipeline")
                .expect("dep")
        );
        manifest.save().expect("save");

        let reloaded = PackageManifest::load_or_new(&path, "ignored").expect("reload");
        assert_eq!(reloaded.script("test"), Some("jest"));
        assert_eq!(reloaded.script("build-dev"), Some("hugo"));
        assert_eq!(
            reloaded.dependency("@mavogel/cdk-hugo-pipeline"),
            Some("^0.1.0")
        );
        let keys: Vec<_> = reloaded
            .doc
            .as_object()
            .expect("object")
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["name", "version", "scripts", "dependencies"]);
    }

    #[test]
    fn unchanged_manifest_is_not_rewritten() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("package.json");
        fs::write(&path, "{\"scripts\":{\"dev\":\"x\"}}").expect("seed");

        let mut manifest = PackageManifest::load_or_new(&path, "app").expect("load");
        assert!(!manifest.set_script("dev", "x").expect("script"));
        assert!(!manifest.save().expect("save"));
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "{\"scripts\":{\"dev\":\"x\"}}"
        );
    }

    #[test]
    fn rejects_non_object_scripts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("package.json");
        fs::write(&path, "{\"scripts\":[]}").expect("seed");

        let mut manifest = PackageManifest::load_or_new(&path, "app").expect("load");
        let err = manifest.set_script("dev", "x").unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }
}
