// SPDX-License-Identifier: MIT OR Apache-2.0
//! The canonical run layout.
//!
//! Host-side mirror of the fixed directory shape bound into the container:
//!
//! ```text
//! <root>/input/spec.yaml
//! <root>/input/prompts/{system,user}.md
//! <root>/input/context/...
//! <root>/output/
//! <root>/output/evidence/
//! ```

use anyhow::{Context, Result};
use holon_core::HolonSpec;
use std::fs;
use std::path::{Path, PathBuf};

/// Host-side run directory tree.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    /// Create the full directory shape under `root`.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [
            root.join("input").join("prompts"),
            root.join("input").join("context"),
            root.join("output").join("evidence"),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("create run directory {}", dir.display()))?;
        }
        Ok(Self { root })
    }

    /// Root of the layout.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `input/` directory.
    pub fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    /// `input/context/` directory.
    pub fn context_dir(&self) -> PathBuf {
        self.root.join("input").join("context")
    }

    /// `output/` directory.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// `output/evidence/` directory.
    pub fn evidence_dir(&self) -> PathBuf {
        self.root.join("output").join("evidence")
    }

    /// `input/spec.yaml`.
    pub fn spec_path(&self) -> PathBuf {
        self.root.join("input").join("spec.yaml")
    }

    /// Serialise `spec` to `input/spec.yaml`.
    pub fn write_spec(&self, spec: &HolonSpec) -> Result<()> {
        let text = spec
            .to_yaml_string()
            .map_err(|e| anyhow::anyhow!("serialise spec: {e}"))?;
        fs::write(self.spec_path(), text).context("write input/spec.yaml")?;
        Ok(())
    }

    /// Write the compiled prompt pair.
    pub fn write_prompts(&self, system: &str, user: &str) -> Result<()> {
        let prompts = self.root.join("input").join("prompts");
        fs::write(prompts.join("system.md"), system).context("write system prompt")?;
        fs::write(prompts.join("user.md"), user).context("write user prompt")?;
        Ok(())
    }

    /// Whether both prompt files exist and are non-empty.
    pub fn prompts_present(&self) -> bool {
        let prompts = self.root.join("input").join("prompts");
        ["system.md", "user.md"].iter().all(|name| {
            fs::metadata(prompts.join(name))
                .map(|m| m.len() > 0)
                .unwrap_or(false)
        })
    }

    /// Stage a context file at `input/context/<rel>`, creating parents.
    pub fn stage_context(&self, rel: &str, content: &[u8]) -> Result<()> {
        let target = self.context_dir().join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&target, content)
            .with_context(|| format!("stage context file {}", target.display()))?;
        Ok(())
    }

    /// Absolute path of an output artifact by relative name.
    pub fn artifact_path(&self, rel: &str) -> PathBuf {
        self.output_dir().join(rel)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_builds_full_shape() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::create(dir.path().join("run")).unwrap();

        assert!(layout.input_dir().is_dir());
        assert!(layout.context_dir().is_dir());
        assert!(layout.output_dir().is_dir());
        assert!(layout.evidence_dir().is_dir());
        assert!(layout.root().join("input/prompts").is_dir());
    }

    #[test]
    fn write_spec_roundtrips() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::create(dir.path().join("run")).unwrap();
        let spec = HolonSpec::from_goal("add a README");
        layout.write_spec(&spec).unwrap();

        let text = fs::read_to_string(layout.spec_path()).unwrap();
        let back = HolonSpec::from_yaml_str(&text).unwrap();
        assert_eq!(back.goal.description(), "add a README");
    }

    #[test]
    fn prompts_written_and_detected() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::create(dir.path().join("run")).unwrap();
        assert!(!layout.prompts_present());

        layout.write_prompts("system text", "user text").unwrap();
        assert!(layout.prompts_present());
        assert_eq!(
            fs::read_to_string(layout.root().join("input/prompts/user.md")).unwrap(),
            "user text"
        );
    }

    #[test]
    fn empty_prompts_not_considered_present() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::create(dir.path().join("run")).unwrap();
        layout.write_prompts("", "user").unwrap();
        assert!(!layout.prompts_present());
    }

    #[test]
    fn stage_context_creates_parents() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::create(dir.path().join("run")).unwrap();
        layout
            .stage_context("github/pr.json", br#"{"number": 7}"#)
            .unwrap();

        let staged = layout.context_dir().join("github/pr.json");
        assert!(staged.is_file());
    }

    #[test]
    fn artifact_path_is_under_output() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::create(dir.path().join("run")).unwrap();
        assert_eq!(
            layout.artifact_path("manifest.json"),
            layout.output_dir().join("manifest.json")
        );
    }
}
