// SPDX-License-Identifier: MIT OR Apache-2.0
//! The input contract: [`HolonSpec`].
//!
//! A spec is either loaded from a `v1` YAML file or synthesised from a bare
//! goal string. Both paths produce the same validated record.

use holon_error::{ErrorKind, HolonError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::artifacts;

/// A declarative task for one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolonSpec {
    /// Contract version; must equal `"v1"`.
    pub version: String,

    /// Record kind; must equal `"Holon"`.
    pub kind: String,

    /// Free-form metadata. Recognised keys: `name`, `mode`, `title`,
    /// `issue_id`, `branch`, `skills`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Workspace, file, and environment context for the run.
    #[serde(default)]
    pub context: ContextSpec,

    /// What the agent should accomplish.
    pub goal: Goal,

    /// Declared output artifacts.
    #[serde(default)]
    pub output: OutputSpec,
}

/// Workspace and environment context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSpec {
    /// Host workspace path to snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    /// Additional context files to stage under `input/context/`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    /// Environment variables forwarded into the container.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// The goal of a run: a bare string or a structured record.
///
/// Both shapes deserialise; callers normalise through the accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Goal {
    /// A free-form goal sentence.
    Text(String),
    /// A structured goal with an optional issue reference.
    Detailed {
        /// What to do.
        description: String,
        /// GitHub issue number this goal tracks, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issue_id: Option<u64>,
    },
}

impl Goal {
    /// The goal description, whichever shape was supplied.
    pub fn description(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::Detailed { description, .. } => description,
        }
    }

    /// The issue id, if the structured shape carried one.
    pub fn issue_id(&self) -> Option<u64> {
        match self {
            Self::Text(_) => None,
            Self::Detailed { issue_id, .. } => *issue_id,
        }
    }
}

/// Declared outputs of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Ordered artifact declarations.
    #[serde(default)]
    pub artifacts: Vec<ArtifactSpec>,
}

/// A single declared artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Path relative to the output directory.
    pub path: String,

    /// Whether the run fails when this artifact is absent.
    #[serde(default)]
    pub required: bool,
}

impl ArtifactSpec {
    /// A required artifact at `path`.
    pub fn required(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }

    /// An optional artifact at `path`.
    pub fn optional(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            required: false,
        }
    }
}

// ---------------------------------------------------------------------------
// RunMode
// ---------------------------------------------------------------------------

/// The run mode label.
///
/// Mode is an opaque string as far as the runner is concerned; it is
/// propagated to the agent as `HOLON_MODE` and used only to seed the default
/// required-artifact list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Produce a patch for a goal or issue (the default).
    Solve,
    /// Address review comments and failing checks on an existing PR.
    PrFix,
    /// Any other label; passed through untouched.
    Other(String),
}

impl RunMode {
    /// Parse a mode label. Unrecognised labels become [`RunMode::Other`].
    pub fn parse(s: &str) -> Self {
        match s {
            "solve" => Self::Solve,
            "pr-fix" => Self::PrFix,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire label for this mode.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Solve => "solve",
            Self::PrFix => "pr-fix",
            Self::Other(s) => s,
        }
    }

    /// Default artifact declarations for this mode.
    ///
    /// Every mode requires `manifest.json` and `summary.md`; `solve`
    /// additionally requires `diff.patch`, `pr-fix` requires both
    /// `diff.patch` and `pr-fix.json`.
    pub fn default_artifacts(&self) -> Vec<ArtifactSpec> {
        let mut out = vec![
            ArtifactSpec::required(artifacts::MANIFEST),
            ArtifactSpec::required(artifacts::DIFF),
            ArtifactSpec::required(artifacts::SUMMARY),
        ];
        if matches!(self, Self::PrFix) {
            out.push(ArtifactSpec::required(artifacts::PR_FIX));
        }
        out
    }
}

impl Default for RunMode {
    fn default() -> Self {
        Self::Solve
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HolonSpec operations
// ---------------------------------------------------------------------------

impl HolonSpec {
    /// Synthesise a spec from a bare goal string.
    ///
    /// The resulting spec carries the goal verbatim and requires the default
    /// artifact set (`manifest.json`, `diff.patch`, `summary.md`).
    pub fn from_goal(goal: &str) -> Self {
        Self {
            version: crate::SPEC_VERSION.to_string(),
            kind: crate::SPEC_KIND.to_string(),
            metadata: BTreeMap::new(),
            context: ContextSpec::default(),
            goal: Goal::Text(goal.to_string()),
            output: OutputSpec {
                artifacts: RunMode::Solve.default_artifacts(),
            },
        }
    }

    /// Parse a spec from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, HolonError> {
        serde_yaml::from_str(text).map_err(|e| {
            HolonError::new(ErrorKind::SpecInvalid, "failed to parse spec YAML").with_source(e)
        })
    }

    /// Serialise the spec to YAML text.
    pub fn to_yaml_string(&self) -> Result<String, HolonError> {
        serde_yaml::to_string(self).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to serialise spec YAML").with_source(e)
        })
    }

    /// Validate the invariants of a `v1` spec.
    pub fn validate(&self) -> Result<(), HolonError> {
        if self.version != crate::SPEC_VERSION {
            return Err(
                HolonError::new(ErrorKind::SpecInvalid, "unsupported spec version")
                    .with_context("version", &self.version),
            );
        }
        if self.kind != crate::SPEC_KIND {
            return Err(HolonError::new(ErrorKind::SpecInvalid, "unsupported spec kind")
                .with_context("kind", &self.kind));
        }
        if self.goal.description().trim().is_empty() {
            return Err(HolonError::new(ErrorKind::SpecInvalid, "goal is empty"));
        }
        if self.output.artifacts.is_empty() {
            return Err(HolonError::new(
                ErrorKind::SpecInvalid,
                "output.artifacts must declare at least one artifact",
            ));
        }
        Ok(())
    }

    /// The run mode, read from `metadata.mode` (defaults to `solve`).
    pub fn mode(&self) -> RunMode {
        self.metadata
            .get("mode")
            .and_then(|v| v.as_str())
            .map(RunMode::parse)
            .unwrap_or_default()
    }

    /// A metadata value as a string, when present and a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// The issue id, from the goal first and `metadata.issue_id` second.
    ///
    /// Metadata values may be numbers or strings; both are accepted.
    pub fn issue_id(&self) -> Option<u64> {
        if let Some(id) = self.goal.issue_id() {
            return Some(id);
        }
        match self.metadata.get("issue_id") {
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    /// Paths of all artifacts declared `required: true`.
    pub fn required_artifacts(&self) -> Vec<&str> {
        self.output
            .artifacts
            .iter()
            .filter(|a| a.required)
            .map(|a| a.path.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_SPEC: &str = r#"
version: v1
kind: Holon
metadata:
  name: fix-flaky-test
  mode: pr-fix
  issue_id: 42
context:
  workspace: /work/repo
  env:
    RUST_LOG: debug
goal:
  description: Fix the flaky integration test
  issue_id: 42
output:
  artifacts:
    - path: manifest.json
      required: true
    - path: diff.patch
      required: true
    - path: summary.md
      required: true
    - path: pr-fix.json
      required: true
"#;

    // -- Parsing ----------------------------------------------------------

    #[test]
    fn parses_full_spec() {
        let spec = HolonSpec::from_yaml_str(FULL_SPEC).expect("parse");
        assert_eq!(spec.version, "v1");
        assert_eq!(spec.kind, "Holon");
        assert_eq!(spec.goal.description(), "Fix the flaky integration test");
        assert_eq!(spec.goal.issue_id(), Some(42));
        assert_eq!(spec.context.workspace.as_deref(), Some("/work/repo"));
        assert_eq!(spec.output.artifacts.len(), 4);
        spec.validate().expect("valid");
    }

    #[test]
    fn parses_string_goal() {
        let yaml = "version: v1\nkind: Holon\ngoal: add a README\noutput:\n  artifacts:\n    - path: manifest.json\n      required: true\n";
        let spec = HolonSpec::from_yaml_str(yaml).expect("parse");
        assert_eq!(spec.goal.description(), "add a README");
        assert_eq!(spec.goal.issue_id(), None);
    }

    #[test]
    fn rejects_bad_yaml() {
        let err = HolonSpec::from_yaml_str("version: [unclosed").unwrap_err();
        assert_eq!(err.kind, holon_error::ErrorKind::SpecInvalid);
    }

    #[test]
    fn yaml_roundtrip() {
        let spec = HolonSpec::from_yaml_str(FULL_SPEC).expect("parse");
        let emitted = spec.to_yaml_string().expect("emit");
        let back = HolonSpec::from_yaml_str(&emitted).expect("reparse");
        assert_eq!(back.goal.description(), spec.goal.description());
        assert_eq!(back.output.artifacts, spec.output.artifacts);
        assert_eq!(back.metadata, spec.metadata);
    }

    // -- Goal synthesis ---------------------------------------------------

    #[test]
    fn from_goal_sets_defaults() {
        let spec = HolonSpec::from_goal("noop");
        assert_eq!(spec.goal.description(), "noop");
        spec.validate().expect("synthesised specs are valid");
        let required = spec.required_artifacts();
        assert_eq!(required, vec!["manifest.json", "diff.patch", "summary.md"]);
    }

    // -- Validation -------------------------------------------------------

    #[test]
    fn rejects_wrong_version() {
        let mut spec = HolonSpec::from_goal("x");
        spec.version = "v2".into();
        let err = spec.validate().unwrap_err();
        assert_eq!(err.kind, holon_error::ErrorKind::SpecInvalid);
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn rejects_wrong_kind() {
        let mut spec = HolonSpec::from_goal("x");
        spec.kind = "Job".into();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn rejects_empty_goal() {
        let spec = HolonSpec::from_goal("   ");
        assert!(spec.validate().is_err());
    }

    #[test]
    fn rejects_empty_artifacts() {
        let mut spec = HolonSpec::from_goal("x");
        spec.output.artifacts.clear();
        assert!(spec.validate().is_err());
    }

    // -- Mode -------------------------------------------------------------

    #[test]
    fn mode_defaults_to_solve() {
        let spec = HolonSpec::from_goal("x");
        assert_eq!(spec.mode(), RunMode::Solve);
    }

    #[test]
    fn mode_read_from_metadata() {
        let spec = HolonSpec::from_yaml_str(FULL_SPEC).expect("parse");
        assert_eq!(spec.mode(), RunMode::PrFix);
    }

    #[test]
    fn unknown_mode_is_preserved() {
        let mode = RunMode::parse("triage");
        assert_eq!(mode, RunMode::Other("triage".into()));
        assert_eq!(mode.as_str(), "triage");
    }

    #[test]
    fn pr_fix_mode_requires_pr_fix_artifact() {
        let paths: Vec<String> = RunMode::PrFix
            .default_artifacts()
            .into_iter()
            .map(|a| a.path)
            .collect();
        assert!(paths.contains(&"pr-fix.json".to_string()));

        let solve_paths: Vec<String> = RunMode::Solve
            .default_artifacts()
            .into_iter()
            .map(|a| a.path)
            .collect();
        assert!(!solve_paths.contains(&"pr-fix.json".to_string()));
        assert!(solve_paths.contains(&"diff.patch".to_string()));
    }

    // -- Metadata accessors -----------------------------------------------

    #[test]
    fn issue_id_prefers_goal() {
        let spec = HolonSpec::from_yaml_str(FULL_SPEC).expect("parse");
        assert_eq!(spec.issue_id(), Some(42));
    }

    #[test]
    fn issue_id_from_metadata_string() {
        let mut spec = HolonSpec::from_goal("x");
        spec.metadata
            .insert("issue_id".into(), serde_json::json!("17"));
        assert_eq!(spec.issue_id(), Some(17));
    }

    #[test]
    fn issue_id_from_metadata_number() {
        let mut spec = HolonSpec::from_goal("x");
        spec.metadata.insert("issue_id".into(), serde_json::json!(9));
        assert_eq!(spec.issue_id(), Some(9));
    }
}
