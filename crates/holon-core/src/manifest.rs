// SPDX-License-Identifier: MIT OR Apache-2.0
//! The output contract: [`HolonManifest`].
//!
//! Two historical shapes exist in the wild: `duration` as a raw number of
//! seconds, and `artifacts` as `{name, path}` objects. Both are accepted on
//! parse and normalised; writers always emit the normalised shape. Nested
//! `metadata` objects survive a parse/emit round trip unchanged.

use holon_error::{ErrorKind, HolonError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The agent completed its goal.
    Success,
    /// The run failed; `error` carries the reason.
    Failure,
}

/// The machine-readable record every run produces at `output/manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolonManifest {
    /// Lifecycle status; always `"completed"` once written.
    #[serde(default = "default_status")]
    pub status: String,

    /// Whether the run succeeded.
    pub outcome: Outcome,

    /// Wall-clock duration, normalised to a string like `"12.5s"`.
    ///
    /// Empty when the agent omitted it; the runner fills it in during
    /// augmentation.
    #[serde(default, deserialize_with = "lenient::duration")]
    pub duration: String,

    /// Artifact paths relative to the output directory.
    #[serde(deserialize_with = "lenient::artifacts", default)]
    pub artifacts: Vec<String>,

    /// Free-form metadata. Nested objects (e.g. `engine`) are preserved
    /// verbatim across parse/emit.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Failure reason when `outcome` is `failure`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HolonManifest {
    /// A successful manifest with the given duration and artifacts.
    pub fn success(duration_secs: f64, artifacts: Vec<String>) -> Self {
        Self {
            status: "completed".to_string(),
            outcome: Outcome::Success,
            duration: format_duration(duration_secs),
            artifacts,
            metadata: BTreeMap::new(),
            error: None,
        }
    }

    /// A failed manifest carrying an error message.
    pub fn failure(duration_secs: f64, error: impl Into<String>) -> Self {
        let error = error.into();
        let mut metadata = BTreeMap::new();
        metadata.insert("error".to_string(), serde_json::json!(error.clone()));
        Self {
            status: "completed".to_string(),
            outcome: Outcome::Failure,
            duration: format_duration(duration_secs),
            artifacts: Vec::new(),
            metadata,
            error: Some(error),
        }
    }

    /// Parse a manifest from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, HolonError> {
        serde_json::from_str(text).map_err(|e| {
            HolonError::new(ErrorKind::ManifestMalformed, "failed to parse manifest.json")
                .with_source(e)
        })
    }

    /// Serialise the manifest as pretty JSON with a trailing newline.
    pub fn to_json_string(&self) -> Result<String, HolonError> {
        let mut text = serde_json::to_string_pretty(self).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to serialise manifest").with_source(e)
        })?;
        text.push('\n');
        Ok(text)
    }

    /// Record an artifact path, keeping the list free of duplicates.
    pub fn add_artifact(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.artifacts.iter().any(|a| *a == path) {
            self.artifacts.push(path);
        }
    }
}

fn default_status() -> String {
    "completed".to_string()
}

/// Normalise a duration in seconds to the wire string (`"12.5s"`, `"7s"`).
pub fn format_duration(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}s", secs as u64)
    } else {
        format!("{:.1}s", secs)
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer};

    /// Accept `"12.5s"` or a raw number of seconds; normalise to a string.
    pub fn duration<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Seconds(f64),
        }
        Ok(match Raw::deserialize(de)? {
            Raw::Text(s) => s,
            Raw::Seconds(n) => super::format_duration(n),
        })
    }

    /// Accept `["a"]` or `[{"name": .., "path": ..}]`; normalise to paths.
    pub fn artifacts<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Path(String),
            Named {
                #[serde(default)]
                #[allow(dead_code)]
                name: Option<String>,
                path: String,
            },
        }
        let raw: Vec<Raw> = Vec::deserialize(de)?;
        Ok(raw
            .into_iter()
            .map(|r| match r {
                Raw::Path(p) => p,
                Raw::Named { path, .. } => path,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_normalised_shape() {
        let json = r#"{
            "status": "completed",
            "outcome": "success",
            "duration": "12.5s",
            "artifacts": ["diff.patch", "summary.md", "evidence"]
        }"#;
        let m = HolonManifest::from_json_str(json).expect("parse");
        assert_eq!(m.outcome, Outcome::Success);
        assert_eq!(m.duration, "12.5s");
        assert_eq!(m.artifacts, vec!["diff.patch", "summary.md", "evidence"]);
    }

    #[test]
    fn accepts_numeric_duration() {
        let json = r#"{"status":"completed","outcome":"success","duration":12.5,"artifacts":[]}"#;
        let m = HolonManifest::from_json_str(json).expect("parse");
        assert_eq!(m.duration, "12.5s");
    }

    #[test]
    fn accepts_integer_duration() {
        let json = r#"{"status":"completed","outcome":"success","duration":7,"artifacts":[]}"#;
        let m = HolonManifest::from_json_str(json).expect("parse");
        assert_eq!(m.duration, "7s");
    }

    #[test]
    fn accepts_object_artifacts() {
        let json = r#"{
            "status": "completed",
            "outcome": "success",
            "duration": "1s",
            "artifacts": [
                {"name": "patch", "path": "diff.patch"},
                "summary.md"
            ]
        }"#;
        let m = HolonManifest::from_json_str(json).expect("parse");
        assert_eq!(m.artifacts, vec!["diff.patch", "summary.md"]);
    }

    #[test]
    fn partial_agent_manifest_gets_defaults() {
        let json = r#"{"outcome": "success", "artifacts": ["summary.md"]}"#;
        let m = HolonManifest::from_json_str(json).expect("parse");
        assert_eq!(m.status, "completed");
        assert_eq!(m.duration, "");
    }

    #[test]
    fn rejects_garbage() {
        let err = HolonManifest::from_json_str("{not json").unwrap_err();
        assert_eq!(err.kind, holon_error::ErrorKind::ManifestMalformed);
    }

    #[test]
    fn nested_metadata_roundtrips() {
        let json = r#"{
            "status": "completed",
            "outcome": "success",
            "duration": "3.2s",
            "artifacts": ["diff.patch"],
            "metadata": {
                "engine": {
                    "name": "claude",
                    "sdk": "@anthropic-ai/claude-agent-sdk",
                    "sdkVersion": "0.9.1",
                    "limits": {"maxTurns": 64}
                },
                "title": "Fix: Add X"
            }
        }"#;
        let m = HolonManifest::from_json_str(json).expect("parse");
        let emitted = m.to_json_string().expect("emit");
        let back = HolonManifest::from_json_str(&emitted).expect("reparse");
        assert_eq!(back, m);

        let engine = back.metadata.get("engine").expect("engine present");
        assert_eq!(engine["sdkVersion"], serde_json::json!("0.9.1"));
        assert_eq!(engine["limits"]["maxTurns"], serde_json::json!(64));
    }

    #[test]
    fn emit_omits_empty_metadata_and_error() {
        let m = HolonManifest::success(1.0, vec!["summary.md".into()]);
        let text = m.to_json_string().expect("emit");
        assert!(!text.contains("\"metadata\""));
        assert!(!text.contains("\"error\""));
    }

    #[test]
    fn failure_records_error_twice() {
        // Both the top-level `error` field and `metadata.error` are set so
        // downstream consumers that read either shape see the reason.
        let m = HolonManifest::failure(4.0, "idle timeout after 1800s");
        assert_eq!(m.outcome, Outcome::Failure);
        assert_eq!(m.error.as_deref(), Some("idle timeout after 1800s"));
        assert_eq!(
            m.metadata.get("error"),
            Some(&serde_json::json!("idle timeout after 1800s"))
        );
    }

    #[test]
    fn add_artifact_deduplicates() {
        let mut m = HolonManifest::success(1.0, vec![]);
        m.add_artifact("diff.patch");
        m.add_artifact("diff.patch");
        m.add_artifact("summary.md");
        assert_eq!(m.artifacts, vec!["diff.patch", "summary.md"]);
    }

    #[test]
    fn format_duration_shapes() {
        assert_eq!(format_duration(12.5), "12.5s");
        assert_eq!(format_duration(7.0), "7s");
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(3.25), "3.2s");
    }
}
