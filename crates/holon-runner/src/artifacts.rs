// SPDX-License-Identifier: MIT OR Apache-2.0
//! Artifact assembly and validation.
//!
//! Runs inside the snapshot repository after the agent exits. The assembly
//! path always leaves a `manifest.json` behind, even when it fails, so
//! downstream consumers always have a machine-readable outcome.

use holon_core::manifest::format_duration;
use holon_core::{HolonManifest, HolonSpec, Outcome, artifacts};
use holon_error::{ErrorKind, HolonError};
use holon_supervise::SupervisionOutcome;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Build outputs that are incidental and never belong in the patch.
const INCIDENTAL_BUILD_OUTPUTS: &[&str] = &["holon", "bin"];

/// Diagnostics file written when patch generation misbehaves.
const GIT_DIAGNOSTICS: &str = "git-diagnostics.txt";

/// A successfully assembled run.
#[derive(Debug)]
pub struct AssembledRun {
    /// The manifest as written to `output/manifest.json`.
    pub manifest: HolonManifest,
    /// The patch text as written to `output/diff.patch`.
    pub patch: String,
}

/// Assembles and validates the artifact set for one run.
pub struct ArtifactAssembler<'a> {
    snapshot: &'a Path,
    output: &'a Path,
    spec: &'a HolonSpec,
}

impl<'a> ArtifactAssembler<'a> {
    /// An assembler over the snapshot repository and the output directory.
    pub fn new(snapshot: &'a Path, output: &'a Path, spec: &'a HolonSpec) -> Self {
        Self {
            snapshot,
            output,
            spec,
        }
    }

    /// Assemble the canonical artifact set.
    ///
    /// On failure a manifest with `outcome: "failure"` is still written
    /// before the error propagates.
    pub fn assemble(
        &self,
        outcome: &SupervisionOutcome,
        duration_secs: f64,
        log: &[String],
    ) -> Result<AssembledRun, HolonError> {
        match self.try_assemble(outcome, duration_secs, log) {
            Ok(run) => Ok(run),
            Err(err) => {
                if let Err(write_err) = self.finalize_failure(duration_secs, &err) {
                    warn!(
                        target: "holon.runner",
                        "failed to write failure manifest: {write_err}"
                    );
                }
                Err(err)
            }
        }
    }

    fn try_assemble(
        &self,
        outcome: &SupervisionOutcome,
        duration_secs: f64,
        log: &[String],
    ) -> Result<AssembledRun, HolonError> {
        let patch = self.generate_patch()?;

        // Supervision failures surface after the patch so partial work is
        // preserved alongside the failure manifest.
        if let Some(err) = outcome.to_error() {
            return Err(err);
        }

        let mut manifest = self.read_agent_manifest()?.ok_or_else(|| {
            HolonError::new(
                ErrorKind::AgentExitedWithoutResult,
                "agent exited without writing manifest.json",
            )
        })?;

        if manifest.duration.is_empty() {
            manifest.duration = format_duration(duration_secs);
        }
        manifest.status = "completed".to_string();

        self.write_summary_fallback(&manifest, log)?;

        manifest.add_artifact(artifacts::DIFF);
        manifest.add_artifact(artifacts::SUMMARY);
        if self.output.join(artifacts::EVIDENCE).is_dir() {
            manifest.add_artifact(artifacts::EVIDENCE);
        }

        self.write_manifest(&manifest)?;
        self.validate_required()?;

        Ok(AssembledRun { manifest, patch })
    }

    /// Stage the snapshot, drop incidental build outputs, emit `diff.patch`.
    fn generate_patch(&self) -> Result<String, HolonError> {
        let git = |e: anyhow::Error| {
            HolonError::new(
                ErrorKind::PatchGenerationFailed,
                format!("git operation failed: {e:#}"),
            )
            .with_context("snapshot", self.snapshot.display().to_string())
        };

        holon_git::ensure_baseline(self.snapshot).map_err(git)?;
        holon_git::stage_all(self.snapshot).map_err(git)?;
        holon_git::unstage(self.snapshot, INCIDENTAL_BUILD_OUTPUTS).map_err(git)?;

        let patch = holon_git::cached_diff(self.snapshot).map_err(git)?;
        let staged = holon_git::has_staged_changes(self.snapshot).map_err(git)?;

        if staged && holon_git::is_patch_empty(&patch) {
            let report = holon_git::diagnostics_report(self.snapshot);
            let diagnostics = self.output.join(artifacts::EVIDENCE).join(GIT_DIAGNOSTICS);
            if let Some(parent) = diagnostics.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = fs::write(&diagnostics, report);
            return Err(HolonError::new(
                ErrorKind::PatchGenerationFailed,
                "files are staged but the cached diff is empty",
            )
            .with_context("diagnostics", diagnostics.display().to_string()));
        }

        let normalized = if holon_git::is_patch_empty(&patch) {
            String::new()
        } else {
            patch
        };
        fs::write(self.output.join(artifacts::DIFF), &normalized).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to write diff.patch").with_source(e)
        })?;
        debug!(target: "holon.runner", "diff.patch written ({} bytes)", normalized.len());
        Ok(normalized)
    }

    /// The agent's own manifest, when present and parseable.
    fn read_agent_manifest(&self) -> Result<Option<HolonManifest>, HolonError> {
        let path = self.output.join(artifacts::MANIFEST);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|e| {
            HolonError::new(ErrorKind::ManifestMalformed, "failed to read manifest.json")
                .with_source(e)
        })?;
        HolonManifest::from_json_str(&text).map(Some)
    }

    /// Synthesise `summary.md` if the agent did not write one.
    fn write_summary_fallback(
        &self,
        manifest: &HolonManifest,
        log: &[String],
    ) -> Result<(), HolonError> {
        let path = self.output.join(artifacts::SUMMARY);
        if path.is_file() {
            return Ok(());
        }

        let outcome_label = match manifest.outcome {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        };
        let mut text = format!(
            "# Task Summary\n\n**Goal:** {}\n\n**Outcome:** {outcome_label}\n",
            self.spec.goal.description()
        );
        if !log.is_empty() {
            text.push_str("\n<details>\n<summary>Execution log</summary>\n\n```\n");
            for line in log {
                text.push_str(line);
                text.push('\n');
            }
            text.push_str("```\n\n</details>\n");
        }

        fs::write(&path, text).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to write summary.md").with_source(e)
        })
    }

    fn write_manifest(&self, manifest: &HolonManifest) -> Result<(), HolonError> {
        let text = manifest.to_json_string()?;
        fs::write(self.output.join(artifacts::MANIFEST), text).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to write manifest.json").with_source(e)
        })
    }

    /// Every artifact declared `required: true` must exist.
    fn validate_required(&self) -> Result<(), HolonError> {
        for required in self.spec.required_artifacts() {
            if !self.output.join(required).exists() {
                return Err(HolonError::new(
                    ErrorKind::ArtifactMissing,
                    "a required artifact is missing from the output directory",
                )
                .with_context("path", required));
            }
        }
        Ok(())
    }

    /// Rewrite (or synthesise) the manifest with a failure outcome.
    ///
    /// Agent-written metadata survives; `outcome`, `error`, and
    /// `metadata.error` are forced to reflect the failure.
    fn finalize_failure(&self, duration_secs: f64, error: &HolonError) -> Result<(), HolonError> {
        let mut manifest = match self.read_agent_manifest() {
            Ok(Some(m)) => m,
            Ok(None) | Err(_) => HolonManifest::failure(duration_secs, error.message.clone()),
        };

        manifest.status = "completed".to_string();
        manifest.outcome = Outcome::Failure;
        if manifest.duration.is_empty() {
            manifest.duration = format_duration(duration_secs);
        }
        manifest.error = Some(error.message.clone());
        manifest.metadata.insert(
            "error".to_string(),
            serde_json::json!(error.message.clone()),
        );

        for name in [artifacts::DIFF, artifacts::SUMMARY, artifacts::EVIDENCE] {
            if self.output.join(name).exists() {
                manifest.add_artifact(name);
            }
        }

        self.write_manifest(&manifest)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
