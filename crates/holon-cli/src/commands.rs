// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the Holon CLI.
//!
//! These functions are library-level so they can be tested without
//! spawning the binary.

use holon_bundle::BundleManifest;
use holon_core::{HolonSpec, RunMode};
use holon_error::{ErrorKind, HolonError};
use std::path::Path;

/// Base toolchain image used when the caller does not name one.
///
/// Workspace-fingerprint auto-detection lives outside the core; `detect
/// image` reports this default.
pub const DEFAULT_BASE_IMAGE: &str = "ubuntu:24.04";

/// Load a spec file, or synthesise one from a goal string.
///
/// Exactly the invariant from the input contract: either a spec file is
/// supplied, or a goal is, and the synthesised spec carries the goal
/// verbatim with the default required artifacts.
pub fn load_or_synthesise_spec(
    spec_path: Option<&Path>,
    goal: Option<&str>,
) -> Result<HolonSpec, HolonError> {
    let spec = match (spec_path, goal) {
        (Some(path), _) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                HolonError::new(ErrorKind::SpecMissing, "failed to read spec file")
                    .with_context("path", path.display().to_string())
                    .with_source(e)
            })?;
            HolonSpec::from_yaml_str(&text)?
        }
        (None, Some(goal)) => HolonSpec::from_goal(goal),
        (None, None) => {
            return Err(HolonError::new(
                ErrorKind::SpecMissing,
                "supply --spec <file> or --goal <text>",
            ));
        }
    };
    spec.validate()?;
    Ok(spec)
}

/// Synthesise a spec for `holon solve <ref>`.
///
/// Accepts `owner/repo#<n>`, an issue URL, or a PR URL. Issues run in
/// `solve` mode; pull requests run in `pr-fix` mode.
pub fn solve_spec(reference: &str) -> Result<HolonSpec, HolonError> {
    let parsed = parse_solve_ref(reference)?;

    let mut spec = HolonSpec::from_goal(&match parsed.kind {
        SolveKind::Issue => format!(
            "Solve GitHub issue #{} in {}/{}",
            parsed.number, parsed.owner, parsed.repo
        ),
        SolveKind::Pr => format!(
            "Address review feedback on pull request #{} in {}/{}",
            parsed.number, parsed.owner, parsed.repo
        ),
    });
    spec.metadata
        .insert("issue_id".to_string(), serde_json::json!(parsed.number));
    let mode = match parsed.kind {
        SolveKind::Issue => RunMode::Solve,
        SolveKind::Pr => RunMode::PrFix,
    };
    spec.metadata
        .insert("mode".to_string(), serde_json::json!(mode.as_str()));
    spec.output.artifacts = mode.default_artifacts();
    Ok(spec)
}

/// What a solve reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveKind {
    /// A GitHub issue.
    Issue,
    /// A GitHub pull request.
    Pr,
}

/// A parsed solve reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveRef {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Issue or PR number.
    pub number: u64,
    /// Whether this is an issue or a PR.
    pub kind: SolveKind,
}

/// Parse a solve reference.
pub fn parse_solve_ref(reference: &str) -> Result<SolveRef, HolonError> {
    let invalid = || {
        HolonError::new(
            ErrorKind::RefInvalid,
            "expected owner/repo#<n> or a GitHub issue/PR URL",
        )
        .with_context("ref", reference)
    };

    if let Some(rest) = reference
        .strip_prefix("https://github.com/")
        .or_else(|| reference.strip_prefix("http://github.com/"))
    {
        let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        return match parts.as_slice() {
            [owner, repo, "issues", number] => Ok(SolveRef {
                owner: (*owner).to_string(),
                repo: (*repo).to_string(),
                number: number.parse().map_err(|_| invalid())?,
                kind: SolveKind::Issue,
            }),
            [owner, repo, "pull", number] => Ok(SolveRef {
                owner: (*owner).to_string(),
                repo: (*repo).to_string(),
                number: number.parse().map_err(|_| invalid())?,
                kind: SolveKind::Pr,
            }),
            _ => Err(invalid()),
        };
    }

    let (repo_part, number) = reference.split_once('#').ok_or_else(invalid)?;
    let (owner, repo) = repo_part.split_once('/').ok_or_else(invalid)?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return Err(invalid());
    }
    Ok(SolveRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        number: number.parse().map_err(|_| invalid())?,
        kind: SolveKind::Issue,
    })
}

/// Compile the default prompt pair for a spec.
///
/// Prompt template authoring is a collaborator concern; these are the
/// built-in fallbacks that make a bare `--goal` run self-contained.
pub fn default_prompts(spec: &HolonSpec) -> (String, String) {
    let system = "\
You are an autonomous coding agent running inside a sandboxed workspace at \
/holon/workspace. Make the requested change, stage your edits with git, and \
write your results under /holon/output: manifest.json (required), summary.md, \
and any evidence files under evidence/.\n"
        .to_string();

    let mut user = format!("Goal: {}\n", spec.goal.description());
    if let Some(issue) = spec.issue_id() {
        user.push_str(&format!("Related issue: #{issue}\n"));
    }
    let required: Vec<&str> = spec.required_artifacts();
    user.push_str(&format!(
        "Required artifacts: {}\n",
        required.join(", ")
    ));
    (system, user)
}

/// Human-readable rendering of a bundle manifest for `agent info`.
pub fn render_bundle_info(sha256: &str, manifest: &BundleManifest) -> String {
    format!(
        "name:      {}\n\
         version:   {}\n\
         platform:  {}/{} ({})\n\
         engine:    {} ({} {})\n\
         runtime:   {} {}\n\
         entry:     {}\n\
         sha256:    {}\n",
        manifest.name,
        manifest.version,
        manifest.platform,
        manifest.arch,
        manifest.libc,
        manifest.engine.name,
        manifest.engine.sdk,
        manifest.engine.sdk_version,
        manifest.runtime.kind,
        manifest.runtime.version,
        manifest.entry,
        sha256,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
