// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic title/branch/commit-message derivation.
//!
//! Precedence for the title: `manifest.metadata.title`, then the provider
//! context (`input/context/manifest.json` naming a GitHub issue or PR),
//! then the first content line of `summary.md`. Derived titles are written
//! back into the manifest so repeated publishes agree.

use chrono::{DateTime, Utc};
use holon_core::HolonManifest;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Everything the `github-pr` provider derives before touching git.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derived {
    /// PR and commit title.
    pub title: String,
    /// Branch the patch lands on.
    pub branch: String,
    /// Commit message.
    pub commit_message: String,
    /// Issue this PR fixes, when known.
    pub issue_id: Option<u64>,
    /// Whether the title came from somewhere other than the manifest and
    /// should be persisted back into it.
    pub title_needs_persist: bool,
}

#[derive(Debug, Deserialize)]
struct ContextManifest {
    provider: String,
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ContextIssue {
    #[serde(default)]
    number: Option<u64>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContextPr {
    #[serde(default)]
    number: Option<u64>,
    #[serde(default)]
    title: Option<String>,
}

/// Derive title, branch, and commit message for one publish.
pub fn derive(
    manifest: &HolonManifest,
    input_dir: Option<&Path>,
    summary: &str,
    now: DateTime<Utc>,
) -> Derived {
    let mut issue_id = metadata_issue_id(manifest);

    let (title, title_needs_persist) = match manifest
        .metadata
        .get("title")
        .and_then(|v| v.as_str())
        .filter(|t| !t.trim().is_empty())
    {
        Some(title) => (title.to_string(), false),
        None => {
            let from_context = input_dir.and_then(|dir| {
                let (title, context_issue) = context_title(dir)?;
                if issue_id.is_none() {
                    issue_id = context_issue;
                }
                Some(title)
            });
            let title = from_context
                .or_else(|| first_content_line(summary))
                .unwrap_or_else(|| "Automated change".to_string());
            (title, true)
        }
    };

    let branch = manifest
        .metadata
        .get("branch")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| branch_marker(summary))
        .unwrap_or_else(|| synthesise_branch(issue_id, now));

    let commit_message = title.clone();

    Derived {
        title,
        branch,
        commit_message,
        issue_id,
        title_needs_persist,
    }
}

/// Title derived from the provider context, plus the issue number when the
/// context names one.
fn context_title(input_dir: &Path) -> Option<(String, Option<u64>)> {
    let manifest_path = input_dir.join("context").join("manifest.json");
    let text = std::fs::read_to_string(&manifest_path).ok()?;
    let context: ContextManifest = serde_json::from_str(&text).ok()?;
    if context.provider != "github" {
        return None;
    }

    match context.kind.as_str() {
        "issue" => {
            let issue: ContextIssue = read_context_json(input_dir, "github/issue.json")?;
            let title = issue.title?;
            debug!(target: "holon.publish", "title derived from issue context");
            Some((format!("Fix: {title}"), issue.number))
        }
        "pr" => {
            let pr: ContextPr = read_context_json(input_dir, "github/pr.json")?;
            let number = pr.number?;
            let title = pr.title.unwrap_or_else(|| "pull request".to_string());
            debug!(target: "holon.publish", "title derived from PR context");
            Some((format!("Address review comments on #{number}: {title}"), None))
        }
        _ => None,
    }
}

fn read_context_json<T: serde::de::DeserializeOwned>(input_dir: &Path, rel: &str) -> Option<T> {
    let text = std::fs::read_to_string(input_dir.join("context").join(rel)).ok()?;
    serde_json::from_str(&text).ok()
}

fn metadata_issue_id(manifest: &HolonManifest) -> Option<u64> {
    match manifest.metadata.get("issue_id") {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

/// First non-empty line of `summary`, stripped of any heading markers.
pub fn first_content_line(summary: &str) -> Option<String> {
    summary.lines().find_map(|line| {
        let stripped = line.trim().trim_start_matches('#').trim();
        if stripped.is_empty() {
            None
        } else {
            Some(stripped.to_string())
        }
    })
}

/// The `Branch:` marker, when the summary carries one.
pub fn branch_marker(summary: &str) -> Option<String> {
    summary.lines().find_map(|line| {
        let name = line.trim().strip_prefix("Branch:")?.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    })
}

/// `holon/fix-<issue>-<stamp>` or `holon/auto-fix-<stamp>` in UTC.
pub fn synthesise_branch(issue_id: Option<u64>, now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%d-%H%M%S");
    match issue_id {
        Some(id) => format!("holon/fix-{id}-{stamp}"),
        None => format!("holon/auto-fix-{stamp}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 4, 12, 30, 45).unwrap()
    }

    fn manifest() -> HolonManifest {
        HolonManifest::success(1.0, vec![])
    }

    fn stage_issue_context(input: &Path) {
        fs::create_dir_all(input.join("context/github")).unwrap();
        fs::write(
            input.join("context/manifest.json"),
            r#"{"provider": "github", "kind": "issue"}"#,
        )
        .unwrap();
        fs::write(
            input.join("context/github/issue.json"),
            r#"{"number": 42, "title": "Add X"}"#,
        )
        .unwrap();
    }

    // -- Title ------------------------------------------------------------

    #[test]
    fn manifest_title_wins() {
        let mut m = manifest();
        m.metadata
            .insert("title".into(), serde_json::json!("Explicit title"));
        let d = derive(&m, None, "# Something else\n", at());
        assert_eq!(d.title, "Explicit title");
        assert!(!d.title_needs_persist);
    }

    #[test]
    fn issue_context_derives_fix_title() {
        let dir = TempDir::new().unwrap();
        stage_issue_context(dir.path());

        let d = derive(&manifest(), Some(dir.path()), "", at());
        assert_eq!(d.title, "Fix: Add X");
        assert_eq!(d.issue_id, Some(42));
        assert!(d.title_needs_persist);
    }

    #[test]
    fn pr_context_derives_review_title() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("context/github")).unwrap();
        fs::write(
            dir.path().join("context/manifest.json"),
            r#"{"provider": "github", "kind": "pr"}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("context/github/pr.json"),
            r#"{"number": 9, "title": "Refactor parser"}"#,
        )
        .unwrap();

        let d = derive(&manifest(), Some(dir.path()), "", at());
        assert_eq!(d.title, "Address review comments on #9: Refactor parser");
    }

    #[test]
    fn pr_context_without_title_uses_placeholder() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("context/github")).unwrap();
        fs::write(
            dir.path().join("context/manifest.json"),
            r#"{"provider": "github", "kind": "pr"}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("context/github/pr.json"),
            r#"{"number": 9}"#,
        )
        .unwrap();

        let d = derive(&manifest(), Some(dir.path()), "", at());
        assert_eq!(d.title, "Address review comments on #9: pull request");
    }

    #[test]
    fn foreign_provider_context_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("context")).unwrap();
        fs::write(
            dir.path().join("context/manifest.json"),
            r#"{"provider": "gitlab", "kind": "issue"}"#,
        )
        .unwrap();

        let d = derive(&manifest(), Some(dir.path()), "Summary line\n", at());
        assert_eq!(d.title, "Summary line");
    }

    #[test]
    fn summary_heading_is_stripped() {
        let d = derive(&manifest(), None, "\n\n# Fix the thing\n\ndetails\n", at());
        assert_eq!(d.title, "Fix the thing");
        assert!(d.title_needs_persist);
    }

    #[test]
    fn empty_summary_falls_back_to_placeholder() {
        let d = derive(&manifest(), None, "", at());
        assert_eq!(d.title, "Automated change");
    }

    // -- Branch -----------------------------------------------------------

    #[test]
    fn metadata_branch_wins() {
        let mut m = manifest();
        m.metadata
            .insert("branch".into(), serde_json::json!("feature/custom"));
        let d = derive(&m, None, "Branch: summary/branch\n", at());
        assert_eq!(d.branch, "feature/custom");
    }

    #[test]
    fn summary_branch_marker() {
        let d = derive(&manifest(), None, "Title line\nBranch: fix/from-summary\n", at());
        assert_eq!(d.branch, "fix/from-summary");
    }

    #[test]
    fn synthesised_branch_with_issue() {
        let mut m = manifest();
        m.metadata.insert("issue_id".into(), serde_json::json!(42));
        let d = derive(&m, None, "Title\n", at());
        assert_eq!(d.branch, "holon/fix-42-20260704-123045");
    }

    #[test]
    fn synthesised_branch_without_issue() {
        let d = derive(&manifest(), None, "Title\n", at());
        assert_eq!(d.branch, "holon/auto-fix-20260704-123045");
    }

    // -- Commit message ---------------------------------------------------

    #[test]
    fn commit_message_defaults_to_title() {
        let d = derive(&manifest(), None, "A tidy title\n", at());
        assert_eq!(d.commit_message, "A tidy title");
    }

    #[test]
    fn issue_id_from_string_metadata() {
        let mut m = manifest();
        m.metadata
            .insert("issue_id".into(), serde_json::json!("17"));
        let d = derive(&m, None, "t\n", at());
        assert_eq!(d.issue_id, Some(17));
    }
}
