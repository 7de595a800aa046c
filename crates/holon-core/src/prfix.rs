// SPDX-License-Identifier: MIT OR Apache-2.0
//! The structured PR-fix report the agent optionally emits at
//! `output/pr-fix.json` in PR-fix mode.

use serde::{Deserialize, Serialize};

/// Disposition of a single review comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyStatus {
    /// The comment was addressed with a code change.
    Fixed,
    /// The comment was considered and declined.
    Wontfix,
    /// More information is needed from the reviewer.
    NeedInfo,
    /// Deferred to a follow-up issue.
    Deferred,
}

/// Fix disposition of a single failing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckFixStatus {
    /// The check failure was fixed.
    Fixed,
    /// The failure was understood but not fixed.
    Unfixed,
    /// A fix was attempted but could not be verified locally.
    Unverified,
    /// The failure is unrelated to this PR.
    NotApplicable,
}

/// A reply to one review thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReply {
    /// The review comment this reply anchors to.
    pub comment_id: u64,

    /// Disposition of the comment.
    pub status: ReplyStatus,

    /// Reply text posted to the thread.
    pub message: String,

    /// Short description of the change made, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_taken: Option<String>,
}

/// A follow-up issue covering deferred comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpIssue {
    /// Issue title.
    pub title: String,

    /// Issue body.
    pub body: String,

    /// Review comment ids this issue covers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deferred_comment_ids: Vec<u64>,

    /// Labels to apply on creation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    /// URL of the created issue. Absent until the publisher creates it;
    /// the publisher persists it back so repeated publishes are idempotent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_url: Option<String>,
}

/// Outcome report for one failing check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    /// Check run name.
    pub name: String,

    /// Conclusion reported by the CI provider (e.g. `failure`).
    pub conclusion: String,

    /// What happened to this check during the run.
    pub fix_status: CheckFixStatus,

    /// Free-form explanation.
    #[serde(default)]
    pub message: String,
}

/// The full PR-fix report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrFixReport {
    /// One entry per review comment the agent addressed.
    #[serde(default)]
    pub review_replies: Vec<ReviewReply>,

    /// Follow-up issues for deferred work.
    #[serde(default)]
    pub follow_up_issues: Vec<FollowUpIssue>,

    /// One entry per failing check the agent looked at.
    #[serde(default)]
    pub checks: Vec<CheckReport>,
}

impl PrFixReport {
    /// Parse a report from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialise as pretty JSON with a trailing newline.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// Replies whose status defers work to a follow-up issue.
    pub fn deferred_replies(&self) -> Vec<&ReviewReply> {
        self.review_replies
            .iter()
            .filter(|r| r.status == ReplyStatus::Deferred)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "review_replies": [
            {"comment_id": 101, "status": "fixed", "message": "Renamed as suggested.", "action_taken": "rename"},
            {"comment_id": 102, "status": "deferred", "message": "Tracking separately."}
        ],
        "follow_up_issues": [
            {"title": "Refactor config loader", "body": "Deferred from review.", "deferred_comment_ids": [102], "labels": ["tech-debt"]}
        ],
        "checks": [
            {"name": "ci/test", "conclusion": "failure", "fix_status": "fixed", "message": "flaky assertion pinned"}
        ]
    }"#;

    #[test]
    fn parses_sample() {
        let report = PrFixReport::from_json_str(SAMPLE).expect("parse");
        assert_eq!(report.review_replies.len(), 2);
        assert_eq!(report.follow_up_issues.len(), 1);
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.review_replies[0].status, ReplyStatus::Fixed);
        assert_eq!(report.checks[0].fix_status, CheckFixStatus::Fixed);
    }

    #[test]
    fn status_wire_names_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ReplyStatus::NeedInfo).unwrap(),
            "\"need-info\""
        );
        assert_eq!(
            serde_json::to_string(&CheckFixStatus::NotApplicable).unwrap(),
            "\"not-applicable\""
        );
    }

    #[test]
    fn issue_url_survives_roundtrip() {
        let mut report = PrFixReport::from_json_str(SAMPLE).expect("parse");
        report.follow_up_issues[0].issue_url =
            Some("https://github.com/o/r/issues/7".to_string());
        let text = report.to_json_string().expect("emit");
        let back = PrFixReport::from_json_str(&text).expect("reparse");
        assert_eq!(
            back.follow_up_issues[0].issue_url.as_deref(),
            Some("https://github.com/o/r/issues/7")
        );
    }

    #[test]
    fn deferred_replies_filter() {
        let report = PrFixReport::from_json_str(SAMPLE).expect("parse");
        let deferred = report.deferred_replies();
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].comment_id, 102);
    }

    #[test]
    fn empty_report_parses() {
        let report = PrFixReport::from_json_str("{}").expect("parse");
        assert!(report.review_replies.is_empty());
        assert!(report.follow_up_issues.is_empty());
        assert!(report.checks.is_empty());
    }
}
