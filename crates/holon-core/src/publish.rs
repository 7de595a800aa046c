// SPDX-License-Identifier: MIT OR Apache-2.0
//! Publish outcome record, written to `publish-result.json` after every
//! publish attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed vocabulary of externally observable publish actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// The run's patch was applied to the publish worktree.
    AppliedPatch,
    /// A new branch was created.
    CreatedBranch,
    /// A commit was created on the branch.
    CreatedCommit,
    /// The branch was pushed to the remote.
    PushedBranch,
    /// A pull request was opened.
    CreatedPr,
    /// An existing pull request was edited.
    UpdatedPr,
    /// A summary comment was posted or edited.
    PostedComment,
    /// A reply was posted to a review thread.
    RepliedReview,
    /// A follow-up issue was created.
    CreatedIssue,
}

/// One externally observable action taken by a publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishAction {
    /// What kind of action this was.
    #[serde(rename = "type")]
    pub action_type: ActionType,

    /// Human-readable description (branch name, PR URL, comment id).
    pub description: String,

    /// Structured details for downstream automation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PublishAction {
    /// An action with no structured metadata.
    pub fn new(action_type: ActionType, description: impl Into<String>) -> Self {
        Self {
            action_type,
            description: description.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), v);
        }
        self
    }
}

/// The full record of one publish invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResult {
    /// Provider name (`github-pr`, `github`).
    pub provider: String,

    /// Target string as supplied by the caller.
    pub target: String,

    /// Actions taken, in execution order.
    pub actions: Vec<PublishAction>,

    /// Non-fatal errors accumulated while publishing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Overall success flag. `false` whenever a fatal error short-circuited.
    pub success: bool,

    /// When the publish finished.
    pub published_at: DateTime<Utc>,

    /// Provider-specific extras (PR number, branch, issue URLs).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PublishResult {
    /// An empty in-progress result for the given provider and target.
    pub fn new(provider: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            target: target.into(),
            actions: Vec::new(),
            errors: Vec::new(),
            success: false,
            published_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Record an action.
    pub fn record(&mut self, action: PublishAction) {
        self.actions.push(action);
    }

    /// Record a non-fatal error and continue.
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Action types in execution order, for assertions and display.
    pub fn action_types(&self) -> Vec<ActionType> {
        self.actions.iter().map(|a| a.action_type).collect()
    }

    /// Serialise as pretty JSON with a trailing newline.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
