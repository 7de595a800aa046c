// SPDX-License-Identifier: MIT OR Apache-2.0
//! Thin GitHub REST client.
//!
//! Only the endpoints the two providers consume. Every call authenticates
//! with the configured token; non-2xx responses surface as
//! `REMOTE_API_ERROR` with the status and a trimmed body.

use holon_error::{ErrorKind, HolonError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

/// Maximum response-body bytes quoted in error messages.
const ERROR_BODY_LIMIT: usize = 1024;

/// Minimal user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account login.
    pub login: String,
}

/// Minimal pull-request record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number.
    pub number: u64,
    /// Current title.
    pub title: String,
    /// Head branch.
    pub head: Branch,
    /// Web URL.
    #[serde(default)]
    pub html_url: String,
}

/// A branch reference inside a PR record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name.
    #[serde(rename = "ref")]
    pub name: String,
}

/// Minimal issue-comment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    /// Comment id.
    pub id: u64,
    /// Comment body.
    pub body: String,
    /// Author.
    pub user: User,
}

/// Minimal review-comment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewComment {
    /// Comment id.
    pub id: u64,
    /// Comment body.
    pub body: String,
    /// Author.
    pub user: User,
    /// The thread anchor this comment replies to, if any.
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
}

/// Minimal issue record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number.
    pub number: u64,
    /// Web URL.
    pub html_url: String,
}

/// Payload for creating a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePull {
    /// Title.
    pub title: String,
    /// Head branch.
    pub head: String,
    /// Base branch.
    pub base: String,
    /// Body text.
    pub body: String,
    /// Allow maintainer edits.
    pub maintainer_can_modify: bool,
}

/// Authenticated client bound to one API base URL.
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    current_user: OnceCell<User>,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("current_user", &self.current_user)
            .finish()
    }
}

impl GithubClient {
    /// A client for `base_url` authenticating with `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, HolonError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(HolonError::new(
                ErrorKind::AuthMissing,
                "no GitHub token available",
            ));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                HolonError::new(ErrorKind::Internal, "failed to build GitHub client")
                    .with_source(e)
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            current_user: OnceCell::new(),
        })
    }

    /// The authenticated identity, fetched once and cached for the run.
    pub async fn current_user(&self) -> Result<&User, HolonError> {
        self.current_user
            .get_or_try_init(|| async { self.get("/user").await })
            .await
    }

    /// Open pull requests for a repository.
    pub async fn list_open_pulls(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequest>, HolonError> {
        self.get(&format!("/repos/{owner}/{repo}/pulls?state=open&per_page=100"))
            .await
    }

    /// Create a pull request.
    pub async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        payload: &CreatePull,
    ) -> Result<PullRequest, HolonError> {
        self.send(
            reqwest::Method::POST,
            &format!("/repos/{owner}/{repo}/pulls"),
            Some(serde_json::to_value(payload).expect("serialisable payload")),
        )
        .await
    }

    /// Edit an existing pull request's title and body.
    pub async fn update_pull(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, HolonError> {
        self.send(
            reqwest::Method::PATCH,
            &format!("/repos/{owner}/{repo}/pulls/{number}"),
            Some(serde_json::json!({"title": title, "body": body})),
        )
        .await
    }

    /// Comments on an issue or pull request.
    pub async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<IssueComment>, HolonError> {
        self.get(&format!(
            "/repos/{owner}/{repo}/issues/{number}/comments?per_page=100"
        ))
        .await
    }

    /// Post a comment on an issue or pull request.
    pub async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<IssueComment, HolonError> {
        self.send(
            reqwest::Method::POST,
            &format!("/repos/{owner}/{repo}/issues/{number}/comments"),
            Some(serde_json::json!({"body": body})),
        )
        .await
    }

    /// Edit an existing issue comment.
    pub async fn update_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<IssueComment, HolonError> {
        self.send(
            reqwest::Method::PATCH,
            &format!("/repos/{owner}/{repo}/issues/comments/{comment_id}"),
            Some(serde_json::json!({"body": body})),
        )
        .await
    }

    /// Review comments on a pull request (all threads, flattened).
    pub async fn list_review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<ReviewComment>, HolonError> {
        self.get(&format!(
            "/repos/{owner}/{repo}/pulls/{number}/comments?per_page=100"
        ))
        .await
    }

    /// Reply to a review comment's thread.
    pub async fn reply_review_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        comment_id: u64,
        body: &str,
    ) -> Result<ReviewComment, HolonError> {
        self.send(
            reqwest::Method::POST,
            &format!("/repos/{owner}/{repo}/pulls/{number}/comments/{comment_id}/replies"),
            Some(serde_json::json!({"body": body})),
        )
        .await
    }

    /// Open a new issue.
    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Issue, HolonError> {
        self.send(
            reqwest::Method::POST,
            &format!("/repos/{owner}/{repo}/issues"),
            Some(serde_json::json!({"title": title, "body": body, "labels": labels})),
        )
        .await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, HolonError> {
        self.send(reqwest::Method::GET, path, None).await
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, HolonError> {
        let url = format!("{}{path}", self.base_url);
        debug!(target: "holon.publish", "{method} {url}");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("authorization", format!("Bearer {}", self.token))
            .header("accept", "application/vnd.github+json")
            .header("user-agent", "holon");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            HolonError::new(ErrorKind::RemoteApiError, "GitHub request failed")
                .with_context("url", &url)
                .with_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(HolonError::new(
                ErrorKind::RemoteApiError,
                format!("GitHub returned HTTP {}: {snippet}", status.as_u16()),
            )
            .with_context("url", &url)
            .with_context("method", method.as_str()));
        }

        response.json().await.map_err(|e| {
            HolonError::new(ErrorKind::RemoteApiError, "unexpected GitHub response shape")
                .with_context("url", &url)
                .with_source(e)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
