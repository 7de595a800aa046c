// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `github` provider: post a run's results on an existing pull request.
//!
//! Three responsibilities: an idempotent summary comment (matched by a
//! hidden HTML marker so repeated publishes edit in place), review-thread
//! replies driven by `pr-fix.json` (suppressed when the thread's last
//! author is the authenticated identity), and follow-up issue creation with
//! the resulting URLs persisted back into `pr-fix.json`.

use async_trait::async_trait;
use chrono::Utc;
use holon_core::{ActionType, PrFixReport, PublishAction, PublishResult};
use holon_error::{ErrorKind, HolonError};
use std::fs;
use tracing::{debug, info};

use crate::github::{GithubClient, ReviewComment};
use crate::registry::{PublishRequest, Publisher};
use crate::target::PrTarget;
use crate::write_publish_result;

/// Hidden marker identifying the summary comment across publishes.
pub const SUMMARY_MARKER: &str = "<!-- holon-summary -->";

/// Comment and review-reply provider for an existing pull request.
///
/// Target grammar: `owner/repo/pr/<n>` or `owner/repo#<n>`.
#[derive(Debug, Default)]
pub struct GithubReviewPublisher;

impl GithubReviewPublisher {
    /// A fresh provider instance.
    pub fn new() -> Self {
        Self
    }

    async fn run(
        &self,
        request: &PublishRequest,
        target: &PrTarget,
        result: &mut PublishResult,
    ) -> Result<(), HolonError> {
        let client = GithubClient::new(&request.config.api_base_url, &request.config.token)?;

        let summary_path = request.output_dir.join(holon_core::artifacts::SUMMARY);
        if !summary_path.is_file() {
            return Err(
                HolonError::new(ErrorKind::ArtifactMissing, "publish input is missing")
                    .with_context("path", "summary.md"),
            );
        }
        let summary = fs::read_to_string(&summary_path).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to read summary.md").with_source(e)
        })?;

        self.upsert_summary_comment(&client, target, &summary, result)
            .await?;

        let report_path = request.output_dir.join(holon_core::artifacts::PR_FIX);
        if report_path.is_file() {
            let text = fs::read_to_string(&report_path).map_err(|e| {
                HolonError::new(ErrorKind::Internal, "failed to read pr-fix.json")
                    .with_source(e)
            })?;
            let mut report = PrFixReport::from_json_str(&text).map_err(|e| {
                HolonError::new(ErrorKind::ManifestMalformed, "pr-fix.json is malformed")
                    .with_source(e)
            })?;

            self.post_review_replies(&client, target, &report, result)
                .await?;
            let changed = self
                .create_follow_up_issues(&client, target, &mut report, result)
                .await;
            if changed {
                let text = report.to_json_string().map_err(|e| {
                    HolonError::new(ErrorKind::Internal, "failed to serialise pr-fix.json")
                        .with_source(e)
                })?;
                fs::write(&report_path, text).map_err(|e| {
                    HolonError::new(ErrorKind::Internal, "failed to persist pr-fix.json")
                        .with_source(e)
                })?;
            }
        }

        Ok(())
    }

    /// Post or edit the summary comment, matched by the hidden marker.
    async fn upsert_summary_comment(
        &self,
        client: &GithubClient,
        target: &PrTarget,
        summary: &str,
        result: &mut PublishResult,
    ) -> Result<(), HolonError> {
        let body = format!("{SUMMARY_MARKER}\n{summary}");
        let comments = client
            .list_issue_comments(&target.owner, &target.repo, target.number)
            .await?;

        if let Some(existing) = comments.iter().find(|c| c.body.contains(SUMMARY_MARKER)) {
            client
                .update_issue_comment(&target.owner, &target.repo, existing.id, &body)
                .await?;
            info!(target: "holon.publish", "edited summary comment {}", existing.id);
            result.record(
                PublishAction::new(ActionType::PostedComment, "edited summary comment")
                    .with_metadata("comment_id", existing.id),
            );
        } else {
            let created = client
                .create_issue_comment(&target.owner, &target.repo, target.number, &body)
                .await?;
            result.record(
                PublishAction::new(ActionType::PostedComment, "posted summary comment")
                    .with_metadata("comment_id", created.id),
            );
        }
        Ok(())
    }

    /// Reply to each addressed review thread, never replying to ourselves.
    ///
    /// Individual reply failures are non-fatal and accumulate in `errors`.
    async fn post_review_replies(
        &self,
        client: &GithubClient,
        target: &PrTarget,
        report: &PrFixReport,
        result: &mut PublishResult,
    ) -> Result<(), HolonError> {
        if report.review_replies.is_empty() {
            return Ok(());
        }

        let me = client.current_user().await?.login.clone();
        let comments = client
            .list_review_comments(&target.owner, &target.repo, target.number)
            .await?;

        for reply in &report.review_replies {
            if let Some(last_author) = thread_last_author(&comments, reply.comment_id) {
                if last_author == me {
                    debug!(
                        target: "holon.publish",
                        "skipping reply to {}: we answered last",
                        reply.comment_id
                    );
                    continue;
                }
            }

            match client
                .reply_review_comment(
                    &target.owner,
                    &target.repo,
                    target.number,
                    reply.comment_id,
                    &reply.message,
                )
                .await
            {
                Ok(posted) => {
                    result.record(
                        PublishAction::new(
                            ActionType::RepliedReview,
                            format!("replied to review comment {}", reply.comment_id),
                        )
                        .with_metadata("comment_id", reply.comment_id)
                        .with_metadata("reply_id", posted.id),
                    );
                }
                Err(e) => {
                    result.record_error(format!(
                        "reply to review comment {} failed: {e}",
                        reply.comment_id
                    ));
                }
            }
        }
        Ok(())
    }

    /// Create missing follow-up issues; returns whether the report changed.
    async fn create_follow_up_issues(
        &self,
        client: &GithubClient,
        target: &PrTarget,
        report: &mut PrFixReport,
        result: &mut PublishResult,
    ) -> bool {
        let mut changed = false;
        for issue in report
            .follow_up_issues
            .iter_mut()
            .filter(|i| i.issue_url.is_none())
        {
            match client
                .create_issue(
                    &target.owner,
                    &target.repo,
                    &issue.title,
                    &issue.body,
                    &issue.labels,
                )
                .await
            {
                Ok(created) => {
                    issue.issue_url = Some(created.html_url.clone());
                    changed = true;
                    result.record(
                        PublishAction::new(
                            ActionType::CreatedIssue,
                            format!("#{}: {}", created.number, issue.title),
                        )
                        .with_metadata("url", created.html_url.clone()),
                    );
                }
                Err(e) => {
                    result.record_error(format!("follow-up issue '{}' failed: {e}", issue.title));
                }
            }
        }
        changed
    }
}

/// Login of the last comment in the thread rooted at `root_id`.
fn thread_last_author(comments: &[ReviewComment], root_id: u64) -> Option<String> {
    comments
        .iter()
        .filter(|c| c.id == root_id || c.in_reply_to_id == Some(root_id))
        .max_by_key(|c| c.id)
        .map(|c| c.user.login.clone())
}

#[async_trait]
impl Publisher for GithubReviewPublisher {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult, HolonError> {
        let target = PrTarget::parse(&request.target)?;
        let mut result = PublishResult::new(self.name(), &request.target);

        match self.run(request, &target, &mut result).await {
            Ok(()) => {
                result.success = true;
                result.published_at = Utc::now();
                write_publish_result(&request.output_dir, &result)?;
                Ok(result)
            }
            Err(err) => {
                result.success = false;
                result.record_error(err.to_string());
                result.published_at = Utc::now();
                let _ = write_publish_result(&request.output_dir, &result);
                Err(err)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
