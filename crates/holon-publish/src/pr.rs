// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `github-pr` provider: create or update a pull request from a run's
//! artifact set.

use async_trait::async_trait;
use chrono::Utc;
use holon_core::{ActionType, HolonManifest, PublishAction, PublishResult};
use holon_error::{ErrorKind, HolonError};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::derive::{Derived, derive};
use crate::github::{CreatePull, GithubClient};
use crate::registry::{PublishRequest, Publisher};
use crate::target::RepoTarget;
use crate::write_publish_result;

/// Create-or-update a pull request on a GitHub repository.
///
/// Target grammar: `owner/repo[:base_branch]`, base defaulting to `main`.
#[derive(Debug, Default)]
pub struct GithubPrPublisher;

impl GithubPrPublisher {
    /// A fresh provider instance.
    pub fn new() -> Self {
        Self
    }

    async fn run(
        &self,
        request: &PublishRequest,
        target: &RepoTarget,
        result: &mut PublishResult,
    ) -> Result<(), HolonError> {
        // Token validity first: nothing below is worth doing without it.
        let client = GithubClient::new(&request.config.api_base_url, &request.config.token)?;

        let output = &request.output_dir;
        let patch_path = output.join(holon_core::artifacts::DIFF);
        let summary_path = output.join(holon_core::artifacts::SUMMARY);
        for (path, name) in [(&patch_path, "diff.patch"), (&summary_path, "summary.md")] {
            if !path.is_file() {
                return Err(HolonError::new(
                    ErrorKind::ArtifactMissing,
                    "publish input is missing",
                )
                .with_context("path", name));
            }
        }
        let summary = fs::read_to_string(&summary_path).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to read summary.md").with_source(e)
        })?;
        let patch = fs::read_to_string(&patch_path).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to read diff.patch").with_source(e)
        })?;

        let manifest_path = output.join(holon_core::artifacts::MANIFEST);
        let mut manifest = if manifest_path.is_file() {
            HolonManifest::from_json_str(&fs::read_to_string(&manifest_path).map_err(|e| {
                HolonError::new(ErrorKind::Internal, "failed to read manifest.json")
                    .with_source(e)
            })?)?
        } else {
            HolonManifest::success(0.0, vec![])
        };

        let derived = derive(
            &manifest,
            request.input_dir.as_deref(),
            &summary,
            Utc::now(),
        );
        if derived.title_needs_persist {
            manifest
                .metadata
                .insert("title".to_string(), serde_json::json!(derived.title.clone()));
            fs::write(&manifest_path, manifest.to_json_string()?).map_err(|e| {
                HolonError::new(ErrorKind::Internal, "failed to persist derived title")
                    .with_source(e)
            })?;
        }

        let repo_dir = request.repo_dir.as_deref().ok_or_else(|| {
            HolonError::new(
                ErrorKind::Internal,
                "github-pr requires a local repository worktree",
            )
        })?;

        self.prepare_branch(repo_dir, &derived, result)?;
        self.apply_patch(repo_dir, &patch_path, &patch, result)?;
        self.commit(repo_dir, request, &derived, result)?;
        self.push(repo_dir, request, target, &derived, result)?;
        self.upsert_pull(&client, target, &derived, &summary, result)
            .await?;

        Ok(())
    }

    /// Reset to HEAD, clean untracked files, verify cleanliness, then land
    /// on the target branch. The branch exists *before* the patch applies.
    fn prepare_branch(
        &self,
        repo_dir: &Path,
        derived: &Derived,
        result: &mut PublishResult,
    ) -> Result<(), HolonError> {
        holon_git::reset_and_clean(repo_dir).map_err(|e| {
            HolonError::new(
                ErrorKind::WorktreeDirty,
                format!("failed to reset publish worktree: {e:#}"),
            )
        })?;
        let clean = holon_git::is_clean(repo_dir).map_err(|e| {
            HolonError::new(
                ErrorKind::WorktreeDirty,
                format!("failed to inspect publish worktree: {e:#}"),
            )
        })?;
        if !clean {
            let status = holon_git::status_porcelain(repo_dir).unwrap_or_default();
            return Err(HolonError::new(
                ErrorKind::WorktreeDirty,
                "publish worktree is dirty after reset and clean",
            )
            .with_context("status", status));
        }

        if holon_git::branch_exists(repo_dir, &derived.branch) {
            holon_git::checkout_branch(repo_dir, &derived.branch).map_err(|e| {
                HolonError::new(
                    ErrorKind::Internal,
                    format!("failed to check out branch: {e:#}"),
                )
            })?;
        } else {
            holon_git::create_branch(repo_dir, &derived.branch).map_err(|e| {
                HolonError::new(
                    ErrorKind::Internal,
                    format!("failed to create branch: {e:#}"),
                )
            })?;
            result.record(PublishAction::new(
                ActionType::CreatedBranch,
                derived.branch.clone(),
            ));
        }
        Ok(())
    }

    /// `git apply --check`, then apply and stage. Whitespace-only patches
    /// are a no-op.
    fn apply_patch(
        &self,
        repo_dir: &Path,
        patch_path: &Path,
        patch: &str,
        result: &mut PublishResult,
    ) -> Result<(), HolonError> {
        if holon_git::is_patch_empty(patch) {
            info!(target: "holon.publish", "patch is empty, nothing to apply");
            return Ok(());
        }

        holon_git::apply_check(repo_dir, patch_path).map_err(|e| {
            HolonError::new(
                ErrorKind::PatchApplyFailed,
                format!("patch does not apply cleanly: {e:#}"),
            )
        })?;
        holon_git::apply_patch(repo_dir, patch_path).map_err(|e| {
            HolonError::new(ErrorKind::PatchApplyFailed, format!("patch apply failed: {e:#}"))
        })?;
        holon_git::stage_all(repo_dir).map_err(|e| {
            HolonError::new(ErrorKind::Internal, format!("failed to stage patch: {e:#}"))
        })?;

        result.record(PublishAction::new(
            ActionType::AppliedPatch,
            holon_core::artifacts::DIFF,
        ));
        Ok(())
    }

    fn commit(
        &self,
        repo_dir: &Path,
        request: &PublishRequest,
        derived: &Derived,
        result: &mut PublishResult,
    ) -> Result<(), HolonError> {
        holon_git::ensure_identity(
            repo_dir,
            &request.config.author_name,
            &request.config.author_email,
        )
        .map_err(|e| {
            HolonError::new(
                ErrorKind::Internal,
                format!("failed to configure git identity: {e:#}"),
            )
        })?;

        let staged = holon_git::has_staged_changes(repo_dir).map_err(|e| {
            HolonError::new(ErrorKind::Internal, format!("failed to inspect index: {e:#}"))
        })?;
        if !staged {
            return Ok(());
        }

        holon_git::commit(repo_dir, &derived.commit_message).map_err(|e| {
            HolonError::new(ErrorKind::Internal, format!("commit failed: {e:#}"))
        })?;
        result.record(PublishAction::new(
            ActionType::CreatedCommit,
            derived.commit_message.clone(),
        ));
        Ok(())
    }

    /// Push with upstream tracking through a token-embedded HTTPS remote.
    fn push(
        &self,
        repo_dir: &Path,
        request: &PublishRequest,
        target: &RepoTarget,
        derived: &Derived,
        result: &mut PublishResult,
    ) -> Result<(), HolonError> {
        let remote_url = holon_git::config_get(repo_dir, "remote.origin.url")
            .unwrap_or_else(|| {
                format!("https://github.com/{}/{}.git", target.owner, target.repo)
            });
        // Local-path remotes (tests, mirrors) need no credentials.
        let push_url = if remote_url.starts_with("http")
            || remote_url.starts_with("git@")
            || remote_url.starts_with("ssh://")
        {
            holon_git::token_remote_url(&remote_url, &request.config.token)
        } else {
            remote_url
        };

        holon_git::set_remote_url(repo_dir, "origin", &push_url).map_err(|e| {
            HolonError::new(ErrorKind::PushFailed, format!("failed to configure remote: {e:#}"))
        })?;
        holon_git::push_upstream(repo_dir, "origin", &derived.branch).map_err(|e| {
            HolonError::new(ErrorKind::PushFailed, format!("push failed: {e:#}"))
        })?;

        result.record(PublishAction::new(
            ActionType::PushedBranch,
            derived.branch.clone(),
        ));
        Ok(())
    }

    /// Find an open PR by head ref and edit it, or create a new one.
    async fn upsert_pull(
        &self,
        client: &GithubClient,
        target: &RepoTarget,
        derived: &Derived,
        summary: &str,
        result: &mut PublishResult,
    ) -> Result<(), HolonError> {
        let body = match derived.issue_id {
            Some(id) => format!("Fixes #{id}\n\n{summary}"),
            None => summary.to_string(),
        };

        let open = client
            .list_open_pulls(&target.owner, &target.repo)
            .await?;
        if let Some(existing) = open.iter().find(|pr| pr.head.name == derived.branch) {
            let updated = client
                .update_pull(
                    &target.owner,
                    &target.repo,
                    existing.number,
                    &derived.title,
                    &body,
                )
                .await?;
            result.record(
                PublishAction::new(ActionType::UpdatedPr, format!("#{}", updated.number))
                    .with_metadata("number", updated.number)
                    .with_metadata("url", updated.html_url.clone()),
            );
            result
                .metadata
                .insert("pr_number".to_string(), serde_json::json!(updated.number));
        } else {
            let created = client
                .create_pull(
                    &target.owner,
                    &target.repo,
                    &CreatePull {
                        title: derived.title.clone(),
                        head: derived.branch.clone(),
                        base: target.base.clone(),
                        body,
                        maintainer_can_modify: true,
                    },
                )
                .await?;
            result.record(
                PublishAction::new(ActionType::CreatedPr, format!("#{}", created.number))
                    .with_metadata("number", created.number)
                    .with_metadata("url", created.html_url.clone()),
            );
            result
                .metadata
                .insert("pr_number".to_string(), serde_json::json!(created.number));
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for GithubPrPublisher {
    fn name(&self) -> &'static str {
        "github-pr"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult, HolonError> {
        let target = RepoTarget::parse(&request.target)?;
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
                // Best-effort: the record matters most when things break.
                let _ = write_publish_result(&request.output_dir, &result);
                Err(err)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
