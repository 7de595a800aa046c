// SPDX-License-Identifier: MIT OR Apache-2.0
//! Target string grammars.
//!
//! - `github-pr`: `owner/repo[:base_branch]`, base defaulting to `main`.
//! - `github`: `owner/repo/pr/<n>` or `owner/repo#<n>`.

use holon_error::{ErrorKind, HolonError};

/// A repository target with a base branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Base branch PRs are opened against.
    pub base: String,
}

impl RepoTarget {
    /// Parse `owner/repo[:base_branch]`.
    pub fn parse(target: &str) -> Result<Self, HolonError> {
        let invalid = || {
            HolonError::new(
                ErrorKind::TargetInvalid,
                "expected owner/repo[:base_branch]",
            )
            .with_context("target", target)
        };

        let (repo_part, base) = match target.split_once(':') {
            Some((repo, base)) if !base.is_empty() => (repo, base.to_string()),
            Some(_) => return Err(invalid()),
            None => (target, "main".to_string()),
        };

        let (owner, repo) = repo_part.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            base,
        })
    }
}

/// A pull-request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrTarget {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number.
    pub number: u64,
}

impl PrTarget {
    /// Parse `owner/repo/pr/<n>` or `owner/repo#<n>`.
    pub fn parse(target: &str) -> Result<Self, HolonError> {
        let invalid = || {
            HolonError::new(
                ErrorKind::TargetInvalid,
                "expected owner/repo/pr/<n> or owner/repo#<n>",
            )
            .with_context("target", target)
        };

        if let Some((repo_part, number)) = target.split_once('#') {
            let (owner, repo) = repo_part.split_once('/').ok_or_else(invalid)?;
            let number = number.parse().map_err(|_| invalid())?;
            if owner.is_empty() || repo.is_empty() || repo.contains('/') {
                return Err(invalid());
            }
            return Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number,
            });
        }

        let parts: Vec<&str> = target.split('/').collect();
        match parts.as_slice() {
            [owner, repo, "pr", number] if !owner.is_empty() && !repo.is_empty() => {
                Ok(Self {
                    owner: (*owner).to_string(),
                    repo: (*repo).to_string(),
                    number: number.parse().map_err(|_| invalid())?,
                })
            }
            _ => Err(invalid()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
