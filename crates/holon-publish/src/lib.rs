// SPDX-License-Identifier: MIT OR Apache-2.0
//! holon-publish
//!
//! Publishers take the canonical artifact set (`manifest.json`,
//! `diff.patch`, `summary.md`, optional `pr-fix.json`) plus optional context
//! files and perform one of two externally observable actions: create or
//! update a pull request, or post structured replies on an existing one.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Deterministic title/branch/commit-message derivation.
pub mod derive;
/// Thin GitHub REST client.
pub mod github;
/// The `github-pr` provider: create-or-update a pull request.
pub mod pr;
/// The publisher trait and the name-keyed registry.
pub mod registry;
/// The `github` provider: summary comment and review replies.
pub mod review;
/// Target string grammars.
pub mod target;

pub use github::GithubClient;
pub use pr::GithubPrPublisher;
pub use registry::{PublishRequest, Publisher, PublisherConfig, PublisherRegistry};
pub use review::GithubReviewPublisher;
pub use target::{PrTarget, RepoTarget};

use holon_core::PublishResult;
use holon_error::{ErrorKind, HolonError};
use std::path::Path;

/// Write `publish-result.json` into the output directory.
pub fn write_publish_result(output_dir: &Path, result: &PublishResult) -> Result<(), HolonError> {
    let text = result.to_json_string().map_err(|e| {
        HolonError::new(ErrorKind::Internal, "failed to serialise publish result")
            .with_source(e)
    })?;
    std::fs::write(output_dir.join("publish-result.json"), text).map_err(|e| {
        HolonError::new(ErrorKind::Internal, "failed to write publish-result.json")
            .with_source(e)
    })
}
