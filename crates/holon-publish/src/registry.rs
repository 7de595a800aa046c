// SPDX-License-Identifier: MIT OR Apache-2.0
//! The publisher trait and the name-keyed registry.

use async_trait::async_trait;
use holon_core::PublishResult;
use holon_error::{ErrorKind, HolonError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration shared by every provider invocation.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// API token for the remote.
    pub token: String,
    /// Commit author name used when the worktree has no identity.
    pub author_name: String,
    /// Commit author email counterpart.
    pub author_email: String,
    /// Remote API base URL (overridable for tests).
    pub api_base_url: String,
}

impl PublisherConfig {
    /// A config with the default author identity and API endpoint.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            author_name: holon_git::DEFAULT_AUTHOR_NAME.to_string(),
            author_email: holon_git::DEFAULT_AUTHOR_EMAIL.to_string(),
            api_base_url: "https://api.github.com".to_string(),
        }
    }
}

/// One publish invocation's inputs.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Provider-specific target string.
    pub target: String,
    /// The run's output directory (`manifest.json`, `diff.patch`, ...).
    pub output_dir: PathBuf,
    /// The run's input directory, when context files should inform the
    /// publish (title derivation reads `input/context/`).
    pub input_dir: Option<PathBuf>,
    /// Local git worktree the `github-pr` provider operates in.
    pub repo_dir: Option<PathBuf>,
    /// Credentials and identity.
    pub config: PublisherConfig,
}

/// A named publisher.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Registry name (`github-pr`, `github`).
    fn name(&self) -> &'static str;

    /// Apply the run's artifacts to the remote.
    ///
    /// Non-fatal problems accumulate in the result's `errors`; a fatal
    /// problem short-circuits with `Err` after `publish-result.json` has
    /// been written with `success = false` where possible.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult, HolonError>;
}

/// Name-keyed publisher registry.
///
/// Owned by process initialisation; looked up per invocation. Duplicate
/// registration is an error, not a replacement.
#[derive(Default)]
pub struct PublisherRegistry {
    publishers: BTreeMap<&'static str, Arc<dyn Publisher>>,
}

impl PublisherRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in providers registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(crate::pr::GithubPrPublisher::new()))
            .expect("fresh registry accepts github-pr");
        registry
            .register(Arc::new(crate::review::GithubReviewPublisher::new()))
            .expect("fresh registry accepts github");
        registry
    }

    /// Register a publisher under its own name.
    pub fn register(&mut self, publisher: Arc<dyn Publisher>) -> Result<(), HolonError> {
        let name = publisher.name();
        if self.publishers.contains_key(name) {
            return Err(
                HolonError::new(ErrorKind::Internal, "publisher already registered")
                    .with_context("name", name),
            );
        }
        self.publishers.insert(name, publisher);
        Ok(())
    }

    /// Look up a publisher by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Publisher>> {
        self.publishers.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.publishers.keys().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(&'static str);

    #[async_trait]
    impl Publisher for Dummy {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn publish(&self, request: &PublishRequest) -> Result<PublishResult, HolonError> {
            Ok(PublishResult::new(self.0, &request.target))
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = PublisherRegistry::new();
        registry.register(Arc::new(Dummy("x"))).unwrap();
        assert!(registry.get("x").is_some());
        assert!(registry.get("y").is_none());
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut registry = PublisherRegistry::new();
        registry.register(Arc::new(Dummy("x"))).unwrap();
        let err = registry.register(Arc::new(Dummy("x"))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = PublisherRegistry::new();
        registry.register(Arc::new(Dummy("zeta"))).unwrap();
        registry.register(Arc::new(Dummy("alpha"))).unwrap();
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn default_registry_has_both_providers() {
        let registry = PublisherRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["github", "github-pr"]);
    }
}
