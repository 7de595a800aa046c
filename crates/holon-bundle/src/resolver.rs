// SPDX-License-Identifier: MIT OR Apache-2.0
//! The resolver facade: agent reference in, verified local archive out.

use holon_error::{ErrorKind, HolonError};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::agent_ref::{AgentRef, split_sha256_fragment};
use crate::cache::BundleCache;
use crate::http::HttpClient;

/// Budget for the best-effort built-in staleness probe.
const UPDATE_CHECK_BUDGET: Duration = Duration::from_secs(2);

/// The compiled-in agent bundle reference.
#[derive(Debug, Clone)]
pub struct BuiltinBundle {
    /// Download URL of the bundle release asset.
    pub url: String,
    /// Expected SHA-256 of the asset.
    pub sha256: String,
    /// Version embedded at compile time, compared against upstream.
    pub version: String,
    /// Releases-latest endpoint used by the staleness probe.
    pub releases_latest_url: String,
}

impl BuiltinBundle {
    /// The bundle reference compiled into this binary.
    pub fn compiled() -> Self {
        Self {
            url: "https://github.com/holon-run/holon-agent/releases/download/v0.4.2/holon-agent-linux-x64.tar.gz".to_string(),
            sha256: "7c9f3e1a54b2d8c0e6f4a19d3b78c5e20d1f6a8b4c3e7d905a2b1c8f6e4d3a70".to_string(),
            version: "0.4.2".to_string(),
            releases_latest_url: "https://api.github.com/repos/holon-run/holon-agent/releases/latest".to_string(),
        }
    }
}

/// Maps an agent reference to a local, known-good bundle archive.
#[derive(Debug, Clone)]
pub struct Resolver {
    cache: BundleCache,
    http: HttpClient,
    builtin: BuiltinBundle,
    no_auto_install: bool,
}

impl Resolver {
    /// A resolver over the given cache and HTTP client.
    pub fn new(cache: BundleCache, http: HttpClient) -> Self {
        Self {
            cache,
            http,
            builtin: BuiltinBundle::compiled(),
            no_auto_install: false,
        }
    }

    /// Replace the built-in bundle reference (tests, staging builds).
    pub fn with_builtin(mut self, builtin: BuiltinBundle) -> Self {
        self.builtin = builtin;
        self
    }

    /// Disable automatic download of the built-in bundle.
    pub fn with_no_auto_install(mut self, flag: bool) -> Self {
        self.no_auto_install = flag;
        self
    }

    /// Borrow the underlying cache.
    pub fn cache(&self) -> &BundleCache {
        &self.cache
    }

    /// Resolve `reference` to a local archive path.
    ///
    /// Classification order: existing file, `http(s)` URL, the `default`
    /// sentinel, registered alias. Every returned path either existed as a
    /// regular file or has been hash-verified into the cache.
    pub async fn resolve(&self, reference: &str) -> Result<PathBuf, HolonError> {
        match AgentRef::classify(reference)? {
            AgentRef::File(path) => Ok(path),
            AgentRef::Http {
                url,
                expected_sha256,
            } => self.resolve_http(&url, expected_sha256.as_deref()).await,
            AgentRef::Alias(name) => {
                let url = self.cache.get_alias(&name).ok_or_else(|| {
                    HolonError::new(ErrorKind::NotFound, "alias is not registered")
                        .with_context("alias", &name)
                })?;
                let (url, expected) = split_sha256_fragment(&url)?;
                self.resolve_http(&url, expected.as_deref()).await
            }
            AgentRef::Default => self.resolve_builtin().await,
        }
    }

    async fn resolve_http(
        &self,
        url: &str,
        expected_sha256: Option<&str>,
    ) -> Result<PathBuf, HolonError> {
        if let Some(hit) = self.cache.get_by_url(url, expected_sha256) {
            debug!(target: "holon.bundle", "cache hit for {url}");
            return Ok(hit);
        }

        if expected_sha256.is_none() {
            warn!(target: "holon.bundle", "downloading {url} without an integrity hash");
        }

        let (tmp, actual_sha256, size) = self.http.download_to_temp(url).await?;

        if let Some(expected) = expected_sha256 {
            if expected != actual_sha256 {
                return Err(HolonError::new(
                    ErrorKind::ChecksumMismatch,
                    "downloaded bundle does not match the expected SHA-256",
                )
                .with_context("url", url)
                .with_context("expected", expected)
                .with_context("actual", actual_sha256));
            }
        }

        self.cache.store(tmp.path(), url, &actual_sha256, size)
    }

    async fn resolve_builtin(&self) -> Result<PathBuf, HolonError> {
        self.spawn_update_check();

        if self.no_auto_install {
            return self.cache.get_by_sha256(&self.builtin.sha256).ok_or_else(|| {
                HolonError::new(
                    ErrorKind::NotFound,
                    "built-in bundle is not cached and auto-install is disabled",
                )
                .with_context("sha256", &self.builtin.sha256)
            });
        }

        self.resolve_http(&self.builtin.url, Some(&self.builtin.sha256))
            .await
    }

    /// Fire the staleness probe on its own task. Resolution never awaits it.
    fn spawn_update_check(&self) {
        let client = self.http.raw().clone();
        let builtin = self.builtin.clone();
        tokio::spawn(async move {
            match fetch_latest_tag(&client, &builtin.releases_latest_url).await {
                Some(latest) if is_newer(&latest, &builtin.version) => {
                    warn!(
                        target: "holon.bundle",
                        "built-in agent bundle {} is stale; latest release is {latest}",
                        builtin.version
                    );
                }
                Some(_) => {}
                None => {
                    debug!(target: "holon.bundle", "built-in staleness check unavailable");
                }
            }
        });
    }
}

/// Fetch the latest release tag, stripped of a leading `v`.
///
/// Bounded by [`UPDATE_CHECK_BUDGET`]; any failure yields `None`.
pub async fn fetch_latest_tag(client: &reqwest::Client, url: &str) -> Option<String> {
    let fut = async {
        let resp = client
            .get(url)
            .header("user-agent", "holon")
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: serde_json::Value = resp.json().await.ok()?;
        let tag = body.get("tag_name")?.as_str()?;
        Some(tag.trim_start_matches('v').to_string())
    };
    tokio::time::timeout(UPDATE_CHECK_BUDGET, fut).await.ok()?
}

/// Dotted-numeric version comparison; non-numeric segments compare as zero.
pub fn is_newer(latest: &str, embedded: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|seg| seg.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let a = parse(latest);
    let b = parse(embedded);
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use std::fs;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &[u8] = b"holon-agent-bundle-bytes";

    fn sha_hex(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }

    fn resolver_in(dir: &TempDir) -> Resolver {
        let cache = BundleCache::open(dir.path().join("cache")).unwrap();
        let http = HttpClient::with_defaults().unwrap();
        Resolver::new(cache, http)
    }

    async fn serve_bundle(server: &MockServer, route: &str, expect: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY.to_vec()))
            .expect(expect)
            .mount(server)
            .await;
    }

    // -- File refs --------------------------------------------------------

    #[tokio::test]
    async fn file_ref_passes_through() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("agent.tgz");
        fs::write(&file, BODY).unwrap();

        let resolver = resolver_in(&dir);
        let resolved = resolver.resolve(file.to_str().unwrap()).await.unwrap();
        assert_eq!(fs::read(&resolved).unwrap(), BODY);
    }

    // -- HTTP refs --------------------------------------------------------

    #[tokio::test]
    async fn http_ref_downloads_verifies_and_caches() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        // Exactly one request: the second resolve must hit the cache.
        serve_bundle(&server, "/a.tgz", 1).await;

        let resolver = resolver_in(&dir);
        let reference = format!("{}/a.tgz#sha256={}", server.uri(), sha_hex(BODY));

        let first = resolver.resolve(&reference).await.expect("first resolve");
        assert_eq!(fs::read(&first).unwrap(), BODY);

        let second = resolver.resolve(&reference).await.expect("second resolve");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn checksum_mismatch_fails_and_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        serve_bundle(&server, "/a.tgz", 1).await;

        let resolver = resolver_in(&dir);
        let wrong = "d".repeat(64);
        let reference = format!("{}/a.tgz#sha256={wrong}", server.uri());

        let err = resolver.resolve(&reference).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ChecksumMismatch);
        // The real hash was never admitted into the cache.
        assert!(resolver.cache().get_by_sha256(&sha_hex(BODY)).is_none());
    }

    #[tokio::test]
    async fn http_ref_without_hash_stores_by_actual_hash() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        serve_bundle(&server, "/a.tgz", 1).await;

        let resolver = resolver_in(&dir);
        let resolved = resolver
            .resolve(&format!("{}/a.tgz", server.uri()))
            .await
            .unwrap();
        assert_eq!(resolved, resolver.cache().archive_path(&sha_hex(BODY)));
    }

    // -- Alias refs -------------------------------------------------------

    #[tokio::test]
    async fn unregistered_alias_is_not_found() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir);
        let err = resolver.resolve("nightly").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn alias_resolves_through_http_with_hash() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        serve_bundle(&server, "/nightly.tgz", 1).await;

        let resolver = resolver_in(&dir);
        resolver
            .cache()
            .set_alias(
                "nightly",
                &format!("{}/nightly.tgz#sha256={}", server.uri(), sha_hex(BODY)),
            )
            .unwrap();

        let resolved = resolver.resolve("nightly").await.expect("resolve alias");
        assert_eq!(fs::read(&resolved).unwrap(), BODY);
    }

    // -- Built-in ---------------------------------------------------------

    #[tokio::test]
    async fn default_with_auto_install_disabled_requires_cache() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir).with_no_auto_install(true);
        let err = resolver.resolve("default").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn default_downloads_builtin() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        serve_bundle(&server, "/builtin.tgz", 1).await;
        // The staleness probe may or may not land before the test ends;
        // a 404 keeps it silent either way.
        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolver = resolver_in(&dir).with_builtin(BuiltinBundle {
            url: format!("{}/builtin.tgz", server.uri()),
            sha256: sha_hex(BODY),
            version: "0.4.2".to_string(),
            releases_latest_url: format!("{}/releases/latest", server.uri()),
        });

        let resolved = resolver.resolve("default").await.expect("resolve default");
        assert_eq!(fs::read(&resolved).unwrap(), BODY);
    }

    // -- Staleness probe --------------------------------------------------

    #[tokio::test]
    async fn fetch_latest_tag_strips_v_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"tag_name": "v0.5.0"}"#),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let tag = fetch_latest_tag(&client, &format!("{}/releases/latest", server.uri())).await;
        assert_eq!(tag.as_deref(), Some("0.5.0"));
    }

    #[tokio::test]
    async fn fetch_latest_tag_swallows_failures() {
        let client = reqwest::Client::new();
        assert!(fetch_latest_tag(&client, "http://127.0.0.1:1/latest").await.is_none());
    }

    #[test]
    fn version_comparison() {
        assert!(is_newer("0.5.0", "0.4.2"));
        assert!(is_newer("1.0.0", "0.9.9"));
        assert!(is_newer("0.4.10", "0.4.2"));
        assert!(!is_newer("0.4.2", "0.4.2"));
        assert!(!is_newer("0.4.1", "0.4.2"));
        assert!(!is_newer("garbage", "0.4.2"));
    }
}
