// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP download with integrity verification.
//!
//! Downloads stream to a temp file while a running SHA-256 digest is fed, so
//! verification never requires a second pass over the body.

use holon_error::{ErrorKind, HolonError};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

/// Maximum number of body bytes quoted in error messages.
const ERROR_BODY_LIMIT: usize = 1024;

/// Explicit knobs for the bundle HTTP client.
#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    /// TCP connect + TLS handshake budget.
    pub connect_timeout: Duration,
    /// Budget for reading between bytes of the response.
    pub read_timeout: Duration,
    /// Budget for the whole request.
    pub request_timeout: Duration,
    /// Maximum redirects followed before failing.
    pub max_redirects: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(300),
            max_redirects: 10,
        }
    }
}

/// Why the redirect policy refused to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
enum RedirectViolation {
    #[error("too many redirects")]
    TooMany,
    #[error("redirect to non-http(s) scheme")]
    SchemeRejected,
}

/// A configured client for bundle downloads.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    /// Build a client from options.
    pub fn new(options: HttpOptions) -> Result<Self, HolonError> {
        let max = options.max_redirects;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max {
                return attempt.error(RedirectViolation::TooMany);
            }
            match attempt.url().scheme() {
                "http" | "https" => attempt.follow(),
                _ => attempt.error(RedirectViolation::SchemeRejected),
            }
        });
        let inner = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .timeout(options.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|e| {
                HolonError::new(ErrorKind::Internal, "failed to build HTTP client")
                    .with_source(e)
            })?;
        Ok(Self { inner })
    }

    /// Build a client with the default options.
    pub fn with_defaults() -> Result<Self, HolonError> {
        Self::new(HttpOptions::default())
    }

    /// Borrow the underlying reqwest client (for small JSON probes).
    pub fn raw(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Download `url` into a temp file, returning the file, the hex SHA-256
    /// of its bytes, and its size.
    pub async fn download_to_temp(
        &self,
        url: &str,
    ) -> Result<(NamedTempFile, String, u64), HolonError> {
        debug!(target: "holon.bundle", "downloading {url}");
        let mut resp = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            let kind = if status == reqwest::StatusCode::NOT_FOUND {
                ErrorKind::NotFound
            } else {
                ErrorKind::NetworkFailure
            };
            return Err(HolonError::new(
                kind,
                format!("download failed with HTTP {}: {snippet}", status.as_u16()),
            )
            .with_context("url", url));
        }

        let mut file = NamedTempFile::new().map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to create download temp file")
                .with_source(e)
        })?;
        let mut hasher = Sha256::new();
        let mut size: u64 = 0;

        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| classify_transport_error(url, e))?
        {
            hasher.update(&chunk);
            size += chunk.len() as u64;
            file.write_all(&chunk).map_err(|e| {
                HolonError::new(ErrorKind::Internal, "failed to write download temp file")
                    .with_source(e)
            })?;
        }
        file.flush().map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to flush download temp file")
                .with_source(e)
        })?;

        let sha256 = format!("{:x}", hasher.finalize());
        debug!(target: "holon.bundle", "downloaded {size} bytes, sha256={sha256}");
        Ok((file, sha256, size))
    }
}

/// Map a transport-level reqwest error onto the taxonomy, surfacing redirect
/// policy violations with their own kinds.
fn classify_transport_error(url: &str, error: reqwest::Error) -> HolonError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&error);
    while let Some(err) = source {
        if let Some(violation) = err.downcast_ref::<RedirectViolation>() {
            let kind = match violation {
                RedirectViolation::TooMany => ErrorKind::TooManyRedirects,
                RedirectViolation::SchemeRejected => ErrorKind::SchemeRejected,
            };
            return HolonError::new(kind, violation.to_string()).with_context("url", url);
        }
        source = err.source();
    }
    HolonError::new(ErrorKind::NetworkFailure, "download failed")
        .with_context("url", url)
        .with_source(error)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
