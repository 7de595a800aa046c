// SPDX-License-Identifier: MIT OR Apache-2.0
//! The composer: render a build context, derive the tag, build or reuse.

use holon_error::{ErrorKind, HolonError};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::cli::ContainerCli;

/// Version of the installation recipe below. Part of the cache key: bump it
/// whenever the rendered Dockerfile changes shape.
pub const RECIPE_VERSION: &str = "3";

/// Image repository used for composed tags.
const IMAGE_REPO: &str = "holon-agent";

/// Inputs to one composition.
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    /// Base toolchain image reference (e.g. `rust:1.85-bookworm`).
    pub base_image: String,
    /// Local path of the verified bundle archive.
    pub bundle_path: PathBuf,
    /// Content hash of the bundle archive.
    pub bundle_sha256: String,
    /// Pinned runtime version from the bundle manifest (e.g. `22.11.0`).
    pub runtime_version: String,
}

/// A composed image, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedImage {
    /// The image tag/id to pass to the container runtime.
    pub id: String,
    /// Whether an existing image was reused instead of rebuilt.
    pub reused: bool,
}

/// Builds composed images through a [`ContainerCli`].
pub struct ImageComposer<C: ContainerCli> {
    cli: C,
}

impl<C: ContainerCli> ImageComposer<C> {
    /// A composer over the given engine.
    pub fn new(cli: C) -> Self {
        Self { cli }
    }

    /// Compose (or reuse) the image for `request`.
    pub fn compose(&self, request: &ComposeRequest) -> Result<ComposedImage, HolonError> {
        let base_digest = self.cli.image_digest(&request.base_image)?;
        let tag = image_tag(&base_digest, &request.bundle_sha256);

        if self.cli.image_exists(&tag)? {
            debug!(target: "holon.image", "reusing composed image {tag}");
            return Ok(ComposedImage {
                id: tag,
                reused: true,
            });
        }

        let context = render_context(request)?;
        info!(target: "holon.image", "building composed image {tag} from {}", request.base_image);
        self.cli.build(context.path(), &tag)?;
        Ok(ComposedImage {
            id: tag,
            reused: false,
        })
    }
}

/// Derive the deterministic tag for `(base_digest, bundle_sha256)` under the
/// current recipe version.
pub fn image_tag(base_digest: &str, bundle_sha256: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base_digest.as_bytes());
    hasher.update(b"\n");
    hasher.update(bundle_sha256.as_bytes());
    hasher.update(b"\n");
    hasher.update(RECIPE_VERSION.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{IMAGE_REPO}:{}", &digest[..12])
}

/// Render the build context: the Dockerfile plus the bundle archive.
///
/// The returned temp dir must outlive the build.
fn render_context(request: &ComposeRequest) -> Result<tempfile::TempDir, HolonError> {
    let dir = tempfile::tempdir().map_err(|e| {
        HolonError::new(ErrorKind::Internal, "failed to create build context").with_source(e)
    })?;

    fs::copy(&request.bundle_path, dir.path().join("holon-bundle.tar.gz")).map_err(|e| {
        HolonError::new(
            ErrorKind::BundleExtractFailed,
            "failed to stage bundle into build context",
        )
        .with_context("bundle", request.bundle_path.display().to_string())
        .with_source(e)
    })?;

    let dockerfile = render_dockerfile(&request.base_image, &request.runtime_version);
    fs::write(dir.path().join("Dockerfile"), dockerfile).map_err(|e| {
        HolonError::new(ErrorKind::Internal, "failed to write Dockerfile").with_source(e)
    })?;

    Ok(dir)
}

/// The installation recipe. Keep [`RECIPE_VERSION`] in sync with any change.
fn render_dockerfile(base_image: &str, runtime_version: &str) -> String {
    format!(
        r#"FROM {base_image}

# Pinned agent runtime.
RUN set -eux; \
    arch="$(uname -m)"; \
    case "$arch" in x86_64) node_arch=x64 ;; aarch64) node_arch=arm64 ;; *) echo "unsupported arch $arch" >&2; exit 1 ;; esac; \
    curl -fsSL "https://nodejs.org/dist/v{runtime_version}/node-v{runtime_version}-linux-$node_arch.tar.xz" -o /tmp/holon-runtime.tar.xz; \
    mkdir -p /usr/local/holon-runtime; \
    tar -xJf /tmp/holon-runtime.tar.xz -C /usr/local/holon-runtime --strip-components=1; \
    rm /tmp/holon-runtime.tar.xz

# Agent bundle, extracted to the canonical location.
COPY holon-bundle.tar.gz /tmp/holon-bundle.tar.gz
RUN set -eux; \
    mkdir -p /holon/agent; \
    tar -xzf /tmp/holon-bundle.tar.gz -C /holon/agent; \
    rm /tmp/holon-bundle.tar.gz; \
    chmod +x /holon/agent/bin/agent

ENV PATH="/holon/agent/bin:/usr/local/holon-runtime/bin:${{PATH}}"
WORKDIR /holon/workspace
"#
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
