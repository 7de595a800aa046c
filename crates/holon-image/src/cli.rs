// SPDX-License-Identifier: MIT OR Apache-2.0
//! The container engine seam.

use holon_error::{ErrorKind, HolonError};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Minimal surface of a container engine the composer needs.
pub trait ContainerCli: Send + Sync {
    /// Content digest (or id) of `image`, pulling it if absent locally.
    fn image_digest(&self, image: &str) -> Result<String, HolonError>;

    /// Whether an image tagged `tag` exists locally.
    fn image_exists(&self, tag: &str) -> Result<bool, HolonError>;

    /// Build `context_dir` into an image tagged `tag`.
    fn build(&self, context_dir: &Path, tag: &str) -> Result<(), HolonError>;
}

/// `docker` subprocess driver.
#[derive(Debug, Clone, Default)]
pub struct DockerCli {
    /// Binary to invoke; `docker` unless overridden.
    pub binary: String,
}

impl DockerCli {
    /// Driver for the `docker` binary on `PATH`.
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<std::process::Output, HolonError> {
        debug!(target: "holon.image", "{} {:?}", self.binary, args);
        Command::new(&self.binary).args(args).output().map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to invoke container engine")
                .with_context("binary", &self.binary)
                .with_source(e)
        })
    }
}

impl ContainerCli for DockerCli {
    fn image_digest(&self, image: &str) -> Result<String, HolonError> {
        let inspect = |image: &str| -> Result<Option<String>, HolonError> {
            let out = self.run(&["image", "inspect", "--format", "{{.Id}}", image])?;
            if out.status.success() {
                Ok(Some(String::from_utf8_lossy(&out.stdout).trim().to_string()))
            } else {
                Ok(None)
            }
        };

        if let Some(id) = inspect(image)? {
            return Ok(id);
        }

        let pull = self.run(&["pull", "--quiet", image])?;
        if !pull.status.success() {
            let stderr = String::from_utf8_lossy(&pull.stderr);
            return Err(HolonError::new(
                ErrorKind::BaseImagePullFailed,
                format!("failed to pull base image: {}", first_lines(&stderr, 3)),
            )
            .with_context("image", image));
        }

        inspect(image)?.ok_or_else(|| {
            HolonError::new(
                ErrorKind::BaseImagePullFailed,
                "base image absent after successful pull",
            )
            .with_context("image", image)
        })
    }

    fn image_exists(&self, tag: &str) -> Result<bool, HolonError> {
        let out = self.run(&["image", "inspect", "--format", "{{.Id}}", tag])?;
        Ok(out.status.success())
    }

    fn build(&self, context_dir: &Path, tag: &str) -> Result<(), HolonError> {
        let context = context_dir.display().to_string();
        let out = self.run(&["build", "--quiet", "-t", tag, &context])?;
        if out.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        Err(classify_build_failure(&stderr).with_context("tag", tag))
    }
}

/// Map a failed build's stderr onto the taxonomy.
///
/// The recipe names its own artifacts (`holon-bundle.tar.gz`, the runtime
/// prefix) so the failing step is identifiable from the engine's output.
pub fn classify_build_failure(stderr: &str) -> HolonError {
    let brief = first_lines(stderr, 6);
    if stderr.contains("holon-bundle.tar.gz") || stderr.contains("/holon/agent") {
        HolonError::new(
            ErrorKind::BundleExtractFailed,
            format!("bundle extraction failed: {brief}"),
        )
    } else if stderr.contains("pull access denied")
        || stderr.contains("manifest unknown")
        || stderr.contains("failed to resolve source metadata")
    {
        HolonError::new(
            ErrorKind::BaseImagePullFailed,
            format!("base image pull failed during build: {brief}"),
        )
    } else {
        HolonError::new(
            ErrorKind::RuntimeInstallFailed,
            format!("runtime installation failed: {brief}"),
        )
    }
}

fn first_lines(text: &str, n: usize) -> String {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .take(n)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_failure_classified() {
        let err = classify_build_failure(
            "#8 ERROR: process \"tar -xzf /tmp/holon-bundle.tar.gz\" did not complete",
        );
        assert_eq!(err.kind, ErrorKind::BundleExtractFailed);
    }

    #[test]
    fn pull_failure_classified() {
        let err = classify_build_failure(
            "ERROR: failed to resolve source metadata for docker.io/library/nonesuch:latest",
        );
        assert_eq!(err.kind, ErrorKind::BaseImagePullFailed);
    }

    #[test]
    fn other_failures_are_runtime_install() {
        let err = classify_build_failure("curl: (22) The requested URL returned error: 500");
        assert_eq!(err.kind, ErrorKind::RuntimeInstallFailed);
    }

    #[test]
    fn brief_output_trims_blank_lines() {
        let err = classify_build_failure("\n\nline one\nline two\n");
        assert!(err.message.contains("line one; line two"));
    }
}
