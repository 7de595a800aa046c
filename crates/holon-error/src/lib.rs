// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error kinds for Holon.
//!
//! Every Holon error carries an [`ErrorKind`] (a machine-readable, stable
//! string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. Use the builder returned by
//! [`HolonError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorKind`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed specs, goals, refs, or prompt inputs.
    Input,
    /// Agent bundle resolution and download errors.
    Resolution,
    /// Image composition errors.
    Build,
    /// Container and agent execution errors.
    Run,
    /// Artifact assembly and validation errors.
    Artifact,
    /// Remote publishing errors.
    Publish,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Resolution => "resolution",
            Self::Build => "build",
            Self::Run => "run",
            Self::Artifact => "artifact",
            Self::Publish => "publish",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Machine-readable, stable error kind.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // -- Input --
    /// The agent reference cannot be classified as file, URL, alias, or default.
    RefInvalid,
    /// No spec file and no goal string were supplied.
    SpecMissing,
    /// The spec file failed validation (version, kind, goal, artifacts).
    SpecInvalid,
    /// A compiled prompt file is missing from the input tree.
    PromptMissing,

    // -- Resolution --
    /// The referenced bundle does not exist (file, cache, or remote).
    NotFound,
    /// The download failed at the transport level.
    NetworkFailure,
    /// The downloaded bundle's SHA-256 does not match the expected hash.
    ChecksumMismatch,
    /// The redirect chain exceeded the configured limit.
    TooManyRedirects,
    /// A redirect pointed at a non-http(s) scheme.
    SchemeRejected,

    // -- Build --
    /// The base toolchain image could not be pulled.
    BaseImagePullFailed,
    /// The bundle archive could not be extracted into the image.
    BundleExtractFailed,
    /// Installing the pinned agent runtime into the image failed.
    RuntimeInstallFailed,

    // -- Run --
    /// The container process could not be started.
    ContainerStartFailed,
    /// No message arrived from the agent within the initial-response window.
    QueryTimeout,
    /// The agent fell silent for longer than the idle window.
    IdleTimeout,
    /// The agent exceeded its total wall-clock budget.
    TotalTimeout,
    /// The run was cancelled by an external signal.
    Cancelled,
    /// The agent exited without producing a result manifest.
    AgentExitedWithoutResult,

    // -- Artifact --
    /// Files were staged but the cached diff came out empty.
    PatchGenerationFailed,
    /// A `required: true` artifact is absent from the output tree.
    ArtifactMissing,
    /// The output manifest could not be parsed.
    ManifestMalformed,

    // -- Publish --
    /// The publish target string does not match the provider's grammar.
    TargetInvalid,
    /// No GitHub token was found in the credential chain.
    AuthMissing,
    /// `git apply` rejected the patch.
    PatchApplyFailed,
    /// The publish worktree was dirty after reset and clean.
    WorktreeDirty,
    /// Pushing the branch to the remote failed.
    PushFailed,
    /// The remote API returned a non-success response.
    RemoteApiError,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorKind {
    /// Returns the broad [`ErrorCategory`] this kind belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RefInvalid | Self::SpecMissing | Self::SpecInvalid | Self::PromptMissing => {
                ErrorCategory::Input
            }

            Self::NotFound
            | Self::NetworkFailure
            | Self::ChecksumMismatch
            | Self::TooManyRedirects
            | Self::SchemeRejected => ErrorCategory::Resolution,

            Self::BaseImagePullFailed | Self::BundleExtractFailed | Self::RuntimeInstallFailed => {
                ErrorCategory::Build
            }

            Self::ContainerStartFailed
            | Self::QueryTimeout
            | Self::IdleTimeout
            | Self::TotalTimeout
            | Self::Cancelled
            | Self::AgentExitedWithoutResult => ErrorCategory::Run,

            Self::PatchGenerationFailed | Self::ArtifactMissing | Self::ManifestMalformed => {
                ErrorCategory::Artifact
            }

            Self::TargetInvalid
            | Self::AuthMissing
            | Self::PatchApplyFailed
            | Self::WorktreeDirty
            | Self::PushFailed
            | Self::RemoteApiError => ErrorCategory::Publish,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the kind (e.g.
    /// `"CHECKSUM_MISMATCH"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefInvalid => "REF_INVALID",
            Self::SpecMissing => "SPEC_MISSING",
            Self::SpecInvalid => "SPEC_INVALID",
            Self::PromptMissing => "PROMPT_MISSING",
            Self::NotFound => "NOT_FOUND",
            Self::NetworkFailure => "NETWORK_FAILURE",
            Self::ChecksumMismatch => "CHECKSUM_MISMATCH",
            Self::TooManyRedirects => "TOO_MANY_REDIRECTS",
            Self::SchemeRejected => "SCHEME_REJECTED",
            Self::BaseImagePullFailed => "BASE_IMAGE_PULL_FAILED",
            Self::BundleExtractFailed => "BUNDLE_EXTRACT_FAILED",
            Self::RuntimeInstallFailed => "RUNTIME_INSTALL_FAILED",
            Self::ContainerStartFailed => "CONTAINER_START_FAILED",
            Self::QueryTimeout => "QUERY_TIMEOUT",
            Self::IdleTimeout => "IDLE_TIMEOUT",
            Self::TotalTimeout => "TOTAL_TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::AgentExitedWithoutResult => "AGENT_EXITED_WITHOUT_RESULT",
            Self::PatchGenerationFailed => "PATCH_GENERATION_FAILED",
            Self::ArtifactMissing => "ARTIFACT_MISSING",
            Self::ManifestMalformed => "MANIFEST_MALFORMED",
            Self::TargetInvalid => "TARGET_INVALID",
            Self::AuthMissing => "AUTH_MISSING",
            Self::PatchApplyFailed => "PATCH_APPLY_FAILED",
            Self::WorktreeDirty => "WORKTREE_DIRTY",
            Self::PushFailed => "PUSH_FAILED",
            Self::RemoteApiError => "REMOTE_API_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    /// Returns `true` for the three supervision timeout kinds.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::QueryTimeout | Self::IdleTimeout | Self::TotalTimeout
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HolonError
// ---------------------------------------------------------------------------

/// Unified Holon error.
///
/// Carries a stable [`ErrorKind`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use holon_error::{ErrorKind, HolonError};
///
/// let err = HolonError::new(ErrorKind::IdleTimeout, "no message for 1800 s")
///     .with_context("idle_secs", 1800)
///     .with_context("messages_seen", 4);
/// ```
pub struct HolonError {
    /// Machine-readable error kind.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl HolonError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.kind.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns `true` if this error is one of the supervision timeouts.
    pub fn is_timeout(&self) -> bool {
        self.kind.is_timeout()
    }
}

impl fmt::Debug for HolonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("HolonError");
        d.field("kind", &self.kind);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for HolonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for HolonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience alias for fallible operations in the orchestrator core.
pub type Result<T> = std::result::Result<T, HolonError>;

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`HolonError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HolonErrorDto {
    /// Error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&HolonError> for HolonErrorDto {
    fn from(err: &HolonError) -> Self {
        Self {
            kind: err.kind,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<HolonErrorDto> for HolonError {
    fn from(dto: HolonErrorDto) -> Self {
        Self {
            kind: dto.kind,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    /// All error kinds for exhaustive iteration in tests.
    const ALL_KINDS: &[ErrorKind] = &[
        ErrorKind::RefInvalid,
        ErrorKind::SpecMissing,
        ErrorKind::SpecInvalid,
        ErrorKind::PromptMissing,
        ErrorKind::NotFound,
        ErrorKind::NetworkFailure,
        ErrorKind::ChecksumMismatch,
        ErrorKind::TooManyRedirects,
        ErrorKind::SchemeRejected,
        ErrorKind::BaseImagePullFailed,
        ErrorKind::BundleExtractFailed,
        ErrorKind::RuntimeInstallFailed,
        ErrorKind::ContainerStartFailed,
        ErrorKind::QueryTimeout,
        ErrorKind::IdleTimeout,
        ErrorKind::TotalTimeout,
        ErrorKind::Cancelled,
        ErrorKind::AgentExitedWithoutResult,
        ErrorKind::PatchGenerationFailed,
        ErrorKind::ArtifactMissing,
        ErrorKind::ManifestMalformed,
        ErrorKind::TargetInvalid,
        ErrorKind::AuthMissing,
        ErrorKind::PatchApplyFailed,
        ErrorKind::WorktreeDirty,
        ErrorKind::PushFailed,
        ErrorKind::RemoteApiError,
        ErrorKind::Internal,
    ];

    // -- Construction & Display -----------------------------------------

    #[test]
    fn basic_construction() {
        let err = HolonError::new(ErrorKind::Internal, "boom");
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.message, "boom");
        assert!(err.source.is_none());
        assert!(err.context.is_empty());
    }

    #[test]
    fn display_without_context() {
        let err = HolonError::new(ErrorKind::NotFound, "no such bundle");
        assert_eq!(err.to_string(), "[NOT_FOUND] no such bundle");
    }

    #[test]
    fn display_with_context() {
        let err = HolonError::new(ErrorKind::IdleTimeout, "went silent")
            .with_context("idle_secs", 1800);
        let s = err.to_string();
        assert!(s.starts_with("[IDLE_TIMEOUT] went silent"));
        assert!(s.contains("idle_secs"));
        assert!(s.contains("1800"));
    }

    #[test]
    fn debug_impl() {
        let err = HolonError::new(ErrorKind::WorktreeDirty, "nope");
        let dbg = format!("{err:?}");
        assert!(dbg.contains("WorktreeDirty"));
        assert!(dbg.contains("nope"));
    }

    #[test]
    fn source_chain_preserved() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        let err = HolonError::new(ErrorKind::NetworkFailure, "download failed")
            .with_source(io_err);
        let src = std::error::Error::source(&err).expect("source present");
        assert!(src.to_string().contains("reset by peer"));
    }

    #[test]
    fn context_is_deterministic() {
        let err = HolonError::new(ErrorKind::ChecksumMismatch, "hash mismatch")
            .with_context("zeta", 1)
            .with_context("alpha", 2);
        let keys: Vec<&String> = err.context.keys().collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    // -- Kind stability ---------------------------------------------------

    #[test]
    fn kind_strings_are_unique() {
        let set: HashSet<&str> = ALL_KINDS.iter().map(|k| k.as_str()).collect();
        assert_eq!(set.len(), ALL_KINDS.len());
    }

    #[test]
    fn kind_serde_matches_as_str() {
        for kind in ALL_KINDS {
            let json = serde_json::to_string(kind).expect("serialize kind");
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn kind_roundtrips_through_serde() {
        for kind in ALL_KINDS {
            let json = serde_json::to_string(kind).expect("serialize");
            let back: ErrorKind = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, *kind);
        }
    }

    #[test]
    fn every_kind_has_a_category() {
        for kind in ALL_KINDS {
            // Force the exhaustive match; the assert just anchors the call.
            let cat = kind.category();
            assert!(!cat.to_string().is_empty());
        }
    }

    #[test]
    fn timeout_kinds_are_exactly_three() {
        let timeouts: Vec<&ErrorKind> = ALL_KINDS.iter().filter(|k| k.is_timeout()).collect();
        assert_eq!(timeouts.len(), 3);
        assert!(timeouts.contains(&&ErrorKind::QueryTimeout));
        assert!(timeouts.contains(&&ErrorKind::IdleTimeout));
        assert!(timeouts.contains(&&ErrorKind::TotalTimeout));
    }

    #[test]
    fn category_grouping_spot_checks() {
        assert_eq!(ErrorKind::RefInvalid.category(), ErrorCategory::Input);
        assert_eq!(
            ErrorKind::ChecksumMismatch.category(),
            ErrorCategory::Resolution
        );
        assert_eq!(
            ErrorKind::BaseImagePullFailed.category(),
            ErrorCategory::Build
        );
        assert_eq!(ErrorKind::IdleTimeout.category(), ErrorCategory::Run);
        assert_eq!(
            ErrorKind::PatchGenerationFailed.category(),
            ErrorCategory::Artifact
        );
        assert_eq!(ErrorKind::PushFailed.category(), ErrorCategory::Publish);
        assert_eq!(ErrorKind::Internal.category(), ErrorCategory::Internal);
    }

    // -- DTO --------------------------------------------------------------

    #[test]
    fn dto_roundtrip_without_source() {
        let err = HolonError::new(ErrorKind::ArtifactMissing, "diff.patch missing")
            .with_context("path", "diff.patch");
        let dto = HolonErrorDto::from(&err);
        let json = serde_json::to_string(&dto).expect("serialize dto");
        let back: HolonErrorDto = serde_json::from_str(&json).expect("deserialize dto");
        assert_eq!(back, dto);

        let restored = HolonError::from(back);
        assert_eq!(restored.kind, ErrorKind::ArtifactMissing);
        assert_eq!(restored.message, "diff.patch missing");
        assert_eq!(
            restored.context.get("path"),
            Some(&serde_json::json!("diff.patch"))
        );
    }

    #[test]
    fn dto_captures_source_message() {
        let io_err = io::Error::other("disk full");
        let err = HolonError::new(ErrorKind::Internal, "write failed").with_source(io_err);
        let dto = HolonErrorDto::from(&err);
        assert_eq!(dto.source_message.as_deref(), Some("disk full"));
    }
}
