// SPDX-License-Identifier: MIT OR Apache-2.0
//! holon-core
//!
//! The stable data contract for Holon.
//!
//! If you only take one dependency, take this one. Everything here is plain
//! data: the input spec, the output manifest, the publish record, and the
//! environment knobs. No network, no subprocesses.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Environment knobs consumed by the core.
pub mod env;
/// The output contract: `manifest.json`.
pub mod manifest;
/// The structured PR-fix report (`pr-fix.json`).
pub mod prfix;
/// Publish outcome record (`publish-result.json`).
pub mod publish;
/// The input contract: `HolonSpec` (`spec.yaml`, version `v1`).
pub mod spec;

pub use env::{EnvConfig, Timeouts};
pub use manifest::{HolonManifest, Outcome};
pub use prfix::{CheckFixStatus, PrFixReport, ReplyStatus};
pub use publish::{ActionType, PublishAction, PublishResult};
pub use spec::{ArtifactSpec, ContextSpec, Goal, HolonSpec, OutputSpec, RunMode};

/// Spec version string this implementation accepts.
pub const SPEC_VERSION: &str = "v1";

/// Spec kind string this implementation accepts.
pub const SPEC_KIND: &str = "Holon";

/// Canonical in-container paths. The runner binds the host-side run layout
/// onto exactly these locations; the agent bundle contract depends on them.
pub mod paths {
    /// Writable snapshot of the host workspace.
    pub const WORKSPACE: &str = "/holon/workspace";
    /// Read-only input tree root.
    pub const INPUT: &str = "/holon/input";
    /// The (possibly synthesised) spec, serialised as YAML.
    pub const INPUT_SPEC: &str = "/holon/input/spec.yaml";
    /// Compiled system prompt.
    pub const INPUT_SYSTEM_PROMPT: &str = "/holon/input/prompts/system.md";
    /// Compiled user prompt.
    pub const INPUT_USER_PROMPT: &str = "/holon/input/prompts/user.md";
    /// Provider-supplied context files.
    pub const INPUT_CONTEXT: &str = "/holon/input/context";
    /// Artifact sink.
    pub const OUTPUT: &str = "/holon/output";
    /// Evidence stream inside the output tree.
    pub const OUTPUT_EVIDENCE: &str = "/holon/output/evidence";
    /// Extracted agent bundle root.
    pub const AGENT: &str = "/holon/agent";
    /// Agent entrypoint inside the bundle.
    pub const AGENT_ENTRYPOINT: &str = "/holon/agent/bin/agent";
}

/// Well-known artifact file names under `/holon/output`.
pub mod artifacts {
    /// The machine-readable run outcome.
    pub const MANIFEST: &str = "manifest.json";
    /// The staged diff produced from the snapshot repository.
    pub const DIFF: &str = "diff.patch";
    /// The human-readable run summary.
    pub const SUMMARY: &str = "summary.md";
    /// The structured PR-fix report (PR-fix mode only).
    pub const PR_FIX: &str = "pr-fix.json";
    /// Evidence directory name.
    pub const EVIDENCE: &str = "evidence";
}
