// SPDX-License-Identifier: MIT OR Apache-2.0
//! The in-memory run context and container environment assembly.

use holon_core::env::vars;
use holon_core::{EnvConfig, HolonSpec, RunMode, Timeouts};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Host environment variables forwarded into the container when set.
///
/// The LLM credential pair plus the model knobs; everything else the agent
/// sees must come from the spec's own `context.env`.
pub const ALLOWED_PASSTHROUGH: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_BASE_URL",
    "CLAUDE_CODE_OAUTH_TOKEN",
    vars::MODEL,
    vars::FALLBACK_MODEL,
    vars::HEARTBEAT_SECONDS,
    vars::QUERY_TIMEOUT_SECONDS,
    vars::RESPONSE_IDLE_TIMEOUT_SECONDS,
    vars::RESPONSE_TOTAL_TIMEOUT_SECONDS,
];

/// Everything the orchestrator knows about one run.
///
/// Constructed at run start; read-only during agent execution except for the
/// output paths; dropped on exit.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Snapshot of the host workspace (the container's writable tree).
    pub snapshot_dir: PathBuf,
    /// Host side of `/holon/input`.
    pub input_dir: PathBuf,
    /// Host side of `/holon/output`.
    pub output_dir: PathBuf,
    /// Host side of `/holon/output/evidence`.
    pub evidence_dir: PathBuf,
    /// Assembled container environment.
    pub env: BTreeMap<String, String>,
    /// Run mode.
    pub mode: RunMode,
    /// Supervision timeouts.
    pub timeouts: Timeouts,
    /// The validated spec.
    pub spec: HolonSpec,
}

impl RunContext {
    /// Assemble the container environment for `spec` under `env_config`.
    ///
    /// Precedence, lowest to highest: host passthroughs, the spec's
    /// `context.env`, then the orchestrator's own variables (`HOLON_MODE`,
    /// ownership ids, mounted-config path) which are never overridable.
    pub fn assemble_env(
        spec: &HolonSpec,
        mode: &RunMode,
        env_config: &EnvConfig,
        host_lookup: impl Fn(&str) -> Option<String>,
    ) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();

        for key in ALLOWED_PASSTHROUGH {
            if let Some(value) = host_lookup(key) {
                env.insert((*key).to_string(), value);
            }
        }

        for (key, value) in &spec.context.env {
            env.insert(key.clone(), value.clone());
        }

        env.insert(vars::MODE.to_string(), mode.as_str().to_string());
        if let Some(mounted) = &env_config.mounted_claude_config {
            env.insert(vars::MOUNTED_CLAUDE_CONFIG.to_string(), mounted.clone());
        }
        if let Some(uid) = env_config.host_uid {
            env.insert(vars::HOST_UID.to_string(), uid.to_string());
        }
        if let Some(gid) = env_config.host_gid {
            env.insert(vars::HOST_GID.to_string(), gid.to_string());
        }

        env
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
