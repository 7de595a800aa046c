// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed accessors for the `HOLON_*` environment knobs.
//!
//! Every accessor has a `_from` variant taking a lookup function so tests can
//! exercise precedence rules without mutating process environment.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable names consumed by the core.
pub mod vars {
    /// Run mode label propagated into the container.
    pub const MODE: &str = "HOLON_MODE";
    /// Agent reference override.
    pub const AGENT: &str = "HOLON_AGENT";
    /// Disable automatic download of the built-in agent bundle.
    pub const NO_AUTO_INSTALL: &str = "HOLON_NO_AUTO_INSTALL";
    /// Cache root override.
    pub const CACHE_DIR: &str = "HOLON_CACHE_DIR";
    /// Snapshot scratch root override.
    pub const SNAPSHOT_BASE: &str = "HOLON_SNAPSHOT_BASE";
    /// Host workspace override.
    pub const WORKSPACE: &str = "HOLON_WORKSPACE";
    /// Preferred model forwarded to the agent.
    pub const MODEL: &str = "HOLON_MODEL";
    /// Fallback model forwarded to the agent.
    pub const FALLBACK_MODEL: &str = "HOLON_FALLBACK_MODEL";
    /// Heartbeat period in seconds.
    pub const HEARTBEAT_SECONDS: &str = "HOLON_HEARTBEAT_SECONDS";
    /// Initial-response timeout in seconds.
    pub const QUERY_TIMEOUT_SECONDS: &str = "HOLON_QUERY_TIMEOUT_SECONDS";
    /// Idle timeout in seconds.
    pub const RESPONSE_IDLE_TIMEOUT_SECONDS: &str = "HOLON_RESPONSE_IDLE_TIMEOUT_SECONDS";
    /// Total wall-clock budget in seconds.
    pub const RESPONSE_TOTAL_TIMEOUT_SECONDS: &str = "HOLON_RESPONSE_TOTAL_TIMEOUT_SECONDS";
    /// Holon-scoped GitHub token (takes precedence).
    pub const HOLON_GITHUB_TOKEN: &str = "HOLON_GITHUB_TOKEN";
    /// Ambient GitHub token.
    pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
    /// Host path of a mounted Claude config directory, when applicable.
    pub const MOUNTED_CLAUDE_CONFIG: &str = "HOLON_MOUNTED_CLAUDE_CONFIG";
    /// Host uid for post-run output re-ownership.
    pub const HOST_UID: &str = "HOST_UID";
    /// Host gid for post-run output re-ownership.
    pub const HOST_GID: &str = "HOST_GID";
}

/// Returns `true` for the usual truthy spellings (`1`, `true`, `yes`, `on`).
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Supervision timeout knobs, with the documented defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Heartbeat/progress period. Default 60 s.
    pub heartbeat: Duration,
    /// Initial-response window. Default 300 s.
    pub query: Duration,
    /// Idle window after the first message. Default 1800 s.
    pub idle: Duration,
    /// Total wall-clock budget. Default 7200 s.
    pub total: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(60),
            query: Duration::from_secs(300),
            idle: Duration::from_secs(1800),
            total: Duration::from_secs(7200),
        }
    }
}

impl Timeouts {
    /// Read timeouts from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Read timeouts through a lookup function. Unparsable or missing values
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let defaults = Self::default();
        Self {
            heartbeat: secs(vars::HEARTBEAT_SECONDS, defaults.heartbeat),
            query: secs(vars::QUERY_TIMEOUT_SECONDS, defaults.query),
            idle: secs(vars::RESPONSE_IDLE_TIMEOUT_SECONDS, defaults.idle),
            total: secs(vars::RESPONSE_TOTAL_TIMEOUT_SECONDS, defaults.total),
        }
    }
}

/// Snapshot of every environment knob the orchestrator consumes.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    /// `HOLON_MODE`, when set.
    pub mode: Option<String>,
    /// `HOLON_AGENT`, when set.
    pub agent: Option<String>,
    /// Whether auto-install of the built-in bundle is disabled.
    pub no_auto_install: bool,
    /// `HOLON_CACHE_DIR`, when set.
    pub cache_dir: Option<PathBuf>,
    /// `HOLON_SNAPSHOT_BASE`, when set.
    pub snapshot_base: Option<PathBuf>,
    /// `HOLON_WORKSPACE`, when set.
    pub workspace: Option<PathBuf>,
    /// `HOLON_MODEL`, when set.
    pub model: Option<String>,
    /// `HOLON_FALLBACK_MODEL`, when set.
    pub fallback_model: Option<String>,
    /// `HOLON_MOUNTED_CLAUDE_CONFIG`, when set.
    pub mounted_claude_config: Option<String>,
    /// Parsed `HOST_UID`, when set and numeric.
    pub host_uid: Option<u32>,
    /// Parsed `HOST_GID`, when set and numeric.
    pub host_gid: Option<u32>,
    /// Supervision timeouts.
    pub timeouts: Timeouts,
}

impl EnvConfig {
    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build a snapshot through a lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            mode: lookup(vars::MODE),
            agent: lookup(vars::AGENT),
            no_auto_install: lookup(vars::NO_AUTO_INSTALL)
                .is_some_and(|v| is_truthy(&v)),
            cache_dir: lookup(vars::CACHE_DIR).map(PathBuf::from),
            snapshot_base: lookup(vars::SNAPSHOT_BASE).map(PathBuf::from),
            workspace: lookup(vars::WORKSPACE).map(PathBuf::from),
            model: lookup(vars::MODEL),
            fallback_model: lookup(vars::FALLBACK_MODEL),
            mounted_claude_config: lookup(vars::MOUNTED_CLAUDE_CONFIG),
            host_uid: lookup(vars::HOST_UID).and_then(|v| v.trim().parse().ok()),
            host_gid: lookup(vars::HOST_GID).and_then(|v| v.trim().parse().ok()),
            timeouts: Timeouts::from_lookup(&lookup),
        }
    }
}

/// Resolve the GitHub token from the process environment.
///
/// Precedence: `HOLON_GITHUB_TOKEN` over `GITHUB_TOKEN`. Empty values are
/// treated as unset.
pub fn github_token() -> Option<String> {
    github_token_from(|k| std::env::var(k).ok())
}

/// [`github_token`] with an injected lookup, for tests.
pub fn github_token_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    for key in [vars::HOLON_GITHUB_TOKEN, vars::GITHUB_TOKEN] {
        if let Some(v) = lookup(key) {
            if !v.trim().is_empty() {
                return Some(v);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup_from<'a>(map: &'a BTreeMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |k| map.get(k).map(|v| v.to_string())
    }

    #[test]
    fn truthy_spellings() {
        for v in ["1", "true", "TRUE", "yes", "on", " 1 "] {
            assert!(is_truthy(v), "{v:?} should be truthy");
        }
        for v in ["0", "false", "no", "off", "", "2"] {
            assert!(!is_truthy(v), "{v:?} should be falsy");
        }
    }

    #[test]
    fn timeout_defaults() {
        let t = Timeouts::from_lookup(|_| None);
        assert_eq!(t.heartbeat, Duration::from_secs(60));
        assert_eq!(t.query, Duration::from_secs(300));
        assert_eq!(t.idle, Duration::from_secs(1800));
        assert_eq!(t.total, Duration::from_secs(7200));
    }

    #[test]
    fn timeout_overrides() {
        let map = BTreeMap::from([
            ("HOLON_HEARTBEAT_SECONDS", "1"),
            ("HOLON_RESPONSE_IDLE_TIMEOUT_SECONDS", "3"),
        ]);
        let t = Timeouts::from_lookup(lookup_from(&map));
        assert_eq!(t.heartbeat, Duration::from_secs(1));
        assert_eq!(t.idle, Duration::from_secs(3));
        // Untouched knobs keep their defaults.
        assert_eq!(t.total, Duration::from_secs(7200));
    }

    #[test]
    fn timeout_garbage_falls_back() {
        let map = BTreeMap::from([("HOLON_QUERY_TIMEOUT_SECONDS", "soon")]);
        let t = Timeouts::from_lookup(lookup_from(&map));
        assert_eq!(t.query, Duration::from_secs(300));
    }

    #[test]
    fn token_precedence_holon_wins() {
        let map = BTreeMap::from([
            ("HOLON_GITHUB_TOKEN", "holon-tok"),
            ("GITHUB_TOKEN", "ambient-tok"),
        ]);
        assert_eq!(
            github_token_from(lookup_from(&map)).as_deref(),
            Some("holon-tok")
        );
    }

    #[test]
    fn token_falls_back_to_ambient() {
        let map = BTreeMap::from([("GITHUB_TOKEN", "ambient-tok")]);
        assert_eq!(
            github_token_from(lookup_from(&map)).as_deref(),
            Some("ambient-tok")
        );
    }

    #[test]
    fn empty_token_treated_as_unset() {
        let map = BTreeMap::from([
            ("HOLON_GITHUB_TOKEN", "  "),
            ("GITHUB_TOKEN", "ambient-tok"),
        ]);
        assert_eq!(
            github_token_from(lookup_from(&map)).as_deref(),
            Some("ambient-tok")
        );
    }

    #[test]
    fn no_token_is_none() {
        assert!(github_token_from(|_| None).is_none());
    }

    #[test]
    fn env_config_snapshot() {
        let map = BTreeMap::from([
            ("HOLON_MODE", "pr-fix"),
            ("HOLON_NO_AUTO_INSTALL", "true"),
            ("HOLON_CACHE_DIR", "/var/cache/holon"),
            ("HOST_UID", "1000"),
            ("HOST_GID", "not-a-number"),
        ]);
        let cfg = EnvConfig::from_lookup(lookup_from(&map));
        assert_eq!(cfg.mode.as_deref(), Some("pr-fix"));
        assert!(cfg.no_auto_install);
        assert_eq!(cfg.cache_dir, Some(PathBuf::from("/var/cache/holon")));
        assert_eq!(cfg.host_uid, Some(1000));
        assert_eq!(cfg.host_gid, None);
    }
}
