// SPDX-License-Identifier: MIT OR Apache-2.0
//! Supervision outcomes and the single-writer cell.

use chrono::{DateTime, Utc};
use holon_error::{ErrorKind, HolonError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::event::AgentEvent;

/// Which supervision clock fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutKind {
    /// Zero messages arrived within the initial-response window.
    Query,
    /// The stream went silent after at least one message.
    Idle,
    /// The total wall-clock budget elapsed.
    Total,
}

impl TimeoutKind {
    /// The taxonomy kind this timeout surfaces as.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Query => ErrorKind::QueryTimeout,
            Self::Idle => ErrorKind::IdleTimeout,
            Self::Total => ErrorKind::TotalTimeout,
        }
    }

    /// Phrase used in manifests and logs.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Query => "query timeout: agent produced no response",
            Self::Idle => "idle timeout: agent stopped responding",
            Self::Total => "total timeout: run exceeded its wall-clock budget",
        }
    }
}

/// Counters and timestamps accumulated while consuming the stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Total events observed.
    pub messages: u64,
    /// Tool invocations observed.
    pub tool_calls: u64,
    /// Agent-side error events observed.
    pub errors: u64,
    /// When the first event arrived.
    pub first_message_at: Option<DateTime<Utc>>,
    /// When the most recent event arrived.
    pub last_message_at: Option<DateTime<Utc>>,
}

impl RunStats {
    /// Fold one event into the stats.
    pub fn observe(&mut self, event: &AgentEvent) {
        self.messages += 1;
        if matches!(event.kind, crate::event::AgentEventKind::ToolCall { .. }) {
            self.tool_calls += 1;
        }
        if event.is_error() {
            self.errors += 1;
        }
        let now = Utc::now();
        if self.first_message_at.is_none() {
            self.first_message_at = Some(now);
        }
        self.last_message_at = Some(now);
    }
}

/// The decisive result of one supervised agent execution.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisionOutcome {
    /// The stream ended naturally.
    Completed(RunStats),
    /// A supervision clock fired.
    Timeout(TimeoutKind),
    /// The stream itself failed before any clock fired.
    StreamError(String),
    /// An external signal aborted the run.
    Cancelled,
}

impl SupervisionOutcome {
    /// Map a non-success outcome onto the error taxonomy.
    pub fn to_error(&self) -> Option<HolonError> {
        match self {
            Self::Completed(_) => None,
            Self::Timeout(kind) => {
                Some(HolonError::new(kind.error_kind(), kind.describe()))
            }
            Self::StreamError(msg) => Some(HolonError::new(
                ErrorKind::AgentExitedWithoutResult,
                format!("agent stream failed: {msg}"),
            )),
            Self::Cancelled => Some(HolonError::new(
                ErrorKind::Cancelled,
                "run cancelled by external signal",
            )),
        }
    }
}

/// First-writer-wins cell holding the decisive outcome.
///
/// A timeout set by the supervisor takes precedence over any subsequent
/// stream error, because the stream likely terminated *because* it was
/// cancelled. The cell enforces that ordering for every writer.
#[derive(Debug, Clone, Default)]
pub struct OutcomeCell {
    inner: Arc<Mutex<Option<SupervisionOutcome>>>,
}

impl OutcomeCell {
    /// An empty cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `outcome` if the cell is still empty.
    ///
    /// Returns `true` when this call decided the run.
    pub fn set(&self, outcome: SupervisionOutcome) -> bool {
        let mut guard = self.inner.lock().expect("outcome lock poisoned");
        if guard.is_none() {
            *guard = Some(outcome);
            true
        } else {
            false
        }
    }

    /// The recorded outcome, if any.
    pub fn get(&self) -> Option<SupervisionOutcome> {
        self.inner.lock().expect("outcome lock poisoned").clone()
    }

    /// Whether an outcome has been recorded.
    pub fn is_set(&self) -> bool {
        self.inner.lock().expect("outcome lock poisoned").is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::parse_event_line;

    #[test]
    fn first_write_wins() {
        let cell = OutcomeCell::new();
        assert!(cell.set(SupervisionOutcome::Timeout(TimeoutKind::Idle)));
        assert!(!cell.set(SupervisionOutcome::StreamError("broken pipe".into())));
        assert_eq!(
            cell.get(),
            Some(SupervisionOutcome::Timeout(TimeoutKind::Idle))
        );
    }

    #[test]
    fn stream_error_first_is_kept() {
        let cell = OutcomeCell::new();
        assert!(cell.set(SupervisionOutcome::StreamError("reset".into())));
        assert!(!cell.set(SupervisionOutcome::Timeout(TimeoutKind::Total)));
        assert!(matches!(
            cell.get(),
            Some(SupervisionOutcome::StreamError(_))
        ));
    }

    #[test]
    fn clones_share_the_cell() {
        let cell = OutcomeCell::new();
        let clone = cell.clone();
        cell.set(SupervisionOutcome::Cancelled);
        assert!(clone.is_set());
    }

    #[test]
    fn timeout_kinds_map_to_taxonomy() {
        assert_eq!(TimeoutKind::Query.error_kind(), ErrorKind::QueryTimeout);
        assert_eq!(TimeoutKind::Idle.error_kind(), ErrorKind::IdleTimeout);
        assert_eq!(TimeoutKind::Total.error_kind(), ErrorKind::TotalTimeout);
    }

    #[test]
    fn outcome_error_mapping() {
        assert!(SupervisionOutcome::Completed(RunStats::default())
            .to_error()
            .is_none());

        let idle = SupervisionOutcome::Timeout(TimeoutKind::Idle)
            .to_error()
            .unwrap();
        assert_eq!(idle.kind, ErrorKind::IdleTimeout);
        assert!(idle.message.contains("idle timeout"));

        let cancelled = SupervisionOutcome::Cancelled.to_error().unwrap();
        assert_eq!(cancelled.kind, ErrorKind::Cancelled);
    }

    #[test]
    fn stats_observe_counts() {
        let mut stats = RunStats::default();
        stats.observe(&parse_event_line(r#"{"type": "run_started"}"#).unwrap());
        stats.observe(
            &parse_event_line(r#"{"type": "tool_call", "tool_name": "bash", "input": {}}"#)
                .unwrap(),
        );
        stats.observe(&parse_event_line(r#"{"type": "error", "message": "x"}"#).unwrap());

        assert_eq!(stats.messages, 3);
        assert_eq!(stats.tool_calls, 1);
        assert_eq!(stats.errors, 1);
        assert!(stats.first_message_at.is_some());
        assert!(stats.last_message_at >= stats.first_message_at);
    }
}
