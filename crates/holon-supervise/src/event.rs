// SPDX-License-Identifier: MIT OR Apache-2.0
//! The agent event model.
//!
//! The agent bundle writes one JSON object per line on stdout. The runner
//! only interprets the shapes below; anything else on the stream is treated
//! as opaque log output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One observed agent event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// When the event was emitted (agent clock).
    #[serde(default = "Utc::now")]
    pub ts: DateTime<Utc>,

    /// What happened.
    #[serde(flatten)]
    pub kind: AgentEventKind,

    /// Vendor extension payload, preserved but uninterpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<BTreeMap<String, serde_json::Value>>,
}

/// Event discriminants the runner understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEventKind {
    /// The agent loop started.
    RunStarted {
        /// Free-form start message.
        #[serde(default)]
        message: String,
    },
    /// A streamed fragment of assistant output.
    AssistantDelta {
        /// Fragment text.
        text: String,
    },
    /// A complete assistant message.
    AssistantMessage {
        /// Message text.
        text: String,
    },
    /// The agent invoked a tool.
    ToolCall {
        /// Tool name.
        tool_name: String,
        /// Tool input payload.
        #[serde(default)]
        input: serde_json::Value,
    },
    /// A tool returned.
    ToolResult {
        /// Tool name.
        tool_name: String,
        /// Whether the tool reported an error.
        #[serde(default)]
        is_error: bool,
    },
    /// A non-fatal warning from the agent loop.
    Warning {
        /// Warning text.
        message: String,
    },
    /// A fatal error from the agent loop.
    Error {
        /// Error text.
        message: String,
    },
    /// The agent loop finished.
    RunCompleted {
        /// Free-form completion message.
        #[serde(default)]
        message: String,
    },
}

impl AgentEvent {
    /// Snake_case discriminant name, for stats and logs.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            AgentEventKind::RunStarted { .. } => "run_started",
            AgentEventKind::AssistantDelta { .. } => "assistant_delta",
            AgentEventKind::AssistantMessage { .. } => "assistant_message",
            AgentEventKind::ToolCall { .. } => "tool_call",
            AgentEventKind::ToolResult { .. } => "tool_result",
            AgentEventKind::Warning { .. } => "warning",
            AgentEventKind::Error { .. } => "error",
            AgentEventKind::RunCompleted { .. } => "run_completed",
        }
    }

    /// Whether this event is a fatal agent-side error.
    pub fn is_error(&self) -> bool {
        matches!(self.kind, AgentEventKind::Error { .. })
    }
}

/// Parse one stdout line as an event.
///
/// Returns `None` for lines that are not event JSON (plain log output).
pub fn parse_event_line(line: &str) -> Option<AgentEvent> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
