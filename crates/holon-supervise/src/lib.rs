// SPDX-License-Identifier: MIT OR Apache-2.0
//! holon-supervise
//!
//! Supervision of a single agent execution: the event model the agent emits
//! on stdout, a cancellation token, a first-writer-wins outcome cell, and
//! the supervision loop enforcing the heartbeat/query/idle/total clocks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Cooperative cancellation token.
pub mod cancel;
/// The agent event model (JSONL lines on the agent's stdout).
pub mod event;
/// Supervision outcomes and the single-writer cell.
pub mod outcome;
/// The supervision loop.
pub mod supervisor;

pub use cancel::CancellationToken;
pub use event::{AgentEvent, AgentEventKind, parse_event_line};
pub use outcome::{OutcomeCell, RunStats, SupervisionOutcome, TimeoutKind};
pub use supervisor::{StreamItem, Supervisor, SupervisorConfig};
