// SPDX-License-Identifier: MIT OR Apache-2.0
//! The supervision loop.
//!
//! One task consumes the agent's event stream while the clocks below run in
//! the same `select` loop:
//!
//! - **heartbeat**: log a progress line when the stream has been silent for
//!   a full period;
//! - **query**: abort if zero messages arrived in the initial window;
//! - **idle**: abort if the stream goes silent after the first message;
//! - **total**: hard wall-clock ceiling.
//!
//! Exactly one outcome is recorded per run. A timeout cancels the stream
//! cooperatively; whatever error the dying stream raises afterwards cannot
//! overwrite the recorded timeout.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use holon_core::Timeouts;

use crate::cancel::CancellationToken;
use crate::event::AgentEvent;
use crate::outcome::{OutcomeCell, RunStats, SupervisionOutcome, TimeoutKind};

/// One item on the supervised stream: an event, or the stream's own failure.
pub type StreamItem = Result<AgentEvent, String>;

/// Clock configuration for one supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Progress-line period.
    pub heartbeat: Duration,
    /// Initial-response window.
    pub query_timeout: Duration,
    /// Idle window after the first message.
    pub idle_timeout: Duration,
    /// Total wall-clock budget.
    pub total_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Timeouts::default().into()
    }
}

impl From<Timeouts> for SupervisorConfig {
    fn from(t: Timeouts) -> Self {
        Self {
            heartbeat: t.heartbeat,
            query_timeout: t.query,
            idle_timeout: t.idle,
            total_timeout: t.total,
        }
    }
}

/// Supervises one agent event stream.
pub struct Supervisor {
    config: SupervisorConfig,
    cell: OutcomeCell,
    cancel: CancellationToken,
}

impl Supervisor {
    /// A supervisor over a shared outcome cell and cancellation token.
    pub fn new(config: SupervisorConfig, cell: OutcomeCell, cancel: CancellationToken) -> Self {
        Self {
            config,
            cell,
            cancel,
        }
    }

    /// Consume `events` until the stream ends or a clock fires.
    ///
    /// Returns the decisive outcome, which is also recorded in the cell.
    pub async fn run(&self, mut events: mpsc::Receiver<StreamItem>) -> SupervisionOutcome {
        let started = Instant::now();
        let total_deadline = started + self.config.total_timeout;
        let query_deadline = started + self.config.query_timeout;

        let mut heartbeat = tokio::time::interval_at(
            started + self.config.heartbeat,
            self.config.heartbeat,
        );
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut stats = RunStats::default();
        let mut last_activity = started;

        loop {
            let idle_deadline = last_activity + self.config.idle_timeout;

            tokio::select! {
                item = events.recv() => match item {
                    Some(Ok(event)) => {
                        stats.observe(&event);
                        last_activity = Instant::now();
                    }
                    Some(Err(message)) => {
                        // A failure raised by the stream itself. If a clock
                        // already fired, the cell keeps the timeout.
                        self.cell.set(SupervisionOutcome::StreamError(message));
                        self.cancel.cancel();
                        return self.decided();
                    }
                    None => {
                        self.cell.set(SupervisionOutcome::Completed(stats.clone()));
                        return self.decided();
                    }
                },

                _ = tokio::time::sleep_until(query_deadline), if stats.messages == 0 => {
                    return self.abort(TimeoutKind::Query);
                }

                _ = tokio::time::sleep_until(idle_deadline), if stats.messages > 0 => {
                    return self.abort(TimeoutKind::Idle);
                }

                _ = tokio::time::sleep_until(total_deadline) => {
                    return self.abort(TimeoutKind::Total);
                }

                _ = heartbeat.tick() => {
                    if last_activity.elapsed() >= self.config.heartbeat {
                        info!(
                            target: "holon.runner",
                            "waiting on agent: {} message(s), silent for {:.0?}",
                            stats.messages,
                            last_activity.elapsed()
                        );
                    }
                }

                _ = self.cancel.cancelled() => {
                    self.cell.set(SupervisionOutcome::Cancelled);
                    return self.decided();
                }
            }
        }
    }

    fn abort(&self, kind: TimeoutKind) -> SupervisionOutcome {
        warn!(target: "holon.runner", "{}", kind.describe());
        self.cell.set(SupervisionOutcome::Timeout(kind));
        self.cancel.cancel();
        self.decided()
    }

    fn decided(&self) -> SupervisionOutcome {
        self.cell.get().expect("outcome recorded before return")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
