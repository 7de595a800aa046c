// SPDX-License-Identifier: MIT OR Apache-2.0
//! Container specification and supervised execution.
//!
//! The container engine is reached through a plain [`tokio::process::Command`]
//! so the execution loop is testable with any process that speaks the agent's
//! stdout protocol.

use holon_error::{ErrorKind, HolonError};
use holon_supervise::{
    CancellationToken, OutcomeCell, StreamItem, SupervisionOutcome, Supervisor, SupervisorConfig,
    TimeoutKind, parse_event_line,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
    /// Host path.
    pub host: PathBuf,
    /// In-container path.
    pub container: String,
    /// Mount read-only.
    pub readonly: bool,
}

impl Bind {
    /// A read-write bind.
    pub fn rw(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            readonly: false,
        }
    }

    /// A read-only bind.
    pub fn ro(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            readonly: true,
        }
    }
}

/// Everything needed to start the agent container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Composed image id.
    pub image: String,
    /// Bind mounts, in declaration order.
    pub binds: Vec<Bind>,
    /// Environment passed into the container.
    pub env: BTreeMap<String, String>,
    /// Working directory inside the container.
    pub workdir: String,
}

impl ContainerSpec {
    /// Render the spec as a `docker run` invocation.
    ///
    /// The container is removed on exit; artifacts persist through the
    /// bound output directory.
    pub fn to_docker_command(&self, binary: &str) -> Command {
        let mut cmd = Command::new(binary);
        cmd.arg("run").arg("--rm");
        cmd.arg("-w").arg(&self.workdir);
        for bind in &self.binds {
            let mut volume = format!("{}:{}", bind.host.display(), bind.container);
            if bind.readonly {
                volume.push_str(":ro");
            }
            cmd.arg("-v").arg(volume);
        }
        for (key, value) in &self.env {
            cmd.arg("-e").arg(format!("{key}={value}"));
        }
        cmd.arg(&self.image);
        cmd.arg(holon_core::paths::AGENT_ENTRYPOINT);
        cmd
    }
}

/// Knobs for [`execute_supervised`].
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Slack added to the in-container total budget before the runner kills
    /// the container itself.
    pub wall_clock_slack: Duration,
    /// How long a cancelled container gets to exit on its own.
    pub kill_grace: Duration,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            wall_clock_slack: Duration::from_secs(60),
            kill_grace: Duration::from_secs(10),
        }
    }
}

/// The result of one supervised container execution.
#[derive(Debug)]
pub struct SupervisedExit {
    /// The decisive supervision outcome.
    pub outcome: SupervisionOutcome,
    /// Container process exit code, when it exited normally.
    pub exit_code: Option<i32>,
}

/// Run `command` under supervision until it exits or a clock fires.
///
/// The command's stdout is consumed line by line; JSON event lines feed the
/// supervisor and are appended verbatim to `event_log` when one is given
/// (the run's evidence stream). Anything else is passed through as debug
/// logging. The wall cap (`total_timeout + slack`) backs up the in-container
/// supervision: if the agent fails to honour its own budget, the runner
/// kills the process.
pub async fn execute_supervised(
    mut command: Command,
    config: SupervisorConfig,
    cell: OutcomeCell,
    cancel: CancellationToken,
    options: ExecuteOptions,
    event_log: Option<PathBuf>,
) -> Result<SupervisedExit, HolonError> {
    command.stdout(Stdio::piped());
    command.stderr(Stdio::inherit());
    command.stdin(Stdio::null());
    command.kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| {
        HolonError::new(ErrorKind::ContainerStartFailed, "failed to start agent container")
            .with_source(e)
    })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        HolonError::new(ErrorKind::ContainerStartFailed, "agent container has no stdout")
    })?;

    let mut log_file = match &event_log {
        Some(path) => match std::fs::File::create(path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(
                    target: "holon.runner",
                    "failed to open event log {}: {e}",
                    path.display()
                );
                None
            }
        },
        None => None,
    };

    let (tx, rx) = mpsc::channel::<StreamItem>(256);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(event) = parse_event_line(&line) {
                        if let Some(file) = &mut log_file {
                            use std::io::Write;
                            let _ = writeln!(file, "{}", line.trim());
                        }
                        if tx.send(Ok(event)).await.is_err() {
                            break;
                        }
                    } else if !line.trim().is_empty() {
                        debug!(target: "holon.runner", "agent: {line}");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(e.to_string())).await;
                    break;
                }
            }
        }
    });

    let supervisor = Supervisor::new(config, cell.clone(), cancel.clone());
    let supervise = tokio::spawn(async move { supervisor.run(rx).await });

    let wall_deadline =
        tokio::time::Instant::now() + config.total_timeout + options.wall_clock_slack;

    let exit_status = tokio::select! {
        status = child.wait() => status,
        _ = async {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep_until(wall_deadline) => {
                    warn!(target: "holon.runner", "wall-clock cap elapsed, killing container");
                    cell.set(SupervisionOutcome::Timeout(TimeoutKind::Total));
                    cancel.cancel();
                }
            }
            tokio::time::sleep(options.kill_grace).await;
        } => {
            // Grace expired without a voluntary exit.
            let _ = child.start_kill();
            child.wait().await
        }
    };

    let exit_status = exit_status.map_err(|e| {
        HolonError::new(ErrorKind::Internal, "failed to reap agent container").with_source(e)
    })?;

    // The reader sees EOF once the process is gone; the supervisor then
    // records Completed unless a clock already decided.
    let outcome = supervise.await.map_err(|e| {
        HolonError::new(ErrorKind::Internal, "supervisor task panicked").with_source(e)
    })?;
    let _ = reader.await;

    Ok(SupervisedExit {
        outcome,
        exit_code: exit_status.code(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
