// SPDX-License-Identifier: MIT OR Apache-2.0
//! Run orchestration.
//!
//! `Runner::run` owns the whole pipeline for one agent execution:
//! snapshot → layout → container → supervision → artifact assembly →
//! output re-ownership.

use holon_core::{EnvConfig, HolonManifest, HolonSpec, paths};
use holon_error::{ErrorKind, HolonError};
use holon_supervise::{CancellationToken, OutcomeCell, SupervisionOutcome, SupervisorConfig};
use holon_workspace::{RunLayout, Snapshot, reown_tree};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{info, warn};

use crate::artifacts::ArtifactAssembler;
use crate::container::{Bind, ContainerSpec, ExecuteOptions, execute_supervised};
use crate::context::RunContext;

/// Turns a [`ContainerSpec`] into a spawnable command.
///
/// Production uses [`DockerLauncher`]; tests substitute a stub process that
/// speaks the agent protocol.
pub trait ContainerLauncher: Send + Sync {
    /// Render the container invocation.
    fn launch(&self, spec: &ContainerSpec) -> Command;
}

/// `docker run` launcher.
#[derive(Debug, Clone)]
pub struct DockerLauncher {
    /// Engine binary, `docker` by default.
    pub binary: String,
}

impl Default for DockerLauncher {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

impl ContainerLauncher for DockerLauncher {
    fn launch(&self, spec: &ContainerSpec) -> Command {
        spec.to_docker_command(&self.binary)
    }
}

/// Inputs for one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// The validated spec.
    pub spec: HolonSpec,
    /// Host workspace to snapshot.
    pub workspace: PathBuf,
    /// Composed image id.
    pub image: String,
    /// Host directory the run layout is created under.
    pub run_root: PathBuf,
    /// Snapshot scratch base; the platform default when `None`.
    pub snapshot_base: Option<PathBuf>,
    /// Compiled system prompt.
    pub system_prompt: String,
    /// Compiled user prompt.
    pub user_prompt: String,
    /// Context files staged under `input/context/`, as `(rel_path, bytes)`.
    pub context_files: Vec<(String, Vec<u8>)>,
}

/// The result of one run.
#[derive(Debug)]
pub struct RunReport {
    /// The manifest as written to the output directory.
    pub manifest: HolonManifest,
    /// The supervision outcome.
    pub outcome: SupervisionOutcome,
    /// Container exit code, when it exited normally.
    pub exit_code: Option<i32>,
    /// Host output directory holding the artifact set.
    pub output_dir: PathBuf,
}

/// Orchestrates one agent run.
pub struct Runner<L: ContainerLauncher> {
    launcher: L,
    env_config: EnvConfig,
    options: ExecuteOptions,
}

impl<L: ContainerLauncher> Runner<L> {
    /// A runner over the given launcher and environment snapshot.
    pub fn new(launcher: L, env_config: EnvConfig) -> Self {
        Self {
            launcher,
            env_config,
            options: ExecuteOptions::default(),
        }
    }

    /// Override execution knobs (wall-clock slack, kill grace).
    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute the run described by `request`.
    ///
    /// On failure the output directory still holds a failure manifest
    /// wherever assembly was reachable.
    pub async fn run(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunReport, HolonError> {
        request.spec.validate()?;
        if request.system_prompt.trim().is_empty() || request.user_prompt.trim().is_empty() {
            return Err(HolonError::new(
                ErrorKind::PromptMissing,
                "compiled prompts are required for a run",
            ));
        }

        let mode = request.spec.mode();
        // The snapshot guard lives until the end of the run; dropping it
        // removes the scratch copy.
        let (context, _snapshot) = self.prepare(&request)?;
        info!(
            target: "holon.runner",
            "starting run: mode={mode}, image={}, workspace={}",
            request.image,
            request.workspace.display()
        );

        let container = ContainerSpec {
            image: request.image.clone(),
            binds: vec![
                Bind::rw(&context.snapshot_dir, paths::WORKSPACE),
                Bind::ro(&context.input_dir, paths::INPUT),
                Bind::rw(&context.output_dir, paths::OUTPUT),
            ],
            env: context.env.clone(),
            workdir: paths::WORKSPACE.to_string(),
        };

        let command = self.launcher.launch(&container);
        let config = SupervisorConfig::from(context.timeouts);
        let cell = OutcomeCell::new();
        let started = std::time::Instant::now();

        let event_log = context.evidence_dir.join("agent-events.jsonl");
        let exit = match execute_supervised(
            command,
            config,
            cell,
            cancel,
            self.options,
            Some(event_log),
        )
        .await
        {
            Ok(exit) => exit,
            Err(err) => {
                // The agent never ran; leave a machine-readable outcome anyway.
                self.write_start_failure(&context, &err);
                return Err(err);
            }
        };
        let duration = started.elapsed().as_secs_f64();

        let assembler =
            ArtifactAssembler::new(&context.snapshot_dir, &context.output_dir, &request.spec);
        let log = execution_log(&exit.outcome, exit.exit_code);
        let assembled = assembler.assemble(&exit.outcome, duration, &log);

        self.reown_outputs(&context);

        let run = assembled?;
        Ok(RunReport {
            manifest: run.manifest,
            outcome: exit.outcome,
            exit_code: exit.exit_code,
            output_dir: context.output_dir,
        })
    }

    /// Snapshot the workspace and populate the run layout.
    fn prepare(&self, request: &RunRequest) -> Result<(RunContext, Snapshot), HolonError> {
        let internal = |what: &'static str| {
            move |e: anyhow::Error| {
                HolonError::new(ErrorKind::Internal, format!("{what}: {e:#}"))
            }
        };

        let snapshot = match &request.snapshot_base {
            Some(base) => Snapshot::create_in(&request.workspace, base),
            None => Snapshot::create(&request.workspace),
        }
        .map_err(internal("failed to snapshot workspace"))?;

        // Baseline before the agent runs, so its staged work diffs cleanly.
        holon_git::ensure_baseline(snapshot.path())
            .map_err(internal("failed to initialise snapshot repository"))?;

        let layout = RunLayout::create(&request.run_root)
            .map_err(internal("failed to create run layout"))?;
        layout
            .write_spec(&request.spec)
            .map_err(internal("failed to write spec"))?;
        layout
            .write_prompts(&request.system_prompt, &request.user_prompt)
            .map_err(internal("failed to write prompts"))?;
        for (rel, bytes) in &request.context_files {
            layout
                .stage_context(rel, bytes)
                .map_err(internal("failed to stage context file"))?;
        }
        // Files the spec itself names travel as context too.
        for file in &request.spec.context.files {
            let source = std::path::Path::new(file);
            let bytes = std::fs::read(source).map_err(|e| {
                HolonError::new(
                    ErrorKind::SpecInvalid,
                    format!("context file not readable: {file}"),
                )
                .with_source(e)
            })?;
            let rel = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.clone());
            layout
                .stage_context(&rel, &bytes)
                .map_err(internal("failed to stage spec context file"))?;
        }

        let mode = request.spec.mode();
        let env = RunContext::assemble_env(&request.spec, &mode, &self.env_config, |k| {
            std::env::var(k).ok()
        });

        let context = RunContext {
            snapshot_dir: snapshot.path().to_path_buf(),
            input_dir: layout.input_dir(),
            output_dir: layout.output_dir(),
            evidence_dir: layout.evidence_dir(),
            env,
            mode,
            timeouts: self.env_config.timeouts,
            spec: request.spec.clone(),
        };
        Ok((context, snapshot))
    }

    fn write_start_failure(&self, context: &RunContext, err: &HolonError) {
        let manifest = HolonManifest::failure(0.0, err.message.clone());
        match manifest.to_json_string() {
            Ok(text) => {
                let path = context.output_dir.join(holon_core::artifacts::MANIFEST);
                if let Err(e) = std::fs::write(&path, text) {
                    warn!(target: "holon.runner", "failed to write start-failure manifest: {e}");
                }
            }
            Err(e) => warn!(target: "holon.runner", "failed to serialise start-failure manifest: {e}"),
        }
        self.reown_outputs(context);
    }

    fn reown_outputs(&self, context: &RunContext) {
        if let (Some(uid), Some(gid)) = (self.env_config.host_uid, self.env_config.host_gid) {
            let changed = reown_tree(&context.output_dir, uid, gid);
            info!(target: "holon.runner", "re-owned {changed} output path(s) to {uid}:{gid}");
        }
    }
}

/// Folded execution log for the fallback summary.
fn execution_log(outcome: &SupervisionOutcome, exit_code: Option<i32>) -> Vec<String> {
    let mut log = Vec::new();
    match outcome {
        SupervisionOutcome::Completed(stats) => {
            log.push(format!(
                "agent stream: {} message(s), {} tool call(s), {} error(s)",
                stats.messages, stats.tool_calls, stats.errors
            ));
        }
        SupervisionOutcome::Timeout(kind) => log.push(kind.describe().to_string()),
        SupervisionOutcome::StreamError(msg) => log.push(format!("stream error: {msg}")),
        SupervisionOutcome::Cancelled => log.push("run cancelled".to_string()),
    }
    if let Some(code) = exit_code {
        log.push(format!("container exit code: {code}"));
    }
    log
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
