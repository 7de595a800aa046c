// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use holon_bundle::{BundleCache, HttpClient, Resolver, archive};
use holon_cli::commands::{
    self, DEFAULT_BASE_IMAGE, default_prompts, load_or_synthesise_spec, solve_spec,
};
use holon_core::EnvConfig;
use holon_image::{ComposeRequest, DockerCli, ImageComposer};
use holon_publish::{PublishRequest, PublisherConfig, PublisherRegistry};
use holon_runner::{DockerLauncher, RunRequest, Runner};
use holon_supervise::CancellationToken;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit code for run/publish failures.
const EXIT_FAILURE: i32 = 1;
/// Exit code for usage errors (clap exits with 2 automatically).
#[allow(dead_code)]
const EXIT_USAGE: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "holon", version, about = "Sandboxed batch runner for AI coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a spec (or a bare goal) in a sandboxed container.
    Run {
        /// Spec file (`v1` YAML).
        #[arg(long)]
        spec: Option<PathBuf>,

        /// Free-form goal; a spec is synthesised around it.
        #[arg(long)]
        goal: Option<String>,

        /// Host workspace to snapshot (defaults to `HOLON_WORKSPACE` or `.`).
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Agent reference: file path, URL with `#sha256=`, alias, or `default`.
        #[arg(long)]
        agent: Option<String>,

        /// Base toolchain image.
        #[arg(long, default_value = DEFAULT_BASE_IMAGE)]
        base_image: String,

        /// Directory the run layout is created under (defaults to a temp dir).
        #[arg(long)]
        run_dir: Option<PathBuf>,
    },

    /// Solve a GitHub issue or address a PR's review feedback.
    Solve {
        /// `owner/repo#<n>`, an issue URL, or a PR URL.
        reference: String,

        /// Host workspace to snapshot (defaults to `HOLON_WORKSPACE` or `.`).
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Agent reference.
        #[arg(long)]
        agent: Option<String>,

        /// Base toolchain image.
        #[arg(long, default_value = DEFAULT_BASE_IMAGE)]
        base_image: String,

        /// Directory the run layout is created under.
        #[arg(long)]
        run_dir: Option<PathBuf>,
    },

    /// Publish a finished run's artifacts.
    Publish {
        /// Provider name (`github-pr`, `github`).
        #[arg(long)]
        provider: String,

        /// Provider-specific target string.
        #[arg(long)]
        target: String,

        /// The run's output directory.
        #[arg(long, default_value = "./output")]
        output_dir: PathBuf,

        /// The run's input directory (for title derivation from context).
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Local repository worktree for the `github-pr` provider.
        #[arg(long)]
        repo_dir: Option<PathBuf>,
    },

    /// Manage agent bundles.
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Print version information.
    Version,

    /// Detection helpers.
    Detect {
        #[command(subcommand)]
        command: DetectCommands,
    },
}

#[derive(Subcommand, Debug)]
enum AgentCommands {
    /// Resolve (and cache) a bundle; optionally register an alias for it.
    Install {
        /// Agent reference.
        reference: String,

        /// Register this alias for the reference (HTTP refs only).
        #[arg(long)]
        alias: Option<String>,
    },

    /// List registered aliases.
    List,

    /// Remove an alias. Bundles stay cached.
    Remove {
        /// Alias name.
        name: String,
    },

    /// Show a bundle's manifest.
    Info {
        /// Agent reference.
        reference: String,
    },
}

#[derive(Subcommand, Debug)]
enum DetectCommands {
    /// Print the base image a run would use.
    Image,
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let code = match dispatch(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Run {
            spec,
            goal,
            workspace,
            agent,
            base_image,
            run_dir,
        } => {
            let spec = load_or_synthesise_spec(spec.as_deref(), goal.as_deref())?;
            execute_run(spec, workspace, agent, base_image, run_dir).await
        }

        Commands::Solve {
            reference,
            workspace,
            agent,
            base_image,
            run_dir,
        } => {
            let spec = solve_spec(&reference)?;
            execute_run(spec, workspace, agent, base_image, run_dir).await
        }

        Commands::Publish {
            provider,
            target,
            output_dir,
            input_dir,
            repo_dir,
        } => {
            let token = holon_core::env::github_token().ok_or_else(|| {
                anyhow::anyhow!("no GitHub token: set HOLON_GITHUB_TOKEN or GITHUB_TOKEN")
            })?;
            let registry = PublisherRegistry::with_defaults();
            let publisher = registry
                .get(&provider)
                .with_context(|| format!("unknown provider '{provider}' (have: {:?})", registry.names()))?;

            let request = PublishRequest {
                target,
                output_dir,
                input_dir,
                repo_dir,
                config: PublisherConfig::new(token),
            };
            let result = publisher.publish(&request).await?;
            print!("{}", holon_cli::format::render_publish_result(&result));
            Ok(if result.success { 0 } else { EXIT_FAILURE })
        }

        Commands::Agent { command } => agent_command(command).await,

        Commands::Version => {
            println!("holon {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }

        Commands::Detect {
            command: DetectCommands::Image,
        } => {
            println!("{DEFAULT_BASE_IMAGE}");
            Ok(0)
        }
    }
}

fn resolver() -> Result<Resolver> {
    let cache = BundleCache::open_default()?;
    let http = HttpClient::with_defaults()?;
    let env = EnvConfig::from_env();
    Ok(Resolver::new(cache, http).with_no_auto_install(env.no_auto_install))
}

async fn agent_command(command: AgentCommands) -> Result<i32> {
    match command {
        AgentCommands::Install { reference, alias } => {
            let resolver = resolver()?;
            let path = resolver.resolve(&reference).await?;
            println!("installed: {}", path.display());
            if let Some(alias) = alias {
                if reference.starts_with("http") {
                    resolver.cache().set_alias(&alias, &reference)?;
                    println!("alias '{alias}' -> {reference}");
                } else {
                    anyhow::bail!("aliases can only point at http(s) references");
                }
            }
            Ok(0)
        }

        AgentCommands::List => {
            let resolver = resolver()?;
            let aliases = resolver.cache().list_aliases();
            if aliases.is_empty() {
                println!("no aliases registered");
            }
            for (name, url) in aliases {
                println!("{name}\t{url}");
            }
            Ok(0)
        }

        AgentCommands::Remove { name } => {
            let resolver = resolver()?;
            if resolver.cache().remove_alias(&name)? {
                println!("removed alias '{name}'");
                Ok(0)
            } else {
                eprintln!("no such alias '{name}'");
                Ok(EXIT_FAILURE)
            }
        }

        AgentCommands::Info { reference } => {
            let resolver = resolver()?;
            let path = resolver.resolve(&reference).await?;
            let sha256 = archive::sha256_file(&path)?;
            let manifest = archive::read_manifest(&path)?;
            print!("{}", commands::render_bundle_info(&sha256, &manifest));
            Ok(0)
        }
    }
}

async fn execute_run(
    spec: holon_core::HolonSpec,
    workspace: Option<PathBuf>,
    agent: Option<String>,
    base_image: String,
    run_dir: Option<PathBuf>,
) -> Result<i32> {
    let env_config = EnvConfig::from_env();

    // Flag, then the spec's own workspace, then HOLON_WORKSPACE, then cwd.
    let workspace = workspace
        .or_else(|| spec.context.workspace.clone().map(PathBuf::from))
        .or_else(|| env_config.workspace.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    // Resolve the agent bundle.
    let agent_ref = agent
        .or_else(|| env_config.agent.clone())
        .unwrap_or_else(|| "default".to_string());
    let resolver = resolver()?;
    let bundle_path = resolver.resolve(&agent_ref).await?;
    let bundle_sha256 = archive::sha256_file(&bundle_path)?;
    let bundle_manifest = archive::read_manifest(&bundle_path)?;
    archive::verify_entrypoint(&bundle_path)?;

    // Compose the image.
    let composer = ImageComposer::new(DockerCli::new());
    let image = composer.compose(&ComposeRequest {
        base_image,
        bundle_path: bundle_path.clone(),
        bundle_sha256,
        runtime_version: bundle_manifest.runtime.version.clone(),
    })?;

    // Keep the temp run dir alive until artifacts are reported.
    let mut _run_dir_guard = None;
    let run_root = match run_dir {
        Some(dir) => dir,
        None => {
            let tmp = tempfile::Builder::new()
                .prefix("holon-run-")
                .tempdir()
                .context("create run directory")?;
            let path = tmp.path().to_path_buf();
            _run_dir_guard = Some(tmp);
            path
        }
    };

    let (system_prompt, user_prompt) = default_prompts(&spec);
    let request = RunRequest {
        spec,
        workspace,
        image: image.id,
        run_root,
        snapshot_base: env_config.snapshot_base.clone(),
        system_prompt,
        user_prompt,
        context_files: vec![],
    };

    // SIGINT aborts cooperatively; the runner kills after a grace window.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let runner = Runner::new(DockerLauncher::default(), env_config);
    match runner.run(request, cancel).await {
        Ok(report) => {
            print!("{}", holon_cli::format::render_run_report(&report));
            // The guard may hold the artifacts; persist them for the caller.
            if let Some(tmp) = _run_dir_guard {
                let kept = tmp.keep();
                println!("run directory kept at {}", kept.display());
            }
            Ok(0)
        }
        Err(err) => {
            eprintln!("run failed: {err}");
            if let Some(tmp) = _run_dir_guard {
                let kept = tmp.keep();
                eprintln!("run directory kept at {}", kept.display());
            }
            Ok(EXIT_FAILURE)
        }
    }
}
