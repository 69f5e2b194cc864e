//! Phase launcher
//!
//! One application binary carries both phases. `build` deploys it, `serve` is
//! what the generated Dockerfile starts inside the cluster.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use colored::Colorize;
use kubescript_build::{BuildOptions, Builder, LogProgress, PipelineError, SpinnerProgress};
use kubescript_core::{App, KubeScriptConfig, ProjectDescriptor};
use kubescript_runtime::Runner;
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// KubeScript application
#[derive(Parser, Debug)]
#[command(about = "Build, deploy and serve a KubeScript application", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, env = "KUBESCRIPT_CONFIG", global = true)]
    pub config: Option<String>,

    /// Log level (overrides the configured one)
    #[arg(long, env = "KUBESCRIPT_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Build the image, deploy it and wire the gateway
    Build {
        /// Project manifest providing name, version and registry prefix
        #[arg(long, default_value = "Cargo.toml")]
        manifest: PathBuf,

        /// Output directory for generated manifests
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Dockerfile template to use instead of the bundled one
        #[arg(long)]
        dockerfile: Option<PathBuf>,

        /// Where to write the generated Dockerfile
        #[arg(long)]
        dockerfile_output: Option<PathBuf>,

        /// Binary the container starts
        #[arg(long)]
        entry: Option<String>,
    },

    /// Serve the declared handlers
    Serve {
        /// Listen address
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Event gateway host for emitted events
        #[arg(long)]
        gateway_host: Option<String>,
    },
}

/// Parse the process arguments and run the selected phase
pub async fn launch(app: App) -> ExitCode {
    run(Cli::parse(), app).await
}

/// Run the phase selected by `cli`
pub async fn run(cli: Cli, app: App) -> ExitCode {
    let config = match KubeScriptConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid configuration: {}", "✗".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    crate::logging::init(&level, cli.json || config.logging.json);

    let result = match cli.command {
        Command::Build {
            manifest,
            out,
            dockerfile,
            dockerfile_output,
            entry,
        } => {
            let options = BuildOptions {
                dockerfile_path: dockerfile,
                dockerfile_output,
                entry,
                context_dir: context_dir(&manifest),
            };
            build(app, config, &manifest, out.as_deref(), options).await
        }
        Command::Serve {
            listen,
            gateway_host,
        } => serve(app, apply_serve_overrides(config, listen, gateway_host)).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn build(
    app: App,
    config: KubeScriptConfig,
    manifest: &Path,
    out: Option<&Path>,
    options: BuildOptions,
) -> anyhow::Result<()> {
    let descriptor = ProjectDescriptor::load(manifest)
        .with_context(|| format!("Cannot read project descriptor {}", manifest.display()))?;

    let mut builder = Builder::new(config, descriptor);
    if !std::io::stderr().is_terminal() {
        builder = builder.with_progress(Arc::new(LogProgress));
    } else {
        builder = builder.with_progress(Arc::new(SpinnerProgress::new()));
    }

    builder.run(&app, out, options).await?;
    Ok(())
}

async fn serve(app: App, config: KubeScriptConfig) -> anyhow::Result<()> {
    let runner = Runner::new(&app, &config).context("Cannot start runner")?;
    runner.run().await?;
    Ok(())
}

fn apply_serve_overrides(
    mut config: KubeScriptConfig,
    listen: Option<SocketAddr>,
    gateway_host: Option<String>,
) -> KubeScriptConfig {
    if let Some(addr) = listen {
        config.server.listen_addr = addr;
    }
    if let Some(host) = gateway_host {
        config.gateway.host = host;
    }
    config
}

/// Build context is the directory holding the manifest
fn context_dir(manifest: &Path) -> Option<PathBuf> {
    manifest
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// Process status for a failed phase: the failing tool's code, else 1
fn exit_status(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<PipelineError>()
        .map(PipelineError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .filter(|code| *code != 0)
        .unwrap_or(1)
}
