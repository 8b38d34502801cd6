//! scones - image-classification pipeline step handlers
//!
//! `scones serve` exposes every step as `POST /invoke/<step>` for the
//! workflow orchestrator. `scones invoke <step>` runs one step locally
//! against a JSON event file (or stdin) and prints the resulting envelope.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scones_common::config::{ConfigResolver, PipelineConfig};
use scones_gateway::{build_router, AppState};
use scones_pipeline::{Services, Step};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for scones
#[derive(Parser, Debug)]
#[command(name = "scones")]
#[command(about = "Image-classification pipeline step handlers")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the step handlers over HTTP (default)
    Serve {
        /// Listen address override
        #[arg(long)]
        host: Option<String>,

        /// Port override
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a single step against a JSON event
    Invoke {
        /// Step name: trigger, serialize, classify, threshold, file-datalake, file-unknown
        step: String,

        /// Event file; reads stdin when omitted
        #[arg(short, long)]
        event: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let config_path = resolver.resolve_path();
    let config = resolver.load().context("Failed to load configuration")?;

    init_tracing(&config);

    info!(
        "Starting scones v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("SCONES_GIT_HASH"),
        env!("SCONES_BUILD_TIMESTAMP"),
        env!("SCONES_BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: compiled defaults"),
    }

    config.validate().context("Invalid configuration")?;

    match args.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            config
                .validate_workflow_target()
                .context("Invalid configuration")?;
            serve(config, host, port).await
        }
        Command::Invoke { step, event } => {
            let step: Step = step.parse()?;
            if step.starts_workflow() {
                config
                    .validate_workflow_target()
                    .context("Invalid configuration")?;
            }
            invoke(config, step, event).await
        }
    }
}

fn init_tracing(config: &PipelineConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{level},scones_gateway={level},scones_pipeline={level},tower_http=info",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn serve(mut config: PipelineConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;

    let services = Services::from_config(config)
        .await
        .context("Failed to initialize pipeline clients")?;
    let app = build_router(AppState::new(services));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn invoke(config: PipelineConfig, step: Step, event_path: Option<PathBuf>) -> Result<()> {
    let raw = match &event_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read event from stdin")?;
            buffer
        }
    };
    let event: serde_json::Value = serde_json::from_str(&raw).context("Event is not valid JSON")?;

    let services = Services::from_config(config)
        .await
        .context("Failed to initialize pipeline clients")?;

    match services.invoke(step, event).await {
        Ok(envelope) => {
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            if envelope.is_ok() {
                Ok(())
            } else {
                anyhow::bail!("{} step reported status {}", step, envelope.status)
            }
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_report())?);
            Err(anyhow::Error::new(e).context(format!("{} step failed", step)))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
