#![forbid(unsafe_code)]

//! `nexus-research`: research workflow API server binary.
//!
//! Bootstraps configuration and credentials, opens the checkpoint store,
//! compiles the stage graph, and serves the HTTP API until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use nexus_research::api::{self, AppState};
use nexus_research::config::GlobalConfig;
use nexus_research::orchestrator::Workflow;
use nexus_research::persistence::open_store;
use nexus_research::render::WkhtmltopdfRenderer;
use nexus_research::stages::builder_from_config;
use nexus_research::transcribe::Transcriber;
use nexus_research::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "nexus-research", about = "Research workflow API server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the HTTP port from the configuration file.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("nexus-research server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(ref path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(port) = args.port {
        config.http_port = port;
    }
    config.load_credentials().await?;
    info!(bind = %config.bind_addr(), "configuration loaded");

    // ── Build the workflow ──────────────────────────────
    let store = open_store(&config).await?;
    let builder = builder_from_config(&config)?;
    let workflow = Arc::new(Workflow::new(store, config.workflow.clone(), builder)?);

    let bind = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind HTTP on {bind}: {err}")))?;

    let state = Arc::new(AppState {
        transcriber: Transcriber::new(config.transcription.clone()),
        renderer: Arc::new(WkhtmltopdfRenderer::new(config.pdf.converter.clone())),
        workflow,
        config,
    });
    let router = api::build_router(state)?;

    // ── Serve ───────────────────────────────────────────
    let ct = CancellationToken::new();
    let mut server_handle = tokio::spawn(api::serve_listener(listener, router, ct.clone()));

    info!("research API ready");

    tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            ct.cancel();
            match server_handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(%err, "http server failed during shutdown"),
                Err(err) => error!(%err, "http server task panicked"),
            }
        }
        joined = &mut server_handle => {
            let err = match joined {
                Ok(Ok(())) => AppError::Config("http server stopped unexpectedly".into()),
                Ok(Err(err)) => err,
                Err(err) => AppError::Config(format!("http server task panicked: {err}")),
            };
            error!(%err, "http server exited before shutdown was requested");
            return Err(err);
        }
    }

    info!("nexus-research shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
