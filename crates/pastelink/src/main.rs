//! pastelink: expiring pastebin server.
//!
//! Subcommands:
//! - `serve` (default): HTTP server plus the retention sweeper
//! - `sweep`: run one retention cycle against the data dir and exit
//! - `config`: print the effective configuration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cas::{ArtifactStore, FileStore};
use clap::{Parser, Subcommand};
use pasteconf::{ConfigSources, PasteConfig};
use pastelink::sweeper::{self, RetentionPolicy, Sweeper};
use pastelink::web::{self, AppState};
use pastelink::{telemetry, PasteService};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "pastelink")]
#[command(about = "Expiring text and image pastes behind short links")]
#[command(version)]
struct Cli {
    /// Config file to use instead of ./pastelink.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Artifact store directory (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server and the retention sweeper
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Delete expired artifacts once and exit
    Sweep,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }
    }

    let (mut config, sources) = PasteConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.paths.data_dir = dir;
    }

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.bind.http_port = port;
            }
            serve(config, sources).await
        }
        Commands::Sweep => sweep(config).await,
        Commands::Config => {
            for file in &sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {var}");
            }
            print!("{}", config.to_toml());
            Ok(())
        }
    }
}

fn open_store(config: &PasteConfig) -> Result<FileStore> {
    FileStore::at_path(&config.paths.data_dir).with_context(|| {
        format!(
            "Failed to open artifact store at {}",
            config.paths.data_dir.display()
        )
    })
}

async fn sweep(config: PasteConfig) -> Result<()> {
    telemetry::init(&config.telemetry.log_level)?;

    let store = open_store(&config)?;
    let max_age = config.retention.max_age();
    let report = tokio::task::spawn_blocking(move || sweeper::sweep_once(&store, max_age))
        .await
        .context("sweep task failed")?;

    println!(
        "scanned {} expired, deleted {}, failed {}",
        report.scanned, report.deleted, report.failed
    );
    if report.failed > 0 {
        bail!("{} artifacts could not be deleted", report.failed);
    }
    Ok(())
}

async fn serve(config: PasteConfig, sources: ConfigSources) -> Result<()> {
    telemetry::init(&config.telemetry.log_level)?;

    for file in &sources.files {
        tracing::info!(path = %file.display(), "loaded config file");
    }
    if !sources.env_overrides.is_empty() {
        tracing::info!(vars = ?sources.env_overrides, "applied env overrides");
    }

    let store: Arc<dyn ArtifactStore> = Arc::new(open_store(&config)?);
    let stats = store.stats()?;
    tracing::info!(
        data_dir = %config.paths.data_dir.display(),
        artifacts = stats.artifact_count,
        "artifact store ready"
    );

    let shutdown = CancellationToken::new();
    let sweeper = Sweeper::spawn(
        store.clone(),
        RetentionPolicy::from(&config.retention),
        shutdown.clone(),
    );

    let service = PasteService::new(store).with_footer(config.page.footer.clone());
    let state = AppState {
        service: Arc::new(service),
        public_url: config.bind.public_url.clone(),
        sweeper: Some(sweeper.status()),
        max_body_bytes: config.bind.max_body_bytes,
    };
    let app = web::router(state);

    let addr = config.bind.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("listening on http://{}", addr);

    let server_token = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                server_token.cancelled().await;
                tracing::info!("server shutdown signal received");
            })
            .await
    });

    tokio::select! {
        _ = shutdown_signal() => {
            shutdown.cancel();
        }
        result = &mut server => {
            shutdown.cancel();
            sweeper.join().await.context("sweeper task failed")?;
            result.context("server task failed")?.context("server error")?;
            bail!("server exited unexpectedly");
        }
    }

    server
        .await
        .context("server task failed")?
        .context("server error")?;
    sweeper.join().await.context("sweeper task failed")?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down gracefully"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down gracefully"),
    }
}
