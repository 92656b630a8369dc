//! mpu-updater - marketplace product price/inventory updater
//!
//! Subcommands:
//! - `run`: update every row of one CSV file and write the reports
//! - `serve`: job-status HTTP API (default port 5780)
//! - `init-config`: write a starter config file

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mpu_common::config::write_toml_config;
use mpu_common::events::EventBus;
use mpu_updater::config::{init_config_path, CliOverrides, KindTuning, TomlConfig, UpdaterConfig};
use mpu_updater::models::UpdateKind;
use mpu_updater::services::{BatchCoordinator, HttpProductApi, ProductApi, ReportGenerator};
use mpu_updater::AppState;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mpu-updater
#[derive(Parser, Debug)]
#[command(name = "mpu-updater")]
#[command(about = "Batch price and inventory updater for marketplace products")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/mpu/mpu-updater.toml)
    #[arg(long, global = true, env = "MPU_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one input CSV and write the reports
    Run(RunArgs),
    /// Serve the job-status HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Write a starter config file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Field to update: price or inventory
    #[arg(short, long)]
    kind: UpdateKind,

    /// Input CSV (SPU_ID,price,inventory)
    #[arg(short, long)]
    input: PathBuf,

    /// Lookup CSV (SPU_ID,Product_ID,SKU_IDs)
    #[arg(short, long)]
    lookup: Option<PathBuf>,

    /// Concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Rows per chunk (0 = whole file)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Server-error retries per row
    #[arg(long)]
    max_retries: Option<u32>,

    /// Directory for report files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

fn init_tracing(level: &str) {
    // A bare level applies to this workspace's crates only
    let default_filter = if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("mpu_updater={level},mpu_common={level}")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::InitConfig { force } => init_config(cli.config, force),
        Command::Run(args) => {
            let overrides = CliOverrides {
                config_file: cli.config,
                lookup_file: args.lookup.clone(),
                output_dir: args.output_dir.clone(),
                port: None,
                tuning: KindTuning {
                    workers: args.workers,
                    chunk_size: args.chunk_size,
                    max_retries: args.max_retries,
                    ..Default::default()
                },
            };
            let config = UpdaterConfig::load(overrides).context("Failed to load configuration")?;
            init_tracing(&config.logging.level);
            run_batch(config, args.kind, args.input).await
        }
        Command::Serve { port } => {
            let overrides = CliOverrides {
                config_file: cli.config,
                port,
                ..Default::default()
            };
            let config = UpdaterConfig::load(overrides).context("Failed to load configuration")?;
            init_tracing(&config.logging.level);
            serve(config).await
        }
    }
}

fn http_client(config: &UpdaterConfig) -> Result<Arc<dyn ProductApi>> {
    let credentials = config.api_credentials()?;
    let client = HttpProductApi::new(credentials, config.request_timeout)
        .context("Failed to create marketplace API client")?;
    Ok(Arc::new(client))
}

async fn run_batch(config: UpdaterConfig, kind: UpdateKind, input: PathBuf) -> Result<()> {
    if let Some(path) = &config.source_file {
        info!("Configuration: {}", path.display());
    }
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Update type: {}", kind);
    info!("Input file: {}", input.display());
    info!("Lookup file: {}", config.lookup_file.display());

    let api = http_client(&config)?;
    let coordinator = BatchCoordinator::new(kind, api, config.batch_settings(kind));
    let run = coordinator
        .run(&config.lookup_file, &input)
        .await
        .context("Batch update failed")?;

    let report = ReportGenerator::new(config.output_dir.clone())
        .generate(&run)
        .context("Failed to write reports")?;

    println!("{}", report.summary);
    println!("Detailed report: {}", report.detail_path.display());
    println!("Statistics:      {}", report.stats_path.display());
    println!("Elapsed:         {:.1}s", run.elapsed.as_secs_f64());
    Ok(())
}

async fn serve(config: UpdaterConfig) -> Result<()> {
    info!("Starting mpu-updater job service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config.source_file {
        info!("Configuration: {}", path.display());
    }

    let api = http_client(&config)?;
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let state = AppState::new(config, api, EventBus::new(100));
    let app = mpu_updater::build_router(state);

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

fn init_config(cli_path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = init_config_path(cli_path.as_deref())
        .context("No config directory available; pass --config")?;

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to replace it)",
            path.display()
        );
    }

    write_toml_config(&TomlConfig::template(), &path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    println!("Edit the [api] section or set MPU_APP_KEY, MPU_APP_SECRET and MPU_ACCESS_TOKEN.");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
