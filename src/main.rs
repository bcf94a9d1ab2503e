//! rotor - a failover-aware round-robin HTTP reverse proxy
//!
//! Usage:
//!     rotor --config <path>
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

use rotor::config::{load_config, Config};
use rotor::pool::BackendPool;
use rotor::proxy::Dispatcher;
use rotor::server::Listener;
use rotor::util::init_logging;

/// A failover-aware round-robin HTTP reverse proxy written in Rust.
#[derive(Parser, Debug)]
#[command(name = "rotor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(&cli.config).with_context(|| {
        format!(
            "failed to load configuration from '{}'",
            cli.config.display()
        )
    })?;

    // Determine log level (CLI overrides config)
    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.global.log_level);

    // Initialize logging
    init_logging(log_level, &config.global.log_format);

    // If --validate flag, just validate and exit
    if cli.validate {
        info!("Configuration is valid");
        println!("Configuration is valid.");
        println!("  Listen: {}", config.listen);
        println!("  Backends: {}", config.backends.len());
        for backend in &config.backends {
            println!("    - {}", backend);
        }
        return Ok(());
    }

    // Log startup information
    info!(
        config_path = %cli.config.display(),
        listen = %config.listen,
        backends = config.backends.len(),
        "rotor starting"
    );

    for backend in &config.backends {
        info!(backend = %backend, "configured backend");
    }

    // Run the proxy
    run(config)
}

/// Run the proxy with the given configuration.
fn run(config: Config) -> Result<()> {
    // Create tokio runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config).await })
}

/// Async entry point for the proxy.
async fn run_async(config: Config) -> Result<()> {
    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Build the backend pool; one instance for the process lifetime
    let urls = config
        .backend_uris()
        .context("invalid backend address")?;
    let pool = Arc::new(BackendPool::new(urls).context("failed to build backend pool")?);

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&pool),
        config.proxy.connect_timeout,
    ));

    // Bind and start the listener
    let listener = Listener::bind(config.listen, dispatcher)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.listen))?;

    let shutdown_rx = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move {
        listener.run(shutdown_rx).await;
    });

    info!("rotor is running");
    info!("press Ctrl+C to stop");

    // Wait for shutdown signal
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal");
        }
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
        }
    }

    // Signal the listener to shut down
    let _ = shutdown_tx.send(());
    let _ = handle.await;

    info!(alive_backends = pool.alive_count(), "rotor shut down complete");
    Ok(())
}
