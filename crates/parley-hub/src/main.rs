//! parley: WebSocket pub/sub hub.
//!
//! Loads the config, applies command-line overrides, then serves until
//! Ctrl+C or SIGTERM, draining every session before exit.

mod cli;

use std::process::ExitCode;
use std::time::Duration;

use parley_common::{ConfigError, HubError};
use parley_config::{config_to_json, load_config, validation, ParleyConfig};
use parley_hub::{Hub, Listener, TransportSettings};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("parley: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.print_config {
        println!("{}", config_to_json(&config));
        return ExitCode::SUCCESS;
    }

    init_logging(args.log_level.as_deref(), &config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Hub stopped");
            ExitCode::FAILURE
        }
    }
}

fn load(args: &cli::Args) -> Result<ParleyConfig, ConfigError> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    validation::validate(&config)?;
    Ok(config)
}

/// `RUST_LOG` wins, then `--log-level`, then `logging.level`.
fn init_logging(cli_level: Option<&str>, config: &ParleyConfig) {
    let fallback = match cli_level {
        Some(level) => format!("parley={level}"),
        None => config.logging.level.directive().to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: ParleyConfig) -> Result<(), HubError> {
    info!("parley v{} starting", env!("CARGO_PKG_VERSION"));

    let hub = Hub::from_config(&config)?;
    let listener = Listener::bind(
        &config.server.bind_addr(),
        hub.clone(),
        TransportSettings::from_config(&config.server),
    )
    .await?;

    let shutdown = CancellationToken::new();

    let stats_hub = hub.clone();
    let stats_stop = shutdown.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(STATS_INTERVAL);
        loop {
            tokio::select! {
                _ = stats_stop.cancelled() => break,
                _ = tick.tick() => {
                    let stats = stats_hub.stats();
                    debug!(connections = stats.connections, channels = stats.channels, "Stats");
                }
            }
        }
    });

    let signal_stop = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_stop.cancel();
    });

    let result = listener.run(shutdown.clone()).await;
    shutdown.cancel();
    info!("Shutdown complete");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
