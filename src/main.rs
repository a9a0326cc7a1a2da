//! storefront-perf
//!
//! Performance control plane server with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod state;

use axum::{middleware, routing::get, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use storefront_perf::system_clock;
use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};

use cli::{Args, Commands, LogLevel};
use commands::{command_config, command_probe, command_report};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{
    admission, health_handler, metrics_handler, report_handler, root_handler, stats_handler,
};
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with the resolved log level.
fn setup_logging(level: LogLevel) {
    let log_level = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", level.as_str());
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Resolves on SIGINT or SIGTERM.
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
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Builds the HTTP router. Every route runs behind the admission middleware.
fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/report", get(report_handler))
        .route("/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), admission))
        .with_state(state)
}

/// Runs the server until a shutdown signal arrives.
async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let bind_ip_str = config
        .bind
        .clone()
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let state: SharedState = Arc::new(AppState::build(config, system_clock())?);

    if state.config.enable_monitor.unwrap_or(true) {
        let interval = state.monitor.config().interval;
        match state.monitor.start_monitoring(interval) {
            Ok(_) => info!("Health monitor started ({}s interval)", interval.as_secs()),
            Err(e) => error!("Failed to start health monitor: {}", e),
        }
    } else {
        debug!("Health monitor disabled in configuration");
    }

    if let Err(e) = state
        .housekeeper
        .start(state.config.housekeeping_interval())
    {
        warn!("Failed to start housekeeper: {}", e);
    }

    let app = build_router(state.clone());
    let listener = TcpListener::bind(addr).await?;
    info!(
        "storefront-perf listening on http://{}:{}",
        bind_ip_str, port
    );

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    // Worker threads are joined off the async runtime.
    let workers = state.clone();
    tokio::task::spawn_blocking(move || {
        workers.monitor.stop_monitoring();
        workers.housekeeper.stop();
    })
    .await?;

    if let Err(e) = result {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("storefront-perf stopped gracefully");
    Ok(())
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    // Config generation needs no effective config
    if let Some(Commands::Config {
        output,
        format,
        commented,
    }) = &args.command
    {
        return command_config(output.clone(), format.clone(), *commented);
    }

    let config = load_validated_config(&args)?;
    setup_logging(config.log_level()?);

    match &args.command {
        Some(Commands::Report { samples, interval }) => {
            let report_config = config.clone();
            let (samples, interval) = (*samples, *interval);
            tokio::task::spawn_blocking(move || {
                command_report(samples, interval, &report_config).map_err(|e| e.to_string())
            })
            .await??;
            Ok(())
        }

        Some(Commands::Probe {
            client,
            operation,
            arguments,
            requests,
            cache_ttl,
        }) => command_probe(client, operation, arguments, *requests, *cache_ttl, &config),

        Some(Commands::Serve) | None => {
            info!("Starting storefront-perf");
            serve(config).await
        }

        Some(Commands::Config { .. }) => unreachable!("Config handled above"),
    }
}
