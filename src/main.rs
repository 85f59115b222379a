// herakles-hw-telemetry - version 0.1.0
// Hardware telemetry exporter with tracing logging
mod cache;
mod cli;
mod commands;
mod config;
mod handlers;
mod health_stats;
mod metrics;
mod poller;
mod state;

use axum::{routing::get, Router};
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};

use crate::cli::{Args, Commands, LogLevel};
use crate::config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT,
};
use crate::handlers::{doc_handler, health_handler, metrics_handler};
use crate::state::AppState;

/// Initializes tracing logging subsystem with configured log level.
/// Logs go to stderr so `sample` output on stdout stays machine-readable.
fn setup_logging(config: &Config) {
    let level = config
        .log_level
        .as_deref()
        .and_then(|l| LogLevel::from_str(l, true).ok())
        .unwrap_or(LogLevel::Info);

    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    debug!("Logging initialized with level: {:?}", level);
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    if args.check_config {
        if let Err(e) = validate_effective_config(&config) {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        return show_config(&config, args.config_format);
    }

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&config);

    // Handle subcommands
    if let Some(command) = args.command {
        return match command {
            Commands::Check {
                cpu,
                gpu,
                memory,
                all,
            } => commands::command_check(cpu, gpu, memory, all, &config),
            Commands::Config {
                output,
                format,
                commented,
            } => commands::command_config(output, format, commented),
            Commands::Sample {
                iterations,
                interval_ms,
                format,
            } => commands::command_sample(iterations, interval_ms, format, &config),
        };
    }

    run_server(config).await
}

/// Runs the exporter: background poller plus HTTP endpoints.
async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting herakles-hw-telemetry");

    let bind_ip: IpAddr = config
        .bind
        .as_deref()
        .unwrap_or(DEFAULT_BIND_ADDR)
        .parse()?;
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let enable_health = config.enable_health.unwrap_or(true);

    let runner = config.shell_runner();
    info!(
        "Telemetry reads via {} (timeout {}ms)",
        if runner.escalates() { "su -c" } else { "sh -c" },
        runner.timeout().as_millis()
    );

    let state = AppState::new(config, Box::new(runner))?;
    debug!("Prometheus registry initialized");

    // Establish the differential baselines before the first scrape
    info!("Performing initial poll");
    if let Err(e) = poller::poll_once(&state).await {
        error!("Initial poll failed: {:#}", e);
    } else {
        info!("Initial poll completed successfully");
    }

    let background_task = tokio::spawn(poller::run(state.clone()));

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
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
    };

    // Configure HTTP server routes and start listening
    let addr = SocketAddr::new(bind_ip, port);

    let mut app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/doc", get(doc_handler));

    if enable_health {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state.clone());

    let listener = TcpListener::bind(addr).await?;
    info!("herakles-hw-telemetry listening on http://{}", addr);

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
        }
    }

    // Cleanup: cancel background poller before exit
    background_task.abort();
    let _ = background_task.await;

    info!("herakles-hw-telemetry stopped gracefully");
    Ok(())
}
