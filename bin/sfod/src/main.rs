//! ---
//! sfo_section: "01-core-functionality"
//! sfo_subsection: "binary"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Binary entrypoint for the smart failover daemon."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::Router;
use clap::{ArgAction, Parser, Subcommand};
use sfo_api::{health_router, HealthApiState};
use sfo_common::{init_tracing, AppConfig};
use sfo_core::{
    FailoverRoutes, HealthAggregator, HealthMonitor, HealthRegistry, InMemoryExpiringStore,
    Notifier, TracingDispatcher,
};
use sfo_logging::{log_system_event, SystemEventOutcome};
use sfo_metrics::{new_registry, spawn_http_server, DaemonMetrics, FailoverMetrics, SharedRegistry};
use sfo_probes::{register_directory, ResourceDirectory};
use tokio::signal;
use tracing::{info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Smart failover daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run health monitoring and serve the health and metrics routes")]
    Run,
    #[command(about = "Validate the configuration and print the resolved failover routes")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("sfod {} ({})", VERSION, build_profile());
        return Ok(());
    }

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/sfo.toml"));
    candidates.push(PathBuf::from("configs/sfo.example.toml"));

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&candidates)?;
    let load_duration = load_started.elapsed();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let registry = new_registry();
            let daemon_metrics = DaemonMetrics::new(registry.clone())?;
            daemon_metrics.observe_config_load(load_duration.as_secs_f64());
            daemon_metrics.inc_start();
            daemon_metrics.set_build_info(VERSION, build_profile());

            init_tracing("sfod", &loaded.config.logging)?;
            info!(config_path = %loaded.source.display(), "configuration loaded");
            run_daemon(loaded.config, registry).await?
        }
        Commands::CheckConfig => {
            let routes = FailoverRoutes::from_config(&loaded.config)?;
            println!("Configuration: {}", loaded.source.display());
            for kind in routes.kinds() {
                let route = routes.route(kind)?;
                println!(
                    "{:<8} primary={} fallback={} attempts={} degrade={}",
                    kind.as_str(),
                    route.set.primary().name(),
                    route.set.fallback().map(|r| r.name()).unwrap_or("-"),
                    route.policy.retry.max_attempts(),
                    route.policy.graceful_degradation
                );
            }
        }
    }

    Ok(())
}

async fn run_daemon(config: AppConfig, registry: SharedRegistry) -> Result<()> {
    let failover_metrics = FailoverMetrics::new(registry.clone())?;
    let health = Arc::new(HealthRegistry::new(config.health_check.cooldown));
    let directory = Arc::new(ResourceDirectory::from_config(&config));
    let routes = FailoverRoutes::from_config(&config)?;

    let notifier = Arc::new(
        Notifier::from_config(
            &config.notifications,
            Arc::new(InMemoryExpiringStore::new()),
            Arc::new(TracingDispatcher),
        )
        .with_metrics(failover_metrics.clone()),
    );

    let mut aggregator = HealthAggregator::new(health, config.health_check.timeout)
        .with_notifier(notifier)
        .with_metrics(failover_metrics);
    register_directory(&mut aggregator, &directory);
    for set in routes.sets() {
        aggregator.register_set(set);
    }
    let aggregator = Arc::new(aggregator);
    let services = config.health_services();

    let monitor = if services.is_empty() {
        info!("health monitoring disabled by configuration");
        None
    } else {
        let schedule = routes.sweep_schedule(&services, config.health_check.interval);
        info!(schedule = ?schedule, "health monitor starting");
        Some(HealthMonitor::spawn_with_schedule(aggregator.clone(), schedule))
    };

    let metrics_server = if config.metrics.enabled {
        let extra = if config.health_check.enabled && config.health_check.route_enabled {
            let state = Arc::new(HealthApiState::new(aggregator.clone(), services, VERSION));
            info!(route = %config.health_check.route_path, "health route enabled");
            health_router(state, &config.health_check.route_path)
        } else {
            Router::new()
        };
        let server = spawn_http_server(registry, config.metrics.listen, extra)?;
        info!(address = %server.addr(), "metrics exporter enabled");
        Some(server)
    } else {
        if config.health_check.route_enabled {
            warn!("health route requires the metrics listener; route not served");
        }
        info!("metrics exporter disabled by configuration");
        None
    };

    log_system_event(
        None,
        "daemon.started",
        &format!("sfod {} running with {} failover routes", VERSION, routes.len()),
        SystemEventOutcome::Success,
    );
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    if let Some(monitor) = monitor {
        monitor.shutdown().await?;
    }
    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    log_system_event(None, "daemon.stopped", "sfod stopped", SystemEventOutcome::Success);
    Ok(())
}
