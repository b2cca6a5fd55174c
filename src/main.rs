use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber;

use floodgate::adaptive::{AdaptiveLimiter, HealthMonitor};
use floodgate::config::FloodgateConfig;
use floodgate::health::{HealthSource, PrometheusSource, SimulatedSource};
use floodgate::limiter::{AdmissionControl, HybridLimiter};
use floodgate::store::RedisStore;

#[derive(Parser, Debug)]
#[command(name = "floodgate", version, about = "Distributed request-admission gate")]
struct Args {
    /// Path to a YAML configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<String>,

    /// Client identifier to exercise
    #[arg(long, default_value = "demo-client")]
    identifier: String,

    /// Number of admission checks to fire
    #[arg(long, default_value_t = 12)]
    requests: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Floodgate Request-Admission Gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FloodgateConfig::from_file(path)?,
        None => FloodgateConfig::default(),
    };
    config.validate()?;
    info!(redis_url = %config.store.redis_url, namespace = %config.store.namespace, "Configuration loaded");

    let store = Arc::new(
        RedisStore::connect(&config.store.redis_url, config.store.op_timeout()).await?,
    );
    let gate = HybridLimiter::new(
        &config.limits,
        config.failure_policy,
        config.store.namespace.clone(),
        store,
    )?;
    info!("Hybrid limiter initialized");

    let governor = Arc::new(AdaptiveLimiter::new(config.adaptive.base_rate_per_sec));
    let monitor = if config.adaptive.enabled {
        let source: Arc<dyn HealthSource> = match &config.adaptive.prometheus_url {
            Some(url) => Arc::new(PrometheusSource::new(url)?),
            None => Arc::new(SimulatedSource::new()),
        };
        let monitor = HealthMonitor::new(governor.clone(), source, config.adaptive.poll_interval());
        Some(tokio::spawn(monitor.run_until(shutdown_signal())))
    } else {
        None
    };

    drive(&gate, &governor, &args.identifier, args.requests).await;

    if let Some(handle) = monitor {
        info!("Adaptive monitor running; press Ctrl-C to stop");
        handle.await?;
    }

    info!("Floodgate stopped");
    Ok(())
}

/// Fire admission checks through both gates and log each decision.
///
/// The global governor is consulted first; the per-client hybrid gate only
/// pays its store round-trips for requests the governor admits.
async fn drive<A: AdmissionControl>(
    gate: &A,
    governor: &AdaptiveLimiter,
    identifier: &str,
    requests: u32,
) {
    for i in 1..=requests {
        let admitted = governor.allow() && gate.allow(identifier).await;
        info!(
            request = i,
            identifier = %identifier,
            admitted = admitted,
            "Admission decision"
        );
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
