//! RPC balancer runtime.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file ──▶ watcher ──sync──▶ ┌──────────────┐ ◀──mark── health prober ──probe──▶ backends
//!                                     │   registry   │
//!   admin API ─────add/remove───────▶ └──────┬───────┘
//!                                            │ healthy snapshot
//!                                            ▼
//!        proxy listener ──▶ interceptor ──▶ balancer ──▶ selected backend
//!                                     │
//!                                     ▼
//!                              metrics collector ──▶ GET /metrics
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use rpc_balancer::client::BalancedClient;
use rpc_balancer::config::loader::{load_config, ConfigError};
use rpc_balancer::config::validation::validate_config;
use rpc_balancer::config::watcher::{apply_backend_updates, ConfigWatcher};
use rpc_balancer::config::BalancerConfig;
use rpc_balancer::health::{probe_for, HealthProber};
use rpc_balancer::http::{AppState, HttpServer, ProxyServer};
use rpc_balancer::interceptor::CallInterceptor;
use rpc_balancer::lifecycle::{shutdown_on_signal, Shutdown};
use rpc_balancer::load_balancer::{registry::BackendRegistry, strategy_for, Balancer};
use rpc_balancer::observability::{logging, MetricsCollector};
use rpc_balancer::resilience::RetryPolicy;

/// How often buffered histogram samples are folded into their summaries.
const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "rpc-balancer", version, about = "Health-aware RPC load balancer")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "RPC_BALANCER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let config = BalancerConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "rpc-balancer starting"
    );

    let registry = Arc::new(BackendRegistry::with_backends(config.backend_addresses()));
    let metrics = Arc::new(MetricsCollector::new());
    let shutdown = Shutdown::new();
    let upkeep = metrics.spawn_upkeep(METRICS_UPKEEP_INTERVAL, shutdown.subscribe());

    tracing::info!(
        backends = registry.len(),
        strategy = ?config.balancer.strategy,
        interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );

    let prober = HealthProber::new(
        registry.clone(),
        probe_for(&config.health_check),
        config.health_check.clone(),
    )
    .spawn(shutdown.subscribe());

    // Keep the notify handle alive for the whole run.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tokio::spawn(apply_backend_updates(
                registry.clone(),
                updates,
                shutdown.subscribe(),
            ));
            Some(handle)
        }
        None => None,
    };

    let proxy_task = if config.proxy.enabled {
        let balancer = Balancer::new(registry.clone(), strategy_for(config.balancer.strategy));
        let client = BalancedClient::new(
            Arc::new(balancer),
            CallInterceptor::new(metrics.clone()),
            RetryPolicy::from_config(&config.retries),
        );
        let listener = TcpListener::bind(&config.proxy.bind_address).await?;
        let proxy = ProxyServer::new(client, &config.proxy);
        Some(tokio::spawn(proxy.run(listener, shutdown.subscribe())))
    } else {
        tracing::info!("Proxy listener disabled");
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(AppState {
        registry,
        metrics,
        config: Arc::new(config),
    });
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let served = server_task.await?;
    // The server may also stop on its own; make sure everything else follows.
    shutdown.trigger();
    prober.await?;
    upkeep.await?;
    if let Some(proxy) = proxy_task {
        proxy.await??;
    }
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
