//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered backend
//! - Update backend health state based on results

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::error::ProbeFailure;
use crate::health::probe::Probe;
use crate::load_balancer::registry::BackendRegistry;

pub struct HealthProber {
    registry: Arc<BackendRegistry>,
    probe: Arc<dyn Probe>,
    config: HealthCheckConfig,
}

impl HealthProber {
    pub fn new(registry: Arc<BackendRegistry>, probe: Arc<dyn Probe>, config: HealthCheckConfig) -> Self {
        Self {
            registry,
            probe,
            config,
        }
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Run the probe loop on its own task.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Probe every backend once per interval until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            timeout_secs = self.config.timeout_secs,
            unhealthy_threshold = self.config.unhealthy_threshold,
            probe = ?self.probe,
            "Health prober starting"
        );

        let mut ticker = time::interval(self.interval());
        // A slow cycle pushes the next one back rather than firing a burst.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health prober received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every registered backend concurrently and apply the outcomes.
    ///
    /// Returns once every probe has completed or timed out, so two cycles
    /// never probe the same backend at the same time.
    pub async fn check_all(&self) {
        let addresses = self.registry.addresses();
        tracing::debug!(backends = addresses.len(), "Starting probe cycle");
        join_all(addresses.into_iter().map(|address| self.check_one(address))).await;
    }

    async fn check_one(&self, address: String) {
        let outcome = match time::timeout(self.timeout(), self.probe.check(&address)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeFailure::Timeout),
        };

        match outcome {
            Ok(()) => {
                if let Some(t) = self.registry.mark_healthy(&address) {
                    tracing::info!(address = %address, from = %t.from, to = %t.to, "Backend is healthy");
                }
            }
            Err(e) => {
                tracing::debug!(address = %address, error = %e, "Health check failed");
                if let Some(t) = self
                    .registry
                    .record_failure(&address, self.config.unhealthy_threshold)
                {
                    tracing::warn!(
                        address = %address,
                        from = %t.from,
                        to = %t.to,
                        threshold = self.config.unhealthy_threshold,
                        error = %e,
                        "Backend marked unhealthy"
                    );
                }
            }
        }
    }
}
