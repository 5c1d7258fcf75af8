//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Serve the metrics exposition and a liveness endpoint
//! - Mount the admin API when enabled
//! - Drain on the shutdown broadcast

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::config::BalancerConfig;
use crate::lifecycle::shutdown;
use crate::load_balancer::registry::BackendRegistry;
use crate::observability::metrics::MetricsCollector;

/// Content type of the Prometheus text exposition format.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<BackendRegistry>,
    pub metrics: Arc<MetricsCollector>,
    pub config: Arc<BalancerConfig>,
}

/// HTTP server for metrics, liveness and administration.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        let mut router = Router::new().route("/health", get(health_handler));

        if config.observability.metrics_enabled {
            router = router.route(&config.observability.metrics_path, get(metrics_handler));
        }
        if config.admin.enabled {
            router = router.merge(setup_admin_router(state.clone()));
        }

        router.layer(TraceLayer::new_for_http()).with_state(state)
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        state.metrics.render(),
    )
}

/// Liveness of the balancer process itself; an empty pool is reported but
/// does not fail the check.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.registry.healthy_snapshot().len();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "backends": state.registry.len(),
            "healthy_backends": healthy,
        })),
    )
}
