//! Liveness probes.
//!
//! # Responsibilities
//! - Define the probe contract the prober drives
//! - Provide HTTP (GET, 2xx is alive) and plain TCP connect probes
//!
//! # Design Decisions
//! - Probes do not enforce their own deadline; the prober wraps every call
//!   in the configured timeout so a misbehaving probe cannot stall a cycle

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpStream;

use crate::config::{HealthCheckConfig, ProbeKind};
use crate::error::ProbeFailure;

/// A cheap liveness check against one backend.
#[async_trait]
pub trait Probe: Send + Sync + Debug {
    async fn check(&self, address: &str) -> Result<(), ProbeFailure>;
}

/// Build the probe named in configuration.
pub fn probe_for(config: &HealthCheckConfig) -> Arc<dyn Probe> {
    match config.probe {
        ProbeKind::Http => Arc::new(HttpProbe::new(config.path.clone())),
        ProbeKind::Tcp => Arc::new(TcpProbe),
    }
}

/// Issues `GET http://{address}{path}` and expects a 2xx.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    path: String,
    client: Client<HttpConnector, Body>,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(HttpConnector::new());

        Self {
            path: path.into(),
            client,
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, address: &str) -> Result<(), ProbeFailure> {
        let request = Request::builder()
            .method("GET")
            .uri(format!("http://{}{}", address, self.path))
            .header("user-agent", "rpc-balancer-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeFailure::Request(e.to_string()))?;

        match self.client.request(request).await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(ProbeFailure::Status(response.status().as_u16())),
            Err(e) if e.is_connect() => Err(ProbeFailure::Connect(std::io::Error::other(e))),
            Err(e) => Err(ProbeFailure::Request(e.to_string())),
        }
    }
}

/// Succeeds if a TCP connection can be opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self, address: &str) -> Result<(), ProbeFailure> {
        TcpStream::connect(address)
            .await
            .map(drop)
            .map_err(ProbeFailure::Connect)
    }
}
