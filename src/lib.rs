//! Health-aware RPC load balancing.
//!
//! A registry of backends kept current by a periodic prober, a round-robin
//! (or random) balancer over the healthy snapshot, and a call interceptor
//! that records every call into a Prometheus-style metrics collector.

pub mod admin;
pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod interceptor;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use client::BalancedClient;
pub use config::BalancerConfig;
pub use error::{Error, NoHealthyBackend, ProbeFailure, Result};
pub use health::{HealthProber, Probe};
pub use http::HttpServer;
pub use interceptor::{CallInterceptor, ErrorClass};
pub use lifecycle::Shutdown;
pub use load_balancer::{registry::BackendRegistry, Balancer, HealthState};
pub use observability::{MetricsCollector, MetricsSnapshot};
