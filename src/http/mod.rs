//! HTTP surface of the balancer.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, TraceLayer)
//!     → GET /metrics   → MetricsCollector::render
//!     → GET /health    → registry counts
//!     → /admin/*       → admin handlers (Bearer key on mutations)
//!
//! Proxy listener
//!     → proxy.rs (any path) → BalancedClient → selected backend
//! ```

pub mod proxy;
pub mod server;

pub use proxy::{ForwardError, ProxyServer};
pub use server::{AppState, HttpServer};
