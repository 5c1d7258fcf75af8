//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Call lifecycles (interceptor):
//!     → metrics.rs (counters, gauge, histogram in an owned recorder)
//!     → rendered on GET /metrics
//!
//! All subsystems:
//!     → logging.rs (structured log events via tracing)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Each collector owns its recorder; nothing is installed globally, so
//!   several collectors can coexist in one process
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use self::metrics::{CallStatus, MetricsCollector, MetricsSnapshot};
