//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (active.rs)
//!     → probe.rs (HTTP GET or TCP connect, one per backend, concurrent)
//!     → bounded by the configured timeout
//!     → registry mark_healthy / record_failure
//! ```
//!
//! # Design Decisions
//! - One success restores a backend; `unhealthy_threshold` consecutive
//!   failures take it out of rotation
//! - A cycle finishes before the next begins, so probes of the same backend
//!   never overlap
//! - The prober never touches call metrics

pub mod active;
pub mod probe;

pub use active::HealthProber;
pub use probe::{probe_for, HttpProbe, Probe, TcpProbe};
