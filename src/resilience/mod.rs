//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Balanced call fails:
//!     → retries.rs (attempt budget left?)
//!     → backoff.rs (exponential delay with jitter)
//!     → next attempt selects a backend again
//! ```
//!
//! # Design Decisions
//! - Retries live with the caller, never inside the balancer
//! - An empty healthy pool is never retried; waiting will not fix it
//!   faster than the next probe cycle

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
