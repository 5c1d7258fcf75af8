//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → prober, watcher loop and metrics upkeep stop; proxy and HTTP server drain
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans out to every long-running task
//! - Triggering is idempotent

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{shutdown_on_signal, wait_for_signal};
