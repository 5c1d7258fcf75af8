//! Error types shared across the balancer.
//!
//! # Taxonomy
//! - `NoHealthyBackend`: the balancer has nothing eligible; surfaced to callers
//! - `ProbeFailure`: absorbed by the health prober, never seen by registry users
//! - call failures: whatever the wrapped handler returns, passed through untouched

use thiserror::Error;

use crate::config::loader::ConfigError;

/// Result alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Returned by the balancer when the healthy snapshot is empty.
///
/// Kept as a standalone type so callers can fold it into their own error enum
/// with a `From` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no healthy backend available")]
pub struct NoHealthyBackend;

/// Outcome of a failed liveness probe.
#[derive(Debug, Error)]
pub enum ProbeFailure {
    /// The probe did not complete within its deadline.
    #[error("probe timed out")]
    Timeout,

    /// Could not reach the backend at all.
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    /// The backend answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The probe request could not be built or sent.
    #[error("probe request failed: {0}")]
    Request(String),
}

/// Top-level error for the balancer runtime.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    NoHealthyBackend(#[from] NoHealthyBackend),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
