//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → handed to each subsystem at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new backend list reconciled into the registry
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only backend membership is hot-reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AdminConfig, BackendConfig, BalancerConfig, HealthCheckConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, ProbeKind, ProxyConfig, RetryConfig, StrategyConfig, StrategyKind,
};
