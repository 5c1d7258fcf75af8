//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Call needs a target
//!     → registry.rs (healthy snapshot, point in time)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (shared atomic cursor)
//!         - random.rs (uniform pick)
//!     → Return backend address or NoHealthyBackend
//! ```
//!
//! # Design Decisions
//! - Balancer never mutates backends; the prober owns health
//! - Strategies only see the snapshot length, so they cannot pick a
//!   backend that was not healthy at snapshot time
//! - No retries here; retry policy belongs to the caller

pub mod backend;
pub mod random;
pub mod registry;
pub mod round_robin;

use std::sync::Arc;

use crate::config::StrategyKind;
use crate::error::NoHealthyBackend;
use crate::load_balancer::random::Random;
use crate::load_balancer::registry::BackendRegistry;
use crate::load_balancer::round_robin::RoundRobin;

pub use backend::{Backend, BackendView, HealthState, Transition};

/// A backend selection algorithm.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick an index into a snapshot of `len` healthy backends.
    /// Returns `None` when `len` is zero.
    fn next_index(&self, len: usize) -> Option<usize>;
}

/// Build the strategy named in configuration.
pub fn strategy_for(kind: StrategyKind) -> Box<dyn LoadBalancer> {
    match kind {
        StrategyKind::RoundRobin => Box::new(RoundRobin::new()),
        StrategyKind::Random => Box::new(Random::new()),
    }
}

/// Selects a healthy backend for each call.
#[derive(Debug)]
pub struct Balancer {
    registry: Arc<BackendRegistry>,
    strategy: Box<dyn LoadBalancer>,
}

impl Balancer {
    pub fn new(registry: Arc<BackendRegistry>, strategy: Box<dyn LoadBalancer>) -> Self {
        Self { registry, strategy }
    }

    /// Balancer using round-robin selection.
    pub fn round_robin(registry: Arc<BackendRegistry>) -> Self {
        Self::new(registry, Box::new(RoundRobin::new()))
    }

    /// Pick one address from the current healthy snapshot.
    pub fn select(&self) -> Result<String, NoHealthyBackend> {
        let mut healthy = self.registry.healthy_snapshot();
        match self.strategy.next_index(healthy.len()) {
            Some(index) => Ok(healthy.swap_remove(index)),
            None => {
                tracing::debug!(
                    registered = self.registry.len(),
                    "No healthy backends available"
                );
                Err(NoHealthyBackend)
            }
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }
}
