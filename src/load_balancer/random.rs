//! Uniform random load balancing strategy.

use rand::Rng;

use crate::load_balancer::LoadBalancer;

/// Picks a healthy backend uniformly at random on every call.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(rand::thread_rng().gen_range(0..len))
    }
}
