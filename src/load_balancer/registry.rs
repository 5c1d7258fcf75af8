//! Backend registry.
//!
//! # Responsibilities
//! - Own the set of known backends, one entry per address
//! - Apply health transitions reported by the prober
//! - Hand out point-in-time healthy snapshots to the balancer
//!
//! # Design Decisions
//! - A single `RwLock` guards the whole set; every critical section is a few
//!   field writes, and no caller holds it across I/O
//! - Insertion order is preserved so round-robin order is predictable
//! - Missing addresses are silent no-ops; nothing here can fail

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::load_balancer::backend::{Backend, BackendView, Transition};

/// The set of backends eligible for routing, plus their health.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: RwLock<Vec<Backend>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with `addresses`, all `Unknown`.
    pub fn with_backends<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new();
        for address in addresses {
            registry.add(address);
        }
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Backend>> {
        self.backends.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Backend>> {
        self.backends.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a backend. Returns false if it was already present.
    pub fn add(&self, address: impl Into<String>) -> bool {
        let address = address.into();
        let mut backends = self.write();
        if backends.iter().any(|b| b.address == address) {
            return false;
        }
        tracing::info!(address = %address, "Backend registered");
        backends.push(Backend::new(address));
        true
    }

    /// Deregister a backend. Returns false if it was not present.
    pub fn remove(&self, address: &str) -> bool {
        let mut backends = self.write();
        match backends.iter().position(|b| b.address == address) {
            Some(index) => {
                backends.remove(index);
                tracing::info!(address = %address, "Backend deregistered");
                true
            }
            None => false,
        }
    }

    /// Reconcile membership with an externally supplied address list.
    ///
    /// Addresses not yet known are added as `Unknown`; known addresses missing
    /// from `addresses` are removed. Surviving backends keep their health.
    pub fn sync(&self, addresses: &[String]) {
        let mut backends = self.write();
        backends.retain(|b| {
            let keep = addresses.contains(&b.address);
            if !keep {
                tracing::info!(address = %b.address, "Backend deregistered by sync");
            }
            keep
        });
        for address in addresses {
            if !backends.iter().any(|b| &b.address == address) {
                tracing::info!(address = %address, "Backend registered by sync");
                backends.push(Backend::new(address.clone()));
            }
        }
    }

    /// Record a successful probe: `Healthy`, failure count reset.
    pub fn mark_healthy(&self, address: &str) -> Option<Transition> {
        self.update(address, Backend::mark_success)
    }

    /// Force a backend `Unhealthy`, counting one more failure.
    pub fn mark_unhealthy(&self, address: &str) -> Option<Transition> {
        self.update(address, |b| b.mark_failure(1))
    }

    /// Record a failed probe; the backend turns `Unhealthy` only once
    /// `unhealthy_threshold` consecutive failures have accumulated.
    pub fn record_failure(&self, address: &str, unhealthy_threshold: u32) -> Option<Transition> {
        self.update(address, |b| b.mark_failure(unhealthy_threshold))
    }

    fn update<F>(&self, address: &str, f: F) -> Option<Transition>
    where
        F: FnOnce(&mut Backend) -> Option<Transition>,
    {
        let mut backends = self.write();
        backends.iter_mut().find(|b| b.address == address).and_then(f)
    }

    /// Addresses currently `Healthy`, in registration order.
    ///
    /// The result is advisory: a backend may fail right after this returns.
    pub fn healthy_snapshot(&self) -> Vec<String> {
        self.read()
            .iter()
            .filter(|b| b.is_healthy())
            .map(|b| b.address.clone())
            .collect()
    }

    /// Every registered address, in registration order.
    pub fn addresses(&self) -> Vec<String> {
        self.read().iter().map(|b| b.address.clone()).collect()
    }

    /// State of every backend, in registration order.
    pub fn all(&self) -> Vec<BackendView> {
        self.read().iter().map(Backend::view).collect()
    }

    /// State of one backend.
    pub fn get(&self, address: &str) -> Option<BackendView> {
        self.read().iter().find(|b| b.address == address).map(Backend::view)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.read().iter().any(|b| b.address == address)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::HealthState;

    #[test]
    fn test_add_is_idempotent() {
        let registry = BackendRegistry::new();
        assert!(registry.add("a:1"));
        assert!(!registry.add("a:1"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a:1").unwrap().health, HealthState::Unknown);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = BackendRegistry::with_backends(["a:1", "b:2"]);
        assert!(registry.remove("a:1"));
        assert!(!registry.remove("a:1"));
        assert_eq!(registry.addresses(), vec!["b:2".to_string()]);
    }

    #[test]
    fn test_missing_address_is_noop() {
        let registry = BackendRegistry::new();
        assert_eq!(registry.mark_healthy("ghost:1"), None);
        assert_eq!(registry.mark_unhealthy("ghost:1"), None);
        assert_eq!(registry.record_failure("ghost:1", 1), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_backends_are_not_selectable() {
        let registry = BackendRegistry::with_backends(["a:1", "b:2", "c:3"]);
        assert!(registry.healthy_snapshot().is_empty());

        registry.mark_healthy("b:2");
        assert_eq!(registry.healthy_snapshot(), vec!["b:2".to_string()]);
    }

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let registry = BackendRegistry::with_backends(["c:3", "a:1", "b:2"]);
        registry.mark_healthy("b:2");
        registry.mark_healthy("c:3");
        registry.mark_healthy("a:1");
        assert_eq!(registry.healthy_snapshot(), vec!["c:3", "a:1", "b:2"]);
    }

    #[test]
    fn test_snapshot_never_contains_latest_unhealthy() {
        let registry = BackendRegistry::with_backends(["a:1", "b:2"]);
        let ops: [(&str, bool); 8] = [
            ("a:1", true),
            ("b:2", true),
            ("a:1", false),
            ("b:2", false),
            ("b:2", true),
            ("a:1", true),
            ("a:1", false),
            ("b:2", true),
        ];

        for (address, healthy) in ops {
            if healthy {
                registry.mark_healthy(address);
            } else {
                registry.mark_unhealthy(address);
            }
            let snapshot = registry.healthy_snapshot();
            assert_eq!(snapshot.contains(&address.to_string()), healthy);
        }
    }

    #[test]
    fn test_threshold_failure_transition() {
        let registry = BackendRegistry::with_backends(["a:1"]);
        registry.mark_healthy("a:1");

        assert_eq!(registry.record_failure("a:1", 2), None);
        assert_eq!(registry.healthy_snapshot().len(), 1);

        let t = registry.record_failure("a:1", 2).unwrap();
        assert_eq!(t.to, HealthState::Unhealthy);
        assert!(registry.healthy_snapshot().is_empty());
        assert_eq!(registry.get("a:1").unwrap().consecutive_failures, 2);
    }

    #[test]
    fn test_sync_reconciles_membership() {
        let registry = BackendRegistry::with_backends(["a:1", "b:2"]);
        registry.mark_healthy("b:2");

        registry.sync(&["b:2".to_string(), "c:3".to_string()]);

        assert_eq!(registry.addresses(), vec!["b:2", "c:3"]);
        assert_eq!(registry.get("b:2").unwrap().health, HealthState::Healthy);
        assert_eq!(registry.get("c:3").unwrap().health, HealthState::Unknown);
    }
}
