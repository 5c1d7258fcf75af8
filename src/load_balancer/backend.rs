//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend replica
//! - Track health state (Unknown/Healthy/Unhealthy)
//! - Apply probe outcomes to the consecutive-failure counter

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Health State enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A health state change caused by a probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: HealthState,
    pub to: HealthState,
}

/// A single backend replica as stored in the registry.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Opaque network endpoint (host:port).
    pub address: String,
    /// Current health state.
    pub health: HealthState,
    /// Consecutive failed probes since the last success.
    pub consecutive_failures: u32,
    /// When the most recent probe outcome was applied.
    pub last_checked_at: Option<SystemTime>,
}

impl Backend {
    /// Create a new backend in the `Unknown` state.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            health: HealthState::Unknown,
            consecutive_failures: 0,
            last_checked_at: None,
        }
    }

    /// Return true if the backend may receive traffic.
    pub fn is_healthy(&self) -> bool {
        self.health == HealthState::Healthy
    }

    /// Report a successful probe. A single success restores `Healthy`.
    pub fn mark_success(&mut self) -> Option<Transition> {
        self.consecutive_failures = 0;
        self.last_checked_at = Some(SystemTime::now());
        self.set_health(HealthState::Healthy)
    }

    /// Report a failed probe.
    ///
    /// The backend only becomes `Unhealthy` once `unhealthy_threshold`
    /// consecutive failures have been seen.
    pub fn mark_failure(&mut self, unhealthy_threshold: u32) -> Option<Transition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_checked_at = Some(SystemTime::now());

        if self.consecutive_failures >= unhealthy_threshold.max(1) {
            self.set_health(HealthState::Unhealthy)
        } else {
            None
        }
    }

    fn set_health(&mut self, to: HealthState) -> Option<Transition> {
        let from = self.health;
        if from == to {
            return None;
        }
        self.health = to;
        Some(Transition { from, to })
    }

    /// Copy of this backend suitable for handing out of the registry.
    pub fn view(&self) -> BackendView {
        BackendView {
            address: self.address.clone(),
            health: self.health,
            consecutive_failures: self.consecutive_failures,
            last_checked_secs: self
                .last_checked_at
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs()),
        }
    }
}

/// Read-only copy of a backend's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendView {
    pub address: String,
    pub health: HealthState,
    pub consecutive_failures: u32,
    /// Seconds since the Unix epoch of the last probe, if any.
    pub last_checked_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_backend_is_unknown() {
        let b = Backend::new("10.0.0.1:50051");
        assert_eq!(b.health, HealthState::Unknown);
        assert!(!b.is_healthy());
        assert!(b.last_checked_at.is_none());
    }

    #[test]
    fn test_failures_below_threshold_keep_state() {
        let mut b = Backend::new("a:1");
        b.mark_success();

        assert_eq!(b.mark_failure(3), None);
        assert_eq!(b.mark_failure(3), None);
        assert_eq!(b.health, HealthState::Healthy);
        assert_eq!(b.consecutive_failures, 2);

        let t = b.mark_failure(3).unwrap();
        assert_eq!(t.from, HealthState::Healthy);
        assert_eq!(t.to, HealthState::Unhealthy);
    }

    #[test]
    fn test_success_resets_counter() {
        let mut b = Backend::new("a:1");
        b.mark_failure(2);
        b.mark_success();
        assert_eq!(b.consecutive_failures, 0);

        assert_eq!(b.mark_failure(2), None);
        assert_eq!(b.health, HealthState::Healthy);
    }

    #[test]
    fn test_recovery_from_unhealthy() {
        let mut b = Backend::new("a:1");
        b.mark_failure(1);
        assert_eq!(b.health, HealthState::Unhealthy);

        let t = b.mark_success().unwrap();
        assert_eq!(t.from, HealthState::Unhealthy);
        assert_eq!(t.to, HealthState::Healthy);
        assert!(b.view().last_checked_secs.is_some());
    }
}
