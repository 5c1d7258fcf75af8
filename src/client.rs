//! Caller-side balanced calls with retry.
//!
//! # Responsibilities
//! - Select a backend, run the call, record it (via the interceptor)
//! - Retry failed calls on a freshly selected backend with backoff
//!
//! # Design Decisions
//! - Every attempt is its own measured call
//! - `NoHealthyBackend` is returned at once; only the prober can refill
//!   the pool, and it runs on its own interval
//! - The final error is the last attempt's error, unchanged

use std::future::Future;
use std::sync::Arc;

use crate::error::NoHealthyBackend;
use crate::interceptor::{CallInterceptor, ErrorClass, NO_HEALTHY_BACKEND};
use crate::load_balancer::Balancer;
use crate::resilience::RetryPolicy;

#[derive(Debug, Clone)]
pub struct BalancedClient {
    balancer: Arc<Balancer>,
    interceptor: CallInterceptor,
    retry: RetryPolicy,
}

impl BalancedClient {
    pub fn new(balancer: Arc<Balancer>, interceptor: CallInterceptor, retry: RetryPolicy) -> Self {
        Self {
            balancer,
            interceptor,
            retry,
        }
    }

    pub fn balancer(&self) -> &Arc<Balancer> {
        &self.balancer
    }

    pub fn interceptor(&self) -> &CallInterceptor {
        &self.interceptor
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run `call` against a selected backend, retrying per the policy.
    ///
    /// `call` receives the selected address and may be invoked once per
    /// attempt.
    pub async fn call<F, Fut, T, E>(&self, method: &str, mut call: F) -> Result<T, E>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorClass + From<NoHealthyBackend>,
    {
        let mut attempt = 1;
        loop {
            let result = self
                .interceptor
                .balanced(&self.balancer, method, &mut call)
                .await;

            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let error_type = error.error_type();
            if error_type == NO_HEALTHY_BACKEND || !self.retry.should_retry(attempt) {
                return Err(error);
            }

            let delay = self.retry.delay_after(attempt);
            tracing::debug!(
                method = %method,
                attempt,
                error_type = %error_type,
                delay_ms = delay.as_millis() as u64,
                "Retrying call on next backend"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
