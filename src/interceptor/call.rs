//! Per-call accounting.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::Stream;

use crate::error::NoHealthyBackend;
use crate::interceptor::classify::{ErrorClass, CANCELLED};
use crate::interceptor::stream::InstrumentedStream;
use crate::load_balancer::Balancer;
use crate::observability::metrics::{CallStatus, MetricsCollector};

/// Tracks one call from start to finish.
///
/// Creating the guard bumps `active_connections`. The outcome (status,
/// error type, duration) is recorded at most once, and the matching gauge
/// decrement happens exactly once, after the outcome. The two can be
/// separated: a stream records its failure at the first error but stays in
/// flight until it is drained or dropped. A guard dropped without an
/// outcome counts the call as cancelled.
#[derive(Debug)]
pub struct CallGuard {
    metrics: Arc<MetricsCollector>,
    method: String,
    started: Instant,
    recorded: bool,
    released: bool,
}

impl CallGuard {
    pub fn new(metrics: Arc<MetricsCollector>, method: impl Into<String>) -> Self {
        metrics.call_started();
        Self {
            metrics,
            method: method.into(),
            started: Instant::now(),
            recorded: false,
            released: false,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// True once the outcome has been recorded.
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    /// True once the outcome is recorded and the call left the gauge.
    pub fn is_finished(&self) -> bool {
        self.recorded && self.released
    }

    /// Record a successful completion and release the call.
    pub fn succeed(&mut self) {
        self.record_success();
        self.release();
    }

    /// Record a failure classified as `error_type` and release the call.
    pub fn fail(&mut self, error_type: Cow<'static, str>) {
        self.record_failure(error_type);
        self.release();
    }

    /// Record the outcome of `result` without consuming it.
    pub fn complete<T, E: ErrorClass>(&mut self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.succeed(),
            Err(e) => self.fail(e.error_type()),
        }
    }

    /// Record success without leaving the gauge. No-op once recorded.
    pub fn record_success(&mut self) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        self.metrics.record_request(&self.method, CallStatus::Ok, self.elapsed());
    }

    /// Record a failure without leaving the gauge. No-op once recorded.
    pub fn record_failure(&mut self, error_type: Cow<'static, str>) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        let duration = self.elapsed();
        tracing::debug!(method = %self.method, error_type = %error_type, ?duration, "Call failed");
        self.metrics.record_error(&self.method, error_type);
        self.metrics.record_request(&self.method, CallStatus::Error, duration);
    }

    /// Take the call out of `active_connections`. No-op once released.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.metrics.call_finished();
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if !self.recorded {
            self.record_failure(Cow::Borrowed(CANCELLED));
        }
        self.release();
    }
}

/// Wraps calls with latency, outcome and concurrency accounting.
///
/// Results and errors pass through untouched.
#[derive(Debug, Clone)]
pub struct CallInterceptor {
    metrics: Arc<MetricsCollector>,
}

impl CallInterceptor {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Start tracking a call by hand.
    pub fn start(&self, method: impl Into<String>) -> CallGuard {
        CallGuard::new(self.metrics.clone(), method)
    }

    /// Run a unary call under measurement.
    ///
    /// If the returned future is dropped before completion the call is
    /// recorded as cancelled.
    pub async fn unary<F, Fut, T, E>(&self, method: &str, call: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorClass,
    {
        let mut guard = self.start(method);
        let result = call().await;
        guard.complete(&result);
        result
    }

    /// Measure a streaming call. The call lasts until the stream ends, yields
    /// an error, or is dropped.
    pub fn streaming<S, T, E>(&self, method: &str, stream: S) -> InstrumentedStream<S>
    where
        S: Stream<Item = Result<T, E>>,
        E: ErrorClass,
    {
        InstrumentedStream::new(stream, self.start(method))
    }

    /// Run a unary call against a backend chosen by `balancer`.
    ///
    /// Selection happens inside the measured call, so an empty pool is
    /// counted as a failed call with `error_type = "NoHealthyBackend"`.
    pub async fn balanced<F, Fut, T, E>(&self, balancer: &Balancer, method: &str, call: F) -> Result<T, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorClass + From<NoHealthyBackend>,
    {
        self.unary(method, || async move {
            match balancer.select() {
                Ok(address) => {
                    tracing::trace!(method = %method, address = %address, "Backend selected");
                    call(address).await
                }
                Err(e) => Err(E::from(e)),
            }
        })
        .await
    }
}
