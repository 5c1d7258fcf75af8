//! Tower middleware for server-side call measurement.
//!
//! # Responsibilities
//! - Wrap any `tower::Service` so each request is measured as one call
//! - Name calls after the request (the URI path for HTTP requests, which
//!   is `/package.Service/Method` for gRPC)
//!
//! # Design Decisions
//! - Only `Err` results from the inner service count as failures; the
//!   response itself is passed back unchanged
//! - The guard lives inside the response future, so dropping the future
//!   records a cancellation

use std::borrow::Cow;
use std::task::{Context, Poll};

use axum::http::Request;
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::interceptor::call::CallInterceptor;
use crate::interceptor::classify::ErrorClass;

/// Extracts the method name a request is counted under.
pub trait CallName {
    fn call_name(&self) -> Cow<'_, str>;
}

impl<B> CallName for Request<B> {
    fn call_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.uri().path())
    }
}

/// Layer that applies [`MetricsService`].
#[derive(Debug, Clone)]
pub struct MetricsLayer {
    interceptor: CallInterceptor,
}

impl MetricsLayer {
    pub fn new(interceptor: CallInterceptor) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

/// Service wrapper recording every call into the metrics collector.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
    interceptor: CallInterceptor,
}

impl<S, Req> Service<Req> for MetricsService<S>
where
    S: Service<Req>,
    S::Error: ErrorClass,
    S::Future: Send + 'static,
    Req: CallName,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        let mut guard = self.interceptor.start(request.call_name().into_owned());
        let response = self.inner.call(request);
        Box::pin(async move {
            let result = response.await;
            guard.complete(&result);
            result
        })
    }
}
