//! Streaming call instrumentation.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_util::Stream;

use crate::interceptor::call::CallGuard;
use crate::interceptor::classify::ErrorClass;

/// A stream whose whole lifetime is measured as one call.
///
/// The outcome is an error at the first `Err` item, success when the inner
/// stream is drained without one, and cancelled if it is dropped first.
/// The call stays in `active_connections` until the stream is drained or
/// dropped, including while items after an error are still being read.
/// Items are forwarded unchanged.
#[derive(Debug)]
pub struct InstrumentedStream<S> {
    inner: Pin<Box<S>>,
    guard: CallGuard,
}

impl<S> InstrumentedStream<S> {
    pub(crate) fn new(inner: S, guard: CallGuard) -> Self {
        Self {
            inner: Box::pin(inner),
            guard,
        }
    }

    /// True once the stream has ended and left the gauge.
    pub fn is_finished(&self) -> bool {
        self.guard.is_finished()
    }
}

impl<S, T, E> Stream for InstrumentedStream<S>
where
    S: Stream<Item = Result<T, E>>,
    E: ErrorClass,
{
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let item = ready!(this.inner.as_mut().poll_next(cx));
        match &item {
            Some(Ok(_)) => {}
            Some(Err(e)) => this.guard.record_failure(e.error_type()),
            // Drained: success unless an error was already recorded.
            None => this.guard.succeed(),
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
