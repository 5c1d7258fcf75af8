//! Call interception subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound or outbound call
//!     → call.rs (CallGuard: start time, active_connections + 1)
//!     → handler runs (unary future, stream, or tower service)
//!     → classify.rs (error → error_type label, on failure)
//!     → metrics collector (request_count, error_count, duration)
//!     → guard released (active_connections - 1), on every exit path
//! ```
//!
//! # Design Decisions
//! - Results and errors are returned exactly as the handler produced them
//! - RAII guard gives the `finally` semantics, cancellation included
//! - Three shapes share the guard: closures (call.rs), streams
//!   (stream.rs), and tower services (layer.rs)

pub mod call;
pub mod classify;
pub mod layer;
pub mod stream;

pub use call::{CallGuard, CallInterceptor};
pub use classify::{ErrorClass, CANCELLED, NO_HEALTHY_BACKEND};
pub use layer::{CallName, MetricsLayer, MetricsService};
pub use stream::InstrumentedStream;
