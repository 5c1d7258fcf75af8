//! Error classification for metrics labels.

use std::borrow::Cow;

use crate::error::{Error, NoHealthyBackend};

/// `error_type` recorded when a call is dropped before completing.
pub const CANCELLED: &str = "Cancelled";

/// `error_type` recorded when selection found no healthy backend.
pub const NO_HEALTHY_BACKEND: &str = "NoHealthyBackend";

/// Maps an error to the `error_type` label it is counted under.
///
/// Labels should be low-cardinality: a variant or kind name, never a
/// message that embeds request data.
pub trait ErrorClass {
    fn error_type(&self) -> Cow<'static, str>;
}

impl ErrorClass for NoHealthyBackend {
    fn error_type(&self) -> Cow<'static, str> {
        Cow::Borrowed(NO_HEALTHY_BACKEND)
    }
}

impl ErrorClass for Error {
    fn error_type(&self) -> Cow<'static, str> {
        match self {
            Error::NoHealthyBackend(e) => e.error_type(),
            Error::Io(e) => e.error_type(),
            Error::Config(_) => Cow::Borrowed("Config"),
        }
    }
}

impl ErrorClass for std::io::Error {
    fn error_type(&self) -> Cow<'static, str> {
        Cow::Owned(format!("{:?}", self.kind()))
    }
}

impl ErrorClass for tokio::time::error::Elapsed {
    fn error_type(&self) -> Cow<'static, str> {
        Cow::Borrowed("DeadlineExceeded")
    }
}

impl ErrorClass for tower::BoxError {
    fn error_type(&self) -> Cow<'static, str> {
        if let Some(e) = self.downcast_ref::<Error>() {
            e.error_type()
        } else if let Some(e) = self.downcast_ref::<NoHealthyBackend>() {
            e.error_type()
        } else if let Some(e) = self.downcast_ref::<std::io::Error>() {
            e.error_type()
        } else if self.is::<tokio::time::error::Elapsed>() {
            Cow::Borrowed("DeadlineExceeded")
        } else {
            Cow::Borrowed("Unknown")
        }
    }
}
