//! Unified error type.

use std::fmt;
use std::sync::Arc;

/// The error type returned by kumi's fallible operations.
///
/// `Config` surfaces at registration or pipeline-build time, never at
/// request time. `Handler` is how a running handler signals failure; it
/// carries the status the response gets if no error handler claims the
/// request. `Io` surfaces infrastructure failures: binding to a port or
/// accepting a connection.
///
/// The type is `Clone` because a pending handler error is offered to every
/// error-variant handler mounted after the point of failure.
#[derive(Clone, Debug)]
pub enum Error {
    /// A registration spec or phase-order configuration was malformed.
    Config(String),
    /// A handler signaled failure while processing a request.
    Handler { status: u16, message: String },
    /// An I/O failure in the serving layer.
    Io(Arc<std::io::Error>),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// A handler failure with the given response status.
    ///
    /// ```rust
    /// use kumi::{Error, Status};
    /// Error::handler(Status::Unauthorized, "missing bearer token");
    /// ```
    pub fn handler(status: impl Into<u16>, message: impl Into<String>) -> Self {
        Self::Handler { status: status.into(), message: message.into() }
    }

    /// The response status sent when this error reaches the end of the
    /// pipeline unhandled.
    pub fn status(&self) -> u16 {
        match self {
            Self::Handler { status, .. } => *status,
            Self::Config(_) | Self::Io(_) => 500,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Handler { status, message } => write!(f, "handler: {status} {message}"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}
