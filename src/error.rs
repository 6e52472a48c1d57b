//! Unified error type.

use thiserror::Error;

/// The error type returned by greenlight's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values built with [`crate::responses`], not
/// as `Error`s. A panicking handler is not an `Error` either: the
/// [`recover_panic`](crate::middleware::recover_panic) boundary turns it into
/// a 500 response. This type surfaces infrastructure failures only.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    InvalidAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}
