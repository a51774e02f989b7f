use std::time::Duration;
use thiserror::Error;

/// Uniform error definition for every query operation.
///
/// None of these are retried internally, retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum QueryErr {
    /// The server address could not be resolved.
    #[error("Failed to resolve server address: {0}")]
    ResolveErr(String),
    /// Binding or connecting the local UDP socket failed.
    #[error("Failed to dial UDP connection: {0}")]
    DialErr(std::io::Error),
    /// An operation was attempted before [crate::QueryClient::connect].
    #[error("No connection, call QueryClient::connect first")]
    NotConnected,
    /// Nothing was received before the read deadline.
    #[error("Timeout of {0:?} exceeded when reading from server")]
    Timeout(Duration),
    /// Wrong packet type byte or an echoed session id that differs from ours.
    #[error("{0}")]
    MalformedHeader(String),
    /// The challenge token is absent or not a decimal integer.
    #[error("{0}")]
    MalformedChallenge(String),
    /// Missing delimited field or truncated buffer.
    #[error("{0}")]
    MalformedResponse(String),
    /// Unintended errors occur when processing input data.
    #[error("{0}")]
    DataErr(String),
    /// Handling errors that occur during sockets.
    #[error("{0}")]
    IoErr(#[from] std::io::Error),
}
