//! SPDY client errors
//!
//! `Error` is the single failure type a `get` call returns. Lower layers
//! keep their own error enums and are wrapped here.

use super::frames::StatusCode;
use super::stream::StreamId;

/// SPDY client errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// URI or header error
    #[error(transparent)]
    Uri(#[from] crate::http::Error),

    /// Transport error (resolve, connect, socket options, poll)
    #[error(transparent)]
    Net(#[from] crate::net::Error),

    /// TLS error, including failed protocol negotiation
    #[error(transparent)]
    Tls(#[from] crate::http::tls::TlsError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error detected
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Header block compression error
    #[error("Header compression error: {0}")]
    Compression(String),

    /// Body decompression error
    #[error("Could not decompress response body: {0}")]
    Decompression(String),

    /// Invalid stream ID
    #[error("Invalid stream ID: {0}")]
    InvalidStreamId(StreamId),

    /// Control frame with a version we did not negotiate
    #[error("Unsupported SPDY version: {0}")]
    UnsupportedVersion(u16),

    /// Stream was reset
    #[error("Stream {stream_id} reset: {status}")]
    StreamReset { stream_id: StreamId, status: StatusCode },

    /// Server sent GOAWAY before the request completed
    #[error("Server is going away")]
    GoingAway,

    /// Connection closed before the request completed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Response body exceeded the configured limit
    #[error("Response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<flate2::CompressError> for Error {
    fn from(e: flate2::CompressError) -> Self {
        Error::Compression(e.to_string())
    }
}

impl From<flate2::DecompressError> for Error {
    fn from(e: flate2::DecompressError) -> Self {
        Error::Compression(e.to_string())
    }
}

/// Result type for SPDY operations
pub type Result<T> = std::result::Result<T, Error>;
