//! HTTPS-over-SPDY client layers
//!
//! This module hosts everything above the raw socket:
//!
//! - `uri` parses `https://host[:port]/path` targets
//! - `headers` holds SPDY name/value blocks in wire order
//! - `session` defines the `SessionIo` seam between the SPDY session and
//!   the transport, plus the readiness bookkeeping the I/O driver polls on
//! - `tls` negotiates the TLS channel and the SPDY version
//! - `spdy` implements framing, the session engine and the client call
//!
//! # Examples
//!
//! ```no_run
//! use spdy_fetch::http::Uri;
//!
//! let uri = Uri::parse("https://[::1]:8443/").unwrap();
//! assert_eq!(uri.host(), "::1");
//! assert_eq!(uri.port(), 8443);
//! assert_eq!(uri.path(), "/");
//! ```

pub mod headers;
pub mod session;
pub mod spdy;
pub mod tls;
pub mod uri;

pub use headers::Headers;
pub use session::{PollEvents, SessionIo, Transfer, WantIo};
pub use uri::Uri;

/// Result type for URI and header operations
pub type Result<T> = std::result::Result<T, Error>;

/// URI and header errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse_uri failed: scheme must be https: {0}")]
    InvalidScheme(String),

    #[error("parse_uri failed: missing host: {0}")]
    MissingHost(String),

    #[error("parse_uri failed: invalid port: {0}")]
    InvalidPort(String),

    #[error("parse_uri failed: {0}")]
    InvalidUri(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Scheme prefix accepted by the URI parser
pub const HTTPS_PREFIX: &str = "https://";
