//! TLS support for SPDY connections
//!
//! SPDY always runs over TLS, and the SPDY version is agreed during the TLS
//! handshake through application-protocol negotiation.
//!
//! # Architecture
//!
//! 1. `TlsConfig` defines TLS settings (versions, ALPN list, verification)
//! 2. `handshake` drives the client handshake on a non-blocking socket and
//!    maps the negotiated protocol to a `SpdyVersion`
//! 3. `TlsSession` implements the `SessionIo` trait for encrypted I/O
//!
//! The server side (`TlsConfig::server()` with the built-in certificate and
//! `TlsSession::accept`) exists for loopback test servers.
//!
//! # Examples
//!
//! ```no_run
//! use spdy_fetch::http::tls::{handshake, TlsConfig};
//! use spdy_fetch::net;
//!
//! let tls_config = TlsConfig::client()?
//!     .alpn(&["spdy/3", "spdy/2"])?
//!     .build()?;
//!
//! let tcp_stream = net::connect_to("example.com", 443, None)?;
//! net::make_non_block(&tcp_stream)?;
//! let tls_session = tls_config.connect(tcp_stream, "example.com")?;
//! let version = handshake::negotiated_version(tls_session.ssl())?;
//! println!("negotiated {}", version);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builtin_cert;
pub mod config;
pub mod handshake;
pub mod session;
pub mod vars;

pub use config::{ClientConfigBuilder, ServerConfigBuilder, TlsConfig, TlsError, TlsVersion};
pub use session::TlsSession;
pub use vars::TlsVars;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
