//! spdy-fetch - single-request SPDY client over TLS
//!
//! This crate performs one HTTPS GET over SPDY/2 or SPDY/3 and returns the
//! aggregated response: negotiated protocol version, the request headers that
//! actually left the wire, the reply headers, and the (gzip-decoded) body.
//!
//! ```no_run
//! let response = spdy_fetch::get("https://example.com/index.html")?;
//! println!("{:?}", response.syn_reply());
//! assert_eq!(response.body_length(), response.body().len());
//! # Ok::<(), spdy_fetch::Error>(())
//! ```

pub mod http;
pub mod net;

pub use http::spdy::client::{get, SpdyClient};
pub use http::spdy::config::{ClientConfig, ClientConfigBuilder};
pub use http::spdy::error::{Error, Result};
pub use http::spdy::response::Response;
pub use http::spdy::SpdyVersion;
