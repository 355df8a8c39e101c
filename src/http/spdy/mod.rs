//! SPDY/2 and SPDY/3 client implementation
//!
//! # Architecture
//!
//! The client is layered the same way on both protocol versions:
//!
//! - `frames` and `codec` turn typed frames into bytes and back, including
//!   the zlib-compressed name/value header blocks (`zlib`)
//! - `session` is the multiplexing engine: stream table, outbound queue,
//!   flow control and the inbound frame rules. It reports protocol events
//!   through the `SessionCallbacks` trait and moves bytes through a
//!   `SessionIo`, never touching the socket itself
//! - `engine` implements the callbacks for one GET request and fills the
//!   `Response` accumulator, decoding gzip bodies on the fly (`gzip`)
//! - `client` owns the connection and runs the poll-driven I/O loop
//!
//! # Examples
//!
//! ```no_run
//! use spdy_fetch::{ClientConfig, SpdyClient, SpdyVersion};
//!
//! let config = ClientConfig::builder()
//!     .protocols(vec![SpdyVersion::V3])
//!     .user_agent("example/1.0")
//!     .build()?;
//!
//! let response = SpdyClient::new(config).get("https://example.com/")?;
//! println!("{}", response.body_text());
//! # Ok::<(), spdy_fetch::Error>(())
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod flow_control;
pub mod frames;
pub mod gzip;
pub mod response;
pub mod session;
pub mod settings;
pub mod stream;
pub mod zlib;

pub use client::{get, SpdyClient};
pub use codec::FrameCodec;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, Result};
pub use frames::{Frame, FrameType, GoawayStatus, StatusCode};
pub use response::Response;
pub use session::{RequestToken, Session, SessionCallbacks, Submitter};
pub use stream::{StreamId, StreamState};

use std::fmt;

/// SPDY protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpdyVersion {
    V2,
    V3,
}

impl SpdyVersion {
    /// Version number as carried in control frame headers
    pub fn as_u16(self) -> u16 {
        match self {
            SpdyVersion::V2 => 2,
            SpdyVersion::V3 => 3,
        }
    }

    /// Create version from a control frame version field
    pub fn from_u16(version: u16) -> Option<Self> {
        match version {
            2 => Some(SpdyVersion::V2),
            3 => Some(SpdyVersion::V3),
            _ => None,
        }
    }

    /// Application protocol id used during TLS negotiation
    pub fn protocol_id(self) -> &'static str {
        match self {
            SpdyVersion::V2 => "spdy/2",
            SpdyVersion::V3 => "spdy/3",
        }
    }

    /// Map a negotiated protocol id back to a version
    pub fn from_protocol_id(id: &[u8]) -> Option<Self> {
        match id {
            b"spdy/2" => Some(SpdyVersion::V2),
            b"spdy/3" => Some(SpdyVersion::V3),
            _ => None,
        }
    }
}

impl fmt::Display for SpdyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.protocol_id())
    }
}

/// Control and data frame header size
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest frame payload (24-bit length)
pub const MAX_FRAME_LENGTH: usize = 0x00FF_FFFF;

/// Largest decompressed name/value block accepted from the peer
pub const MAX_HEADER_BLOCK_SIZE: usize = 64 * 1024;

/// Default per-stream window (SPDY/3)
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 64 * 1024;

/// Maximum stream ID value (2^31 - 1)
pub const MAX_STREAM_ID: u32 = 0x7FFF_FFFF;

/// Lowest (numerically largest) priority per version
pub fn lowest_priority(version: SpdyVersion) -> u8 {
    match version {
        SpdyVersion::V2 => 3,
        SpdyVersion::V3 => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ids() {
        assert_eq!(SpdyVersion::V2.as_u16(), 2);
        assert_eq!(SpdyVersion::from_u16(3), Some(SpdyVersion::V3));
        assert_eq!(SpdyVersion::from_u16(4), None);

        assert_eq!(SpdyVersion::V3.protocol_id(), "spdy/3");
        assert_eq!(SpdyVersion::from_protocol_id(b"spdy/2"), Some(SpdyVersion::V2));
        assert_eq!(SpdyVersion::from_protocol_id(b"h2"), None);
        assert_eq!(SpdyVersion::V2.to_string(), "spdy/2");
    }

    #[test]
    fn test_lowest_priority() {
        assert_eq!(lowest_priority(SpdyVersion::V2), 3);
        assert_eq!(lowest_priority(SpdyVersion::V3), 7);
    }
}
