//! Non-blocking client handshake and protocol selection
//!
//! The socket is already non-blocking when the handshake starts, so the
//! handshake is driven by hand: each would-block waits for the direction
//! OpenSSL asked for, then resumes.

use super::config::TlsError;
use crate::http::session::PollEvents;
use crate::http::spdy::SpdyVersion;
use crate::net;
use log::{debug, trace};
use openssl::ssl::{ErrorCode, HandshakeError, Ssl, SslRef, SslStream};
use std::net::TcpStream;
use std::os::fd::AsRawFd;

/// Message used when no SPDY version could be agreed
pub const NO_SPDY_PROTOCOL: &str = "Server did not advertise spdy/2 or spdy/3 protocol.";

/// Pick the first protocol in `advertised` that also appears in `supported`
///
/// Both lists use the length-prefixed wire format. Truncated entries end the
/// scan. The returned slice borrows from `advertised`.
pub fn select_next_protocol<'a>(advertised: &'a [u8], supported: &[u8]) -> Option<&'a [u8]> {
    let ours: Vec<&[u8]> = protocol_entries(supported).collect();
    protocol_entries(advertised).find(|proto| ours.contains(proto))
}

fn protocol_entries(wire: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        let len = *wire.get(pos)? as usize;
        let entry = wire.get(pos + 1..pos + 1 + len)?;
        pos += 1 + len;
        Some(entry)
    })
}

/// Drive a client handshake to completion on a non-blocking socket
pub fn connect(ssl: Ssl, stream: TcpStream) -> Result<SslStream<TcpStream>, TlsError> {
    let mut attempt = ssl.connect(stream);
    loop {
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(HandshakeError::SetupFailure(e)) => return Err(TlsError::OpenSsl(e)),
            Err(HandshakeError::Failure(mid)) => {
                let verify = mid.ssl().verify_result();
                let message = if verify.as_raw() != 0 {
                    format!("{} (certificate verify: {})", mid.error(), verify.error_string())
                } else {
                    mid.error().to_string()
                };
                return Err(TlsError::HandshakeFailed(message));
            }
            Err(HandshakeError::WouldBlock(mid)) => {
                let events = match mid.error().code() {
                    ErrorCode::WANT_WRITE => PollEvents::Write,
                    _ => PollEvents::Read,
                };
                trace!("TLS handshake would block, waiting for {:?}", events);
                let readiness = net::wait_ready(mid.get_ref().as_raw_fd(), events)?;
                if readiness.hangup && !readiness.readable {
                    return Err(TlsError::HandshakeFailed(
                        "connection closed during handshake".to_string(),
                    ));
                }
                attempt = mid.handshake();
            }
        }
    }
}

/// Map the negotiated application protocol to a SPDY version
pub fn negotiated_version(ssl: &SslRef) -> Result<SpdyVersion, TlsError> {
    let selected = ssl.selected_alpn_protocol();
    debug!(
        "negotiated protocol: {}",
        selected
            .map(String::from_utf8_lossy)
            .unwrap_or_else(|| "<none>".into())
    );
    selected
        .and_then(SpdyVersion::from_protocol_id)
        .ok_or_else(|| TlsError::ProtocolNegotiation(NO_SPDY_PROTOCOL.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_first_advertised_match() {
        let advertised = b"\x08http/1.1\x06spdy/2\x06spdy/3";
        let supported = b"\x06spdy/3\x06spdy/2";
        assert_eq!(
            select_next_protocol(advertised, supported),
            Some(&b"spdy/2"[..])
        );
    }

    #[test]
    fn test_select_no_overlap() {
        assert_eq!(
            select_next_protocol(b"\x08http/1.1\x02h2", b"\x06spdy/3\x06spdy/2"),
            None
        );
        assert_eq!(select_next_protocol(b"", b"\x06spdy/3"), None);
    }

    #[test]
    fn test_select_truncated_list() {
        // Second entry claims 9 bytes but only 3 remain
        let advertised = b"\x02h2\x09spd";
        assert_eq!(select_next_protocol(advertised, b"\x06spdy/3"), None);
        assert_eq!(select_next_protocol(advertised, b"\x02h2"), Some(&b"h2"[..]));
    }
}
