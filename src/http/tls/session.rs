//! TLS session transport
//!
//! This module implements the `SessionIo` trait for TLS connections. Reads
//! and writes never block: OpenSSL's WANT_READ / WANT_WRITE become
//! `Transfer::WouldBlock`, and the wanted direction is kept for the next
//! poll.

use super::config::{TlsConfig, TlsError};
use super::handshake;
use super::vars::TlsVars;
use crate::http::session::{SessionIo, Transfer, WantIo};
use log::{debug, trace};
use openssl::ssl::{ErrorCode, Ssl, SslStream};
use std::io::{self, Read, Write};
use std::net::{IpAddr, Shutdown, TcpStream};
use std::os::fd::{AsRawFd, RawFd};

/// TLS session over a TCP socket
pub struct TlsSession {
    stream: SslStream<TcpStream>,
    vars: TlsVars,
    want_io: WantIo,
    failed: bool,
    closed: bool,
}

impl TlsSession {
    /// Create a client TLS connection on a non-blocking socket
    pub fn connect(tcp_stream: TcpStream, config: &TlsConfig, host: &str) -> Result<Self, TlsError> {
        let mut ssl = Ssl::new(&config.ctx)?;

        let ip = host.parse::<IpAddr>().ok();

        if config.sni {
            match (&config.servername, ip) {
                (Some(servername), _) => ssl.set_hostname(servername)?,
                (None, None) => ssl.set_hostname(host)?,
                // SNI is not defined for IP literals
                (None, Some(_)) => {}
            }
        }

        if config.verify_peer {
            let param = ssl.param_mut();
            match ip {
                Some(ip) => param.set_ip(ip)?,
                None => param.set_host(host)?,
            }
        }

        let ssl_stream = handshake::connect(ssl, tcp_stream)?;
        let vars = TlsVars::from_ssl(ssl_stream.ssl(), false);
        debug!("TLS handshake complete: {}", vars);

        Ok(TlsSession {
            stream: ssl_stream,
            vars,
            want_io: WantIo::None,
            failed: false,
            closed: false,
        })
    }

    /// Accept a client connection (blocking socket)
    pub fn accept(tcp_stream: TcpStream, config: &TlsConfig) -> Result<Self, TlsError> {
        let ssl = Ssl::new(&config.ctx)?;

        let ssl_stream = ssl
            .accept(tcp_stream)
            .map_err(|e| TlsError::HandshakeFailed(format!("Accept failed: {}", e)))?;

        let vars = TlsVars::from_ssl(ssl_stream.ssl(), false);

        Ok(TlsSession {
            stream: ssl_stream,
            vars,
            want_io: WantIo::None,
            failed: false,
            closed: false,
        })
    }

    /// Get negotiated TLS parameters
    pub fn vars(&self) -> &TlsVars {
        &self.vars
    }

    /// Get the SSL handle
    pub fn ssl(&self) -> &openssl::ssl::SslRef {
        self.stream.ssl()
    }

    /// Raw descriptor for readiness polling
    pub fn raw_fd(&self) -> RawFd {
        self.stream.get_ref().as_raw_fd()
    }

    fn fail(&mut self) {
        self.failed = true;
        self.vars.failed = true;
    }

    /// Translate an OpenSSL result into a transfer outcome
    fn transfer(&mut self, result: Result<usize, openssl::ssl::Error>) -> io::Result<Transfer> {
        match result {
            Ok(0) => Ok(Transfer::Eof),
            Ok(n) => {
                self.want_io = WantIo::None;
                Ok(Transfer::Done(n))
            }
            Err(e) => match e.code() {
                ErrorCode::WANT_READ => {
                    self.want_io = WantIo::Read;
                    trace!("TLS would block on read");
                    Ok(Transfer::WouldBlock)
                }
                ErrorCode::WANT_WRITE => {
                    self.want_io = WantIo::Write;
                    trace!("TLS would block on write");
                    Ok(Transfer::WouldBlock)
                }
                ErrorCode::ZERO_RETURN => Ok(Transfer::Eof),
                ErrorCode::SYSCALL if e.io_error().is_none() => Ok(Transfer::Eof),
                _ => {
                    self.fail();
                    Err(e
                        .into_io_error()
                        .unwrap_or_else(|e| io::Error::new(io::ErrorKind::Other, e.to_string())))
                }
            },
        }
    }

    /// Send close_notify and shut down the write side of the socket
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Best effort; a non-blocking peer may not be ready for the alert
        if !self.failed {
            let _ = self.stream.shutdown();
        }

        match self.stream.get_mut().shutdown(Shutdown::Write) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

impl SessionIo for TlsSession {
    fn send(&mut self, buf: &[u8]) -> io::Result<Transfer> {
        if buf.is_empty() {
            return Ok(Transfer::Done(0));
        }
        let result = self.stream.ssl_write(buf);
        self.transfer(result)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Transfer> {
        if buf.is_empty() {
            return Ok(Transfer::Done(0));
        }
        let result = self.stream.ssl_read(buf);
        self.transfer(result)
    }

    fn want_io(&self) -> WantIo {
        self.want_io
    }
}

impl Read for TlsSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).map_err(|e| {
            self.fail();
            e
        })
    }
}

impl Write for TlsSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf).map_err(|e| {
            self.fail();
            e
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Drop for TlsSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net;
    use std::net::TcpListener;
    use std::thread;

    fn server_config(protocols: &[&str]) -> TlsConfig {
        TlsConfig::server()
            .unwrap()
            .alpn(protocols)
            .unwrap()
            .build()
            .unwrap()
    }

    fn client_config(protocols: &[&str]) -> TlsConfig {
        TlsConfig::client()
            .unwrap()
            .alpn(protocols)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_nonblocking_handshake_and_transfer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server_config = server_config(&["spdy/3"]);

        let server_handle = thread::spawn(move || {
            let (tcp_stream, _) = listener.accept().unwrap();
            let mut tls_session = server_config.accept(tcp_stream).unwrap();

            let mut buf = [0u8; 5];
            tls_session.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"Hello");
            tls_session.write_all(b"World").unwrap();
            tls_session.flush().unwrap();
            tls_session.vars().alpn.clone()
        });

        let tcp_stream = TcpStream::connect(addr).unwrap();
        net::make_non_block(&tcp_stream).unwrap();
        let mut tls_session = client_config(&["spdy/3", "spdy/2"])
            .connect(tcp_stream, "localhost")
            .unwrap();

        assert!(!tls_session.vars().failed);
        assert_eq!(tls_session.vars().alpn.as_deref(), Some("spdy/3"));
        assert_eq!(tls_session.vars().peer_subject.as_deref(), Some("example.com"));
        assert_eq!(
            handshake::negotiated_version(tls_session.ssl()).unwrap(),
            crate::http::spdy::SpdyVersion::V3
        );

        let mut sent = 0;
        while sent < 5 {
            match tls_session.send(&b"Hello"[sent..]).unwrap() {
                Transfer::Done(n) => sent += n,
                Transfer::WouldBlock => {
                    net::wait_ready(tls_session.raw_fd(), crate::http::PollEvents::Write).unwrap();
                }
                Transfer::Eof => panic!("unexpected eof"),
            }
        }

        let mut buf = [0u8; 16];
        let mut received = Vec::new();
        while received.len() < 5 {
            match tls_session.recv(&mut buf).unwrap() {
                Transfer::Done(n) => received.extend_from_slice(&buf[..n]),
                Transfer::WouldBlock => {
                    assert_eq!(tls_session.want_io(), WantIo::Read);
                    net::wait_ready(tls_session.raw_fd(), crate::http::PollEvents::Read).unwrap();
                }
                Transfer::Eof => panic!("unexpected eof"),
            }
        }
        assert_eq!(received, b"World");

        let server_alpn = server_handle.join().unwrap();
        assert_eq!(server_alpn.as_deref(), Some("spdy/3"));
    }

    #[test]
    fn test_no_common_protocol() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server_config = server_config(&["http/1.1"]);

        let server_handle = thread::spawn(move || {
            let (tcp_stream, _) = listener.accept().unwrap();
            // Handshake completes without ALPN; the client then gives up
            let _ = server_config.accept(tcp_stream);
        });

        let tcp_stream = TcpStream::connect(addr).unwrap();
        net::make_non_block(&tcp_stream).unwrap();
        let tls_session = client_config(&["spdy/3", "spdy/2"])
            .connect(tcp_stream, "127.0.0.1")
            .unwrap();

        let err = handshake::negotiated_version(tls_session.ssl()).unwrap_err();
        assert!(matches!(err, TlsError::ProtocolNegotiation(_)));
        assert_eq!(err.to_string(), handshake::NO_SPDY_PROTOCOL);

        drop(tls_session);
        server_handle.join().unwrap();
    }
}
