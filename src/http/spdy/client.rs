//! SPDY client call
//!
//! One call owns one TCP connection, one TLS session and one SPDY session.
//! The I/O loop polls the socket for whatever the session and the TLS layer
//! currently need, then runs a receive-then-send cycle, until the session
//! wants neither direction.

use super::config::ClientConfig;
use super::engine::Engine;
use super::error::{Error, Result};
use super::response::Response;
use super::session::Session;
use crate::http::tls::{handshake, TlsConfig, TlsError, TlsSession};
use crate::http::{PollEvents, SessionIo, Uri};
use crate::net;
use log::{debug, trace};
use std::net::TcpStream;

/// Fetch `uri` with the default configuration
pub fn get(uri: &str) -> Result<Response> {
    SpdyClient::new(ClientConfig::default()).get(uri)
}

/// SPDY client
///
/// Holds configuration only; every call opens and tears down its own
/// connection.
#[derive(Debug, Clone, Default)]
pub struct SpdyClient {
    config: ClientConfig,
}

impl SpdyClient {
    /// Create a client
    pub fn new(config: ClientConfig) -> Self {
        SpdyClient { config }
    }

    /// Get configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Parse `uri` and fetch it
    ///
    /// A URI that is not `https://` fails before any network activity.
    pub fn get(&self, uri: &str) -> Result<Response> {
        let uri = Uri::parse(uri)?;
        self.fetch(&uri)
    }

    /// Fetch a parsed URI
    pub fn fetch(&self, uri: &Uri) -> Result<Response> {
        net::ignore_sigpipe();

        let tcp = net::connect_to(uri.host(), uri.port(), self.config.connect_timeout())?;
        net::make_non_block(&tcp)?;
        net::set_tcp_nodelay(&tcp)?;

        let tls_config = self.config.tls_config()?;
        let mut conn = Connection::open(tcp, &tls_config, uri.host(), &self.config)?;
        conn.engine.submit(
            &mut conn.session,
            uri,
            self.config.user_agent(),
            self.config.priority(),
        )?;

        conn.run()?;
        conn.finish()
    }
}

/// Per-call connection state
///
/// Fields drop in declaration order: the SPDY session, then the engine and
/// its inflaters, then the TLS session, which shuts down and closes the
/// socket.
struct Connection {
    session: Session,
    engine: Engine,
    tls: TlsSession,
}

impl Connection {
    fn open(tcp: TcpStream, tls_config: &TlsConfig, host: &str, config: &ClientConfig) -> Result<Self> {
        let tls = TlsSession::connect(tcp, tls_config, host)?;

        let version = handshake::negotiated_version(tls.ssl())?;
        if !config.protocols().contains(&version) {
            return Err(TlsError::ProtocolNegotiation(format!(
                "Server selected {}, which was not offered",
                version
            ))
            .into());
        }
        debug!("Using {}", version);

        let session = Session::new(version, config.recv_buffer_size())?;
        let mut engine = Engine::new(version, config.max_body_size());
        engine.response_mut().set_tls_vars(tls.vars().clone());

        Ok(Connection {
            session,
            engine,
            tls,
        })
    }

    /// Drive the session until it wants neither reading nor writing
    fn run(&mut self) -> Result<()> {
        let fd = self.tls.raw_fd();

        loop {
            let want_read = self.session.want_read();
            let want_write = self.session.want_write();
            if !want_read && !want_write {
                return Ok(());
            }

            let Some(events) = PollEvents::from_wants(want_read, want_write, self.tls.want_io())
            else {
                return Ok(());
            };
            trace!(
                "Polling read={} write={}",
                events.wants_read(),
                events.wants_write()
            );

            let readiness = net::wait_ready(fd, events)?;
            if readiness.is_ready() {
                self.session.recv(&mut self.tls, &mut self.engine)?;
                self.session.send(&mut self.tls, &mut self.engine)?;
            } else if readiness.hangup {
                return Err(Error::Net(net::Error::Hangup));
            }
        }
    }

    fn finish(self) -> Result<Response> {
        let Connection {
            session,
            engine,
            tls,
        } = self;

        let result = engine.finish(&session);
        drop(session);
        drop(tls);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_scheme_rejected() {
        let result = get("http://example.com/");
        assert!(matches!(
            result,
            Err(Error::Uri(crate::http::Error::InvalidScheme(_)))
        ));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let client = SpdyClient::default();
        assert!(matches!(
            client.get("https://example.com:0/"),
            Err(Error::Uri(crate::http::Error::InvalidPort(_)))
        ));
        assert!(matches!(
            client.get("https://example.com:https/"),
            Err(Error::Uri(_))
        ));
    }
}
