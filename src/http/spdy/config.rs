//! Client configuration

use super::error::{Error, Result};
use super::{lowest_priority, SpdyVersion};
use crate::http::tls::{TlsConfig, TlsVersion};
use std::path::PathBuf;
use std::time::Duration;

/// Default cap on the decoded body (16 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Default number of bytes requested per TLS read
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 16 * 1024;

/// Default user-agent header
pub const DEFAULT_USER_AGENT: &str = concat!("spdy-fetch/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`SpdyClient`](super::SpdyClient)
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    user_agent: String,
    max_body_size: Option<usize>,
    protocols: Vec<SpdyVersion>,
    verify_peer: bool,
    ca_file: Option<PathBuf>,
    sni: bool,
    min_tls_version: Option<TlsVersion>,
    connect_timeout: Option<Duration>,
    recv_buffer_size: usize,
    priority: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_size: Some(DEFAULT_MAX_BODY_SIZE),
            protocols: vec![SpdyVersion::V3, SpdyVersion::V2],
            verify_peer: false,
            ca_file: None,
            sni: true,
            min_tls_version: None,
            connect_timeout: None,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            priority: 0,
        }
    }
}

impl ClientConfig {
    /// Start from the defaults
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig::default(),
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn max_body_size(&self) -> Option<usize> {
        self.max_body_size
    }

    /// Protocols advertised during negotiation, most preferred first
    pub fn protocols(&self) -> &[SpdyVersion] {
        &self.protocols
    }

    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn recv_buffer_size(&self) -> usize {
        self.recv_buffer_size
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Derive the TLS client configuration
    pub fn tls_config(&self) -> Result<TlsConfig> {
        let protocols: Vec<&str> = self.protocols.iter().map(|p| p.protocol_id()).collect();

        let mut builder = TlsConfig::client()?
            .alpn(&protocols)?
            .sni(self.sni)
            .verify_peer(self.verify_peer);
        if let Some(version) = self.min_tls_version {
            builder = builder.min_version(version)?;
        }
        if let Some(ca_file) = &self.ca_file {
            builder = builder.ca_file(ca_file)?;
        }

        Ok(builder.build()?)
    }

    fn validate(&self) -> Result<()> {
        if self.protocols.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one SPDY version must be enabled".to_string(),
            ));
        }
        if self.recv_buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "Receive buffer size must be greater than zero".to_string(),
            ));
        }
        // Must be valid whichever version gets negotiated
        let lowest = lowest_priority(SpdyVersion::V2);
        if self.priority > lowest {
            return Err(Error::InvalidConfig(format!(
                "Priority {} out of range 0..={}",
                self.priority, lowest
            )));
        }
        if self.user_agent.is_empty() {
            return Err(Error::InvalidConfig("User agent must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the user-agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Cap the decoded body; `None` removes the cap
    pub fn max_body_size(mut self, limit: Option<usize>) -> Self {
        self.config.max_body_size = limit;
        self
    }

    /// Set the versions to advertise, most preferred first
    pub fn protocols(mut self, protocols: Vec<SpdyVersion>) -> Self {
        self.config.protocols = protocols;
        self
    }

    /// Enable/disable peer certificate and hostname verification
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.config.verify_peer = verify;
        self
    }

    /// Trust the CA certificates in a PEM file
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ca_file = Some(path.into());
        self
    }

    /// Enable/disable SNI
    pub fn sni(mut self, enabled: bool) -> Self {
        self.config.sni = enabled;
        self
    }

    /// Set the lowest acceptable TLS version
    pub fn min_tls_version(mut self, version: TlsVersion) -> Self {
        self.config.min_tls_version = Some(version);
        self
    }

    /// Bound the TCP connect per address
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Set the number of bytes requested per TLS read
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// Set the SYN_STREAM priority (0 is highest)
    pub fn priority(mut self, priority: u8) -> Self {
        self.config.priority = priority;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.user_agent().starts_with("spdy-fetch/"));
        assert_eq!(config.max_body_size(), Some(DEFAULT_MAX_BODY_SIZE));
        assert_eq!(config.protocols(), &[SpdyVersion::V3, SpdyVersion::V2]);
        assert!(!config.verify_peer());
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.recv_buffer_size(), DEFAULT_RECV_BUFFER_SIZE);
        assert_eq!(config.priority(), 0);
        assert_eq!(ClientConfig::builder().build().unwrap(), config);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .user_agent("test/1.0")
            .max_body_size(None)
            .protocols(vec![SpdyVersion::V2])
            .connect_timeout(Duration::from_secs(5))
            .recv_buffer_size(512)
            .priority(3)
            .build()
            .unwrap();

        assert_eq!(config.user_agent(), "test/1.0");
        assert_eq!(config.max_body_size(), None);
        assert_eq!(config.protocols(), &[SpdyVersion::V2]);
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.recv_buffer_size(), 512);
        assert_eq!(config.priority(), 3);
    }

    #[test]
    fn test_invalid_values() {
        assert!(ClientConfig::builder().protocols(vec![]).build().is_err());
        assert!(ClientConfig::builder().recv_buffer_size(0).build().is_err());
        assert!(ClientConfig::builder().priority(4).build().is_err());
        assert!(ClientConfig::builder().user_agent("").build().is_err());
    }

    #[test]
    fn test_tls_config() {
        let tls = ClientConfig::default().tls_config().unwrap();
        assert!(!tls.is_server());
        assert!(!tls.verify_peer());

        let tls = ClientConfig::builder()
            .verify_peer(true)
            .min_tls_version(TlsVersion::Tls12)
            .build()
            .unwrap()
            .tls_config()
            .unwrap();
        assert!(tls.verify_peer());
    }

    #[test]
    fn test_tls_config_ca_file() {
        let mut ca = tempfile::NamedTempFile::new().unwrap();
        ca.write_all(crate::http::tls::builtin_cert::BUILTIN_CERT.as_bytes())
            .unwrap();
        ca.flush().unwrap();

        let config = ClientConfig::builder()
            .verify_peer(true)
            .ca_file(ca.path())
            .build()
            .unwrap();
        assert!(config.tls_config().is_ok());

        let config = ClientConfig::builder()
            .ca_file("/nonexistent/ca.pem")
            .build()
            .unwrap();
        assert!(matches!(config.tls_config(), Err(Error::Tls(_))));
    }
}
