//! TLS configuration
//!
//! This module provides TLS configuration builders for both client and server.

use openssl::pkey::PKey;
use openssl::ssl::{
    SslContext, SslContextBuilder, SslMethod, SslMode, SslOptions, SslVerifyMode,
};
use openssl::x509::X509;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Parse TLS version from string (case-insensitive)
    pub fn parse(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }

    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(self) -> openssl::ssl::SslVersion {
        use openssl::ssl::SslVersion;
        match self {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Get version as string
    pub fn as_str(self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Net(#[from] crate::net::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("{0}")]
    ProtocolNegotiation(String),
}

/// TLS configuration (immutable after building)
#[derive(Clone)]
pub struct TlsConfig {
    pub(crate) ctx: SslContext,
    pub(crate) is_server: bool,
    pub(crate) servername: Option<String>,
    pub(crate) sni: bool,
    pub(crate) verify_peer: bool,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("is_server", &self.is_server)
            .field("servername", &self.servername)
            .field("sni", &self.sni)
            .field("verify_peer", &self.verify_peer)
            .finish_non_exhaustive()
    }
}

impl TlsConfig {
    /// Create a new client configuration builder
    pub fn client() -> Result<ClientConfigBuilder, TlsError> {
        ClientConfigBuilder::new()
    }

    /// Create a new server configuration builder
    pub fn server() -> Result<ServerConfigBuilder, TlsError> {
        ServerConfigBuilder::new()
    }

    /// Check whether this is a server configuration
    pub fn is_server(&self) -> bool {
        self.is_server
    }

    /// Check whether peer verification is enabled
    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    /// Run the client handshake on a connected non-blocking socket
    ///
    /// `host` is used for SNI (unless an explicit servername was set) and for
    /// certificate name checks when verification is on.
    pub fn connect(&self, stream: TcpStream, host: &str) -> Result<super::TlsSession, TlsError> {
        if self.is_server {
            return Err(TlsError::InvalidConfig(
                "Cannot use server config for client connection".to_string(),
            ));
        }
        super::session::TlsSession::connect(stream, self, host)
    }

    /// Accept a client connection (server-side, blocking socket)
    pub fn accept(&self, stream: TcpStream) -> Result<super::TlsSession, TlsError> {
        if !self.is_server {
            return Err(TlsError::InvalidConfig(
                "Cannot use client config for server accept".to_string(),
            ));
        }
        super::session::TlsSession::accept(stream, self)
    }
}

/// Encode protocol names as an ALPN wire list (length-prefixed)
pub fn encode_protocol_list(protocols: &[&str]) -> Result<Vec<u8>, TlsError> {
    let mut wire = Vec::new();
    for proto in protocols {
        let len = u8::try_from(proto.len())
            .ok()
            .filter(|len| *len > 0)
            .ok_or_else(|| TlsError::InvalidConfig(format!("Invalid protocol name: {:?}", proto)))?;
        wire.push(len);
        wire.extend_from_slice(proto.as_bytes());
    }
    Ok(wire)
}

fn new_context(method: SslMethod) -> Result<SslContextBuilder, TlsError> {
    let mut ctx_builder = SslContextBuilder::new(method)?;
    ctx_builder.set_options(SslOptions::ALL | SslOptions::NO_SSLV2 | SslOptions::NO_SSLV3);
    ctx_builder.set_mode(SslMode::AUTO_RETRY | SslMode::RELEASE_BUFFERS);
    Ok(ctx_builder)
}

fn load_pem(ctx_builder: &mut SslContextBuilder, pem: &[u8]) -> Result<(), TlsError> {
    let cert = X509::from_pem(pem)
        .map_err(|e| TlsError::Certificate(format!("Failed to load certificate: {}", e)))?;
    ctx_builder.set_certificate(&cert)?;

    let key = PKey::private_key_from_pem(pem)
        .map_err(|e| TlsError::Certificate(format!("Failed to load private key: {}", e)))?;
    ctx_builder.set_private_key(&key)?;

    Ok(())
}

/// Client configuration builder
pub struct ClientConfigBuilder {
    ctx_builder: SslContextBuilder,
    servername: Option<String>,
    sni: bool,
    verify_peer: bool,
    ca_file: Option<PathBuf>,
}

impl ClientConfigBuilder {
    fn new() -> Result<Self, TlsError> {
        let mut ctx_builder = new_context(SslMethod::tls_client())?;

        // Default: don't verify peer
        ctx_builder.set_verify(SslVerifyMode::NONE);

        Ok(ClientConfigBuilder {
            ctx_builder,
            servername: None,
            sni: true,
            verify_peer: false,
            ca_file: None,
        })
    }

    /// Set the lowest acceptable TLS version
    pub fn min_version(mut self, min: TlsVersion) -> Result<Self, TlsError> {
        self.ctx_builder
            .set_min_proto_version(Some(min.to_openssl_version()))?;
        Ok(self)
    }

    /// Set application protocols to advertise, most preferred first
    pub fn alpn(mut self, protocols: &[&str]) -> Result<Self, TlsError> {
        let wire = encode_protocol_list(protocols)?;
        self.ctx_builder.set_alpn_protos(&wire)?;
        Ok(self)
    }

    /// Set an explicit SNI servername
    pub fn servername(mut self, name: impl Into<String>) -> Self {
        self.servername = Some(name.into());
        self
    }

    /// Enable/disable sending SNI
    pub fn sni(mut self, enabled: bool) -> Self {
        self.sni = enabled;
        self
    }

    /// Enable/disable peer certificate verification
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        if verify {
            self.ctx_builder.set_verify(SslVerifyMode::PEER);
        } else {
            self.ctx_builder.set_verify(SslVerifyMode::NONE);
        }
        self
    }

    /// Trust the CA certificates in a PEM file
    pub fn ca_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TlsError::InvalidConfig(format!(
                "CA file not found: {}",
                path.display()
            )));
        }
        self.ctx_builder.set_ca_file(path)?;
        self.ca_file = Some(path.to_path_buf());
        Ok(self)
    }

    /// Build the TLS configuration
    pub fn build(mut self) -> Result<TlsConfig, TlsError> {
        if self.verify_peer && self.ca_file.is_none() {
            self.ctx_builder.set_default_verify_paths()?;
        }

        Ok(TlsConfig {
            ctx: self.ctx_builder.build(),
            is_server: false,
            servername: self.servername,
            sni: self.sni,
            verify_peer: self.verify_peer,
        })
    }
}

/// Server configuration builder
///
/// Used by loopback test servers.
pub struct ServerConfigBuilder {
    ctx_builder: SslContextBuilder,
}

impl ServerConfigBuilder {
    fn new() -> Result<Self, TlsError> {
        Ok(ServerConfigBuilder {
            ctx_builder: new_context(SslMethod::tls_server())?,
        })
    }

    /// Set application protocols the server accepts
    ///
    /// The first protocol in the client's list that the server also supports
    /// is selected; with no overlap no protocol is negotiated.
    pub fn alpn(mut self, protocols: &[&str]) -> Result<Self, TlsError> {
        let supported = encode_protocol_list(protocols)?;

        self.ctx_builder.set_alpn_select_callback(move |_ssl, client_protos| {
            super::handshake::select_next_protocol(client_protos, &supported)
                .ok_or(openssl::ssl::AlpnError::NOACK)
        });

        Ok(self)
    }

    /// Build the TLS configuration with the built-in certificate
    pub fn build(mut self) -> Result<TlsConfig, TlsError> {
        load_pem(
            &mut self.ctx_builder,
            super::builtin_cert::BUILTIN_CERT.as_bytes(),
        )?;

        Ok(TlsConfig {
            ctx: self.ctx_builder.build(),
            is_server: true,
            servername: None,
            sni: false,
            verify_peer: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_tls_version_parsing() {
        assert_eq!(TlsVersion::parse("TLSv1.2").unwrap(), TlsVersion::Tls12);
        assert_eq!(TlsVersion::parse("tlsv1.3").unwrap(), TlsVersion::Tls13);
        assert_eq!(TlsVersion::parse("TLS1.0").unwrap(), TlsVersion::Tls10);
        assert!(TlsVersion::parse("SSLv3").is_err());
        assert!(TlsVersion::parse("invalid").is_err());
    }

    #[test]
    fn test_client_config_builder() {
        let config = TlsConfig::client()
            .unwrap()
            .min_version(TlsVersion::Tls12)
            .unwrap()
            .servername("example.com")
            .verify_peer(false)
            .alpn(&["spdy/3", "spdy/2"])
            .unwrap()
            .build()
            .unwrap();

        assert!(!config.is_server());
        assert_eq!(config.servername, Some("example.com".to_string()));
        assert!(!config.verify_peer());
        assert!(config.sni);
    }

    #[test]
    fn test_server_config_builder() {
        // Server with built-in cert
        let config = TlsConfig::server()
            .unwrap()
            .alpn(&["spdy/3"])
            .unwrap()
            .build()
            .unwrap();

        assert!(config.is_server());
    }

    #[test]
    fn test_encode_protocol_list() {
        assert_eq!(
            encode_protocol_list(&["spdy/3", "spdy/2"]).unwrap(),
            b"\x06spdy/3\x06spdy/2".to_vec()
        );
        assert!(encode_protocol_list(&[""]).is_err());
        let long = "x".repeat(256);
        assert!(encode_protocol_list(&[long.as_str()]).is_err());
    }

    #[test]
    fn test_missing_ca_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = TlsConfig::client()
            .unwrap()
            .ca_file(dir.path().join("missing.pem"));
        assert!(matches!(result, Err(TlsError::InvalidConfig(_))));
    }

    #[test]
    fn test_ca_file_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(super::super::builtin_cert::BUILTIN_CERT.as_bytes())
            .unwrap();

        let config = TlsConfig::client()
            .unwrap()
            .verify_peer(true)
            .ca_file(file.path())
            .unwrap()
            .build()
            .unwrap();

        assert!(config.verify_peer());
    }

    #[test]
    fn test_wrong_role_rejected() {
        let server = TlsConfig::server().unwrap().build().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        assert!(matches!(
            server.connect(stream, "localhost"),
            Err(TlsError::InvalidConfig(_))
        ));
    }
}
