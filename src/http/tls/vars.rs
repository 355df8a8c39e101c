//! Negotiated TLS parameters
//!
//! Populated after the handshake and attached to the `Response` so callers
//! can see what the connection actually used.

use openssl::nid::Nid;
use openssl::ssl::{NameType, SslRef};
use std::fmt;

/// TLS parameters available after the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsVars {
    /// Negotiated TLS version (e.g., "TLSv1.3")
    pub version: String,

    /// Negotiated cipher suite
    pub cipher: String,

    /// SNI servername sent by the client
    pub servername: Option<String>,

    /// Negotiated application protocol
    pub alpn: Option<String>,

    /// Common name of the peer certificate
    pub peer_subject: Option<String>,

    /// Whether handshake or I/O failed
    pub failed: bool,
}

impl TlsVars {
    /// Capture the parameters of an SSL connection
    pub fn from_ssl(ssl: &SslRef, failed: bool) -> Self {
        if failed {
            return TlsVars::default();
        }

        let peer_subject = ssl.peer_certificate().and_then(|cert| {
            cert.subject_name()
                .entries_by_nid(Nid::COMMONNAME)
                .next()
                .and_then(|entry| entry.data().as_utf8().ok())
                .map(|cn| cn.to_string())
        });

        TlsVars {
            version: ssl.version_str().to_string(),
            cipher: ssl
                .current_cipher()
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "<undef>".to_string()),
            servername: ssl.servername(NameType::HOST_NAME).map(|s| s.to_string()),
            alpn: ssl
                .selected_alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).to_string()),
            peer_subject,
            failed,
        }
    }
}

impl Default for TlsVars {
    fn default() -> Self {
        TlsVars {
            version: "<undef>".to_string(),
            cipher: "<undef>".to_string(),
            servername: None,
            alpn: None,
            peer_subject: None,
            failed: true,
        }
    }
}

impl fmt::Display for TlsVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} alpn={}",
            self.version,
            self.cipher,
            self.alpn.as_deref().unwrap_or("<undef>")
        )
    }
}
