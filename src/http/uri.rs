//! `https://` URI parsing
//!
//! Splits `https://host[:port]/path` into the pieces a SPDY request needs.
//! Bracketed IPv6 literals are supported, the port defaults to 443 and the
//! path to `/`. Anything from `#` on is dropped.

use super::{Error, Result, DEFAULT_HTTPS_PORT, HTTPS_PREFIX};
use std::fmt;
use std::str::FromStr;

/// Parsed request target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    host: String,
    port: u16,
    path: String,
    hostport: String,
}

impl Uri {
    /// Parse an `https://` URI
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = match uri.strip_prefix(HTTPS_PREFIX) {
            Some(rest) if !rest.is_empty() => rest,
            _ => return Err(Error::InvalidScheme(uri.to_string())),
        };

        // `offset` indexes into `rest` just past the host
        let (host, mut offset) = if let Some(bracketed) = rest.strip_prefix('[') {
            match bracketed.find(']') {
                Some(end) => (&bracketed[..end], end + 2),
                None => return Err(Error::MissingHost(uri.to_string())),
            }
        } else {
            let end = rest.find([':', '/', '?', '#']).unwrap_or(rest.len());
            (&rest[..end], end)
        };

        if host.is_empty() {
            return Err(Error::MissingHost(uri.to_string()));
        }

        let mut port = DEFAULT_HTTPS_PORT;
        if rest[offset..].starts_with(':') {
            let digits_start = offset + 1;
            let digits_end = rest[digits_start..]
                .find(['/', '?', '#'])
                .map(|i| digits_start + i)
                .unwrap_or(rest.len());
            port = parse_port(&rest[digits_start..digits_end])
                .ok_or_else(|| Error::InvalidPort(uri.to_string()))?;
            offset = digits_end;
        }

        let hostport = rest[..offset].to_string();

        let tail = &rest[offset..];
        let path = match tail.find('#') {
            Some(i) => &tail[..i],
            None => tail,
        };
        let path = if path.is_empty() { "/" } else { path };

        Ok(Uri {
            host: host.to_string(),
            port,
            path: path.to_string(),
            hostport,
        })
    }

    /// Host without IPv6 brackets
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port (443 unless given)
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path including any query, never empty
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Authority as written in the URI, used for the `:host` header
    pub fn hostport(&self) -> &str {
        &self.hostport
    }
}

/// Digits only, 1..=65535
fn parse_port(digits: &str) -> Option<u16> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut port: u32 = 0;
    for b in digits.bytes() {
        port = port * 10 + u32::from(b - b'0');
        if port > u32::from(u16::MAX) {
            return None;
        }
    }
    if port == 0 {
        return None;
    }
    u16::try_from(port).ok()
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::parse(s)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", HTTPS_PREFIX, self.hostport, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let uri = Uri::parse("https://example.com/index.html").unwrap();
        assert_eq!(uri.host(), "example.com");
        assert_eq!(uri.port(), 443);
        assert_eq!(uri.path(), "/index.html");
        assert_eq!(uri.hostport(), "example.com");
    }

    #[test]
    fn test_default_port_equivalence() {
        let a = Uri::parse("https://example.com/a?b=c").unwrap();
        let b = Uri::parse("https://example.com:443/a?b=c").unwrap();
        assert_eq!(
            (a.host(), a.port(), a.path()),
            (b.host(), b.port(), b.path())
        );
        assert_eq!(b.hostport(), "example.com:443");
    }

    #[test]
    fn test_ipv6_literal() {
        let uri = Uri::parse("https://[::1]:8443/").unwrap();
        assert_eq!(uri.host(), "::1");
        assert_eq!(uri.port(), 8443);
        assert_eq!(uri.path(), "/");
        assert_eq!(uri.hostport(), "[::1]:8443");
    }

    #[test]
    fn test_ipv6_without_port() {
        let uri = Uri::parse("https://[2001:db8::1]/x").unwrap();
        assert_eq!(uri.host(), "2001:db8::1");
        assert_eq!(uri.port(), 443);
        assert_eq!(uri.hostport(), "[2001:db8::1]");
    }

    #[test]
    fn test_empty_path_defaults_to_root() {
        assert_eq!(Uri::parse("https://example.com").unwrap().path(), "/");
        assert_eq!(Uri::parse("https://example.com:8080").unwrap().path(), "/");
        assert_eq!(Uri::parse("https://example.com#frag").unwrap().path(), "/");
    }

    #[test]
    fn test_fragment_truncated() {
        let uri = Uri::parse("https://example.com/a/b?q=1#section").unwrap();
        assert_eq!(uri.path(), "/a/b?q=1");
    }

    #[test]
    fn test_wrong_scheme_rejected() {
        assert!(matches!(
            Uri::parse("http://example.com/"),
            Err(Error::InvalidScheme(_))
        ));
        assert!(matches!(Uri::parse("https://"), Err(Error::InvalidScheme(_))));
    }

    #[test]
    fn test_bad_ports_rejected() {
        for uri in [
            "https://example.com:0/",
            "https://example.com:65536/",
            "https://example.com:99999999999/",
            "https://example.com:80a/",
            "https://example.com:/",
        ] {
            assert!(
                matches!(Uri::parse(uri), Err(Error::InvalidPort(_))),
                "{uri} should be rejected"
            );
        }
        assert_eq!(Uri::parse("https://example.com:65535/").unwrap().port(), 65535);
    }

    #[test]
    fn test_missing_host_rejected() {
        assert!(matches!(Uri::parse("https:///path"), Err(Error::MissingHost(_))));
        assert!(matches!(Uri::parse("https://[]/"), Err(Error::MissingHost(_))));
        assert!(matches!(Uri::parse("https://[::1/"), Err(Error::MissingHost(_))));
    }

    #[test]
    fn test_display() {
        let uri: Uri = "https://example.com:8443/x#y".parse().unwrap();
        assert_eq!(uri.to_string(), "https://example.com:8443/x");
    }
}
