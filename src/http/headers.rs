//! SPDY name/value header blocks
//!
//! SPDY header names are lowercase on the wire and each name appears once
//! per block; repeated values are joined with a NUL byte. `Headers` keeps
//! pairs in wire order so a decoded block re-encodes byte for byte.

use super::{Error, Result};
use std::fmt;

/// Upper bound on pairs in one block
pub const MAX_HEADERS: usize = 256;

/// Ordered name/value block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    /// Create a new empty block
    pub fn new() -> Self {
        Headers {
            headers: Vec::new(),
        }
    }

    /// Append a pair
    ///
    /// Names are lowercased. A name already present gets the new value
    /// appended after a NUL separator rather than a second entry.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();

        if let Some((_, existing)) = self.headers.iter_mut().find(|(n, _)| *n == name) {
            existing.push('\0');
            existing.push_str(&value);
            return;
        }

        if self.headers.len() >= MAX_HEADERS {
            return;
        }

        self.headers.push((name, value));
    }

    /// Set a pair, replacing any existing value in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();

        if let Some(i) = self.headers.iter().position(|(n, _)| *n == name) {
            self.headers[i].1 = value;
        } else if self.headers.len() < MAX_HEADERS {
            self.headers.push((name, value));
        }
    }

    /// Get the value for a name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get the NUL-separated values for a name
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.get(name)
            .map(|v| v.split('\0').collect())
            .unwrap_or_default()
    }

    /// Check if a name exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a name, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self
            .headers
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(self.headers.remove(pos).1)
    }

    /// Rename keys through `map`, keeping order and values
    pub fn map_names(&self, map: impl Fn(&str) -> &str) -> Headers {
        Headers {
            headers: self
                .headers
                .iter()
                .map(|(n, v)| (map(n).to_string(), v.clone()))
                .collect(),
        }
    }

    /// Get the number of pairs
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no pairs
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over pairs in wire order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Reject blocks a peer must not send: empty names, uppercase names,
    /// duplicated names
    pub fn validate(&self) -> Result<()> {
        for (i, (name, _)) in self.headers.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::InvalidHeader("Empty header name".to_string()));
            }
            if name.bytes().any(|b| b.is_ascii_uppercase()) {
                return Err(Error::InvalidHeader(format!("Uppercase header name: {}", name)));
            }
            if self.headers[..i].iter().any(|(n, _)| n == name) {
                return Err(Error::InvalidHeader(format!("Duplicate header: {}", name)));
            }
        }
        Ok(())
    }

    /// Build a block from raw pairs without normalising
    ///
    /// Used by the frame decoder so `validate` sees what the peer sent.
    pub(crate) fn from_raw(headers: Vec<(String, String)>) -> Self {
        Headers { headers }
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            writeln!(f, "{}: {}", name, value.replace('\0', ", "))?;
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut headers = Headers::new();
        headers.insert(":status", "200 OK");
        headers.insert("Content-Type", "text/html");

        assert_eq!(headers.get(":status"), Some("200 OK"));
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("missing"), None);
    }

    #[test]
    fn test_names_lowercased() {
        let mut headers = Headers::new();
        headers.insert("Content-Encoding", "gzip");

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("content-encoding", "gzip")]);
        assert_eq!(headers.get("CONTENT-ENCODING"), Some("gzip"));
    }

    #[test]
    fn test_repeated_name_joins_with_nul() {
        let mut headers = Headers::new();
        headers.insert("set-cookie", "a=1");
        headers.insert("set-cookie", "b=2");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("set-cookie"), Some("a=1\0b=2"));
        assert_eq!(headers.get_all("set-cookie"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.insert("a", "1");
        headers.insert("b", "2");
        headers.set("a", "3");

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_set_appends_new_name() {
        let mut headers = Headers::new();
        headers.insert("a", "1");
        headers.set("Content-Encoding", "gzip");

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("a", "1"), ("content-encoding", "gzip")]);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut headers: Headers = [("x-remove", "v1"), ("x-keep", "v2")].into_iter().collect();

        assert_eq!(headers.remove("X-Remove").as_deref(), Some("v1"));
        assert_eq!(headers.remove("x-remove"), None);
        assert!(headers.contains("x-keep"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_map_names_keeps_order() {
        let headers: Headers = [(":method", "GET"), ("accept", "*/*")].into_iter().collect();
        let mapped = headers.map_names(|n| if n == ":method" { "method" } else { n });

        let collected: Vec<_> = mapped.iter().collect();
        assert_eq!(collected, vec![("method", "GET"), ("accept", "*/*")]);
    }

    #[test]
    fn test_validate() {
        let ok: Headers = [(":status", "200 OK")].into_iter().collect();
        assert!(ok.validate().is_ok());

        let upper = Headers::from_raw(vec![("Status".into(), "200".into())]);
        assert!(upper.validate().is_err());

        let empty_name = Headers::from_raw(vec![(String::new(), "x".into())]);
        assert!(empty_name.validate().is_err());

        let dup = Headers::from_raw(vec![("a".into(), "1".into()), ("a".into(), "2".into())]);
        assert!(dup.validate().is_err());
    }

    #[test]
    fn test_max_headers() {
        let mut headers = Headers::new();
        for i in 0..MAX_HEADERS + 10 {
            headers.insert(format!("header-{}", i), "value");
        }
        assert_eq!(headers.len(), MAX_HEADERS);
    }
}
