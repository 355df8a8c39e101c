//! Response accumulator
//!
//! Filled incrementally by the engine callbacks and handed to the caller
//! once the I/O loop ends. Fields appear in `keys()` in the order they were
//! first set.

use super::stream::StreamId;
use super::SpdyVersion;
use crate::http::tls::TlsVars;
use crate::http::Headers;
use std::borrow::Cow;

pub const SPDY_PROTO_VERSION: &str = "spdy_proto_version";
pub const STREAM_ID: &str = "stream_id";
pub const SYN_STREAM: &str = "syn_stream";
pub const SYN_REPLY: &str = "syn_reply";
pub const RECEIVE_BYTES: &str = "receive_bytes";
pub const BODY: &str = "body";
pub const BODY_LENGTH: &str = "body_length";

/// Result of one SPDY GET
#[derive(Debug, Clone, Default)]
pub struct Response {
    keys: Vec<&'static str>,
    spdy_proto_version: Option<SpdyVersion>,
    stream_id: Option<StreamId>,
    syn_stream: Option<Headers>,
    syn_reply: Option<Headers>,
    receive_bytes: Option<usize>,
    body: Vec<u8>,
    tls: Option<TlsVars>,
}

impl Response {
    /// Create an empty response
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, key: &'static str) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    /// Record the negotiated version
    pub fn set_spdy_proto_version(&mut self, version: SpdyVersion) {
        self.touch(SPDY_PROTO_VERSION);
        self.spdy_proto_version = Some(version);
    }

    /// Record the stream id; later calls are ignored
    ///
    /// Returns whether this call set it.
    pub fn set_stream_id(&mut self, stream_id: StreamId) -> bool {
        if self.stream_id.is_some() {
            return false;
        }
        self.touch(STREAM_ID);
        self.stream_id = Some(stream_id);
        true
    }

    /// Record the request headers that were sent
    pub fn set_syn_stream(&mut self, headers: Headers) {
        self.touch(SYN_STREAM);
        self.syn_stream = Some(headers);
    }

    /// Replace the reply header snapshot
    pub fn set_syn_reply(&mut self, headers: Headers) {
        self.touch(SYN_REPLY);
        self.syn_reply = Some(headers);
    }

    /// Record the size of the last DATA payload
    pub fn set_receive_bytes(&mut self, n: usize) {
        self.touch(RECEIVE_BYTES);
        self.receive_bytes = Some(n);
    }

    /// Append decoded body bytes
    pub fn append_body(&mut self, data: &[u8]) {
        self.touch(BODY);
        self.touch(BODY_LENGTH);
        self.body.extend_from_slice(data);
    }

    /// Attach negotiated TLS parameters
    pub fn set_tls_vars(&mut self, vars: TlsVars) {
        self.tls = Some(vars);
    }

    /// Field names in the order they were first set
    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }

    /// Negotiated SPDY version number (2 or 3)
    pub fn spdy_proto_version(&self) -> Option<u16> {
        self.spdy_proto_version.map(SpdyVersion::as_u16)
    }

    /// Negotiated SPDY version
    pub fn version(&self) -> Option<SpdyVersion> {
        self.spdy_proto_version
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        self.stream_id
    }

    /// Request headers as sent
    pub fn syn_stream(&self) -> Option<&Headers> {
        self.syn_stream.as_ref()
    }

    /// Reply headers, from the last SYN_REPLY or HEADERS frame
    pub fn syn_reply(&self) -> Option<&Headers> {
        self.syn_reply.as_ref()
    }

    /// Size of the last DATA payload received
    pub fn receive_bytes(&self) -> Option<usize> {
        self.receive_bytes
    }

    /// Body, gzip-decoded when the reply said so
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, replacing invalid UTF-8
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn body_length(&self) -> usize {
        self.body.len()
    }

    /// Status line from the reply, e.g. "200 OK"
    pub fn status(&self) -> Option<&str> {
        self.syn_reply.as_ref()?.get(":status")
    }

    /// TLS parameters of the connection
    pub fn tls_vars(&self) -> Option<&TlsVars> {
        self.tls.as_ref()
    }

    /// Take the body, dropping everything else
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}
