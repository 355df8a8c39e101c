//! Loopback SPDY server for integration tests
//!
//! Accepts one TLS connection with the built-in certificate, negotiates
//! the given protocols and hands a frame-level connection to the test's
//! handler on a background thread.

#![allow(dead_code)]

use spdy_fetch::http::spdy::frames::{DataFrame, SynReplyFrame};
use spdy_fetch::http::spdy::{Frame, FrameCodec, SpdyVersion, StreamId};
use spdy_fetch::http::tls::{handshake, TlsConfig, TlsSession};
use spdy_fetch::http::Headers;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

/// Server end of one connection
pub struct ServerConn {
    tls: TlsSession,
    codec: Option<FrameCodec>,
    buf: Vec<u8>,
}

impl ServerConn {
    /// Negotiated version, if the client agreed on one
    pub fn version(&self) -> Option<SpdyVersion> {
        self.codec.as_ref().map(|c| c.version())
    }

    fn codec(&mut self) -> &mut FrameCodec {
        self.codec.as_mut().expect("no SPDY version negotiated")
    }

    /// Read the next frame; `None` once the client closed
    pub fn read_frame(&mut self) -> Option<Frame> {
        loop {
            let buf = std::mem::take(&mut self.buf);
            let decoded = self.codec().decode(&buf).expect("client sent a bad frame");
            self.buf = buf;
            if let Some((frame, used)) = decoded {
                self.buf.drain(..used);
                return Some(frame);
            }

            let mut chunk = [0u8; 4096];
            match self.tls.read(&mut chunk) {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    /// Read frames until one matches
    pub fn expect_frame(&mut self, pred: impl Fn(&Frame) -> bool) -> Frame {
        loop {
            let frame = self.read_frame().expect("connection closed");
            if pred(&frame) {
                return frame;
            }
        }
    }

    /// Read every remaining frame until the client closes
    pub fn drain(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.read_frame() {
            frames.push(frame);
        }
        frames
    }

    pub fn write_frame(&mut self, frame: &Frame) {
        let bytes = self.codec().encode(frame).expect("encode failed");
        self.tls.write_all(&bytes).expect("write failed");
    }

    /// Send a SYN_REPLY with a status and extra headers
    pub fn reply(&mut self, stream_id: StreamId, status: &str, extra: &[(&str, &str)], fin: bool) {
        let mut headers: Headers = [(":status", status), (":version", "HTTP/1.1")]
            .into_iter()
            .collect();
        for (name, value) in extra {
            headers.insert(*name, *value);
        }
        self.write_frame(&Frame::SynReply(SynReplyFrame {
            stream_id,
            fin,
            headers,
        }));
    }

    pub fn data(&mut self, stream_id: StreamId, data: &[u8], fin: bool) {
        self.write_frame(&Frame::Data(DataFrame::new(stream_id, data.to_vec(), fin)));
    }

    /// Wait for the request's SYN_STREAM
    pub fn read_request(&mut self) -> Frame {
        self.expect_frame(|f| matches!(f, Frame::SynStream(_)))
    }
}

/// Start a server offering `protocols`; returns its port and the handler's
/// result
pub fn spawn_server<F, T>(protocols: &'static [&'static str], handler: F) -> (u16, JoinHandle<T>)
where
    F: FnOnce(&mut ServerConn) -> T + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (tcp_stream, _) = listener.accept().unwrap();

        let tls_config = TlsConfig::server()
            .unwrap()
            .alpn(protocols)
            .unwrap()
            .build()
            .unwrap();
        let tls = TlsSession::accept(tcp_stream, &tls_config).unwrap();
        let codec = handshake::negotiated_version(tls.ssl())
            .ok()
            .map(|version| FrameCodec::new(version).unwrap());

        let mut conn = ServerConn {
            tls,
            codec,
            buf: Vec::new(),
        };
        handler(&mut conn)
    });

    (port, handle)
}

pub fn url(port: u16, path: &str) -> String {
    format!("https://127.0.0.1:{}{}", port, path)
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
