//! End-to-end SPDY fetches against a loopback TLS server

mod common;

use common::{gzip, spawn_server, url};
use spdy_fetch::http::spdy::frames::{PingFrame, RstStreamFrame, WindowUpdateFrame};
use spdy_fetch::http::spdy::{Frame, GoawayStatus, StatusCode};
use spdy_fetch::http::tls::TlsError;
use spdy_fetch::{ClientConfig, Error, SpdyClient, SpdyVersion};
use std::net::TcpListener;

#[test]
fn test_simple_get_v3() {
    let (port, server) = spawn_server(&["spdy/3", "spdy/2"], |conn| {
        let request = conn.read_request();
        conn.reply(1, "200 OK", &[("content-type", "text/html")], false);
        conn.data(1, b"<html>", false);
        conn.data(1, b"Hello SPDY</html>", true);
        (conn.version(), request, conn.drain())
    });

    let response = spdy_fetch::get(&url(port, "/index.html")).unwrap();
    let (version, request, rest) = server.join().unwrap();

    assert_eq!(version, Some(SpdyVersion::V3));
    assert_eq!(response.spdy_proto_version(), Some(3));
    assert_eq!(response.stream_id(), Some(1));

    let sent = response.syn_stream().unwrap();
    assert_eq!(sent.get(":path"), Some("/index.html"));
    assert_eq!(sent.get(":method"), Some("GET"));
    assert_eq!(sent.get(":host"), Some(format!("127.0.0.1:{}", port).as_str()));
    assert_eq!(request.headers(), Some(sent));
    assert!(request.is_fin());

    let reply = response.syn_reply().unwrap();
    assert_eq!(reply.get(":status"), Some("200 OK"));
    assert_eq!(reply.get("content-type"), Some("text/html"));

    assert_eq!(response.body(), b"<html>Hello SPDY</html>");
    assert_eq!(response.body_length(), response.body().len());
    assert_eq!(response.receive_bytes(), Some(17));
    assert_eq!(
        response.tls_vars().unwrap().alpn.as_deref(),
        Some("spdy/3")
    );

    assert!(matches!(
        rest[..],
        [Frame::Goaway(spdy_fetch::http::spdy::frames::GoawayFrame {
            last_good_stream_id: 0,
            status: GoawayStatus::Ok
        })]
    ));
}

#[test]
fn test_get_v2() {
    let (port, server) = spawn_server(&["spdy/2"], |conn| {
        let request = conn.read_request();
        conn.reply(1, "200 OK", &[], false);
        conn.data(1, b"spdy2 body", true);
        conn.drain();
        (conn.version(), request)
    });

    let response = spdy_fetch::get(&url(port, "/v2")).unwrap();
    let (version, request) = server.join().unwrap();

    assert_eq!(version, Some(SpdyVersion::V2));
    assert_eq!(response.spdy_proto_version(), Some(2));
    assert_eq!(request.headers().unwrap().get(":path"), Some("/v2"));
    assert_eq!(response.syn_stream().unwrap().get(":path"), Some("/v2"));
    assert_eq!(response.syn_reply().unwrap().get(":status"), Some("200 OK"));
    assert_eq!(response.body_text(), "spdy2 body");
}

#[test]
fn test_protocol_preference_follows_client_order() {
    let (port, server) = spawn_server(&["spdy/3", "spdy/2"], |conn| {
        conn.read_request();
        conn.reply(1, "204 No Content", &[], true);
        conn.drain();
    });

    let config = ClientConfig::builder()
        .protocols(vec![SpdyVersion::V2, SpdyVersion::V3])
        .build()
        .unwrap();
    let response = SpdyClient::new(config).get(&url(port, "/")).unwrap();
    server.join().unwrap();

    assert_eq!(response.spdy_proto_version(), Some(2));
    assert_eq!(response.body_length(), 0);
    assert_eq!(response.status(), Some("204 No Content"));
}

#[test]
fn test_gzip_body_split_into_small_frames() {
    let plain = b"The quick brown fox jumps over the lazy dog. ".repeat(200);
    let compressed = gzip(&plain);

    let (port, server) = spawn_server(&["spdy/3"], move |conn| {
        conn.read_request();
        conn.reply(1, "200 OK", &[("content-encoding", "gzip")], false);
        let chunks: Vec<&[u8]> = compressed.chunks(7).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            conn.data(1, chunk, i == chunks.len() - 1);
        }
        conn.drain();
    });

    let response = spdy_fetch::get(&url(port, "/compressed")).unwrap();
    server.join().unwrap();

    assert_eq!(response.body(), &plain[..]);
    assert_eq!(response.body_length(), plain.len());
}

#[test]
fn test_bad_gzip_resets_stream() {
    let (port, server) = spawn_server(&["spdy/3"], |conn| {
        conn.read_request();
        conn.reply(1, "200 OK", &[("content-encoding", "gzip")], false);
        conn.data(1, b"this is not gzip at all", false);
        conn.drain()
    });

    let result = spdy_fetch::get(&url(port, "/"));
    let frames = server.join().unwrap();

    assert!(matches!(result, Err(Error::Decompression(_))));
    assert_eq!(
        frames[0],
        Frame::RstStream(RstStreamFrame {
            stream_id: 1,
            status: StatusCode::InternalError
        })
    );
    assert!(matches!(frames[1], Frame::Goaway(_)));
}

#[test]
fn test_server_reset() {
    let (port, server) = spawn_server(&["spdy/3"], |conn| {
        conn.read_request();
        conn.write_frame(&Frame::RstStream(RstStreamFrame {
            stream_id: 1,
            status: StatusCode::InternalError,
        }));
        conn.drain();
    });

    let result = spdy_fetch::get(&url(port, "/"));
    server.join().unwrap();

    match result {
        Err(Error::StreamReset { stream_id, status }) => {
            assert_eq!(stream_id, 1);
            assert_eq!(status, StatusCode::InternalError);
        }
        other => panic!("expected stream reset, got {:?}", other.map(|r| r.body_length())),
    }
}

#[test]
fn test_no_common_protocol() {
    let (port, server) = spawn_server(&["http/1.1"], |conn| conn.version());

    let result = spdy_fetch::get(&url(port, "/"));
    let server_version = server.join().unwrap();

    assert_eq!(server_version, None);
    match result {
        Err(Error::Tls(TlsError::ProtocolNegotiation(msg))) => {
            assert_eq!(msg, "Server did not advertise spdy/2 or spdy/3 protocol.");
        }
        other => panic!("expected negotiation failure, got {:?}", other.map(|r| r.body_length())),
    }
}

#[test]
fn test_client_offers_only_configured_versions() {
    let (port, server) = spawn_server(&["spdy/2"], |conn| conn.version());

    let config = ClientConfig::builder()
        .protocols(vec![SpdyVersion::V3])
        .build()
        .unwrap();
    let result = SpdyClient::new(config).get(&url(port, "/"));
    server.join().unwrap();

    assert!(matches!(
        result,
        Err(Error::Tls(TlsError::ProtocolNegotiation(_)))
    ));
}

#[test]
fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = spdy_fetch::get(&url(port, "/"));
    assert!(matches!(
        result,
        Err(Error::Net(spdy_fetch::net::Error::Connect { .. }))
    ));
}

#[test]
fn test_connection_closed_before_completion() {
    let (port, server) = spawn_server(&["spdy/3"], |conn| {
        conn.read_request();
        conn.reply(1, "200 OK", &[], false);
        conn.data(1, b"partial", false);
    });

    let result = spdy_fetch::get(&url(port, "/"));
    server.join().unwrap();

    assert!(matches!(result, Err(Error::ConnectionClosed)));
}

#[test]
fn test_body_limit() {
    let (port, server) = spawn_server(&["spdy/3"], |conn| {
        conn.read_request();
        conn.reply(1, "200 OK", &[], false);
        conn.data(1, &[b'x'; 600], false);
        conn.data(1, &[b'y'; 600], true);
        conn.drain()
    });

    let config = ClientConfig::builder()
        .max_body_size(Some(1000))
        .build()
        .unwrap();
    let result = SpdyClient::new(config).get(&url(port, "/big"));
    let frames = server.join().unwrap();

    assert!(matches!(result, Err(Error::BodyTooLarge { limit: 1000 })));
    assert!(frames.contains(&Frame::RstStream(RstStreamFrame {
        stream_id: 1,
        status: StatusCode::Cancel
    })));
}

#[test]
fn test_ping_echoed() {
    let (port, server) = spawn_server(&["spdy/3"], |conn| {
        conn.read_request();
        conn.write_frame(&Frame::Ping(PingFrame { unique_id: 2 }));
        let echo = conn.expect_frame(|f| matches!(f, Frame::Ping(_)));
        conn.reply(1, "200 OK", &[], false);
        conn.data(1, b"pong", true);
        conn.drain();
        echo
    });

    let response = spdy_fetch::get(&url(port, "/")).unwrap();
    let echo = server.join().unwrap();

    assert_eq!(echo, Frame::Ping(PingFrame { unique_id: 2 }));
    assert_eq!(response.body(), b"pong");
}

#[test]
fn test_window_update_and_large_body() {
    let (port, server) = spawn_server(&["spdy/3"], |conn| {
        conn.read_request();
        conn.reply(1, "200 OK", &[], false);
        conn.data(1, &vec![b'a'; 40_000], false);
        let update = conn.expect_frame(|f| matches!(f, Frame::WindowUpdate(_)));
        conn.data(1, &vec![b'b'; 40_000], true);
        conn.drain();
        update
    });

    let config = ClientConfig::builder()
        .recv_buffer_size(1024)
        .build()
        .unwrap();
    let response = SpdyClient::new(config).get(&url(port, "/large")).unwrap();
    let update = server.join().unwrap();

    assert_eq!(
        update,
        Frame::WindowUpdate(WindowUpdateFrame {
            stream_id: 1,
            delta_window_size: 40_000
        })
    );
    assert_eq!(response.body_length(), 80_000);
    assert_eq!(response.receive_bytes(), Some(40_000));
    assert!(response.body()[..40_000].iter().all(|b| *b == b'a'));
}

#[test]
fn test_trailing_headers_replace_reply() {
    let (port, server) = spawn_server(&["spdy/3"], |conn| {
        conn.read_request();
        conn.reply(1, "200 OK", &[], false);
        conn.data(1, b"body", false);
        let mut trailers = spdy_fetch::http::Headers::new();
        trailers.insert("x-checksum", "abc");
        conn.write_frame(&Frame::Headers(spdy_fetch::http::spdy::frames::HeadersFrame {
            stream_id: 1,
            fin: true,
            headers: trailers,
        }));
        conn.drain();
    });

    let response = spdy_fetch::get(&url(port, "/")).unwrap();
    server.join().unwrap();

    let reply = response.syn_reply().unwrap();
    assert_eq!(reply.get("x-checksum"), Some("abc"));
    assert_eq!(reply.get(":status"), None);
    assert_eq!(response.body(), b"body");
}
