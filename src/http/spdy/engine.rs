//! Request engine: session callbacks for a single GET
//!
//! Requests are keyed by a token until their SYN_STREAM is serialized and
//! by stream id afterwards. Every callback looks its request up in that
//! table; frames for streams we never opened are left to the session.

use super::error::{Error, Result};
use super::frames::{Frame, GoawayStatus, StatusCode, SynStreamFrame};
use super::gzip::GzipInflater;
use super::response::Response;
use super::session::{RequestToken, Session, SessionCallbacks, Submitter};
use super::stream::StreamId;
use super::SpdyVersion;
use crate::http::{Headers, Uri};
use log::debug;
use std::collections::HashMap;

/// One GET request
pub struct Request {
    uri: Uri,
    stream_id: Option<StreamId>,
    inflater: Option<GzipInflater>,
}

impl Request {
    fn new(uri: Uri) -> Self {
        Request {
            uri,
            stream_id: None,
            inflater: None,
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        self.stream_id
    }

    pub fn is_gzip(&self) -> bool {
        self.inflater.is_some()
    }
}

/// Build the header block of a GET request
pub fn request_headers(uri: &Uri, user_agent: &str) -> Headers {
    [
        (":method", "GET"),
        (":path", uri.path()),
        (":version", "HTTP/1.1"),
        (":scheme", "https"),
        (":host", uri.hostport()),
        ("accept", "*/*"),
        ("user-agent", user_agent),
    ]
    .into_iter()
    .collect()
}

fn is_gzip_encoded(headers: &Headers) -> bool {
    headers.get_all("content-encoding").iter().any(|value| {
        value
            .split(',')
            .any(|coding| coding.trim().eq_ignore_ascii_case("gzip"))
    })
}

/// Session callbacks filling a [`Response`]
pub struct Engine {
    response: Response,
    pending: HashMap<RequestToken, Request>,
    requests: HashMap<StreamId, Request>,
    next_token: RequestToken,
    max_body_size: Option<usize>,
    failure: Option<Error>,
    completed: bool,
    going_away: bool,
}

impl Engine {
    /// Create an engine for a connection that negotiated `version`
    pub fn new(version: SpdyVersion, max_body_size: Option<usize>) -> Self {
        let mut response = Response::new();
        response.set_spdy_proto_version(version);

        Engine {
            response,
            pending: HashMap::new(),
            requests: HashMap::new(),
            next_token: 1,
            max_body_size,
            failure: None,
            completed: false,
            going_away: false,
        }
    }

    /// Queue a GET for `uri` on `session`
    pub fn submit(
        &mut self,
        session: &mut Session,
        uri: &Uri,
        user_agent: &str,
        priority: u8,
    ) -> Result<RequestToken> {
        let token = self.next_token;
        session.submit_request(token, priority, request_headers(uri, user_agent), true)?;
        self.next_token += 1;
        self.pending.insert(token, Request::new(uri.clone()));
        Ok(token)
    }

    /// Get the response gathered so far
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Attach TLS parameters to the response
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Look up the request on a stream
    pub fn request(&self, stream_id: StreamId) -> Option<&Request> {
        self.requests.get(&stream_id)
    }

    /// Check whether the stream finished normally
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    fn fail(&mut self, error: Error) {
        if self.failure.is_none() {
            debug!("Request failed: {}", error);
            self.failure = Some(error);
        }
    }

    /// Turn the engine into the call's outcome
    ///
    /// A recorded failure wins; a stream that never completed is reported
    /// as the connection going away or closing.
    pub fn finish(self, session: &Session) -> Result<Response> {
        if let Some(error) = self.failure {
            return Err(error);
        }
        if !self.completed {
            if self.going_away || session.goaway_received() {
                return Err(Error::GoingAway);
            }
            return Err(Error::ConnectionClosed);
        }
        Ok(self.response)
    }

    fn append_body(response: &mut Response, limit: Option<usize>, data: &[u8]) -> Result<()> {
        if let Some(limit) = limit {
            if response.body_length() + data.len() > limit {
                return Err(Error::BodyTooLarge { limit });
            }
        }
        response.append_body(data);
        Ok(())
    }
}

impl SessionCallbacks for Engine {
    fn before_ctrl_send(
        &mut self,
        token: RequestToken,
        frame: &SynStreamFrame,
        _submit: &mut Submitter<'_>,
    ) -> Result<()> {
        let Some(mut request) = self.pending.remove(&token) else {
            return Ok(());
        };
        if request.stream_id.is_none() {
            request.stream_id = Some(frame.stream_id);
            self.response.set_stream_id(frame.stream_id);
            debug!("Request for {} assigned stream {}", request.uri, frame.stream_id);
        }
        self.requests.insert(frame.stream_id, request);
        Ok(())
    }

    fn on_ctrl_send(&mut self, frame: &Frame, _submit: &mut Submitter<'_>) -> Result<()> {
        if let Frame::SynStream(syn) = frame {
            if self.requests.contains_key(&syn.stream_id) {
                self.response.set_syn_stream(syn.headers.clone());
            }
        }
        Ok(())
    }

    fn on_ctrl_recv(&mut self, frame: &Frame, _submit: &mut Submitter<'_>) -> Result<()> {
        match frame {
            Frame::SynReply(_) | Frame::Headers(_) => {
                let Some(request) = self.requests.get_mut(&frame.stream_id()) else {
                    return Ok(());
                };
                let Some(headers) = frame.headers() else {
                    return Ok(());
                };
                if request.inflater.is_none() && is_gzip_encoded(headers) {
                    debug!("Stream {}: gzip body", frame.stream_id());
                    request.inflater = Some(GzipInflater::new());
                }
                self.response.set_syn_reply(headers.clone());
            }
            Frame::Goaway(_) => self.going_away = true,
            _ => {}
        }
        Ok(())
    }

    fn on_data_chunk_recv(
        &mut self,
        stream_id: StreamId,
        data: &[u8],
        submit: &mut Submitter<'_>,
    ) -> Result<()> {
        if self.failure.is_some() {
            return Ok(());
        }

        let result = {
            let Engine {
                requests,
                response,
                max_body_size,
                ..
            } = &mut *self;
            let Some(request) = requests.get_mut(&stream_id) else {
                return Ok(());
            };

            response.set_receive_bytes(data.len());
            let limit = *max_body_size;
            match request.inflater.as_mut() {
                Some(inflater) => {
                    inflater.inflate(data, |window| Self::append_body(response, limit, window))
                }
                None => Self::append_body(response, limit, data),
            }
        };

        match result {
            Ok(()) => {}
            Err(error @ Error::BodyTooLarge { .. }) => {
                submit.submit_rst_stream(stream_id, StatusCode::Cancel);
                self.fail(error);
            }
            Err(error) => {
                submit.submit_rst_stream(stream_id, StatusCode::InternalError);
                self.fail(error);
            }
        }
        Ok(())
    }

    fn on_stream_close(
        &mut self,
        stream_id: StreamId,
        status: StatusCode,
        submit: &mut Submitter<'_>,
    ) -> Result<()> {
        if self.requests.remove(&stream_id).is_none() {
            return Ok(());
        }

        match status {
            StatusCode::Ok => self.completed = true,
            StatusCode::RefusedStream if self.going_away => self.fail(Error::GoingAway),
            status => self.fail(Error::StreamReset { stream_id, status }),
        }

        submit.submit_goaway(GoawayStatus::Ok);
        Ok(())
    }
}
