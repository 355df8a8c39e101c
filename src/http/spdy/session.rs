//! SPDY session: framing, stream table, outbound queue
//!
//! A `Session` never performs I/O on its own. `send` and `recv` move bytes
//! through a [`SessionIo`] and stop at the first would-block, so the caller
//! decides when to wait for socket readiness. Everything the session
//! observes is reported through [`SessionCallbacks`], which may in turn
//! queue frames through a [`Submitter`].
//!
//! Outbound frames are serialized (and their header blocks compressed) at
//! the moment they are first written, which keeps the zlib stream in wire
//! order. Control frames go first in submission order, then SYN_STREAMs by
//! priority.

use super::codec::FrameCodec;
use super::error::{Error, Result};
use super::frames::*;
use super::settings::RemoteSettings;
use super::stream::{SpdyStream, StreamId};
use super::{lowest_priority, SpdyVersion, DEFAULT_INITIAL_WINDOW_SIZE, MAX_STREAM_ID};
use crate::http::{Headers, SessionIo, Transfer};
use bytes::{Buf, Bytes, BytesMut};
use log::{debug, trace, warn};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, VecDeque};

/// Caller-chosen handle tying a submitted request to its stream
pub type RequestToken = u64;

/// Hooks fired by the session
///
/// Every hook receives a [`Submitter`] for queuing frames in response. An
/// error returned from a hook aborts the current `send`/`recv` and is
/// returned to the caller.
pub trait SessionCallbacks {
    /// A SYN_STREAM for `token` is about to be serialized; its stream id is
    /// already assigned
    fn before_ctrl_send(
        &mut self,
        _token: RequestToken,
        _frame: &SynStreamFrame,
        _submit: &mut Submitter<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// A control frame was completely written
    fn on_ctrl_send(&mut self, _frame: &Frame, _submit: &mut Submitter<'_>) -> Result<()> {
        Ok(())
    }

    /// A control frame for a known stream (or the session) arrived
    fn on_ctrl_recv(&mut self, _frame: &Frame, _submit: &mut Submitter<'_>) -> Result<()> {
        Ok(())
    }

    /// A DATA payload for a known stream arrived
    fn on_data_chunk_recv(
        &mut self,
        _stream_id: StreamId,
        _data: &[u8],
        _submit: &mut Submitter<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// A stream closed, by FIN in both directions (`StatusCode::Ok`) or by
    /// RST_STREAM in either direction
    fn on_stream_close(
        &mut self,
        _stream_id: StreamId,
        _status: StatusCode,
        _submit: &mut Submitter<'_>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Control frames waiting to be written
#[derive(Debug, Default)]
struct ControlQueue {
    frames: VecDeque<Frame>,
    goaway_submitted: bool,
    /// Last peer-initiated stream id seen, reported in GOAWAY
    last_recv_stream_id: StreamId,
}

/// Queue frames from inside a callback
pub struct Submitter<'a> {
    control: &'a mut ControlQueue,
}

impl Submitter<'_> {
    /// Queue RST_STREAM; the stream closes once it is written
    pub fn submit_rst_stream(&mut self, stream_id: StreamId, status: StatusCode) {
        warn!("Resetting stream {}: {}", stream_id, status);
        self.control
            .frames
            .push_back(Frame::RstStream(RstStreamFrame { stream_id, status }));
    }

    /// Queue GOAWAY
    ///
    /// Only the first call queues a frame; returns whether this call did.
    pub fn submit_goaway(&mut self, status: GoawayStatus) -> bool {
        if self.control.goaway_submitted {
            return false;
        }
        self.control.goaway_submitted = true;
        self.control.frames.push_back(Frame::Goaway(GoawayFrame {
            last_good_stream_id: self.control.last_recv_stream_id,
            status,
        }));
        true
    }

    fn submit_ping_reply(&mut self, unique_id: u32) {
        self.control
            .frames
            .push_back(Frame::Ping(PingFrame { unique_id }));
    }

    fn submit_window_update(&mut self, stream_id: StreamId, delta_window_size: u32) {
        self.control
            .frames
            .push_back(Frame::WindowUpdate(WindowUpdateFrame {
                stream_id,
                delta_window_size,
            }));
    }
}

/// A request waiting for its SYN_STREAM slot
#[derive(Debug)]
struct PendingSyn {
    token: RequestToken,
    priority: u8,
    seq: u64,
    headers: Headers,
    fin: bool,
}

impl PendingSyn {
    fn key(&self) -> Reverse<(u8, u64)> {
        Reverse((self.priority, self.seq))
    }
}

impl PartialEq for PendingSyn {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PendingSyn {}

impl PartialOrd for PendingSyn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingSyn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// A serialized frame being written
#[derive(Debug)]
struct Outbound {
    frame: Frame,
    bytes: Bytes,
    offset: usize,
}

/// Client-side SPDY session
pub struct Session {
    version: SpdyVersion,
    codec: FrameCodec,
    streams: HashMap<StreamId, SpdyStream>,
    control: ControlQueue,
    syn_queue: BinaryHeap<PendingSyn>,
    next_seq: u64,
    pending: Option<Outbound>,
    recv_buf: BytesMut,
    scratch: Vec<u8>,
    next_stream_id: StreamId,
    remote_settings: RemoteSettings,
    goaway_sent: bool,
    goaway_received: bool,
    peer_closed: bool,
}

impl Session {
    /// Create a client session; `recv_buffer_size` bytes are requested from
    /// the transport per read
    pub fn new(version: SpdyVersion, recv_buffer_size: usize) -> Result<Self> {
        if recv_buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "Receive buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(Session {
            version,
            codec: FrameCodec::new(version)?,
            streams: HashMap::new(),
            control: ControlQueue::default(),
            syn_queue: BinaryHeap::new(),
            next_seq: 0,
            pending: None,
            recv_buf: BytesMut::with_capacity(recv_buffer_size),
            scratch: vec![0; recv_buffer_size],
            next_stream_id: 1,
            remote_settings: RemoteSettings::new(),
            goaway_sent: false,
            goaway_received: false,
            peer_closed: false,
        })
    }

    /// Get negotiated version
    pub fn version(&self) -> SpdyVersion {
        self.version
    }

    /// Queue a request; its SYN_STREAM is sent by a later `send`
    ///
    /// `fin` closes our half with the SYN_STREAM, as for a request without
    /// a body.
    pub fn submit_request(
        &mut self,
        token: RequestToken,
        priority: u8,
        headers: Headers,
        fin: bool,
    ) -> Result<()> {
        let lowest = lowest_priority(self.version);
        if priority > lowest {
            return Err(Error::InvalidConfig(format!(
                "Priority {} out of range 0..={} for {}",
                priority, lowest, self.version
            )));
        }

        self.syn_queue.push(PendingSyn {
            token,
            priority,
            seq: self.next_seq,
            headers,
            fin,
        });
        self.next_seq += 1;
        Ok(())
    }

    /// Check whether the session is waiting for inbound frames
    pub fn want_read(&self) -> bool {
        !self.peer_closed && (!self.is_going_away() || !self.streams.is_empty())
    }

    /// Check whether the session has bytes to write
    pub fn want_write(&self) -> bool {
        if self.peer_closed {
            return false;
        }
        if self.pending.is_some() {
            return true;
        }
        let queued = !self.control.frames.is_empty() || self.syn_ready();
        queued && (!self.is_going_away() || !self.streams.is_empty())
    }

    /// Check whether the peer closed the connection
    pub fn is_peer_closed(&self) -> bool {
        self.peer_closed
    }

    /// Check whether GOAWAY was received
    pub fn goaway_received(&self) -> bool {
        self.goaway_received
    }

    /// Number of open streams
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    fn is_going_away(&self) -> bool {
        self.goaway_sent || self.goaway_received
    }

    fn syn_ready(&self) -> bool {
        !self.syn_queue.is_empty()
            && !self.is_going_away()
            && !self.control.goaway_submitted
            && (self.streams.len() as u64) < u64::from(self.remote_settings.max_concurrent_streams())
    }

    /// Write queued frames until the queue drains or the transport blocks
    pub fn send<I, C>(&mut self, io: &mut I, cb: &mut C) -> Result<()>
    where
        I: SessionIo + ?Sized,
        C: SessionCallbacks + ?Sized,
    {
        loop {
            if self.peer_closed {
                return Ok(());
            }

            if self.pending.is_none() {
                if self.is_going_away() && self.streams.is_empty() {
                    return Ok(());
                }
                match self.next_outbound(cb)? {
                    Some(outbound) => self.pending = Some(outbound),
                    None => return Ok(()),
                }
            }

            let Some(outbound) = self.pending.as_mut() else {
                return Ok(());
            };
            while outbound.offset < outbound.bytes.len() {
                match io.send(&outbound.bytes[outbound.offset..])? {
                    Transfer::Done(n) => outbound.offset += n,
                    Transfer::WouldBlock => {
                        trace!("Send would block on {}", outbound.frame.name());
                        return Ok(());
                    }
                    Transfer::Eof => {
                        debug!("Peer closed the connection during send");
                        self.peer_closed = true;
                        self.pending = None;
                        return Ok(());
                    }
                }
            }

            if let Some(outbound) = self.pending.take() {
                trace!(
                    "Sent {} stream={} length={}",
                    outbound.frame.name(),
                    outbound.frame.stream_id(),
                    outbound.bytes.len()
                );
                self.after_send(outbound.frame, cb)?;
            }
        }
    }

    fn next_outbound<C>(&mut self, cb: &mut C) -> Result<Option<Outbound>>
    where
        C: SessionCallbacks + ?Sized,
    {
        if let Some(frame) = self.control.frames.pop_front() {
            let bytes = self.codec.encode(&frame)?;
            return Ok(Some(Outbound {
                frame,
                bytes,
                offset: 0,
            }));
        }

        if !self.syn_ready() {
            return Ok(None);
        }
        let Some(syn) = self.syn_queue.pop() else {
            return Ok(None);
        };

        let stream_id = self.next_stream_id;
        if stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId(stream_id));
        }
        self.next_stream_id += 2;

        let frame = SynStreamFrame {
            stream_id,
            assoc_stream_id: 0,
            priority: syn.priority,
            slot: 0,
            fin: syn.fin,
            unidirectional: false,
            headers: syn.headers,
        };
        cb.before_ctrl_send(
            syn.token,
            &frame,
            &mut Submitter {
                control: &mut self.control,
            },
        )?;

        let send_window = self
            .remote_settings
            .initial_window_size()
            .unwrap_or(DEFAULT_INITIAL_WINDOW_SIZE);
        let mut stream = SpdyStream::new(stream_id, syn.priority, send_window);
        if syn.fin {
            stream.shut_local();
        }
        self.streams.insert(stream_id, stream);

        let frame = Frame::SynStream(frame);
        let bytes = self.codec.encode(&frame)?;
        Ok(Some(Outbound {
            frame,
            bytes,
            offset: 0,
        }))
    }

    fn after_send<C>(&mut self, frame: Frame, cb: &mut C) -> Result<()>
    where
        C: SessionCallbacks + ?Sized,
    {
        if let Frame::Goaway(_) = frame {
            debug!("GOAWAY sent");
            self.goaway_sent = true;
        }

        if frame.frame_type().map_or(false, |t| t != FrameType::Data) {
            cb.on_ctrl_send(
                &frame,
                &mut Submitter {
                    control: &mut self.control,
                },
            )?;
        }

        if let Frame::RstStream(rst) = frame {
            self.close_stream(rst.stream_id, rst.status, cb)?;
        }
        Ok(())
    }

    /// Read and process frames until the transport blocks or reaches EOF
    pub fn recv<I, C>(&mut self, io: &mut I, cb: &mut C) -> Result<()>
    where
        I: SessionIo + ?Sized,
        C: SessionCallbacks + ?Sized,
    {
        while !self.peer_closed {
            match io.recv(&mut self.scratch)? {
                Transfer::Done(0) | Transfer::Eof => {
                    debug!("Peer closed the connection");
                    self.peer_closed = true;
                }
                Transfer::Done(n) => {
                    self.recv_buf.extend_from_slice(&self.scratch[..n]);
                    self.process_frames(cb)?;
                }
                Transfer::WouldBlock => {
                    trace!("Receive would block");
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn process_frames<C>(&mut self, cb: &mut C) -> Result<()>
    where
        C: SessionCallbacks + ?Sized,
    {
        while let Some((frame, used)) = self.codec.decode(&self.recv_buf)? {
            self.recv_buf.advance(used);
            trace!(
                "Received {} stream={} length={}",
                frame.name(),
                frame.stream_id(),
                used
            );
            self.handle_frame(frame, cb)?;
        }
        Ok(())
    }

    fn submitter(&mut self) -> Submitter<'_> {
        Submitter {
            control: &mut self.control,
        }
    }

    fn handle_frame<C>(&mut self, frame: Frame, cb: &mut C) -> Result<()>
    where
        C: SessionCallbacks + ?Sized,
    {
        match &frame {
            Frame::SynStream(syn) => {
                if syn.stream_id > self.control.last_recv_stream_id {
                    self.control.last_recv_stream_id = syn.stream_id;
                }
                warn!("Refusing server-initiated stream {}", syn.stream_id);
                self.submitter()
                    .submit_rst_stream(syn.stream_id, StatusCode::RefusedStream);
            }
            Frame::SynReply(reply) => {
                let stream_id = reply.stream_id;
                let Some(stream) = self.streams.get_mut(&stream_id) else {
                    self.submitter()
                        .submit_rst_stream(stream_id, StatusCode::InvalidStream);
                    return Ok(());
                };
                if stream.is_replied() {
                    let status = match self.version {
                        SpdyVersion::V2 => StatusCode::ProtocolError,
                        SpdyVersion::V3 => StatusCode::StreamInUse,
                    };
                    self.submitter().submit_rst_stream(stream_id, status);
                    return Ok(());
                }
                stream.mark_replied();
                cb.on_ctrl_recv(&frame, &mut self.submitter())?;
                if reply.fin {
                    self.shut_remote(stream_id, cb)?;
                }
            }
            Frame::Headers(headers) => {
                let stream_id = headers.stream_id;
                let status = match self.streams.get(&stream_id) {
                    None => Some(StatusCode::InvalidStream),
                    Some(stream) if stream.is_remote_shut() => Some(StatusCode::ProtocolError),
                    Some(_) => None,
                };
                if let Some(status) = status {
                    self.submitter().submit_rst_stream(stream_id, status);
                    return Ok(());
                }
                cb.on_ctrl_recv(&frame, &mut self.submitter())?;
                if headers.fin {
                    self.shut_remote(stream_id, cb)?;
                }
            }
            Frame::RstStream(rst) => {
                if self.streams.contains_key(&rst.stream_id) {
                    cb.on_ctrl_recv(&frame, &mut self.submitter())?;
                    self.close_stream(rst.stream_id, rst.status, cb)?;
                }
            }
            Frame::Settings(settings) => {
                if settings.clear {
                    self.remote_settings.clear();
                }
                if let Some(window) = self.remote_settings.apply(&settings.entries) {
                    for stream in self.streams.values_mut() {
                        stream.send_window_mut().update_initial_size(window);
                    }
                }
                cb.on_ctrl_recv(&frame, &mut self.submitter())?;
            }
            Frame::Ping(ping) => {
                // Client pings are odd, so an even id came from the peer
                if ping.unique_id % 2 == 0 {
                    self.submitter().submit_ping_reply(ping.unique_id);
                }
                cb.on_ctrl_recv(&frame, &mut self.submitter())?;
            }
            Frame::Goaway(goaway) => {
                debug!(
                    "GOAWAY received, last good stream {}",
                    goaway.last_good_stream_id
                );
                self.goaway_received = true;
                cb.on_ctrl_recv(&frame, &mut self.submitter())?;

                let mut refused: Vec<StreamId> = self
                    .streams
                    .keys()
                    .copied()
                    .filter(|id| *id > goaway.last_good_stream_id)
                    .collect();
                refused.sort_unstable();
                for stream_id in refused {
                    self.close_stream(stream_id, StatusCode::RefusedStream, cb)?;
                }
            }
            Frame::WindowUpdate(update) => {
                let result = match self.streams.get_mut(&update.stream_id) {
                    Some(stream) => stream.send_window_mut().increase(update.delta_window_size),
                    None => return Ok(()),
                };
                match result {
                    Ok(_) => cb.on_ctrl_recv(&frame, &mut self.submitter())?,
                    Err(e) => {
                        debug!("Stream {}: {}", update.stream_id, e);
                        self.submitter()
                            .submit_rst_stream(update.stream_id, StatusCode::FlowControlError);
                    }
                }
            }
            Frame::Data(data) => return self.handle_data(data, cb),
            Frame::Noop | Frame::Credential(_) | Frame::Unknown { .. } => {
                trace!("Ignoring {}", frame.name());
            }
        }
        Ok(())
    }

    fn handle_data<C>(&mut self, data: &DataFrame, cb: &mut C) -> Result<()>
    where
        C: SessionCallbacks + ?Sized,
    {
        let stream_id = data.stream_id;
        let version = self.version;

        let (status, window_update) = match self.streams.get_mut(&stream_id) {
            None => (Some(StatusCode::InvalidStream), None),
            Some(stream) if !stream.is_replied() || stream.is_remote_shut() => {
                (Some(StatusCode::ProtocolError), None)
            }
            Some(stream) if version == SpdyVersion::V3 => {
                match stream.recv_window_mut().consume(data.data.len()) {
                    Ok(delta) => (None, delta),
                    Err(e) => {
                        debug!("Stream {}: {}", stream_id, e);
                        (Some(StatusCode::FlowControlError), None)
                    }
                }
            }
            Some(_) => (None, None),
        };

        if let Some(status) = status {
            self.submitter().submit_rst_stream(stream_id, status);
            return Ok(());
        }

        cb.on_data_chunk_recv(stream_id, &data.data, &mut self.submitter())?;

        if let Some(delta) = window_update.filter(|_| !data.fin) {
            trace!("Stream {} window update {}", stream_id, delta);
            self.submitter().submit_window_update(stream_id, delta);
        }
        if data.fin {
            self.shut_remote(stream_id, cb)?;
        }
        Ok(())
    }

    fn shut_remote<C>(&mut self, stream_id: StreamId, cb: &mut C) -> Result<()>
    where
        C: SessionCallbacks + ?Sized,
    {
        let closed = self
            .streams
            .get_mut(&stream_id)
            .map_or(false, |stream| stream.shut_remote());
        if closed {
            self.close_stream(stream_id, StatusCode::Ok, cb)?;
        }
        Ok(())
    }

    fn close_stream<C>(&mut self, stream_id: StreamId, status: StatusCode, cb: &mut C) -> Result<()>
    where
        C: SessionCallbacks + ?Sized,
    {
        if self.streams.remove(&stream_id).is_some() {
            debug!("Stream {} closed: {}", stream_id, status);
            cb.on_stream_close(stream_id, status, &mut self.submitter())?;
        }
        Ok(())
    }
}
