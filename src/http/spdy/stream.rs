//! SPDY stream state

use super::flow_control::{ReceiveWindow, SendWindow};
use super::DEFAULT_INITIAL_WINDOW_SIZE;

/// Stream ID type
pub type StreamId = u32;

/// Stream state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// SYN_STREAM sent, no SYN_REPLY yet
    Opening,
    /// SYN_REPLY received
    Open,
    /// Both halves shut or reset
    Closed,
}

/// Client-initiated SPDY stream
#[derive(Debug)]
pub struct SpdyStream {
    id: StreamId,
    priority: u8,
    state: StreamState,
    /// FIN sent
    local_shut: bool,
    /// FIN received
    remote_shut: bool,
    send_window: SendWindow,
    recv_window: ReceiveWindow,
}

impl SpdyStream {
    /// Create a stream as its SYN_STREAM is serialized
    pub fn new(id: StreamId, priority: u8, send_window_size: u32) -> Self {
        SpdyStream {
            id,
            priority,
            state: StreamState::Opening,
            local_shut: false,
            remote_shut: false,
            send_window: SendWindow::with_initial_size(send_window_size),
            recv_window: ReceiveWindow::with_initial_size(DEFAULT_INITIAL_WINDOW_SIZE),
        }
    }

    /// Get stream ID
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Get priority
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Get stream state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Check whether SYN_REPLY arrived
    pub fn is_replied(&self) -> bool {
        self.state == StreamState::Open
    }

    /// Record SYN_REPLY
    pub fn mark_replied(&mut self) {
        self.state = StreamState::Open;
    }

    /// Check whether the peer sent FIN
    pub fn is_remote_shut(&self) -> bool {
        self.remote_shut
    }

    /// Check whether we sent FIN
    pub fn is_local_shut(&self) -> bool {
        self.local_shut
    }

    /// Shut our half; returns true when the stream is now fully closed
    pub fn shut_local(&mut self) -> bool {
        self.local_shut = true;
        self.update_closed()
    }

    /// Shut the peer's half; returns true when the stream is now fully closed
    pub fn shut_remote(&mut self) -> bool {
        self.remote_shut = true;
        self.update_closed()
    }

    fn update_closed(&mut self) -> bool {
        if self.local_shut && self.remote_shut {
            self.state = StreamState::Closed;
        }
        self.state == StreamState::Closed
    }

    /// Get send window
    pub fn send_window_mut(&mut self) -> &mut SendWindow {
        &mut self.send_window
    }

    /// Get receive window
    pub fn recv_window_mut(&mut self) -> &mut ReceiveWindow {
        &mut self.recv_window
    }
}
