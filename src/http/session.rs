//! Transport seam for the SPDY session
//!
//! The framing layer never touches sockets. It moves bytes through a
//! `SessionIo`, which reports would-block instead of blocking, and records
//! which direction the transport was waiting on so the I/O driver can
//! poll for the right event.

use std::io;

/// Outcome of a single non-blocking transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Some bytes moved
    Done(usize),
    /// Nothing moved; retry after the socket becomes ready
    WouldBlock,
    /// Peer closed the channel
    Eof,
}

/// Direction the transport needs before the last would-block can progress
///
/// TLS may need to read in order to write (renegotiation, post-handshake
/// messages) and the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WantIo {
    #[default]
    None,
    Read,
    Write,
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

impl PollEvents {
    /// Compute poll interest from session wants and the transport's
    /// pending direction
    ///
    /// The transport's pending direction is added to the session's. A
    /// transport blocked on read cannot write either, so the session's write
    /// interest is dropped then; polling for it would return at once on an
    /// idle writable socket. Returns `None` when nothing is wanted.
    pub fn from_wants(want_read: bool, want_write: bool, want_io: WantIo) -> Option<PollEvents> {
        let (read, write) = match want_io {
            WantIo::Read => (true, false),
            WantIo::Write => (want_read, true),
            WantIo::None => (want_read, want_write),
        };
        match (read, write) {
            (true, true) => Some(PollEvents::Both),
            (true, false) => Some(PollEvents::Read),
            (false, true) => Some(PollEvents::Write),
            (false, false) => None,
        }
    }

    /// Check if read readiness is requested
    pub fn wants_read(self) -> bool {
        matches!(self, PollEvents::Read | PollEvents::Both)
    }

    /// Check if write readiness is requested
    pub fn wants_write(self) -> bool {
        matches!(self, PollEvents::Write | PollEvents::Both)
    }
}

/// Non-blocking byte transport
///
/// Implementations must never block. A would-block must be reported as
/// `Transfer::WouldBlock` with `want_io` updated, and a send that returned
/// would-block must be retried with the same bytes.
pub trait SessionIo {
    /// Send bytes
    fn send(&mut self, buf: &[u8]) -> io::Result<Transfer>;

    /// Receive bytes into `buf`
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Transfer>;

    /// Direction the last would-block was waiting on
    fn want_io(&self) -> WantIo;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wants_session_only() {
        assert_eq!(
            PollEvents::from_wants(true, true, WantIo::None),
            Some(PollEvents::Both)
        );
        assert_eq!(
            PollEvents::from_wants(true, false, WantIo::None),
            Some(PollEvents::Read)
        );
        assert_eq!(
            PollEvents::from_wants(false, true, WantIo::None),
            Some(PollEvents::Write)
        );
        assert_eq!(PollEvents::from_wants(false, false, WantIo::None), None);
    }

    #[test]
    fn test_from_wants_transport_direction() {
        // TLS blocked on read: only read readiness can unblock it
        assert_eq!(
            PollEvents::from_wants(false, true, WantIo::Read),
            Some(PollEvents::Read)
        );
        assert_eq!(
            PollEvents::from_wants(true, true, WantIo::Read),
            Some(PollEvents::Read)
        );
        // TLS blocked on write keeps the session's read interest armed
        assert_eq!(
            PollEvents::from_wants(true, true, WantIo::Write),
            Some(PollEvents::Both)
        );
        assert_eq!(
            PollEvents::from_wants(true, false, WantIo::Write),
            Some(PollEvents::Both)
        );
        assert_eq!(
            PollEvents::from_wants(false, false, WantIo::Write),
            Some(PollEvents::Write)
        );
    }

    #[test]
    fn test_wants_helpers() {
        assert!(PollEvents::Both.wants_read());
        assert!(PollEvents::Both.wants_write());
        assert!(PollEvents::Read.wants_read());
        assert!(!PollEvents::Read.wants_write());
        assert!(!PollEvents::Write.wants_read());
    }
}
