//! Transport bootstrap
//!
//! Resolves a host, opens a TCP connection to the first resolved address that
//! accepts it, and prepares the socket for the poll-driven I/O loop
//! (non-blocking mode, Nagle disabled). Also provides the single-descriptor
//! readiness wait used by the TLS handshake and the SPDY I/O driver.

use crate::http::session::PollEvents;
use log::{debug, warn};
use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::RawFd;
use std::sync::Once;
use std::time::Duration;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("getaddrinfo: {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("getaddrinfo: {0}: no addresses")]
    NoAddress(String),

    #[error("Could not connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("{option}: {source}")]
    SocketOption {
        option: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("poll: {0}")]
    Poll(#[source] io::Error),

    #[error("connection error")]
    Hangup,
}

/// Readiness reported by [`wait_ready`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    /// POLLHUP or POLLERR was reported
    pub hangup: bool,
}

impl Readiness {
    /// Whether the descriptor can make progress in either direction
    pub fn is_ready(&self) -> bool {
        self.readable || self.writable
    }
}

/// Resolve `host:port` into socket addresses, in resolver order
pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| Error::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(Error::NoAddress(host.to_string()));
    }
    Ok(addrs)
}

/// Connect to the first resolved address that accepts the connection
///
/// Every resolved address is tried in order; the error of the last attempt is
/// reported when none succeeds.
pub fn connect_to(host: &str, port: u16, timeout: Option<Duration>) -> Result<TcpStream> {
    let addrs = resolve(host, port)?;
    let mut last_err = None;

    for addr in &addrs {
        match connect_addr(addr, timeout) {
            Ok(stream) => {
                debug!("connected to {} ({}:{})", addr, host, port);
                return Ok(stream);
            }
            Err(e) => {
                warn!("connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(Error::Connect {
        host: host.to_string(),
        port,
        source: last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address to connect to")),
    })
}

fn connect_addr(addr: &SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
    let sockaddr = SockAddr::from(*addr);

    match timeout {
        Some(timeout) => socket.connect_timeout(&sockaddr, timeout)?,
        None => loop {
            match socket.connect(&sockaddr) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        },
    }

    Ok(TcpStream::from(socket))
}

/// Switch the socket to non-blocking mode
pub fn make_non_block(stream: &TcpStream) -> Result<()> {
    SockRef::from(stream)
        .set_nonblocking(true)
        .map_err(|source| Error::SocketOption {
            option: "fcntl(O_NONBLOCK)",
            source,
        })
}

/// Disable Nagle's algorithm
pub fn set_tcp_nodelay(stream: &TcpStream) -> Result<()> {
    SockRef::from(stream)
        .set_nodelay(true)
        .map_err(|source| Error::SocketOption {
            option: "setsockopt(TCP_NODELAY)",
            source,
        })
}

/// Block until `fd` is ready for `events`, or reports hangup/error
///
/// There is no timeout. Interrupted polls are restarted.
pub fn wait_ready(fd: RawFd, events: PollEvents) -> Result<Readiness> {
    use libc::{poll, pollfd, POLLERR, POLLHUP, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd,
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
            PollEvents::Both => POLLIN | POLLOUT,
        },
        revents: 0,
    };

    loop {
        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, -1) };
        if result >= 0 {
            break;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(Error::Poll(err));
        }
    }

    Ok(Readiness {
        readable: pfd.revents & POLLIN != 0,
        writable: pfd.revents & POLLOUT != 0,
        hangup: pfd.revents & (POLLHUP | POLLERR) != 0,
    })
}

/// Ignore SIGPIPE for the whole process
///
/// Writes to a peer that went away then fail with EPIPE instead of killing
/// the host process. Runs once; later calls are no-ops.
pub fn ignore_sigpipe() {
    static IGNORE: Once = Once::new();
    IGNORE.call_once(|| unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    });
}
