//! SPDY frame types
//!
//! Typed representations of SPDY/2 and SPDY/3 frames. Header blocks are
//! carried decompressed; the codec handles zlib and the per-version layout.

use super::settings::SettingsEntry;
use super::stream::StreamId;
use crate::http::Headers;
use bytes::Bytes;
use std::fmt;

/// SPDY frame types
///
/// Control types carry their wire value. `Data` is not a control type and
/// has no wire value of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Data,
    SynStream,
    SynReply,
    RstStream,
    Settings,
    /// SPDY/2 only
    Noop,
    Ping,
    Goaway,
    Headers,
    /// SPDY/3 only
    WindowUpdate,
    /// SPDY/3 only, ignored
    Credential,
}

impl FrameType {
    /// Control frame type value (0 for DATA)
    pub fn as_u16(self) -> u16 {
        match self {
            FrameType::Data => 0,
            FrameType::SynStream => 1,
            FrameType::SynReply => 2,
            FrameType::RstStream => 3,
            FrameType::Settings => 4,
            FrameType::Noop => 5,
            FrameType::Ping => 6,
            FrameType::Goaway => 7,
            FrameType::Headers => 8,
            FrameType::WindowUpdate => 9,
            FrameType::Credential => 10,
        }
    }

    /// Create control frame type from its wire value
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FrameType::SynStream),
            2 => Some(FrameType::SynReply),
            3 => Some(FrameType::RstStream),
            4 => Some(FrameType::Settings),
            5 => Some(FrameType::Noop),
            6 => Some(FrameType::Ping),
            7 => Some(FrameType::Goaway),
            8 => Some(FrameType::Headers),
            9 => Some(FrameType::WindowUpdate),
            10 => Some(FrameType::Credential),
            _ => None,
        }
    }

    /// Get frame type name
    pub fn name(&self) -> &'static str {
        match self {
            FrameType::Data => "DATA",
            FrameType::SynStream => "SYN_STREAM",
            FrameType::SynReply => "SYN_REPLY",
            FrameType::RstStream => "RST_STREAM",
            FrameType::Settings => "SETTINGS",
            FrameType::Noop => "NOOP",
            FrameType::Ping => "PING",
            FrameType::Goaway => "GOAWAY",
            FrameType::Headers => "HEADERS",
            FrameType::WindowUpdate => "WINDOW_UPDATE",
            FrameType::Credential => "CREDENTIAL",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u16())
    }
}

/// FIN flag (SYN_STREAM, SYN_REPLY, HEADERS, DATA)
pub const FLAG_FIN: u8 = 0x01;

/// UNIDIRECTIONAL flag (SYN_STREAM)
pub const FLAG_UNIDIRECTIONAL: u8 = 0x02;

/// CLEAR_SETTINGS flag (SETTINGS)
pub const FLAG_SETTINGS_CLEAR: u8 = 0x01;

/// RST_STREAM status codes
///
/// `Ok` is never sent on the wire; it is the close status of a stream that
/// ended normally. Codes 8 and above exist in SPDY/3 only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    ProtocolError,
    InvalidStream,
    RefusedStream,
    UnsupportedVersion,
    Cancel,
    InternalError,
    FlowControlError,
    StreamInUse,
    StreamAlreadyClosed,
    InvalidCredentials,
    FrameTooLarge,
    /// Status value this implementation does not know
    Unknown(u32),
}

impl StatusCode {
    /// Convert status code to u32
    pub fn as_u32(self) -> u32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::ProtocolError => 1,
            StatusCode::InvalidStream => 2,
            StatusCode::RefusedStream => 3,
            StatusCode::UnsupportedVersion => 4,
            StatusCode::Cancel => 5,
            StatusCode::InternalError => 6,
            StatusCode::FlowControlError => 7,
            StatusCode::StreamInUse => 8,
            StatusCode::StreamAlreadyClosed => 9,
            StatusCode::InvalidCredentials => 10,
            StatusCode::FrameTooLarge => 11,
            StatusCode::Unknown(code) => code,
        }
    }

    /// Create status code from u32
    pub fn from_u32(code: u32) -> Self {
        match code {
            0 => StatusCode::Ok,
            1 => StatusCode::ProtocolError,
            2 => StatusCode::InvalidStream,
            3 => StatusCode::RefusedStream,
            4 => StatusCode::UnsupportedVersion,
            5 => StatusCode::Cancel,
            6 => StatusCode::InternalError,
            7 => StatusCode::FlowControlError,
            8 => StatusCode::StreamInUse,
            9 => StatusCode::StreamAlreadyClosed,
            10 => StatusCode::InvalidCredentials,
            11 => StatusCode::FrameTooLarge,
            other => StatusCode::Unknown(other),
        }
    }

    /// Get status name
    pub fn name(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::ProtocolError => "PROTOCOL_ERROR",
            StatusCode::InvalidStream => "INVALID_STREAM",
            StatusCode::RefusedStream => "REFUSED_STREAM",
            StatusCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            StatusCode::Cancel => "CANCEL",
            StatusCode::InternalError => "INTERNAL_ERROR",
            StatusCode::FlowControlError => "FLOW_CONTROL_ERROR",
            StatusCode::StreamInUse => "STREAM_IN_USE",
            StatusCode::StreamAlreadyClosed => "STREAM_ALREADY_CLOSED",
            StatusCode::InvalidCredentials => "INVALID_CREDENTIALS",
            StatusCode::FrameTooLarge => "FRAME_TOO_LARGE",
            StatusCode::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u32())
    }
}

/// GOAWAY status codes (SPDY/3; SPDY/2 GOAWAY carries none)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoawayStatus {
    Ok,
    ProtocolError,
    InternalError,
    Unknown(u32),
}

impl GoawayStatus {
    /// Convert status to u32
    pub fn as_u32(self) -> u32 {
        match self {
            GoawayStatus::Ok => 0,
            GoawayStatus::ProtocolError => 1,
            GoawayStatus::InternalError => 11,
            GoawayStatus::Unknown(code) => code,
        }
    }

    /// Create status from u32
    pub fn from_u32(code: u32) -> Self {
        match code {
            0 => GoawayStatus::Ok,
            1 => GoawayStatus::ProtocolError,
            11 => GoawayStatus::InternalError,
            other => GoawayStatus::Unknown(other),
        }
    }
}

/// SYN_STREAM frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynStreamFrame {
    pub stream_id: StreamId,
    pub assoc_stream_id: StreamId,
    /// 0 is highest; 0..=3 on SPDY/2, 0..=7 on SPDY/3
    pub priority: u8,
    /// Credential slot (SPDY/3)
    pub slot: u8,
    pub fin: bool,
    pub unidirectional: bool,
    pub headers: Headers,
}

/// SYN_REPLY frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynReplyFrame {
    pub stream_id: StreamId,
    pub fin: bool,
    pub headers: Headers,
}

/// RST_STREAM frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstStreamFrame {
    pub stream_id: StreamId,
    pub status: StatusCode,
}

/// SETTINGS frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFrame {
    pub clear: bool,
    pub entries: Vec<SettingsEntry>,
}

/// PING frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingFrame {
    pub unique_id: u32,
}

/// GOAWAY frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoawayFrame {
    pub last_good_stream_id: StreamId,
    /// Not encoded on SPDY/2
    pub status: GoawayStatus,
}

/// HEADERS frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersFrame {
    pub stream_id: StreamId,
    pub fin: bool,
    pub headers: Headers,
}

/// WINDOW_UPDATE frame (SPDY/3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUpdateFrame {
    pub stream_id: StreamId,
    pub delta_window_size: u32,
}

/// DATA frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub stream_id: StreamId,
    pub fin: bool,
    pub data: Bytes,
}

impl DataFrame {
    /// Create a new DATA frame
    pub fn new(stream_id: StreamId, data: impl Into<Bytes>, fin: bool) -> Self {
        DataFrame {
            stream_id,
            fin,
            data: data.into(),
        }
    }
}

/// Any SPDY frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    SynStream(SynStreamFrame),
    SynReply(SynReplyFrame),
    RstStream(RstStreamFrame),
    Settings(SettingsFrame),
    Noop,
    Ping(PingFrame),
    Goaway(GoawayFrame),
    Headers(HeadersFrame),
    WindowUpdate(WindowUpdateFrame),
    /// Payload is kept opaque
    Credential(Bytes),
    Data(DataFrame),
    /// Control frame of a type this implementation does not know
    Unknown { frame_type: u16, length: usize },
}

impl Frame {
    /// Frame type, `None` for unknown control types
    pub fn frame_type(&self) -> Option<FrameType> {
        Some(match self {
            Frame::SynStream(_) => FrameType::SynStream,
            Frame::SynReply(_) => FrameType::SynReply,
            Frame::RstStream(_) => FrameType::RstStream,
            Frame::Settings(_) => FrameType::Settings,
            Frame::Noop => FrameType::Noop,
            Frame::Ping(_) => FrameType::Ping,
            Frame::Goaway(_) => FrameType::Goaway,
            Frame::Headers(_) => FrameType::Headers,
            Frame::WindowUpdate(_) => FrameType::WindowUpdate,
            Frame::Credential(_) => FrameType::Credential,
            Frame::Data(_) => FrameType::Data,
            Frame::Unknown { .. } => return None,
        })
    }

    /// Stream the frame belongs to, 0 for session-level frames
    pub fn stream_id(&self) -> StreamId {
        match self {
            Frame::SynStream(f) => f.stream_id,
            Frame::SynReply(f) => f.stream_id,
            Frame::RstStream(f) => f.stream_id,
            Frame::Headers(f) => f.stream_id,
            Frame::WindowUpdate(f) => f.stream_id,
            Frame::Data(f) => f.stream_id,
            _ => 0,
        }
    }

    /// Header block carried by the frame, if any
    pub fn headers(&self) -> Option<&Headers> {
        match self {
            Frame::SynStream(f) => Some(&f.headers),
            Frame::SynReply(f) => Some(&f.headers),
            Frame::Headers(f) => Some(&f.headers),
            _ => None,
        }
    }

    /// Check whether the frame half-closes its stream
    pub fn is_fin(&self) -> bool {
        match self {
            Frame::SynStream(f) => f.fin,
            Frame::SynReply(f) => f.fin,
            Frame::Headers(f) => f.fin,
            Frame::Data(f) => f.fin,
            _ => false,
        }
    }

    /// Get frame name for logging
    pub fn name(&self) -> &'static str {
        self.frame_type().map(|t| t.name()).unwrap_or("UNKNOWN")
    }
}
