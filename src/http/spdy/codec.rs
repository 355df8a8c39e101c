//! SPDY frame encoding and decoding
//!
//! `FrameCodec` owns the two zlib streams of a connection, so one codec
//! must encode every outbound frame and decode every inbound frame in wire
//! order. It has no notion of client or server and serves both roles.

use super::error::{Error, Result};
use super::frames::*;
use super::settings::SettingsEntry;
use super::zlib::{HeaderDeflater, HeaderInflater};
use super::{SpdyVersion, FRAME_HEADER_SIZE, MAX_FRAME_LENGTH, MAX_STREAM_ID};
use crate::http::Headers;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// SPDY/2 header names and their SPDY/3 equivalents
const V2_NAME_MAP: &[(&str, &str)] = &[
    ("method", ":method"),
    ("url", ":path"),
    ("version", ":version"),
    ("scheme", ":scheme"),
    ("host", ":host"),
    ("status", ":status"),
];

/// Map a SPDY/3 name to what SPDY/2 puts on the wire
pub fn to_v2_name(name: &str) -> &str {
    V2_NAME_MAP
        .iter()
        .find(|(_, v3)| *v3 == name)
        .map(|(v2, _)| *v2)
        .unwrap_or(name)
}

/// Map a SPDY/2 wire name to its SPDY/3 equivalent
pub fn to_v3_name(name: &str) -> &str {
    V2_NAME_MAP
        .iter()
        .find(|(v2, _)| *v2 == name)
        .map(|(_, v3)| *v3)
        .unwrap_or(name)
}

/// Frame codec for one connection
pub struct FrameCodec {
    version: SpdyVersion,
    deflater: HeaderDeflater,
    inflater: HeaderInflater,
}

impl FrameCodec {
    /// Create a codec with fresh zlib streams
    pub fn new(version: SpdyVersion) -> Result<Self> {
        Ok(FrameCodec {
            version,
            deflater: HeaderDeflater::new(version)?,
            inflater: HeaderInflater::new(version),
        })
    }

    /// Get negotiated version
    pub fn version(&self) -> SpdyVersion {
        self.version
    }

    /// Encode a control frame header
    pub fn encode_control_header(
        buf: &mut BytesMut,
        version: SpdyVersion,
        frame_type: FrameType,
        flags: u8,
        length: usize,
    ) -> Result<()> {
        if length > MAX_FRAME_LENGTH {
            return Err(Error::Protocol(format!("Frame length {} too large", length)));
        }
        buf.put_u16(0x8000 | version.as_u16());
        buf.put_u16(frame_type.as_u16());
        buf.put_u32((u32::from(flags) << 24) | length as u32);
        Ok(())
    }

    /// Encode a DATA frame header
    pub fn encode_data_header(
        buf: &mut BytesMut,
        stream_id: u32,
        flags: u8,
        length: usize,
    ) -> Result<()> {
        if length > MAX_FRAME_LENGTH {
            return Err(Error::Protocol(format!("Frame length {} too large", length)));
        }
        buf.put_u32(stream_id & MAX_STREAM_ID);
        buf.put_u32((u32::from(flags) << 24) | length as u32);
        Ok(())
    }

    /// Total size of the first frame in `buf`, if its header is complete
    pub fn frame_len(buf: &[u8]) -> Option<usize> {
        if buf.len() < FRAME_HEADER_SIZE {
            return None;
        }
        let length = (usize::from(buf[5]) << 16) | (usize::from(buf[6]) << 8) | usize::from(buf[7]);
        Some(FRAME_HEADER_SIZE + length)
    }

    /// Serialize a name/value block without compression
    pub fn pack_nv(version: SpdyVersion, headers: &Headers) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let too_long = |what: &str| Error::Protocol(format!("Header {} too long for SPDY/2", what));

        match version {
            SpdyVersion::V2 => {
                let count = u16::try_from(headers.len()).map_err(|_| too_long("count"))?;
                buf.put_u16(count);
                for (name, value) in headers.iter() {
                    let name = to_v2_name(name);
                    buf.put_u16(u16::try_from(name.len()).map_err(|_| too_long("name"))?);
                    buf.put_slice(name.as_bytes());
                    buf.put_u16(u16::try_from(value.len()).map_err(|_| too_long("value"))?);
                    buf.put_slice(value.as_bytes());
                }
            }
            SpdyVersion::V3 => {
                buf.put_u32(headers.len() as u32);
                for (name, value) in headers.iter() {
                    buf.put_u32(name.len() as u32);
                    buf.put_slice(name.as_bytes());
                    buf.put_u32(value.len() as u32);
                    buf.put_slice(value.as_bytes());
                }
            }
        }

        Ok(buf)
    }

    /// Parse an uncompressed name/value block
    ///
    /// SPDY/2 names are returned under their SPDY/3 equivalents.
    pub fn unpack_nv(version: SpdyVersion, mut data: &[u8]) -> Result<Headers> {
        let truncated = || Error::Protocol("Truncated name/value block".to_string());

        let read_len = |data: &mut &[u8]| -> Result<usize> {
            match version {
                SpdyVersion::V2 if data.remaining() >= 2 => Ok(usize::from(data.get_u16())),
                SpdyVersion::V3 if data.remaining() >= 4 => Ok(data.get_u32() as usize),
                _ => Err(truncated()),
            }
        };
        let read_str = |data: &mut &[u8], len: usize| -> Result<String> {
            if data.remaining() < len {
                return Err(truncated());
            }
            let s = std::str::from_utf8(&data[..len])
                .map_err(|_| Error::Protocol("Header is not valid UTF-8".to_string()))?
                .to_string();
            data.advance(len);
            Ok(s)
        };

        let count = read_len(&mut data)?;
        let mut pairs = Vec::with_capacity(count.min(crate::http::headers::MAX_HEADERS));
        for _ in 0..count {
            let name_len = read_len(&mut data)?;
            let name = read_str(&mut data, name_len)?;
            let value_len = read_len(&mut data)?;
            let value = read_str(&mut data, value_len)?;
            pairs.push((name, value));
        }

        let headers = Headers::from_raw(pairs);
        headers
            .validate()
            .map_err(|e| Error::Protocol(e.to_string()))?;

        Ok(match version {
            SpdyVersion::V2 => headers.map_names(to_v3_name),
            SpdyVersion::V3 => headers,
        })
    }

    fn encode_header_block(&mut self, headers: &Headers) -> Result<Vec<u8>> {
        let nv = Self::pack_nv(self.version, headers)?;
        self.deflater.deflate(&nv)
    }

    fn decode_header_block(&mut self, block: &[u8]) -> Result<Headers> {
        if block.is_empty() {
            return Ok(Headers::new());
        }
        let nv = self.inflater.inflate(block)?;
        Self::unpack_nv(self.version, &nv)
    }

    /// Encode any frame
    pub fn encode(&mut self, frame: &Frame) -> Result<Bytes> {
        let version = self.version;
        let mut buf = BytesMut::new();

        match frame {
            Frame::SynStream(f) => {
                let block = self.encode_header_block(&f.headers)?;
                let mut flags = 0;
                if f.fin {
                    flags |= FLAG_FIN;
                }
                if f.unidirectional {
                    flags |= FLAG_UNIDIRECTIONAL;
                }
                Self::encode_control_header(&mut buf, version, FrameType::SynStream, flags, 10 + block.len())?;
                buf.put_u32(f.stream_id & MAX_STREAM_ID);
                buf.put_u32(f.assoc_stream_id & MAX_STREAM_ID);
                match version {
                    SpdyVersion::V2 => {
                        buf.put_u8((f.priority & 0x3) << 6);
                        buf.put_u8(0);
                    }
                    SpdyVersion::V3 => {
                        buf.put_u8((f.priority & 0x7) << 5);
                        buf.put_u8(f.slot);
                    }
                }
                buf.put_slice(&block);
            }
            Frame::SynReply(SynReplyFrame { stream_id, fin, headers })
            | Frame::Headers(HeadersFrame { stream_id, fin, headers }) => {
                let frame_type = if matches!(frame, Frame::SynReply(_)) {
                    FrameType::SynReply
                } else {
                    FrameType::Headers
                };
                let block = self.encode_header_block(headers)?;
                let flags = if *fin { FLAG_FIN } else { 0 };
                let fixed = match version {
                    SpdyVersion::V2 => 6,
                    SpdyVersion::V3 => 4,
                };
                Self::encode_control_header(&mut buf, version, frame_type, flags, fixed + block.len())?;
                buf.put_u32(stream_id & MAX_STREAM_ID);
                if version == SpdyVersion::V2 {
                    buf.put_u16(0);
                }
                buf.put_slice(&block);
            }
            Frame::RstStream(f) => {
                Self::encode_control_header(&mut buf, version, FrameType::RstStream, 0, 8)?;
                buf.put_u32(f.stream_id & MAX_STREAM_ID);
                buf.put_u32(f.status.as_u32());
            }
            Frame::Settings(f) => {
                let flags = if f.clear { FLAG_SETTINGS_CLEAR } else { 0 };
                Self::encode_control_header(&mut buf, version, FrameType::Settings, flags, 4 + 8 * f.entries.len())?;
                buf.put_u32(f.entries.len() as u32);
                for entry in &f.entries {
                    let id = entry.id & 0x00FF_FFFF;
                    match version {
                        // SPDY/2 puts the id little-endian, a long-standing quirk
                        SpdyVersion::V2 => {
                            buf.put_u8(id as u8);
                            buf.put_u8((id >> 8) as u8);
                            buf.put_u8((id >> 16) as u8);
                            buf.put_u8(entry.flags);
                        }
                        SpdyVersion::V3 => {
                            buf.put_u32((u32::from(entry.flags) << 24) | id);
                        }
                    }
                    buf.put_u32(entry.value);
                }
            }
            Frame::Noop => {
                Self::encode_control_header(&mut buf, version, FrameType::Noop, 0, 0)?;
            }
            Frame::Ping(f) => {
                Self::encode_control_header(&mut buf, version, FrameType::Ping, 0, 4)?;
                buf.put_u32(f.unique_id);
            }
            Frame::Goaway(f) => {
                let length = match version {
                    SpdyVersion::V2 => 4,
                    SpdyVersion::V3 => 8,
                };
                Self::encode_control_header(&mut buf, version, FrameType::Goaway, 0, length)?;
                buf.put_u32(f.last_good_stream_id & MAX_STREAM_ID);
                if version == SpdyVersion::V3 {
                    buf.put_u32(f.status.as_u32());
                }
            }
            Frame::WindowUpdate(f) => {
                Self::encode_control_header(&mut buf, version, FrameType::WindowUpdate, 0, 8)?;
                buf.put_u32(f.stream_id & MAX_STREAM_ID);
                buf.put_u32(f.delta_window_size & 0x7FFF_FFFF);
            }
            Frame::Credential(payload) => {
                Self::encode_control_header(&mut buf, version, FrameType::Credential, 0, payload.len())?;
                buf.put_slice(payload);
            }
            Frame::Data(f) => {
                let flags = if f.fin { FLAG_FIN } else { 0 };
                Self::encode_data_header(&mut buf, f.stream_id, flags, f.data.len())?;
                buf.put_slice(&f.data);
            }
            Frame::Unknown { frame_type, .. } => {
                return Err(Error::Protocol(format!(
                    "Cannot encode unknown frame type {}",
                    frame_type
                )));
            }
        }

        Ok(buf.freeze())
    }

    /// Decode the first frame in `buf`
    ///
    /// Returns `None` until a whole frame is buffered, otherwise the frame
    /// and the number of bytes it occupied.
    pub fn decode(&mut self, buf: &[u8]) -> Result<Option<(Frame, usize)>> {
        let total = match Self::frame_len(buf) {
            Some(total) if buf.len() >= total => total,
            _ => return Ok(None),
        };

        let mut header = &buf[..FRAME_HEADER_SIZE];
        let first = header.get_u32();
        let flags = header.get_u8();
        let length = total - FRAME_HEADER_SIZE;
        let payload = &buf[FRAME_HEADER_SIZE..total];

        if first & 0x8000_0000 == 0 {
            let frame = DataFrame {
                stream_id: first & MAX_STREAM_ID,
                fin: flags & FLAG_FIN != 0,
                data: Bytes::copy_from_slice(payload),
            };
            return Ok(Some((Frame::Data(frame), total)));
        }

        let version = ((first >> 16) & 0x7FFF) as u16;
        if version != self.version.as_u16() {
            return Err(Error::UnsupportedVersion(version));
        }
        let type_value = (first & 0xFFFF) as u16;

        let frame = match FrameType::from_u16(type_value) {
            Some(frame_type) => self.decode_control(frame_type, flags, payload)?,
            None => None,
        };
        let frame = frame.unwrap_or(Frame::Unknown {
            frame_type: type_value,
            length,
        });

        Ok(Some((frame, total)))
    }

    /// Decode a control frame payload; `None` for types not in this version
    fn decode_control(&mut self, frame_type: FrameType, flags: u8, payload: &[u8]) -> Result<Option<Frame>> {
        let version = self.version;
        let bad_length = || {
            Error::Protocol(format!(
                "Invalid {} length {}",
                frame_type.name(),
                payload.len()
            ))
        };
        let mut p = payload;

        let frame = match frame_type {
            FrameType::SynStream => {
                if p.len() < 10 {
                    return Err(bad_length());
                }
                let stream_id = p.get_u32() & MAX_STREAM_ID;
                let assoc_stream_id = p.get_u32() & MAX_STREAM_ID;
                let pri = p.get_u8();
                let slot = p.get_u8();
                let (priority, slot) = match version {
                    SpdyVersion::V2 => (pri >> 6, 0),
                    SpdyVersion::V3 => (pri >> 5, slot),
                };
                let headers = self.decode_header_block(p)?;
                Frame::SynStream(SynStreamFrame {
                    stream_id,
                    assoc_stream_id,
                    priority,
                    slot,
                    fin: flags & FLAG_FIN != 0,
                    unidirectional: flags & FLAG_UNIDIRECTIONAL != 0,
                    headers,
                })
            }
            FrameType::SynReply | FrameType::Headers => {
                let fixed = match version {
                    SpdyVersion::V2 => 6,
                    SpdyVersion::V3 => 4,
                };
                if p.len() < fixed {
                    return Err(bad_length());
                }
                let stream_id = p.get_u32() & MAX_STREAM_ID;
                p.advance(fixed - 4);
                let headers = self.decode_header_block(p)?;
                let fin = flags & FLAG_FIN != 0;
                if frame_type == FrameType::SynReply {
                    Frame::SynReply(SynReplyFrame { stream_id, fin, headers })
                } else {
                    Frame::Headers(HeadersFrame { stream_id, fin, headers })
                }
            }
            FrameType::RstStream => {
                if p.len() != 8 {
                    return Err(bad_length());
                }
                Frame::RstStream(RstStreamFrame {
                    stream_id: p.get_u32() & MAX_STREAM_ID,
                    status: StatusCode::from_u32(p.get_u32()),
                })
            }
            FrameType::Settings => {
                if p.len() < 4 {
                    return Err(bad_length());
                }
                let count = p.get_u32() as usize;
                if p.len() / 8 != count || p.len() % 8 != 0 {
                    return Err(bad_length());
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let (id, entry_flags) = match version {
                        SpdyVersion::V2 => {
                            let b = [p.get_u8(), p.get_u8(), p.get_u8(), p.get_u8()];
                            (u32::from_le_bytes([b[0], b[1], b[2], 0]), b[3])
                        }
                        SpdyVersion::V3 => {
                            let word = p.get_u32();
                            (word & 0x00FF_FFFF, (word >> 24) as u8)
                        }
                    };
                    entries.push(SettingsEntry {
                        id,
                        flags: entry_flags,
                        value: p.get_u32(),
                    });
                }
                Frame::Settings(SettingsFrame {
                    clear: flags & FLAG_SETTINGS_CLEAR != 0,
                    entries,
                })
            }
            FrameType::Noop => match version {
                SpdyVersion::V2 => Frame::Noop,
                SpdyVersion::V3 => return Ok(None),
            },
            FrameType::Ping => {
                if p.len() != 4 {
                    return Err(bad_length());
                }
                Frame::Ping(PingFrame {
                    unique_id: p.get_u32(),
                })
            }
            FrameType::Goaway => {
                let expected = match version {
                    SpdyVersion::V2 => 4,
                    SpdyVersion::V3 => 8,
                };
                if p.len() != expected {
                    return Err(bad_length());
                }
                let last_good_stream_id = p.get_u32() & MAX_STREAM_ID;
                let status = match version {
                    SpdyVersion::V2 => GoawayStatus::Ok,
                    SpdyVersion::V3 => GoawayStatus::from_u32(p.get_u32()),
                };
                Frame::Goaway(GoawayFrame {
                    last_good_stream_id,
                    status,
                })
            }
            FrameType::WindowUpdate => match version {
                SpdyVersion::V2 => return Ok(None),
                SpdyVersion::V3 => {
                    if p.len() != 8 {
                        return Err(bad_length());
                    }
                    Frame::WindowUpdate(WindowUpdateFrame {
                        stream_id: p.get_u32() & MAX_STREAM_ID,
                        delta_window_size: p.get_u32() & 0x7FFF_FFFF,
                    })
                }
            },
            FrameType::Credential => match version {
                SpdyVersion::V2 => return Ok(None),
                SpdyVersion::V3 => Frame::Credential(Bytes::copy_from_slice(p)),
            },
            FrameType::Data => return Ok(None),
        };

        Ok(Some(frame))
    }
}
