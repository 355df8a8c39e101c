//! Header block compression
//!
//! SPDY compresses every name/value block with zlib, using one stream per
//! direction for the whole connection and a version-specific preset
//! dictionary. Each outbound block ends with a sync flush so the peer can
//! decode it without waiting for the next one.

use super::error::{Error, Result};
use super::{SpdyVersion, MAX_HEADER_BLOCK_SIZE};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use std::sync::OnceLock;

/// SPDY/2 preset dictionary, including its trailing NUL
pub const V2_DICTIONARY: &[u8] = b"optionsgetheadpostputdeletetraceacceptaccept-charsetaccept-encodingaccept-\
languageauthorizationexpectfromhostif-modified-sinceif-matchif-none-matchi\
f-rangeif-unmodifiedsincemax-forwardsproxy-authorizationrangerefererteuser\
-agent10010120020120220320420520630030130230330430530630740040140240340440\
5406407408409410411412413414415416417500501502503504505accept-rangesageeta\
glocationproxy-authenticatepublicretry-afterservervarywarningwww-authentic\
ateallowcontent-basecontent-encodingcache-controlconnectiondatetrailertran\
sfer-encodingupgradeviawarningcontent-languagecontent-lengthcontent-locati\
oncontent-md5content-rangecontent-typeetagexpireslast-modifiedset-cookieMo\
ndayTuesdayWednesdayThursdayFridaySaturdaySundayJanFebMarAprMayJunJulAugSe\
pOctNovDecchunkedtext/htmlimage/pngimage/jpgimage/gifapplication/xmlapplic\
ation/xhtmltext/plainpublicmax-agecharset=iso-8859-1utf-8gzipdeflateHTTP/1\
.1statusversionurl\0";

/// Words of the SPDY/3 dictionary that carry a 32-bit length prefix
const V3_DICTIONARY_WORDS: &[&str] = &[
    "options", "head", "post", "put", "delete", "trace", "accept", "accept-charset",
    "accept-encoding", "accept-language", "accept-ranges", "age", "allow", "authorization",
    "cache-control", "connection", "content-base", "content-encoding", "content-language",
    "content-length", "content-location", "content-md5", "content-range", "content-type",
    "date", "etag", "expect", "expires", "from", "host", "if-match", "if-modified-since",
    "if-none-match", "if-range", "if-unmodified-since", "last-modified", "location",
    "max-forwards", "pragma", "proxy-authenticate", "proxy-authorization", "range", "referer",
    "retry-after", "server", "te", "trailer", "transfer-encoding", "upgrade", "user-agent",
    "vary", "via", "warning", "www-authenticate", "method", "get", "status", "200 OK",
    "version", "HTTP/1.1", "url", "public", "set-cookie", "keep-alive", "origin",
];

/// Unprefixed tail of the SPDY/3 dictionary
const V3_DICTIONARY_TAIL: &str = concat!(
    "100101201202205206300302303304305306307402405406407408409410411412413414415416417502504505",
    "203 Non-Authoritative Information204 No Content301 Moved Permanently400 Bad Request",
    "401 Unauthorized403 Forbidden404 Not Found500 Internal Server Error501 Not Implemented",
    "503 Service Unavailable",
    "Jan Feb Mar Apr May Jun Jul Aug Sept Oct Nov Dec 00:00:00 Mon, Tue, Wed, Thu, Fri, Sat, Sun, GMT",
    "chunked,text/html,image/png,image/jpg,image/gif,application/xml,application/xhtml+xml,",
    "text/plain,text/javascript,publicprivatemax-age=gzip,deflate,sdchcharset=utf-8",
    "charset=iso-8859-1,utf-,*,enq=0.",
);

/// SPDY/3 preset dictionary
pub fn v3_dictionary() -> &'static [u8] {
    static DICTIONARY: OnceLock<Vec<u8>> = OnceLock::new();
    DICTIONARY.get_or_init(|| {
        let mut dict = Vec::with_capacity(1423);
        for word in V3_DICTIONARY_WORDS {
            dict.extend_from_slice(&(word.len() as u32).to_be_bytes());
            dict.extend_from_slice(word.as_bytes());
        }
        dict.extend_from_slice(V3_DICTIONARY_TAIL.as_bytes());
        dict
    })
}

/// Preset dictionary for a version
pub fn dictionary(version: SpdyVersion) -> &'static [u8] {
    match version {
        SpdyVersion::V2 => V2_DICTIONARY,
        SpdyVersion::V3 => v3_dictionary(),
    }
}

/// Outbound header block compressor
pub struct HeaderDeflater {
    inner: Compress,
}

impl HeaderDeflater {
    /// Create a compressor primed with the version's dictionary
    pub fn new(version: SpdyVersion) -> Result<Self> {
        let mut inner = Compress::new(Compression::default(), true);
        inner.set_dictionary(dictionary(version))?;
        Ok(HeaderDeflater { inner })
    }

    /// Compress one block, ending with a sync flush
    pub fn deflate(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let start = self.inner.total_in();
        let mut out = Vec::with_capacity(input.len() / 2 + 64);

        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity().max(256));
            }
            let consumed = (self.inner.total_in() - start) as usize;
            self.inner
                .compress_vec(&input[consumed..], &mut out, FlushCompress::Sync)?;

            let consumed = (self.inner.total_in() - start) as usize;
            // Spare output room after a sync flush means the flush completed
            if consumed == input.len() && out.len() < out.capacity() {
                return Ok(out);
            }
        }
    }
}

/// Inbound header block decompressor
pub struct HeaderInflater {
    inner: Decompress,
    dictionary: &'static [u8],
}

impl HeaderInflater {
    /// Create a decompressor for the version's dictionary
    pub fn new(version: SpdyVersion) -> Self {
        HeaderInflater {
            inner: Decompress::new(true),
            dictionary: dictionary(version),
        }
    }

    /// Decompress one block
    ///
    /// Output larger than 64 KiB is a protocol error.
    pub fn inflate(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let start = self.inner.total_in();
        let mut out = Vec::with_capacity((input.len() * 4).clamp(256, MAX_HEADER_BLOCK_SIZE));

        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity());
            }
            let consumed = (self.inner.total_in() - start) as usize;
            let produced = out.len();

            match self
                .inner
                .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Sync)
            {
                Ok(Status::StreamEnd) => return Ok(out),
                Ok(_) => {}
                Err(e) => match e.needs_dictionary() {
                    Some(_) => {
                        self.inner.set_dictionary(self.dictionary)?;
                        continue;
                    }
                    None => return Err(Error::Compression(e.to_string())),
                },
            }

            if out.len() > MAX_HEADER_BLOCK_SIZE {
                return Err(Error::Protocol(format!(
                    "Header block exceeds {} bytes",
                    MAX_HEADER_BLOCK_SIZE
                )));
            }

            let now_consumed = (self.inner.total_in() - start) as usize;
            if now_consumed == input.len() && out.len() < out.capacity() {
                return Ok(out);
            }
            if now_consumed == consumed && out.len() == produced && out.len() < out.capacity() {
                return Err(Error::Compression(
                    "Header block stream made no progress".to_string(),
                ));
            }
        }
    }
}
