//! Incremental gzip decoding of response bodies
//!
//! DATA frames split a gzip member at arbitrary byte boundaries. The
//! inflater keeps its state across chunks and decodes each chunk through a
//! fixed 4 KiB window, handing every filled window to a sink.

use super::error::{Error, Result};
use flate2::{Decompress, FlushDecompress, Status};
use log::warn;

/// Size of the output window
pub const WINDOW_SIZE: usize = 4096;

/// Streaming gzip inflater
pub struct GzipInflater {
    inner: Decompress,
    window: Box<[u8; WINDOW_SIZE]>,
    finished: bool,
}

impl GzipInflater {
    /// Create an inflater expecting a gzip header
    pub fn new() -> Self {
        GzipInflater {
            inner: Decompress::new_gzip(15),
            window: Box::new([0; WINDOW_SIZE]),
            finished: false,
        }
    }

    /// Check whether the gzip trailer was seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decode one chunk, passing each decoded window to `sink`
    ///
    /// Stops early if `sink` fails. Bytes after the end of the gzip member
    /// are discarded.
    pub fn inflate<F>(&mut self, mut input: &[u8], mut sink: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        loop {
            if self.finished {
                if !input.is_empty() {
                    warn!("Discarding {} bytes after end of gzip body", input.len());
                }
                return Ok(());
            }

            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();
            let status = self
                .inner
                .decompress(input, &mut self.window[..], FlushDecompress::None)
                .map_err(|e| Error::Decompression(e.to_string()))?;
            let consumed = (self.inner.total_in() - before_in) as usize;
            let produced = (self.inner.total_out() - before_out) as usize;

            input = &input[consumed..];
            if produced > 0 {
                sink(&self.window[..produced])?;
            }

            match status {
                Status::StreamEnd => self.finished = true,
                Status::Ok | Status::BufError => {
                    // A full window may hide pending output; go round again
                    if produced == WINDOW_SIZE {
                        continue;
                    }
                    if input.is_empty() || consumed == 0 {
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl Default for GzipInflater {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn inflate_chunks(compressed: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut inflater = GzipInflater::new();
        let mut out = Vec::new();
        for chunk in compressed.chunks(chunk_size) {
            inflater
                .inflate(chunk, |window| {
                    assert!(window.len() <= WINDOW_SIZE);
                    out.extend_from_slice(window);
                    Ok(())
                })
                .unwrap();
        }
        assert!(inflater.is_finished());
        out
    }

    #[test]
    fn test_inflate_whole() {
        let plain = b"<html><body>Hello SPDY</body></html>".repeat(10);
        assert_eq!(inflate_chunks(&gzip(&plain), usize::MAX), plain);
    }

    #[test]
    fn test_inflate_arbitrary_boundaries() {
        let plain: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = gzip(&plain);
        for chunk_size in [1, 7, 4096, 4097] {
            assert_eq!(inflate_chunks(&compressed, chunk_size), plain);
        }
    }

    #[test]
    fn test_highly_compressible_input_drains_window() {
        // One small chunk expands to many windows
        let plain = vec![b'z'; 100_000];
        let compressed = gzip(&plain);
        assert!(compressed.len() < WINDOW_SIZE);
        assert_eq!(inflate_chunks(&compressed, usize::MAX), plain);
    }

    #[test]
    fn test_trailing_garbage_discarded() {
        let mut compressed = gzip(b"payload");
        compressed.extend_from_slice(b"junk");
        assert_eq!(inflate_chunks(&compressed, usize::MAX), b"payload");
    }

    #[test]
    fn test_invalid_input() {
        let mut inflater = GzipInflater::new();
        let result = inflater.inflate(b"this is not gzip", |_| Ok(()));
        assert!(matches!(result, Err(Error::Decompression(_))));
    }

    #[test]
    fn test_sink_error_stops() {
        let plain = vec![b'q'; 20_000];
        let mut inflater = GzipInflater::new();
        let mut calls = 0;
        let result = inflater.inflate(&gzip(&plain), |_| {
            calls += 1;
            Err(Error::BodyTooLarge { limit: 0 })
        });
        assert!(matches!(result, Err(Error::BodyTooLarge { limit: 0 })));
        assert_eq!(calls, 1);
    }
}
