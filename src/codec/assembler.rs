//! Stream assembler: the append side of the receive buffer
//!
//! Every transport chunk is appended and immediately followed by a parse
//! pass. The assembler is also where the buffer bound lives: a peer that
//! advertises a large length and never completes the frame would otherwise
//! grow the buffer without limit.

use tracing::debug;

use super::scanner::{FrameScanner, ScanStats};
use crate::LinkError;
use crate::types::Frame;

/// Result of appending one chunk
#[derive(Debug, Default)]
pub struct Assembled {
    /// Complete frames extracted by the parse pass, in wire order
    pub frames: Vec<Frame>,
    /// Buffered byte count when the limit was exceeded
    pub overflowed: Option<usize>,
    /// Bytes dropped to get back under the limit
    pub discarded: usize,
    /// Limit in force for this pass
    pub limit: usize,
}

impl Assembled {
    /// The overflow of this pass, if any, as an error.
    pub fn overflow_error(&self) -> Option<LinkError> {
        self.overflowed.map(|buffered| LinkError::BufferOverflow { buffered, limit: self.limit })
    }
}

/// Owns the scanner and enforces the receive buffer limit
#[derive(Debug)]
pub struct StreamAssembler {
    scanner: FrameScanner,
    max_buffer_len: usize,
}

impl StreamAssembler {
    /// Create an assembler that resets its buffer once more than
    /// `max_buffer_len` bytes are waiting after a parse pass.
    pub fn new(max_buffer_len: usize) -> Self {
        Self { scanner: FrameScanner::with_capacity(max_buffer_len.min(8192)), max_buffer_len }
    }

    /// Append a chunk and run the parse pass to its fixed point.
    ///
    /// Over the limit, the frame at the front is given up on the way a
    /// checksum mismatch is, and parsing resumes behind its marker. Frames
    /// queued after a bogus length are kept.
    pub fn append(&mut self, chunk: &[u8]) -> Assembled {
        self.scanner.extend(chunk);
        let mut frames = self.scanner.drain_frames();

        let buffered = self.scanner.buffered();
        if buffered <= self.max_buffer_len {
            return Assembled { frames, overflowed: None, discarded: 0, limit: self.max_buffer_len };
        }

        let before = self.scanner.stats().discarded_bytes;
        while self.scanner.buffered() > self.max_buffer_len {
            self.scanner.skip_marker();
            frames.extend(self.scanner.drain_frames());
        }
        let discarded = (self.scanner.stats().discarded_bytes - before) as usize;
        debug!(
            "Receive buffer held {} bytes, dropped {} of a stalled frame ({} recovered)",
            buffered,
            discarded,
            frames.len()
        );

        Assembled { frames, overflowed: Some(buffered), discarded, limit: self.max_buffer_len }
    }

    /// Bytes waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.scanner.buffered()
    }

    /// Configured buffer limit.
    pub fn max_buffer_len(&self) -> usize {
        self.max_buffer_len
    }

    /// Scanner activity counters.
    pub fn stats(&self) -> ScanStats {
        self.scanner.stats()
    }

    /// Drop any partial frame, e.g. after the link reconnects.
    pub fn reset(&mut self) {
        self.scanner.clear();
    }
}
