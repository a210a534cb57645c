//! Frame synchronisation and resynchronisation over a byte buffer
//!
//! The scanner owns the receive buffer between parse passes. Each step finds
//! the sync marker, waits until the advertised frame is complete, verifies
//! the checksum, and either emits the frame or skips past the false marker.
//!
//! ## Resync
//!
//! A checksum mismatch drops everything up to and including the bogus
//! marker, then scanning restarts from the next byte. Every mismatch removes
//! at least two bytes, so a pass always terminates.
//!
//! ## Usage Example
//!
//! ```rust
//! use racebox_link::codec::FrameScanner;
//! use racebox_link::types::Frame;
//!
//! let wire = Frame::new(0xFF, 0x02, vec![0xFF, 0x23]).unwrap().encode();
//!
//! let mut scanner = FrameScanner::new();
//! scanner.extend(&wire[..5]);
//! assert!(scanner.next_frame().is_none());
//!
//! scanner.extend(&wire[5..]);
//! let frame = scanner.next_frame().unwrap();
//! assert_eq!((frame.class(), frame.id()), (0xFF, 0x02));
//! ```

use std::sync::Arc;
use tracing::{debug, trace};

use crate::types::{Checksum, FRAME_OVERHEAD, Frame, HEADER_LEN, SYNC};

/// Counters describing scanner activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Frames emitted
    pub frames: u64,
    /// Checksum mismatches skipped
    pub resyncs: u64,
    /// Bytes dropped without being part of an emitted frame
    pub discarded_bytes: u64,
}

/// Outcome of a single scan step
enum Step {
    Frame(Frame),
    Resync,
    NeedMore,
}

/// Incremental frame scanner over an append-only byte buffer
#[derive(Debug, Default)]
pub struct FrameScanner {
    buffer: Vec<u8>,
    stats: ScanStats,
}

impl FrameScanner {
    /// Create an empty scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty scanner with a preallocated buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buffer: Vec::with_capacity(capacity), stats: ScanStats::default() }
    }

    /// Append received bytes to the back of the buffer.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of bytes waiting to be parsed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.stats.discarded_bytes += self.buffer.len() as u64;
        self.buffer.clear();
    }

    /// Give up on the frame at the front of the buffer: drop its marker so
    /// the next pass scans from the following byte. Returns bytes dropped.
    pub fn skip_marker(&mut self) -> usize {
        let count = self.buffer.len().min(SYNC.len());
        self.discard(count);
        count
    }

    /// Scanner activity counters.
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Extract the next complete frame, resynchronising past corruption.
    ///
    /// Returns `None` when no complete frame is buffered yet.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.step() {
                Step::Frame(frame) => return Some(frame),
                Step::Resync => continue,
                Step::NeedMore => return None,
            }
        }
    }

    /// Run a parse pass to its fixed point, returning every complete frame.
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    fn step(&mut self) -> Step {
        let Some(start) = find_sync(&self.buffer) else {
            // The last byte may be the first half of a split marker
            let keep_from = self.buffer.len().saturating_sub(1);
            self.discard(keep_from);
            return Step::NeedMore;
        };

        // Bytes ahead of the marker can never start a frame
        self.discard(start);

        if self.buffer.len() < HEADER_LEN {
            return Step::NeedMore;
        }

        let class = self.buffer[2];
        let id = self.buffer[3];
        let length = u16::from_le_bytes([self.buffer[4], self.buffer[5]]) as usize;
        let frame_len = FRAME_OVERHEAD + length;

        if self.buffer.len() < frame_len {
            trace!(
                "Waiting for frame {:02X}/{:02X}: have {} of {} bytes",
                class,
                id,
                self.buffer.len(),
                frame_len
            );
            return Step::NeedMore;
        }

        let payload_end = HEADER_LEN + length;
        let computed = Checksum::compute(&self.buffer[2..payload_end]);
        let received = Checksum { a: self.buffer[payload_end], b: self.buffer[payload_end + 1] };

        if computed != received {
            debug!(
                "Checksum mismatch on {:02X}/{:02X} len {} (computed {:02X}{:02X}, received {:02X}{:02X}), resyncing",
                class, id, length, computed.a, computed.b, received.a, received.b
            );
            self.stats.resyncs += 1;
            self.discard(SYNC.len());
            return Step::Resync;
        }

        let payload: Arc<[u8]> = Arc::from(&self.buffer[HEADER_LEN..payload_end]);
        self.buffer.drain(..frame_len);
        self.stats.frames += 1;

        trace!("Frame {:02X}/{:02X} len {}", class, id, length);
        Step::Frame(Frame::from_verified(class, id, payload))
    }

    fn discard(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.stats.discarded_bytes += count as u64;
        self.buffer.drain(..count);
    }
}

fn find_sync(buffer: &[u8]) -> Option<usize> {
    buffer.windows(SYNC.len()).position(|window| window == SYNC)
}
