//! Wire frame type and the two-accumulator checksum

use std::sync::Arc;

use crate::{LinkError, Result};

/// Two-byte marker that starts every frame.
pub const SYNC: [u8; 2] = [0xB5, 0x62];

/// Sync marker + class + id + little-endian length.
pub const HEADER_LEN: usize = 6;

/// Trailing checksum bytes.
pub const CHECKSUM_LEN: usize = 2;

/// Bytes a frame occupies on the wire in addition to its payload.
pub const FRAME_OVERHEAD: usize = HEADER_LEN + CHECKSUM_LEN;

/// Running two-accumulator checksum.
///
/// `a` is the byte sum and `b` the sum of the successive values of `a`, both
/// modulo 256. It covers class, id, both length bytes and the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum {
    pub a: u8,
    pub b: u8,
}

impl Checksum {
    /// Create a checksum with both accumulators at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one byte into the running sums.
    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.a = self.a.wrapping_add(byte);
        self.b = self.b.wrapping_add(self.a);
    }

    /// Fold a byte slice into the running sums, in order.
    pub fn extend(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.update(byte);
        }
    }

    /// Checksum of a complete byte slice.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut checksum = Self::new();
        checksum.extend(bytes);
        checksum
    }

    /// Checksum bytes in wire order.
    pub fn to_bytes(self) -> [u8; 2] {
        [self.a, self.b]
    }
}

/// One checksum-verified protocol frame.
///
/// Immutable once constructed: the length is always the payload length, and
/// the checksum is derived rather than stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    class: u8,
    id: u8,
    payload: Arc<[u8]>,
}

impl Frame {
    /// Build a frame, rejecting payloads that do not fit the 16-bit length field.
    pub fn new(class: u8, id: u8, payload: impl Into<Arc<[u8]>>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > u16::MAX as usize {
            return Err(LinkError::parse_error(
                "Frame construction",
                format!("payload of {} bytes exceeds the 16-bit length field", payload.len()),
            ));
        }
        Ok(Self { class, id, payload })
    }

    /// Build a frame from bytes the scanner has already length- and checksum-verified.
    pub(crate) fn from_verified(class: u8, id: u8, payload: Arc<[u8]>) -> Self {
        debug_assert!(payload.len() <= u16::MAX as usize);
        Self { class, id, payload }
    }

    /// Message class.
    pub fn class(&self) -> u8 {
        self.class
    }

    /// Message id within the class.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Payload length as carried in the header.
    pub fn len(&self) -> u16 {
        self.payload.len() as u16
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Checksum over class, id, length and payload.
    pub fn checksum(&self) -> Checksum {
        let mut checksum = Checksum::new();
        checksum.extend(&[self.class, self.id]);
        checksum.extend(&self.len().to_le_bytes());
        checksum.extend(&self.payload);
        checksum
    }

    /// Total size on the wire.
    pub fn wire_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encode to wire bytes: sync, class, id, LE length, payload, checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        out.extend_from_slice(&SYNC);
        out.push(self.class);
        out.push(self.id);
        out.extend_from_slice(&self.len().to_le_bytes());
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.checksum().to_bytes());
        out
    }
}
