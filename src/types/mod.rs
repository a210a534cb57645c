//! Core types for the wire protocol and its payloads.
//!
//! - [`Frame`] is one checksum-verified unit of the wire protocol
//! - [`Checksum`] implements the running two-accumulator sum over a frame
//! - [`LeField`] reads little-endian integers at fixed payload offsets
//! - [`Flags8`] wraps packed bitmask bytes
//! - [`AckMessage`], [`NackMessage`], [`StatusSnapshot`] and
//!   [`RecordingConfig`] are the small fixed payloads of the message catalog
//!
//! ## Usage Example
//!
//! ```rust
//! use racebox_link::types::{Checksum, Frame};
//!
//! let frame = Frame::new(0xFF, 0x30, 1234u32.to_le_bytes().to_vec()).unwrap();
//! let wire = frame.encode();
//!
//! // Checksum covers everything between the sync marker and the checksum itself
//! let expected = Checksum::compute(&wire[2..wire.len() - 2]);
//! assert_eq!(&wire[wire.len() - 2..], &expected.to_bytes());
//! ```

pub mod field;
pub mod flags;
mod frame;
mod message;
mod update_rate;

pub use field::{LeField, read};
pub use flags::{Flags8, date_time_valid, masks};
pub use frame::{CHECKSUM_LEN, Checksum, FRAME_OVERHEAD, Frame, HEADER_LEN, SYNC};
pub use message::{AckMessage, NackMessage, RecordingConfig, StatusSnapshot};
pub use update_rate::UpdateRate;
