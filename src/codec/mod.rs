//! Byte stream framing: assembly, sync search and checksum verification.

pub mod assembler;
pub mod scanner;

pub use assembler::{Assembled, StreamAssembler};
pub use scanner::{FrameScanner, ScanStats};
