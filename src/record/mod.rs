//! Telemetry record decoding and the hex-line record log.

pub mod hex_log;
pub mod telemetry;

pub use hex_log::{HexLogReader, HexLogWriter, LINE_LEN};
pub use telemetry::{FixKind, RECORD_LEN, TelemetryRecord};
