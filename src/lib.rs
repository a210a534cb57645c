//! Type-safe Rust library for RaceBox GNSS data loggers.
//!
//! RaceBox Link turns the byte stream a RaceBox device sends over its BLE
//! UART service into typed messages, tracks bulk history downloads, and
//! exports stored telemetry to CSV.
//!
//! # Features
//!
//! - **Framing**: Resynchronising frame scanner that tolerates arbitrary chunking and corruption
//! - **Downloads**: Record-count and Ack/Nack completion, whichever comes first
//! - **Telemetry**: 80-byte records decoded to physical units with UTC timestamps
//! - **Export**: Hex-line record logs and configurable CSV columns
//!
//! The radio itself is behind the [`Transport`] trait; implement it for your
//! BLE stack and hand it to [`RaceBox::connect`].
//!
//! ## Example (record log to CSV)
//!
//! ```rust,no_run
//! use racebox_link::RaceBox;
//!
//! fn main() -> racebox_link::Result<()> {
//!     for record in RaceBox::open("history.hex")? {
//!         let record = record?;
//!         println!("{:?} {:.1} km/h", record.utc_timestamp(), record.speed_mps * 3.6);
//!     }
//!
//!     let rows = racebox_link::export_csv("history.hex", "history.csv", &["Utc", "lat", "lon"])?;
//!     println!("wrote {rows} rows");
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Wire protocol
pub mod codec;
pub mod dispatch;
pub mod download;

// Telemetry records and export
pub mod export;
pub mod record;

// Device link
pub mod config;
pub mod connection;
pub mod driver;
pub mod stream;
pub mod transport;

// Core exports
pub use error::*;
pub use types::*;

pub use codec::{Assembled, FrameScanner, StreamAssembler};
pub use config::LinkConfig;
pub use connection::Connection;
pub use dispatch::{Command, Message, dispatch};
pub use download::{CompletionReason, DownloadProgress, DownloadSession, DownloadState};
pub use driver::LinkEvent;
pub use export::{
    ColumnRegistry, ColumnSelection, CsvExporter, export_csv, export_csv_default, export_csv_with,
};
pub use record::{HexLogReader, HexLogWriter, TelemetryRecord};
pub use transport::Transport;

/// Unified entry point for device links and stored record logs.
///
/// # Examples
///
/// ## Device link
/// ```rust,no_run
/// use racebox_link::{LinkConfig, RaceBox, Transport};
///
/// async fn status<T: Transport>(transport: T) -> racebox_link::Result<()> {
///     let mut connection = RaceBox::connect(transport, "RaceBox Mini 1234", LinkConfig::default()).await?;
///     connection.query_status().await?;
///     println!("{:?}", connection.next_event().await);
///     Ok(())
/// }
/// ```
///
/// ## Record log
/// ```rust,no_run
/// use racebox_link::RaceBox;
///
/// # fn main() -> racebox_link::Result<()> {
/// let records = RaceBox::open("history.hex")?.collect::<racebox_link::Result<Vec<_>>>()?;
/// # Ok(())
/// # }
/// ```
pub struct RaceBox;

impl RaceBox {
    /// Connect to a device through `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the transport
    /// cannot connect.
    pub async fn connect<T: Transport>(
        transport: T,
        device_id: &str,
        config: LinkConfig,
    ) -> Result<Connection<T>> {
        Connection::open(transport, device_id, config).await
    }

    /// Open a hex-line record log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened. Malformed lines are
    /// reported by the returned iterator.
    pub fn open<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<HexLogReader<std::io::BufReader<std::fs::File>>> {
        HexLogReader::open(path)
    }
}
