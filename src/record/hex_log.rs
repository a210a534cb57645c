//! Hex-line record log
//!
//! One telemetry record per line: the 80-byte payload as exactly 160 hex
//! characters, no separators or prefix. Blank lines are skipped. Any other
//! line length is a hard error that ends ingestion of the file.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use racebox_link::record::HexLogReader;
//!
//! fn summarise() -> racebox_link::Result<()> {
//!     for record in HexLogReader::open("history.hex")? {
//!         let record = record?;
//!         println!("{} {:.7} {:.7}", record.itow_ms, record.lat_deg, record.lon_deg);
//!     }
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::telemetry::{RECORD_LEN, TelemetryRecord};
use crate::{LinkError, Result};

/// Characters per log line.
pub const LINE_LEN: usize = RECORD_LEN * 2;

/// Decode one log line into a raw payload.
///
/// `line_number` is 1-based and only used for error context.
pub fn parse_line(line: &str, line_number: usize) -> Result<[u8; RECORD_LEN]> {
    let line = line.trim();
    if line.len() != LINE_LEN {
        return Err(LinkError::LogLine { line_number, length: line.len() });
    }

    let mut payload = [0u8; RECORD_LEN];
    hex::decode_to_slice(line, &mut payload)
        .map_err(|e| LinkError::InvalidHex { line_number, details: e.to_string() })?;
    Ok(payload)
}

/// Encode a raw payload as one log line (upper-case, no terminator).
pub fn format_line(payload: &[u8; RECORD_LEN]) -> String {
    hex::encode_upper(payload)
}

/// Streaming reader over a hex-line log.
///
/// Yields one decoded record per non-blank line. After the first error the
/// iterator is exhausted.
pub struct HexLogReader<R> {
    lines: Lines<R>,
    path: PathBuf,
    line_number: usize,
    failed: bool,
}

impl HexLogReader<BufReader<File>> {
    /// Open a log file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).map_err(|e| LinkError::file_error(path.to_path_buf(), e))?;
        debug!("Opened record log {}", path.display());
        Ok(Self::with_path(BufReader::new(file), path.to_path_buf()))
    }
}

impl<R: BufRead> HexLogReader<R> {
    /// Read a log from any buffered source.
    pub fn new(reader: R) -> Self {
        Self::with_path(reader, PathBuf::from("<memory>"))
    }

    fn with_path(reader: R, path: PathBuf) -> Self {
        Self { lines: reader.lines(), path, line_number: 0, failed: false }
    }

    /// Number of lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    fn fail(&mut self, error: LinkError) -> Option<Result<TelemetryRecord>> {
        warn!("Stopping record log {} at line {}: {}", self.path.display(), self.line_number, error);
        self.failed = true;
        Some(Err(error))
    }
}

impl<R: BufRead> Iterator for HexLogReader<R> {
    type Item = Result<TelemetryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    let error = LinkError::file_error(self.path.clone(), e);
                    return self.fail(error);
                }
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            let decoded = parse_line(&line, self.line_number)
                .and_then(|payload| TelemetryRecord::decode(&payload));
            return match decoded {
                Ok(record) => Some(Ok(record)),
                Err(error) => self.fail(error),
            };
        }
    }
}

/// Appends records to a hex-line log.
pub struct HexLogWriter<W: Write> {
    writer: W,
    records_written: u64,
}

impl HexLogWriter<BufWriter<File>> {
    /// Create (or truncate) a log file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::create(path).map_err(|e| LinkError::file_error(path.to_path_buf(), e))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> HexLogWriter<W> {
    /// Write records to any sink.
    pub fn new(writer: W) -> Self {
        Self { writer, records_written: 0 }
    }

    /// Append a raw record payload, which must be exactly 80 bytes.
    pub fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
        let payload: &[u8; RECORD_LEN] = payload.try_into().map_err(|_| {
            LinkError::parse_error(
                "Record log write",
                format!("payload is {} bytes, expected {}", payload.len(), RECORD_LEN),
            )
        })?;
        writeln!(self.writer, "{}", format_line(payload))?;
        self.records_written += 1;
        Ok(())
    }

    /// Append a decoded record using its original payload.
    pub fn write_record(&mut self, record: &TelemetryRecord) -> Result<()> {
        self.write_payload(record.raw())
    }

    /// Records written so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush buffered lines to the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::PayloadBuilder;
    use std::io::Cursor;

    #[test]
    fn reads_lines_and_skips_blanks() {
        let a = PayloadBuilder::new().u32(0, 1000).build();
        let b = PayloadBuilder::new().u32(0, 1040).build();
        let text = format!("{}\n\n  {}  \n", format_line(&a), hex::encode(b));

        let records: Vec<_> =
            HexLogReader::new(Cursor::new(text)).collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].itow_ms, 1000);
        assert_eq!(records[1].itow_ms, 1040);
    }

    #[test]
    fn wrong_length_is_a_hard_error_naming_the_length() {
        let good = format_line(&PayloadBuilder::new().build());
        let text = format!("{good}\n{}\n{good}\n", &good[..158]);

        let mut reader = HexLogReader::new(Cursor::new(text));
        assert!(reader.next().unwrap().is_ok());

        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, LinkError::LogLine { line_number: 2, length: 158 }));
        assert!(err.to_string().contains("158"));

        // Ingestion stops after the error
        assert!(reader.next().is_none());
    }

    #[test]
    fn non_hex_characters_are_rejected() {
        let mut line = format_line(&PayloadBuilder::new().build());
        line.replace_range(10..12, "ZZ");

        let mut reader = HexLogReader::new(Cursor::new(line));
        assert!(matches!(reader.next(), Some(Err(LinkError::InvalidHex { line_number: 1, .. }))));
    }

    #[test]
    fn writer_output_reads_back() {
        let payload = PayloadBuilder::new().i32(24, -74_012_345).build();

        let mut writer = HexLogWriter::new(Vec::new());
        writer.write_payload(&payload).unwrap();
        assert!(writer.write_payload(&payload[..40]).is_err());
        assert_eq!(writer.records_written(), 1);

        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.len(), LINE_LEN + 1);

        let record = HexLogReader::new(Cursor::new(text)).next().unwrap().unwrap();
        assert_eq!(record.lon_deg, -7.4012345);
    }
}
