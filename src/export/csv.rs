//! CSV export of decoded telemetry
//!
//! Comma separator, `\n` line endings, one header row of canonical column
//! names followed by one row per record. Cells are the column formatters'
//! output, quoted only when they contain a separator, quote or newline.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use super::columns::{ColumnRegistry, ColumnSelection};
use crate::record::{HexLogReader, TelemetryRecord};
use crate::{LinkError, Result};

fn write_row<W: Write, S: AsRef<str>>(writer: &mut W, cells: &[S]) -> std::io::Result<()> {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        let cell = cell.as_ref();
        if cell.contains([',', '"', '\n', '\r']) {
            write!(writer, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            writer.write_all(cell.as_bytes())?;
        }
    }
    writer.write_all(b"\n")
}

/// Row writer for a fixed column selection
pub struct CsvExporter<W: Write> {
    writer: W,
    selection: ColumnSelection,
    rows_written: u64,
}

impl<W: Write> CsvExporter<W> {
    /// Write the header row and return an exporter ready for records.
    pub fn new(mut writer: W, selection: ColumnSelection) -> Result<Self> {
        write_row(&mut writer, &selection.header())?;
        Ok(Self { writer, selection, rows_written: 0 })
    }

    /// Append one record as a row.
    pub fn write_record(&mut self, record: &TelemetryRecord) -> Result<()> {
        write_row(&mut self.writer, &self.selection.row(record))?;
        self.rows_written += 1;
        Ok(())
    }

    /// Data rows written so far (header excluded).
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// The columns this exporter writes.
    pub fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Convert a hex-line record log into CSV.
///
/// Columns are resolved before the output file is touched, so an unusable
/// column list leaves no file behind. A malformed log line aborts the
/// export with an error naming the line; rows already written stay in the
/// output. Returns the number of data rows written.
pub fn export_csv<S: AsRef<str>>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    columns: &[S],
) -> Result<u64> {
    let selection = ColumnRegistry::standard().select(columns)?;
    export_csv_with(input, output, selection)
}

/// [`export_csv`] with the default column preset.
pub fn export_csv_default(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<u64> {
    export_csv_with(input, output, ColumnSelection::default())
}

/// [`export_csv`] with an already resolved selection.
pub fn export_csv_with(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    selection: ColumnSelection,
) -> Result<u64> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let reader = HexLogReader::open(input)?;

    let file = File::create(output).map_err(|e| LinkError::file_error(output.to_path_buf(), e))?;
    debug!("Exporting {} to {} ({} columns)", input.display(), output.display(), selection.len());

    let mut exporter = CsvExporter::new(BufWriter::new(file), selection)?;
    let mut outcome = Ok(());
    for record in reader {
        match record {
            Ok(record) => exporter.write_record(&record)?,
            Err(error) => {
                outcome = Err(error);
                break;
            }
        }
    }

    let rows = exporter.rows_written();
    exporter.into_inner()?;
    outcome?;

    info!("Exported {} records to {}", rows, output.display());
    Ok(rows)
}
