//! Tabular export of decoded telemetry
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use racebox_link::export::{ColumnRegistry, export_csv, parse_column_list};
//!
//! fn convert() -> racebox_link::Result<()> {
//!     let columns = parse_column_list("Utc,lat,lon,speed_kph,fixOK");
//!     let rows = export_csv("history.hex", "history.csv", &columns)?;
//!     println!("{rows} rows, {} columns available", ColumnRegistry::standard().len());
//!     Ok(())
//! }
//! ```

pub mod columns;
pub mod csv;

pub use columns::{
    Column, ColumnRegistry, ColumnSelection, DEFAULT_COLUMNS, STANDARD_COLUMNS, parse_column_list,
};
pub use csv::{CsvExporter, export_csv, export_csv_default, export_csv_with};
