//! Column formatter registry for CSV export
//!
//! A static, ordered table from column name to a pure formatter over a
//! decoded record. Names match case-insensitively; output uses the
//! canonical spelling. Formats are locale-independent.

use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

use crate::record::TelemetryRecord;
use crate::{LinkError, Result};

const FEET_PER_METER: f64 = 3.28084;
const KPH_PER_MPS: f64 = 3.6;
const MPH_PER_MPS: f64 = 2.23694;

/// Formatter signature for a column.
pub type Formatter = fn(&TelemetryRecord) -> String;

/// One named output column
#[derive(Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub format: Formatter,
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column").field("name", &self.name).finish()
    }
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Built-in columns in their canonical order.
pub const STANDARD_COLUMNS: &[Column] = &[
    // Time
    Column {
        name: "Utc",
        format: |r| {
            r.utc_timestamp()
                .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
                .unwrap_or_default()
        },
    },
    Column { name: "iTOWms", format: |r| r.itow_ms.to_string() },
    Column {
        name: "time_accuracy_ms",
        format: |r| format!("{:.3}", r.time_accuracy_ns as f64 / 1e6),
    },
    // Position
    Column { name: "lat", format: |r| format!("{:.7}", r.lat_deg) },
    Column { name: "lon", format: |r| format!("{:.7}", r.lon_deg) },
    Column { name: "altMSL_m", format: |r| format!("{:.3}", r.alt_msl_m) },
    Column { name: "altWGS_m", format: |r| format!("{:.3}", r.alt_wgs_m) },
    Column { name: "altWGS_ft", format: |r| format!("{:.1}", r.alt_wgs_m * FEET_PER_METER) },
    Column { name: "altMSL_ft", format: |r| format!("{:.1}", r.alt_msl_m * FEET_PER_METER) },
    Column { name: "HAcc_m", format: |r| format!("{:.3}", r.h_acc_m) },
    Column { name: "VAcc_m", format: |r| format!("{:.3}", r.v_acc_m) },
    Column { name: "HAcc_ft", format: |r| format!("{:.3}", r.h_acc_m * FEET_PER_METER) },
    Column { name: "VAcc_ft", format: |r| format!("{:.3}", r.v_acc_m * FEET_PER_METER) },
    Column { name: "PDOP", format: |r| format!("{:.2}", r.pdop) },
    Column { name: "numSV", format: |r| r.num_sv.to_string() },
    // Motion
    Column { name: "speed_mps", format: |r| format!("{:.3}", r.speed_mps) },
    Column { name: "speed_kph", format: |r| format!("{:.3}", r.speed_mps * KPH_PER_MPS) },
    Column { name: "speed_mph", format: |r| format!("{:.3}", r.speed_mps * MPH_PER_MPS) },
    Column { name: "heading_deg", format: |r| format!("{:.5}", r.heading_deg) },
    Column { name: "SAcc_mps", format: |r| format!("{:.3}", r.speed_acc_mps) },
    Column { name: "HeadingAcc_deg", format: |r| format!("{:.5}", r.heading_acc_deg) },
    // Fix
    Column { name: "fixOK", format: |r| flag(r.fix_ok()) },
    Column { name: "fixStatus", format: |r| r.fix_status.to_string() },
    // Battery / input
    Column { name: "batt_pct", format: |r| r.battery_percent().to_string() },
    Column { name: "charging", format: |r| flag(r.is_charging()) },
    Column { name: "batt_raw", format: |r| r.battery_raw.to_string() },
    Column { name: "inputV_micro", format: |r| format!("{:.1}", r.input_voltage()) },
    // IMU
    Column { name: "gX", format: |r| format!("{:.3}", r.accel_g[0]) },
    Column { name: "gY", format: |r| format!("{:.3}", r.accel_g[1]) },
    Column { name: "gZ", format: |r| format!("{:.3}", r.accel_g[2]) },
    Column { name: "rotX_degps", format: |r| format!("{:.2}", r.gyro_dps[0]) },
    Column { name: "rotY_degps", format: |r| format!("{:.2}", r.gyro_dps[1]) },
    Column { name: "rotZ_degps", format: |r| format!("{:.2}", r.gyro_dps[2]) },
    // Lossless copy of the payload
    Column { name: "raw80_hex", format: |r| hex::encode_upper(r.raw()) },
];

/// Columns written when the caller names none.
pub const DEFAULT_COLUMNS: &[&str] = &[
    "Utc", "iTOWms", "lat", "lon", "altMSL_m", "altWGS_m", "speed_mps", "speed_kph",
    "heading_deg", "PDOP", "HAcc_m", "VAcc_m", "fixOK", "fixStatus", "numSV", "gX", "gY", "gZ",
    "rotX_degps", "rotY_degps", "rotZ_degps", "batt_pct", "charging", "batt_raw",
];

static STANDARD: LazyLock<ColumnRegistry> =
    LazyLock::new(|| ColumnRegistry::build(STANDARD_COLUMNS));

/// Case-insensitive lookup over an ordered column table
#[derive(Debug)]
pub struct ColumnRegistry {
    columns: &'static [Column],
    index: HashMap<String, usize>,
}

impl ColumnRegistry {
    /// The built-in registry.
    pub fn standard() -> &'static ColumnRegistry {
        &STANDARD
    }

    /// Build a registry, rejecting names that collide case-insensitively.
    pub fn new(columns: &'static [Column]) -> Result<Self> {
        let registry = Self::build(columns);
        if registry.index.len() != columns.len() {
            let mut seen = HashMap::new();
            for column in columns {
                if let Some(previous) = seen.insert(column.name.to_ascii_lowercase(), column.name) {
                    return Err(LinkError::config_error(format!(
                        "column '{}' collides with '{}'",
                        column.name, previous
                    )));
                }
            }
        }
        Ok(registry)
    }

    fn build(columns: &'static [Column]) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.name.to_ascii_lowercase(), i))
            .collect();
        Self { columns, index }
    }

    /// Look up a column by name, ignoring case and surrounding whitespace.
    pub fn get(&self, name: &str) -> Option<&'static Column> {
        let columns = self.columns;
        self.index.get(&name.trim().to_ascii_lowercase()).map(|&i| &columns[i])
    }

    /// Canonical column names in registry order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|column| column.name)
    }

    /// Number of registered columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Resolve requested names into an ordered selection.
    ///
    /// Unknown names are logged and skipped; blank names are ignored. Fails
    /// when nothing valid remains.
    pub fn select<S: AsRef<str>>(&self, requested: &[S]) -> Result<ColumnSelection> {
        let mut columns = Vec::with_capacity(requested.len());
        for name in requested.iter().map(|s| s.as_ref().trim()).filter(|s| !s.is_empty()) {
            match self.get(name) {
                Some(column) => columns.push(column),
                None => warn!("Unknown column '{}', skipping", name),
            }
        }

        if columns.is_empty() {
            return Err(LinkError::NoValidColumns {
                requested: requested.iter().map(|s| s.as_ref().to_string()).collect(),
            });
        }
        Ok(ColumnSelection { columns })
    }

    /// Resolve a comma-separated column list.
    pub fn select_list(&self, list: &str) -> Result<ColumnSelection> {
        self.select(&parse_column_list(list))
    }
}

/// Split a comma-separated column list, trimming names and dropping blanks.
pub fn parse_column_list(list: &str) -> Vec<String> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Ordered, validated set of columns to export
#[derive(Debug, Clone)]
pub struct ColumnSelection {
    columns: Vec<&'static Column>,
}

impl Default for ColumnSelection {
    /// The [`DEFAULT_COLUMNS`] preset.
    fn default() -> Self {
        let registry = ColumnRegistry::standard();
        Self { columns: DEFAULT_COLUMNS.iter().filter_map(|name| registry.get(name)).collect() }
    }
}

impl ColumnSelection {
    /// Resolve a comma-separated list against the standard registry.
    pub fn parse(list: &str) -> Result<Self> {
        ColumnRegistry::standard().select_list(list)
    }

    /// Canonical names, in selection order.
    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.name).collect()
    }

    /// Format one record into cells, in selection order.
    pub fn row(&self, record: &TelemetryRecord) -> Vec<String> {
        self.columns.iter().map(|column| (column.format)(record)).collect()
    }

    /// Number of selected columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false; a selection holds at least one column.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
