//! Decoder for the 80-byte history/live telemetry record
//!
//! The layout follows the u-blox NAV-PVT convention with device-specific
//! battery and IMU fields appended. Every field is little-endian at a fixed
//! offset; scaled fields are converted to physical units once, at decode.
//!
//! | offset | type | field | scale |
//! |---|---|---|---|
//! | 0 | u32 | iTOW | ms |
//! | 4 | u16 | year | |
//! | 6..=10 | u8 | month, day, hour, minute, second | |
//! | 11 | u8 | validity flags | bit0 date, bit1 time |
//! | 12 | u32 | time accuracy | ns |
//! | 16 | i32 | nanosecond offset | ns |
//! | 20 | u8 | fix status | 0/2/3 |
//! | 21 | u8 | fix flags | bit0 fixOK |
//! | 22 | u8 | date/time confirmation flags | |
//! | 23 | u8 | satellites in solution | |
//! | 24, 28 | i32 | longitude, latitude | 1e-7 deg |
//! | 32, 36 | i32 | altitude WGS84, MSL | mm |
//! | 40, 44 | u32 | horizontal, vertical accuracy | mm |
//! | 48 | i32 | ground speed | mm/s |
//! | 52 | i32 | heading | 1e-5 deg |
//! | 56 | u32 | speed accuracy | mm/s |
//! | 60 | u32 | heading accuracy | 1e-5 deg |
//! | 64 | u16 | PDOP | 0.01 |
//! | 66 | u8 | lat/lon flags | |
//! | 67 | u8 | battery / input voltage | see [`TelemetryRecord::battery_percent`] |
//! | 68, 70, 72 | i16 | acceleration X, Y, Z | milli-g |
//! | 74, 76, 78 | i16 | rotation rate X, Y, Z | centi-deg/s |

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;

use crate::types::{Flags8, date_time_valid, masks, read};
use crate::{LinkError, Result};

/// Payload length of a telemetry record.
pub const RECORD_LEN: usize = 80;

const DEG_E7: f64 = 1e7;
const DEG_E5: f64 = 1e5;
const MILLI: f64 = 1000.0;
const CENTI: f64 = 100.0;
const NANOS_PER_MILLI: i32 = 1_000_000;

/// GNSS fix type reported in the fix status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FixKind {
    NoFix,
    TwoD,
    ThreeD,
    /// Any other value the receiver reports (dead reckoning, time only, ...)
    Other(u8),
}

impl From<u8> for FixKind {
    fn from(raw: u8) -> Self {
        match raw {
            0 => FixKind::NoFix,
            2 => FixKind::TwoD,
            3 => FixKind::ThreeD,
            other => FixKind::Other(other),
        }
    }
}

/// Decoded telemetry record with physically scaled fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// GPS time of week, ms
    pub itow_ms: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub validity: Flags8,
    pub time_accuracy_ns: u32,
    /// Signed fraction-of-second correction, ns
    pub nanos: i32,
    pub fix_status: u8,
    pub fix_flags: Flags8,
    pub date_time_flags: u8,
    pub num_sv: u8,

    pub lon_deg: f64,
    pub lat_deg: f64,
    pub alt_wgs_m: f64,
    pub alt_msl_m: f64,
    pub h_acc_m: f64,
    pub v_acc_m: f64,
    pub speed_mps: f64,
    pub heading_deg: f64,
    pub speed_acc_mps: f64,
    pub heading_acc_deg: f64,
    pub pdop: f64,
    pub lat_lon_flags: u8,
    pub battery_raw: u8,

    /// Acceleration X, Y, Z in g
    pub accel_g: [f64; 3],
    /// Rotation rate X, Y, Z in deg/s
    pub gyro_dps: [f64; 3],

    /// UTC time, present only when both date and time are flagged valid
    pub utc: Option<DateTime<Utc>>,

    #[serde(skip)]
    raw: [u8; RECORD_LEN],
}

impl TelemetryRecord {
    /// Decode an 80-byte payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let raw: [u8; RECORD_LEN] = payload.try_into().map_err(|_| {
            LinkError::parse_error(
                "Telemetry record",
                format!("payload is {} bytes, expected {}", payload.len(), RECORD_LEN),
            )
        })?;
        let b = &raw[..];

        let year = read::<u16>(b, 4)?;
        let month = b[6];
        let day = b[7];
        let hour = b[8];
        let minute = b[9];
        let second = b[10];
        let validity = Flags8::new(b[11]);
        let nanos = read::<i32>(b, 16)?;

        let utc = if date_time_valid(validity) {
            utc_from_fields(year, month, day, hour, minute, second, nanos)
        } else {
            None
        };

        Ok(Self {
            itow_ms: read::<u32>(b, 0)?,
            year,
            month,
            day,
            hour,
            minute,
            second,
            validity,
            time_accuracy_ns: read::<u32>(b, 12)?,
            nanos,
            fix_status: b[20],
            fix_flags: Flags8::new(b[21]),
            date_time_flags: b[22],
            num_sv: b[23],

            lon_deg: read::<i32>(b, 24)? as f64 / DEG_E7,
            lat_deg: read::<i32>(b, 28)? as f64 / DEG_E7,
            alt_wgs_m: read::<i32>(b, 32)? as f64 / MILLI,
            alt_msl_m: read::<i32>(b, 36)? as f64 / MILLI,
            h_acc_m: read::<u32>(b, 40)? as f64 / MILLI,
            v_acc_m: read::<u32>(b, 44)? as f64 / MILLI,
            speed_mps: read::<i32>(b, 48)? as f64 / MILLI,
            heading_deg: read::<i32>(b, 52)? as f64 / DEG_E5,
            speed_acc_mps: read::<u32>(b, 56)? as f64 / MILLI,
            heading_acc_deg: read::<u32>(b, 60)? as f64 / DEG_E5,
            pdop: read::<u16>(b, 64)? as f64 / CENTI,
            lat_lon_flags: b[66],
            battery_raw: b[67],

            accel_g: [
                read::<i16>(b, 68)? as f64 / MILLI,
                read::<i16>(b, 70)? as f64 / MILLI,
                read::<i16>(b, 72)? as f64 / MILLI,
            ],
            gyro_dps: [
                read::<i16>(b, 74)? as f64 / CENTI,
                read::<i16>(b, 76)? as f64 / CENTI,
                read::<i16>(b, 78)? as f64 / CENTI,
            ],

            utc,
            raw,
        })
    }

    /// The undecoded payload this record was built from.
    pub fn raw(&self) -> &[u8; RECORD_LEN] {
        &self.raw
    }

    /// Fix type from the fix status byte.
    pub fn fix_kind(&self) -> FixKind {
        FixKind::from(self.fix_status)
    }

    /// The receiver reports a valid fix.
    pub fn fix_ok(&self) -> bool {
        self.fix_flags.has_flag(masks::fix::FIX_OK)
    }

    /// Percentage-variant battery byte: charger connected.
    pub fn is_charging(&self) -> bool {
        self.battery_raw & masks::battery::CHARGING != 0
    }

    /// Percentage-variant battery byte: charge level, 0-100.
    pub fn battery_percent(&self) -> u8 {
        self.battery_raw & masks::battery::PERCENT_MASK
    }

    /// Voltage-variant battery byte: supply voltage in volts.
    pub fn input_voltage(&self) -> f64 {
        self.battery_raw as f64 / 10.0
    }

    /// UTC timestamp, if the record carries a valid date and time.
    pub fn utc_timestamp(&self) -> Option<DateTime<Utc>> {
        self.utc
    }
}

/// Second-aligned calendar time plus the signed nanosecond offset, applied as
/// whole milliseconds and the sub-millisecond remainder.
fn utc_from_fields(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    nanos: i32,
) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?;
    // Leap second: 23:59:60 is 59 s with a full second of fraction
    let base = if second == 60 {
        date.and_hms_milli_opt(hour as u32, minute as u32, 59, 1000)?
    } else {
        date.and_hms_opt(hour as u32, minute as u32, second as u32)?
    };

    let whole_ms = nanos / NANOS_PER_MILLI;
    let sub_ms = nanos % NANOS_PER_MILLI;
    let adjusted = base
        .checked_add_signed(TimeDelta::milliseconds(whole_ms as i64))?
        .checked_add_signed(TimeDelta::nanoseconds(sub_ms as i64))?;

    Some(adjusted.and_utc())
}
