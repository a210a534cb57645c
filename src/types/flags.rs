//! Single-byte bitmask type used by record and status fields

use serde::{Deserialize, Serialize};

/// Bitmask byte from a decoded payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags8(pub u8);

impl Flags8 {
    /// Create a new Flags8 from a raw byte.
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    /// Check if a specific bit is set.
    pub fn is_set(&self, bit: u8) -> bool {
        bit < 8 && (self.0 & (1 << bit)) != 0
    }

    /// Check if any bit in `mask` is set.
    pub fn has_flag(&self, mask: u8) -> bool {
        (self.0 & mask) != 0
    }

    /// Check if every bit in `mask` is set.
    pub fn has_all(&self, mask: u8) -> bool {
        (self.0 & mask) == mask
    }

    /// Get the raw byte.
    pub fn value(&self) -> u8 {
        self.0
    }
}

/// Bit constants for the packed fields of the telemetry record and status payload.
pub mod masks {
    /// Validity flags (record offset 11)
    pub mod validity {
        pub const DATE_VALID: u8 = 0x01;
        pub const TIME_VALID: u8 = 0x02;
        pub const DATE_TIME_VALID: u8 = DATE_VALID | TIME_VALID;
    }

    /// Fix status flags (record offset 21)
    pub mod fix {
        pub const FIX_OK: u8 = 0x01;
    }

    /// Battery byte (record offset 67), percentage variant
    pub mod battery {
        pub const CHARGING: u8 = 0x80;
        pub const PERCENT_MASK: u8 = 0x7F;
    }

    /// Security byte (status offset 2)
    pub mod security {
        pub const ENABLED: u8 = 0x01;
        pub const UNLOCKED: u8 = 0x02;
    }
}

/// Convenience: both the date-valid and time-valid bits are set.
pub fn date_time_valid(flags: Flags8) -> bool {
    flags.has_all(masks::validity::DATE_TIME_VALID)
}
