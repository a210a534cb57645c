//! Inbound and outbound message payloads of the device catalog

use serde::{Deserialize, Serialize};

use super::field::read;
use super::flags::{Flags8, masks};
use crate::Result;

/// Acknowledgement echoing the class and id of the command it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    pub echoed_class: u8,
    pub echoed_id: u8,
}

/// Negative acknowledgement echoing the class and id of the rejected command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NackMessage {
    pub echoed_class: u8,
    pub echoed_id: u8,
}

/// Standalone-recording status reported in response to a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub recording: bool,
    pub memory_percent: u8,
    pub security_enabled: bool,
    pub security_unlocked: bool,
    pub stored_records: u32,
    pub total_capacity: u32,
}

impl StatusSnapshot {
    /// Payload length of the status message.
    pub const LEN: usize = 12;

    /// Decode a 12-byte status payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let security = Flags8::new(read::<u8>(payload, 2)?);
        Ok(Self {
            recording: read::<u8>(payload, 0)? != 0,
            memory_percent: read::<u8>(payload, 1)?,
            security_enabled: security.has_flag(masks::security::ENABLED),
            security_unlocked: security.has_flag(masks::security::UNLOCKED),
            stored_records: read::<u32>(payload, 4)?,
            total_capacity: read::<u32>(payload, 8)?,
        })
    }
}

/// Standalone recording configuration sent with the set-recording command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub enable: bool,
    /// Device-specific data rate code (0 = 25 Hz on current firmware)
    pub rate_code: u8,
    pub flags: u8,
    /// Speed below which the device is considered stationary, in mm/s
    pub stationary_speed_mm_s: u16,
    pub stationary_secs: u16,
    pub no_fix_secs: u16,
    pub auto_shutdown_secs: u16,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enable: true,
            rate_code: 0,
            flags: 0x1F,
            stationary_speed_mm_s: 1389,
            stationary_secs: 30,
            no_fix_secs: 30,
            auto_shutdown_secs: 300,
        }
    }
}

impl RecordingConfig {
    /// Payload length of the set-recording command.
    pub const LEN: usize = 12;

    /// Encode to the 12-byte little-endian payload.
    pub fn to_payload(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = u8::from(self.enable);
        out[1] = self.rate_code;
        out[2] = self.flags;
        // out[3] reserved
        out[4..6].copy_from_slice(&self.stationary_speed_mm_s.to_le_bytes());
        out[6..8].copy_from_slice(&self.stationary_secs.to_le_bytes());
        out[8..10].copy_from_slice(&self.no_fix_secs.to_le_bytes());
        out[10..12].copy_from_slice(&self.auto_shutdown_secs.to_le_bytes());
        out
    }
}
