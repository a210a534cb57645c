//! Link configuration
//!
//! Every field has a default, so an empty YAML document (or
//! `LinkConfig::default()`) is a working configuration.
//!
//! ```yaml
//! max_buffer_len: 65536
//! event_capacity: 256
//! command_capacity: 32
//! stall_timeout_secs: 600
//! device_prefix: RaceBox
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::FRAME_OVERHEAD;
use crate::record::RECORD_LEN;
use crate::{LinkError, Result};

/// Tunables for a device link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Upper bound on unconsumed inbound bytes before the buffer is dropped
    pub max_buffer_len: usize,
    /// Capacity of the link event channel
    pub event_capacity: usize,
    /// Capacity of the inbound notification and control channels
    pub command_capacity: usize,
    /// Inactivity after which an in-progress download counts as stalled
    pub stall_timeout_secs: u64,
    /// Advertised name prefix identifying compatible devices
    pub device_prefix: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_buffer_len: 64 * 1024,
            event_capacity: 256,
            command_capacity: 32,
            stall_timeout_secs: 600,
            device_prefix: "RaceBox".to_string(),
        }
    }
}

impl LinkConfig {
    /// Smallest buffer bound that still fits one history record frame.
    pub const MIN_BUFFER_LEN: usize = RECORD_LEN + FRAME_OVERHEAD;

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: LinkConfig = if yaml.trim().is_empty() {
            LinkConfig::default()
        } else {
            serde_yaml_ng::from_str(yaml)
                .map_err(|e| LinkError::config_error(format!("invalid link config: {e}")))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| LinkError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject settings the link cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_buffer_len < Self::MIN_BUFFER_LEN {
            return Err(LinkError::config_error(format!(
                "max_buffer_len {} is below one record frame ({} bytes)",
                self.max_buffer_len,
                Self::MIN_BUFFER_LEN
            )));
        }
        if self.event_capacity == 0 {
            return Err(LinkError::config_error("event_capacity must be at least 1"));
        }
        if self.command_capacity == 0 {
            return Err(LinkError::config_error("command_capacity must be at least 1"));
        }
        Ok(())
    }

    /// Stall timeout as a duration.
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }

    /// Whether an advertised device name belongs to a compatible device.
    pub fn matches_device(&self, name: &str) -> bool {
        name.starts_with(&self.device_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = LinkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stall_timeout(), Duration::from_secs(600));
        assert_eq!(LinkConfig::MIN_BUFFER_LEN, 88);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = LinkConfig::from_yaml_str("event_capacity: 8\nstall_timeout_secs: 5\n").unwrap();
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.stall_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_buffer_len, LinkConfig::default().max_buffer_len);
        assert_eq!(LinkConfig::from_yaml_str("").unwrap(), LinkConfig::default());
    }

    #[test]
    fn rejects_unusable_values() {
        for yaml in ["max_buffer_len: 87", "event_capacity: 0", "command_capacity: 0"] {
            let err = LinkConfig::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, LinkError::Config { .. }), "{yaml}: {err}");
        }
        assert!(LinkConfig::from_yaml_str("max_buffer_len: [1, 2]").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "device_prefix: RaceBox Mini").unwrap();
        let config = LinkConfig::from_yaml_file(file.path()).unwrap();
        assert!(config.matches_device("RaceBox Mini 1234"));
        assert!(!config.matches_device("RaceBox Micro 1"));

        let missing = LinkConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(missing, LinkError::File { .. }));
    }
}
