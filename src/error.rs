//! Error types for link, log and export operations.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context for debugging and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: connect/send failures reported by the byte transport
//! - **File Errors**: problems reading hex logs or writing CSV output
//! - **Log Errors**: malformed lines in a persisted hex-line log
//! - **Export Errors**: column selections that leave nothing to write
//! - **Runtime Errors**: buffer limits, timeouts and closed channels
//!
//! Checksum mismatches and frames with an unexpected length are never errors;
//! the scanner resynchronises and the dispatcher ignores them.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use racebox_link::LinkError;
//!
//! let error = LinkError::transport_failed("write rejected by peripheral");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for link operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for link operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Log line {line_number} is {length} chars, expected 160")]
    LogLine { line_number: usize, length: usize },

    #[error("Log line {line_number} is not valid hex: {details}")]
    InvalidHex { line_number: usize, details: String },

    #[error("No valid columns in selection [{}]", requested.join(", "))]
    NoValidColumns { requested: Vec<String> },

    #[error("Receive buffer holds {buffered} bytes, limit is {limit}")]
    BufferOverflow { buffered: usize, limit: usize },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Not connected to a device")]
    NotConnected,

    #[error("Channel '{channel}' closed")]
    ChannelClosed { channel: &'static str },

    #[error("Invalid configuration: {details}")]
    Config { details: String },
}

impl LinkError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Transport { .. } => true,
            LinkError::Timeout { .. } => true,
            LinkError::BufferOverflow { .. } => true,
            LinkError::NotConnected => true,
            LinkError::File { .. } => false,
            LinkError::Parse { .. } => false,
            LinkError::LogLine { .. } => false,
            LinkError::InvalidHex { .. } => false,
            LinkError::NoValidColumns { .. } => false,
            LinkError::ChannelClosed { .. } => false,
            LinkError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LinkError::Transport { .. } => vec![
                "Check the device is powered and in range",
                "Reconnect the link before sending again",
                "Verify notifications are enabled on the TX characteristic",
            ],
            LinkError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check permissions on the output directory",
            ],
            LinkError::Parse { .. } => vec![
                "Check data format compatibility",
                "Verify source data integrity",
            ],
            LinkError::LogLine { .. } | LinkError::InvalidHex { .. } => vec![
                "Stop ingesting this file; it is not a hex-line record log",
                "Re-export the log from the device download",
            ],
            LinkError::NoValidColumns { .. } => vec![
                "Check column name spelling",
                "Use ColumnRegistry::names() to list supported columns",
            ],
            LinkError::BufferOverflow { .. } => vec![
                "Raise max_buffer_len if the device sends large frames",
                "Check the transport is not corrupting length fields",
            ],
            LinkError::Timeout { .. } => vec![
                "Cancel the download and start it again",
                "Check the device is still connected",
            ],
            LinkError::NotConnected => vec!["Open a connection before issuing commands"],
            LinkError::ChannelClosed { .. } => vec![
                "The link driver has stopped; reconnect to the device",
            ],
            LinkError::Config { .. } => vec![
                "Check configuration values against LinkConfig defaults",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        LinkError::File { path, source }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        LinkError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        LinkError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        LinkError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(details: impl Into<String>) -> Self {
        LinkError::Config { details: details.into() }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            reason in ".*",
            line_number in 1usize..100_000,
            length in 0usize..400,
            buffered in 0usize..1_000_000,
            limit in 1usize..1_000_000,
        ) {
            let transport = LinkError::transport_failed(reason.clone());
            prop_assert!(transport.to_string().contains(&reason));

            let line = LinkError::LogLine { line_number, length };
            let msg = line.to_string();
            prop_assert!(msg.contains(&length.to_string()));
            prop_assert!(msg.contains(&line_number.to_string()));

            let overflow = LinkError::BufferOverflow { buffered, limit };
            prop_assert!(overflow.to_string().contains(&limit.to_string()));
        }

        #[test]
        fn source_chain_is_preserved(base_message in "[a-z ]{1,40}") {
            let inner: Box<dyn std::error::Error + Send + Sync> =
                Box::new(std::io::Error::other(base_message.clone()));
            let err = LinkError::transport_failed_with_source("send", inner);

            let source = std::error::Error::source(&err).expect("source present");
            prop_assert!(source.to_string().contains(&base_message));
        }
    }

    #[test]
    fn no_valid_columns_lists_requested_names() {
        let err = LinkError::NoValidColumns { requested: vec!["foo".into(), "bar".into()] };
        assert_eq!(err.to_string(), "No valid columns in selection [foo, bar]");
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<LinkError>();

        let error = LinkError::transport_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_methods_work() {
        let transport = LinkError::transport_failed("test");
        let line = LinkError::LogLine { line_number: 3, length: 158 };

        assert!(transport.is_retryable());
        assert!(!line.is_retryable());
        assert!(!LinkError::NoValidColumns { requested: vec![] }.is_retryable());

        for suggestion in transport.recovery_suggestions() {
            assert!(suggestion.len() > 5);
        }
        assert!(!line.recovery_suggestions().is_empty());
    }

    #[test]
    fn from_io_error_maps_to_file() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing log");
        match LinkError::from(io_err) {
            LinkError::File { source, .. } => assert_eq!(source.to_string(), "missing log"),
            other => panic!("Expected File error variant, got {other:?}"),
        }
    }
}
