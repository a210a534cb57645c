//! Message catalog, inbound dispatch and outbound command encoding
//!
//! Every message of this device uses class `0xFF`; the id selects the kind
//! and each kind has exactly one legal payload length.
//!
//! | id | len | message | direction |
//! |---|---|---|---|
//! | 0x02 | 2 | Ack(class, id) | in |
//! | 0x03 | 2 | Nack(class, id) | in |
//! | 0x21 | 80 | History record | in |
//! | 0x22 | 12 | Status snapshot | in (empty payload out) |
//! | 0x23 | 4 | Download started (expected count) | in (0/1 byte out) |
//! | 0x25 | 12 | Set recording config | out |
//! | 0x26 | 12 | Recording state change | in, ignored |
//! | 0x30 | 4 | Unlock memory | out |
//!
//! A frame with a known id but any other length is ignored. This keeps older
//! hosts working against newer payload variants; such frames are visible at
//! `debug` level.

use tracing::{debug, trace};

use crate::record::{RECORD_LEN, TelemetryRecord};
use crate::types::{AckMessage, Frame, NackMessage, RecordingConfig, StatusSnapshot, read};

/// Class byte shared by every message in the catalog.
pub const CLASS: u8 = 0xFF;

/// Message ids within [`CLASS`].
pub mod ids {
    pub const ACK: u8 = 0x02;
    pub const NACK: u8 = 0x03;
    pub const HISTORY_RECORD: u8 = 0x21;
    pub const STATUS: u8 = 0x22;
    pub const DOWNLOAD: u8 = 0x23;
    pub const RECORDING_CONFIG: u8 = 0x25;
    pub const STATE_CHANGE: u8 = 0x26;
    pub const UNLOCK_MEMORY: u8 = 0x30;
}

/// Payload byte that turns the download command into a cancel request.
pub const CANCEL_DOWNLOAD: u8 = 0xFF;

/// Kind of catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Ack,
    Nack,
    HistoryRecord,
    Status,
    DownloadStarted,
    RecordingConfig,
    StateChange,
    UnlockMemory,
}

/// One row of the message catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: u8,
    pub len: u16,
    pub kind: MessageKind,
}

/// Inbound-length catalog for class [`CLASS`].
pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry { id: ids::ACK, len: 2, kind: MessageKind::Ack },
    CatalogEntry { id: ids::NACK, len: 2, kind: MessageKind::Nack },
    CatalogEntry { id: ids::HISTORY_RECORD, len: RECORD_LEN as u16, kind: MessageKind::HistoryRecord },
    CatalogEntry { id: ids::STATUS, len: 12, kind: MessageKind::Status },
    CatalogEntry { id: ids::DOWNLOAD, len: 4, kind: MessageKind::DownloadStarted },
    CatalogEntry { id: ids::RECORDING_CONFIG, len: 12, kind: MessageKind::RecordingConfig },
    CatalogEntry { id: ids::STATE_CHANGE, len: 12, kind: MessageKind::StateChange },
    CatalogEntry { id: ids::UNLOCK_MEMORY, len: 4, kind: MessageKind::UnlockMemory },
];

/// Look up the catalog entry for a class/id pair.
pub fn lookup(class: u8, id: u8) -> Option<&'static CatalogEntry> {
    if class != CLASS {
        return None;
    }
    CATALOG.iter().find(|entry| entry.id == id)
}

/// Typed inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Ack(AckMessage),
    Nack(NackMessage),
    Status(StatusSnapshot),
    /// The device is about to stream `expected` history records
    DownloadStarted { expected: u32 },
    HistoryRecord(Box<TelemetryRecord>),
}

/// Map a verified frame to a typed message.
///
/// Returns `None` for unknown class/id pairs, known ids with an unexpected
/// length, and outbound-only or ignored kinds.
pub fn dispatch(frame: &Frame) -> Option<Message> {
    let Some(entry) = lookup(frame.class(), frame.id()) else {
        trace!("Ignoring unknown frame {:02X}/{:02X} len {}", frame.class(), frame.id(), frame.len());
        return None;
    };

    if frame.len() != entry.len {
        debug!(
            "Ignoring {:?} frame with length {} (expected {})",
            entry.kind,
            frame.len(),
            entry.len
        );
        return None;
    }

    let payload = frame.payload();
    let message = match entry.kind {
        MessageKind::Ack => {
            Message::Ack(AckMessage { echoed_class: payload[0], echoed_id: payload[1] })
        }
        MessageKind::Nack => {
            Message::Nack(NackMessage { echoed_class: payload[0], echoed_id: payload[1] })
        }
        MessageKind::Status => Message::Status(StatusSnapshot::decode(payload).ok()?),
        MessageKind::DownloadStarted => {
            let raw = read::<i32>(payload, 0).ok()?;
            if raw < 0 {
                debug!("Download start reported negative count {}, treating as unknown", raw);
            }
            Message::DownloadStarted { expected: raw.max(0) as u32 }
        }
        MessageKind::HistoryRecord => {
            Message::HistoryRecord(Box::new(TelemetryRecord::decode(payload).ok()?))
        }
        // Outbound-only or not acted on
        MessageKind::RecordingConfig | MessageKind::StateChange | MessageKind::UnlockMemory => {
            trace!("Ignoring inbound {:?} frame", entry.kind);
            return None;
        }
    };

    Some(message)
}

/// Outbound command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Request a [`StatusSnapshot`]
    QueryStatus,
    /// Begin streaming stored history records
    StartDownload,
    /// Ask the device to stop an in-progress download
    CancelDownload,
    /// Unlock protected memory with a 4-byte code
    UnlockMemory(u32),
    /// Configure standalone recording
    SetRecordingConfig(RecordingConfig),
}

impl Command {
    /// Message id this command is sent with.
    pub fn id(&self) -> u8 {
        match self {
            Command::QueryStatus => ids::STATUS,
            Command::StartDownload | Command::CancelDownload => ids::DOWNLOAD,
            Command::UnlockMemory(_) => ids::UNLOCK_MEMORY,
            Command::SetRecordingConfig(_) => ids::RECORDING_CONFIG,
        }
    }

    /// Command payload bytes.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Command::QueryStatus | Command::StartDownload => Vec::new(),
            Command::CancelDownload => vec![CANCEL_DOWNLOAD],
            Command::UnlockMemory(code) => code.to_le_bytes().to_vec(),
            Command::SetRecordingConfig(config) => config.to_payload().to_vec(),
        }
    }

    /// Build the command frame.
    pub fn to_frame(&self) -> Frame {
        Frame::from_verified(CLASS, self.id(), self.payload().into())
    }

    /// Encode the command to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.to_frame().encode()
    }

    /// Whether an Ack or Nack echoing `(class, id)` answers this command.
    pub fn is_answered_by(&self, echoed_class: u8, echoed_id: u8) -> bool {
        echoed_class == CLASS && echoed_id == self.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::PayloadBuilder;

    fn frame(id: u8, payload: Vec<u8>) -> Frame {
        Frame::new(CLASS, id, payload).unwrap()
    }

    #[test]
    fn dispatches_ack_and_nack() {
        assert_eq!(
            dispatch(&frame(ids::ACK, vec![0xFF, 0x23])),
            Some(Message::Ack(AckMessage { echoed_class: 0xFF, echoed_id: 0x23 }))
        );
        assert_eq!(
            dispatch(&frame(ids::NACK, vec![0xFF, 0x30])),
            Some(Message::Nack(NackMessage { echoed_class: 0xFF, echoed_id: 0x30 }))
        );
    }

    #[test]
    fn dispatches_download_started() {
        let msg = dispatch(&frame(ids::DOWNLOAD, 3i32.to_le_bytes().to_vec()));
        assert_eq!(msg, Some(Message::DownloadStarted { expected: 3 }));

        let negative = dispatch(&frame(ids::DOWNLOAD, (-5i32).to_le_bytes().to_vec()));
        assert_eq!(negative, Some(Message::DownloadStarted { expected: 0 }));
    }

    #[test]
    fn dispatches_history_record() {
        let payload = PayloadBuilder::new().i32(24, -74_012_345).build();
        match dispatch(&frame(ids::HISTORY_RECORD, payload.to_vec())) {
            Some(Message::HistoryRecord(record)) => assert_eq!(record.lon_deg, -7.4012345),
            other => panic!("expected history record, got {other:?}"),
        }
    }

    #[test]
    fn dispatches_status() {
        let mut payload = vec![0u8; 12];
        payload[0] = 1;
        payload[2] = 0x03;
        match dispatch(&frame(ids::STATUS, payload)) {
            Some(Message::Status(status)) => {
                assert!(status.recording);
                assert!(status.security_enabled && status.security_unlocked);
            }
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[test]
    fn ignores_length_mismatch_for_known_ids() {
        assert_eq!(dispatch(&frame(ids::ACK, vec![0xFF])), None);
        assert_eq!(dispatch(&frame(ids::STATUS, vec![0u8; 16])), None);
        assert_eq!(dispatch(&frame(ids::HISTORY_RECORD, vec![0u8; 79])), None);
        assert_eq!(dispatch(&frame(ids::DOWNLOAD, vec![0u8; 0])), None);
    }

    #[test]
    fn ignores_unknown_and_outbound_only() {
        assert_eq!(dispatch(&Frame::new(0x01, 0x07, vec![0u8; 92]).unwrap()), None);
        assert_eq!(dispatch(&frame(0x7E, vec![])), None);
        assert_eq!(dispatch(&frame(ids::UNLOCK_MEMORY, vec![0u8; 4])), None);
        assert_eq!(dispatch(&frame(ids::RECORDING_CONFIG, vec![0u8; 12])), None);
        assert_eq!(dispatch(&frame(ids::STATE_CHANGE, vec![0u8; 12])), None);
    }

    #[test]
    fn command_encoding() {
        assert_eq!(
            Command::StartDownload.encode(),
            vec![0xB5, 0x62, 0xFF, 0x23, 0x00, 0x00, 0x22, 0x65]
        );
        assert_eq!(Command::CancelDownload.payload(), vec![0xFF]);
        assert_eq!(Command::UnlockMemory(0x0102_0304).payload(), vec![0x04, 0x03, 0x02, 0x01]);
        assert_eq!(Command::SetRecordingConfig(RecordingConfig::default()).payload().len(), 12);
        assert_eq!(Command::QueryStatus.to_frame().id(), ids::STATUS);
    }

    #[test]
    fn download_commands_share_an_answer() {
        assert!(Command::StartDownload.is_answered_by(0xFF, 0x23));
        assert!(Command::CancelDownload.is_answered_by(0xFF, 0x23));
        assert!(!Command::StartDownload.is_answered_by(0xFF, 0x22));
        assert!(!Command::StartDownload.is_answered_by(0x06, 0x23));
    }
}
