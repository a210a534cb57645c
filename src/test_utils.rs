//! Test utilities: payload builders, wire-frame helpers and an in-memory transport
//!
//! Compiled for unit tests and for the `benchmark` feature so integration
//! tests and benches share the same fixtures.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::dispatch::{CLASS, ids};
use crate::record::RECORD_LEN;
use crate::transport::Transport;
use crate::types::Frame;
use crate::{LinkError, Result};

/// Builds an 80-byte telemetry payload field by field.
///
/// Unset bytes are zero.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    bytes: [u8; RECORD_LEN],
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self { bytes: [0u8; RECORD_LEN] }
    }

    fn put(mut self, offset: usize, value: &[u8]) -> Self {
        self.bytes[offset..offset + value.len()].copy_from_slice(value);
        self
    }

    pub fn u8(self, offset: usize, value: u8) -> Self {
        self.put(offset, &[value])
    }

    pub fn u16(self, offset: usize, value: u16) -> Self {
        self.put(offset, &value.to_le_bytes())
    }

    pub fn i16(self, offset: usize, value: i16) -> Self {
        self.put(offset, &value.to_le_bytes())
    }

    pub fn u32(self, offset: usize, value: u32) -> Self {
        self.put(offset, &value.to_le_bytes())
    }

    pub fn i32(self, offset: usize, value: i32) -> Self {
        self.put(offset, &value.to_le_bytes())
    }

    /// Calendar fields at offsets 4..=10. Validity flags are left alone.
    pub fn date_time(self, year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        self.u16(4, year).put(6, &[month, day, hour, minute, second])
    }

    /// A plausible moving record: valid date/time, 3D fix, position and speed.
    pub fn sample(itow_ms: u32) -> Self {
        Self::new()
            .u32(0, itow_ms)
            .date_time(2024, 6, 15, 12, 30, 45)
            .u8(11, 0x07)
            .i32(16, 250_000_000)
            .u8(20, 3)
            .u8(21, 0x01)
            .u8(23, 12)
            .i32(24, -74_012_345)
            .i32(28, 407_127_760)
            .i32(32, 15_000)
            .i32(36, 12_000)
            .i32(48, 22_222)
            .u16(64, 110)
            .u8(67, 0x80 | 64)
            .i16(72, 1_000)
    }

    pub fn build(&self) -> [u8; RECORD_LEN] {
        self.bytes
    }
}

/// Wire bytes for a frame of the device class.
pub fn frame_bytes(id: u8, payload: &[u8]) -> Vec<u8> {
    Frame::new(CLASS, id, payload.to_vec()).map(|frame| frame.encode()).unwrap_or_default()
}

pub fn ack_frame(class: u8, id: u8) -> Vec<u8> {
    frame_bytes(ids::ACK, &[class, id])
}

pub fn nack_frame(class: u8, id: u8) -> Vec<u8> {
    frame_bytes(ids::NACK, &[class, id])
}

pub fn download_started_frame(expected: i32) -> Vec<u8> {
    frame_bytes(ids::DOWNLOAD, &expected.to_le_bytes())
}

pub fn record_frame(payload: &[u8; RECORD_LEN]) -> Vec<u8> {
    frame_bytes(ids::HISTORY_RECORD, payload)
}

pub fn status_frame(
    recording: bool,
    memory_percent: u8,
    security: u8,
    stored_records: u32,
    total_capacity: u32,
) -> Vec<u8> {
    let mut payload = [0u8; 12];
    payload[0] = u8::from(recording);
    payload[1] = memory_percent;
    payload[2] = security;
    payload[4..8].copy_from_slice(&stored_records.to_le_bytes());
    payload[8..12].copy_from_slice(&total_capacity.to_le_bytes());
    frame_bytes(ids::STATUS, &payload)
}

#[derive(Debug, Default)]
struct MockState {
    notifications: Option<mpsc::Sender<Vec<u8>>>,
    connected_to: Option<String>,
    sent: Vec<Vec<u8>>,
    fail_connect: bool,
    fail_sends: bool,
    disconnected: bool,
}

/// In-memory transport
///
/// Clones share state, so a test keeps one handle to push notifications
/// and inspect sent bytes while the connection owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver one notification chunk. Does nothing before connect or after close.
    pub async fn notify(&self, chunk: impl Into<Vec<u8>>) {
        let sender = self.state().notifications.clone();
        if let Some(sender) = sender {
            let _ = sender.send(chunk.into()).await;
        }
    }

    /// Drop the notification channel, as a lost link would.
    pub fn close(&self) {
        self.state().notifications = None;
    }

    /// Every command written so far, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state().sent.clone()
    }

    pub fn connected_to(&self) -> Option<String> {
        self.state().connected_to.clone()
    }

    pub fn disconnected(&self) -> bool {
        self.state().disconnected
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state().fail_connect = fail;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.state().fail_sends = fail;
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn connect(&self, device_id: &str, capacity: usize) -> Result<mpsc::Receiver<Vec<u8>>> {
        let mut state = self.state();
        if state.fail_connect {
            return Err(LinkError::transport_failed(format!("{device_id} not found")));
        }
        let (tx, rx) = mpsc::channel(capacity);
        state.notifications = Some(tx);
        state.connected_to = Some(device_id.to_string());
        Ok(rx)
    }

    async fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state();
        if state.fail_sends {
            return Err(LinkError::transport_failed("write rejected"));
        }
        state.sent.push(bytes.to_vec());
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state();
        state.notifications = None;
        state.disconnected = true;
        Ok(())
    }
}
