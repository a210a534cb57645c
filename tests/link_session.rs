//! End-to-end link tests through the public API with a channel-backed transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use racebox_link::{
    CompletionReason, LinkConfig, LinkError, LinkEvent, RaceBox, RecordingConfig, Transport,
    UpdateRate,
};
use tokio::sync::mpsc;

#[derive(Clone, Default)]
struct ChannelTransport {
    inbound: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    reject_writes: Arc<Mutex<bool>>,
}

impl ChannelTransport {
    async fn push(&self, bytes: Vec<u8>) {
        let sender = self.inbound.lock().unwrap().clone();
        sender.expect("not connected").send(bytes).await.unwrap();
    }

    fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn connect(
        &self,
        _device_id: &str,
        capacity: usize,
    ) -> racebox_link::Result<mpsc::Receiver<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(capacity);
        *self.inbound.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn send(&self, bytes: &[u8]) -> racebox_link::Result<()> {
        if *self.reject_writes.lock().unwrap() {
            return Err(LinkError::transport_failed("GATT write failed"));
        }
        self.written.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }
}

/// Encode a class 0xFF frame long-hand.
fn frame(id: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0xFF, id];
    body.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    body.extend_from_slice(payload);

    let (mut a, mut b) = (0u8, 0u8);
    for &byte in &body {
        a = a.wrapping_add(byte);
        b = b.wrapping_add(a);
    }

    let mut wire = vec![0xB5, 0x62];
    wire.extend(body);
    wire.extend([a, b]);
    wire
}

fn record(itow_ms: u32, lon_e7: i32) -> Vec<u8> {
    let mut payload = [0u8; 80];
    payload[0..4].copy_from_slice(&itow_ms.to_le_bytes());
    payload[24..28].copy_from_slice(&lon_e7.to_le_bytes());
    frame(0x21, &payload)
}

#[tokio::test]
async fn three_record_download_in_odd_chunks() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let transport = ChannelTransport::default();
    let mut connection =
        RaceBox::connect(transport.clone(), "RaceBox Mini 42", LinkConfig::default()).await?;
    connection.start_download().await?;
    assert_eq!(transport.written()[0], vec![0xB5, 0x62, 0xFF, 0x23, 0x00, 0x00, 0x22, 0x65]);

    // Noise, the announcement, three records, split at awkward boundaries
    let mut wire = vec![0x00, 0xB5, 0x13];
    wire.extend(frame(0x23, &3i32.to_le_bytes()));
    for i in 0..3 {
        wire.extend(record(1000 + i * 40, -74_012_345));
    }
    for chunk in wire.chunks(7) {
        transport.push(chunk.to_vec()).await;
    }

    let mut longitudes = Vec::new();
    let mut completions = Vec::new();
    while completions.is_empty() {
        match connection.next_event_timeout(Duration::from_secs(5)).await? {
            Some(LinkEvent::Record(record)) => longitudes.push(record.lon_deg),
            Some(LinkEvent::DownloadCompleted { received, expected, reason }) => {
                completions.push((received, expected, reason))
            }
            Some(_) => {}
            None => anyhow::bail!("link closed early"),
        }
    }

    assert_eq!(longitudes, vec![-7.4012345; 3]);
    assert_eq!(completions, vec![(3, 3, CompletionReason::CountReached)]);
    assert!(connection.download_progress().is_idle());
    Ok(())
}

#[tokio::test]
async fn corrupted_frame_is_skipped() -> anyhow::Result<()> {
    let transport = ChannelTransport::default();
    let mut connection = RaceBox::connect(transport.clone(), "dev", LinkConfig::default()).await?;

    let mut bad = frame(0x02, &[0xFF, 0x22]);
    let last = bad.len() - 1;
    bad[last] ^= 0x5A;

    let mut wire = bad;
    wire.extend(frame(0x03, &[0xFF, 0x30]));
    transport.push(wire).await;

    match connection.next_event().await {
        Some(LinkEvent::Nack(nack)) => assert_eq!(nack.echoed_id, 0x30),
        other => anyhow::bail!("expected nack, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn write_failure_does_not_disturb_download() -> anyhow::Result<()> {
    let transport = ChannelTransport::default();
    let mut connection = RaceBox::connect(transport.clone(), "dev", LinkConfig::default()).await?;
    connection.start_download().await?;
    transport.push(frame(0x23, &2i32.to_le_bytes())).await;

    *transport.reject_writes.lock().unwrap() = true;
    let err = connection.set_recording_config(&RecordingConfig::default()).await.unwrap_err();
    assert!(err.is_retryable());

    transport.push(record(1, 0)).await;
    transport.push(record(2, 0)).await;

    let mut progress = connection.progress_updates(UpdateRate::Native);
    let done = loop {
        let snapshot = progress.next().await.expect("progress stream ended");
        if snapshot.is_idle() && snapshot.received > 0 {
            break snapshot;
        }
    };
    assert_eq!((done.received, done.expected), (2, 2));
    Ok(())
}
