//! Driver spawns and manages the link processing task
//!
//! One task owns the [`StreamAssembler`] and the [`DownloadSession`]. Inbound
//! chunks and control requests arrive over channels and are processed one at
//! a time, so no lock guards the receive buffer. Each chunk is parsed to a
//! fixed point before the next is taken.

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::StreamAssembler;
use crate::config::LinkConfig;
use crate::dispatch::{Message, dispatch};
use crate::download::{CompletionReason, DownloadEvent, DownloadProgress, DownloadSession};
use crate::record::TelemetryRecord;
use crate::types::{AckMessage, NackMessage, StatusSnapshot};

/// Typed output of the link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LinkEvent {
    Ack(AckMessage),
    Nack(NackMessage),
    Status(StatusSnapshot),
    DownloadProgress { received: u32, expected: u32 },
    DownloadCompleted { received: u32, expected: u32, reason: CompletionReason },
    /// A decoded history record, whether or not a download is active
    Record(Box<TelemetryRecord>),
    /// The receive buffer exceeded its bound and `discarded` bytes were dropped
    BufferOverflow { discarded: usize },
    /// The transport closed its notification channel
    Disconnected,
}

impl From<DownloadEvent> for LinkEvent {
    fn from(event: DownloadEvent) -> Self {
        match event {
            DownloadEvent::Progress { received, expected } => {
                LinkEvent::DownloadProgress { received, expected }
            }
            DownloadEvent::Completed { received, expected, reason } => {
                LinkEvent::DownloadCompleted { received, expected, reason }
            }
        }
    }
}

/// Requests from the connection to the driver task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// The download-start command is about to be sent
    BeginDownload,
    /// The cancel command is about to be sent
    CancelDownload,
    /// The download-start command could not be written
    AbortBegin,
    /// The cancel command could not be written
    AbortCancel,
}

/// Result of spawning the driver task
pub struct DriverChannels {
    /// Receiver for link events
    pub events: mpsc::Receiver<LinkEvent>,
    /// Sender for control requests
    pub control: mpsc::Sender<Control>,
    /// Receiver for download progress snapshots
    pub progress: watch::Receiver<DownloadProgress>,
    /// Receiver for the time of the last inbound chunk
    pub activity: watch::Receiver<Instant>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Driver spawns and manages the link processing task
pub struct Driver;

impl Driver {
    /// Spawn the processing task for a stream of inbound chunks.
    pub fn spawn(notifications: mpsc::Receiver<Vec<u8>>, config: &LinkConfig) -> DriverChannels {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let (control_tx, control_rx) = mpsc::channel(config.command_capacity);
        let (progress_tx, progress_rx) = watch::channel(DownloadProgress::default());
        let (activity_tx, activity_rx) = watch::channel(Instant::now());
        let cancel = CancellationToken::new();

        let task = DriverTask {
            assembler: StreamAssembler::new(config.max_buffer_len),
            session: DownloadSession::new(),
            events: event_tx,
            progress: progress_tx,
            activity: activity_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run(notifications, control_rx));

        DriverChannels {
            events: event_rx,
            control: control_tx,
            progress: progress_rx,
            activity: activity_rx,
            cancel,
        }
    }
}

struct DriverTask {
    assembler: StreamAssembler,
    session: DownloadSession,
    events: mpsc::Sender<LinkEvent>,
    progress: watch::Sender<DownloadProgress>,
    activity: watch::Sender<Instant>,
    cancel: CancellationToken,
}

impl DriverTask {
    async fn run(
        mut self,
        mut notifications: mpsc::Receiver<Vec<u8>>,
        mut control: mpsc::Receiver<Control>,
    ) {
        info!("Link driver task started");
        let mut chunk_count = 0u64;
        let mut control_open = true;

        loop {
            // Control first: a begin request queued before its command was
            // written must be applied before the device's reply is parsed
            let keep_going = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Link driver cancelled");
                    break;
                }
                request = control.recv(), if control_open => match request {
                    Some(request) => {
                        self.apply(request);
                        true
                    }
                    None => {
                        control_open = false;
                        true
                    }
                },
                chunk = notifications.recv() => match chunk {
                    Some(chunk) => {
                        chunk_count += 1;
                        self.ingest(&chunk).await
                    }
                    None => {
                        info!("Notification channel closed after {} chunks", chunk_count);
                        self.emit(LinkEvent::Disconnected).await;
                        false
                    }
                },
            };

            if !keep_going {
                break;
            }
        }

        let stats = self.assembler.stats();
        info!(
            "Link driver task ended ({} chunks, {} frames, {} resyncs)",
            chunk_count, stats.frames, stats.resyncs
        );
    }

    fn apply(&mut self, request: Control) {
        debug!("Control request: {:?}", request);
        match request {
            Control::BeginDownload => self.session.begin(),
            Control::CancelDownload => self.session.request_cancel(),
            Control::AbortBegin => self.session.abort_begin(),
            Control::AbortCancel => self.session.abort_cancel(),
        }
        self.publish_progress();
    }

    /// Parse one chunk to a fixed point and publish the results. Returns
    /// false once nobody is listening for events.
    async fn ingest(&mut self, chunk: &[u8]) -> bool {
        trace!("Received {} byte chunk", chunk.len());
        self.activity.send_replace(Instant::now());

        let assembled = self.assembler.append(chunk);
        for frame in &assembled.frames {
            let Some(message) = dispatch(frame) else {
                continue;
            };

            let session_events = self.session.handle(&message);
            if !session_events.is_empty() {
                self.publish_progress();
            }

            let primary = match message {
                Message::Ack(ack) => Some(LinkEvent::Ack(ack)),
                Message::Nack(nack) => Some(LinkEvent::Nack(nack)),
                Message::Status(status) => Some(LinkEvent::Status(status)),
                Message::HistoryRecord(record) => Some(LinkEvent::Record(record)),
                Message::DownloadStarted { .. } => None,
            };

            let events = primary.into_iter().chain(session_events.into_iter().map(LinkEvent::from));
            for event in events {
                if !self.emit(event).await {
                    return false;
                }
            }
        }

        if let Some(error) = assembled.overflow_error() {
            warn!("{}", error);
            return self.emit(LinkEvent::BufferOverflow { discarded: assembled.discarded }).await;
        }
        true
    }

    fn publish_progress(&self) {
        self.progress.send_replace(self.session.progress());
    }

    async fn emit(&self, event: LinkEvent) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.events.send(event) => {
                if sent.is_err() {
                    warn!("Link event receiver dropped, shutting down");
                }
                sent.is_ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DownloadState;
    use crate::types::Frame;
    use crate::test_utils::{PayloadBuilder, ack_frame, download_started_frame, record_frame};

    fn spawn() -> (mpsc::Sender<Vec<u8>>, DriverChannels) {
        let (tx, rx) = mpsc::channel(16);
        (tx, Driver::spawn(rx, &LinkConfig::default()))
    }

    #[tokio::test]
    async fn counted_download_emits_records_progress_and_completion() {
        let (tx, mut channels) = spawn();
        channels.control.send(Control::BeginDownload).await.unwrap();

        let mut wire = download_started_frame(2);
        wire.extend(record_frame(&PayloadBuilder::new().u32(0, 1).build()));
        wire.extend(record_frame(&PayloadBuilder::new().u32(0, 2).build()));
        // Late ack after count completion is reported but completes nothing
        wire.extend(ack_frame(0xFF, 0x23));
        tx.send(wire).await.unwrap();

        let mut events = Vec::new();
        while events.len() < 7 {
            events.push(channels.events.recv().await.unwrap());
        }

        assert_eq!(events[0], LinkEvent::DownloadProgress { received: 0, expected: 2 });
        assert!(matches!(&events[1], LinkEvent::Record(r) if r.itow_ms == 1));
        assert_eq!(events[2], LinkEvent::DownloadProgress { received: 1, expected: 2 });
        assert!(matches!(&events[3], LinkEvent::Record(r) if r.itow_ms == 2));
        assert_eq!(events[4], LinkEvent::DownloadProgress { received: 2, expected: 2 });
        assert_eq!(
            events[5],
            LinkEvent::DownloadCompleted {
                received: 2,
                expected: 2,
                reason: CompletionReason::CountReached
            }
        );
        assert!(matches!(events[6], LinkEvent::Ack(_)));

        let progress = *channels.progress.borrow();
        assert_eq!(progress.state, DownloadState::Idle);
        assert_eq!(progress.received, 2);
    }

    #[tokio::test]
    async fn split_chunks_decode_like_whole() {
        let (tx, mut channels) = spawn();
        let status = Frame::new(0xFF, 0x22, vec![1u8; 12]).unwrap().encode();

        for byte in status {
            tx.send(vec![byte]).await.unwrap();
        }
        match channels.events.recv().await.unwrap() {
            LinkEvent::Status(snapshot) => assert!(snapshot.recording),
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn overflow_is_reported_and_parsing_continues() {
        let (tx, rx) = mpsc::channel(16);
        let config = LinkConfig { max_buffer_len: 100, ..LinkConfig::default() };
        let mut channels = Driver::spawn(rx, &config);

        // Header announcing a huge frame that never completes
        let mut bogus = vec![0xB5, 0x62, 0xFF, 0x21, 0xFF, 0xFF];
        bogus.extend(vec![0u8; 200]);
        tx.send(bogus).await.unwrap();
        assert!(matches!(channels.events.recv().await, Some(LinkEvent::BufferOverflow { .. })));

        tx.send(ack_frame(0xFF, 0x22)).await.unwrap();
        assert!(matches!(channels.events.recv().await, Some(LinkEvent::Ack(_))));
    }

    #[tokio::test]
    async fn closed_notifications_report_disconnect() {
        let (tx, mut channels) = spawn();
        let before = *channels.activity.borrow();
        tx.send(vec![0x00]).await.unwrap();
        drop(tx);

        assert_eq!(channels.events.recv().await, Some(LinkEvent::Disconnected));
        assert_eq!(channels.events.recv().await, None);
        assert!(*channels.activity.borrow() >= before);
    }

    #[tokio::test]
    async fn cancel_stops_the_task() {
        let (_tx, mut channels) = spawn();
        channels.cancel.cancel();
        assert_eq!(channels.events.recv().await, None);
    }
}
