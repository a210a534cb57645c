//! Connection to one device
//!
//! A [`Connection`] owns the transport and the handles of the driver task
//! that parses everything the device sends. Commands are fire-and-forget on
//! the wire: the only error a command can return is a transport or channel
//! failure, and such a failure never touches the receive state.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use racebox_link::{Connection, LinkConfig, LinkEvent, Transport, UpdateRate};
//! use futures::StreamExt;
//!
//! async fn download<T: Transport>(transport: T) -> racebox_link::Result<()> {
//!     let mut connection = Connection::open(transport, "RaceBox Mini 1234", LinkConfig::default()).await?;
//!
//!     let mut progress = connection.progress_updates(UpdateRate::Max(4));
//!     tokio::spawn(async move {
//!         while let Some(p) = progress.next().await {
//!             println!("{}/{}", p.received, p.expected);
//!         }
//!     });
//!
//!     connection.start_download().await?;
//!     while let Some(event) = connection.next_event().await {
//!         match event {
//!             LinkEvent::Record(record) => println!("{:.7} {:.7}", record.lat_deg, record.lon_deg),
//!             LinkEvent::DownloadCompleted { .. } | LinkEvent::Disconnected => break,
//!             _ => {}
//!         }
//!     }
//!     connection.disconnect().await
//! }
//! ```

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::LinkConfig;
use crate::dispatch::Command;
use crate::download::{DownloadProgress, DownloadState};
use crate::driver::{Control, Driver, LinkEvent};
use crate::stream::ThrottleExt;
use crate::transport::Transport;
use crate::types::{RecordingConfig, UpdateRate};
use crate::{LinkError, Result};

/// Live link to one device
pub struct Connection<T: Transport> {
    transport: T,
    device_id: String,
    config: LinkConfig,

    /// Link event receiver
    events: mpsc::Receiver<LinkEvent>,

    /// Control requests to the driver
    control: mpsc::Sender<Control>,

    /// Download progress watch receiver
    progress: watch::Receiver<DownloadProgress>,

    /// Time of the last inbound chunk
    activity: watch::Receiver<Instant>,

    /// Cancellation token for stopping the driver
    cancel: CancellationToken,
}

impl<T: Transport> Connection<T> {
    /// Connect through `transport` and start parsing.
    pub async fn open(transport: T, device_id: &str, config: LinkConfig) -> Result<Self> {
        config.validate()?;
        info!("Connecting to {}", device_id);

        let notifications = transport.connect(device_id, config.command_capacity).await.map_err(|e| {
            error!("Connect to {} failed: {}", device_id, e);
            e
        })?;
        let channels = Driver::spawn(notifications, &config);

        info!("Connected to {}", device_id);
        Ok(Self {
            transport,
            device_id: device_id.to_string(),
            config,
            events: channels.events,
            control: channels.control,
            progress: channels.progress,
            activity: channels.activity,
            cancel: channels.cancel,
        })
    }

    /// Ask the device for a status snapshot.
    pub async fn query_status(&self) -> Result<()> {
        self.send_command(Command::QueryStatus).await
    }

    /// Enter `Downloading` and ask the device to stream its stored history.
    ///
    /// If the command cannot be written the session is rolled back, so a
    /// failed call leaves the download state as it was.
    pub async fn start_download(&self) -> Result<()> {
        self.control(Control::BeginDownload).await?;
        self.send_or_roll_back(Command::StartDownload, Control::AbortBegin).await
    }

    /// Ask the device to stop the current download.
    ///
    /// The session stays `Downloading` until the device answers or the
    /// announced count completes.
    pub async fn cancel_download(&self) -> Result<()> {
        self.control(Control::CancelDownload).await?;
        self.send_or_roll_back(Command::CancelDownload, Control::AbortCancel).await
    }

    /// Unlock protected memory.
    pub async fn unlock_memory(&self, code: u32) -> Result<()> {
        self.send_command(Command::UnlockMemory(code)).await
    }

    /// Configure standalone recording.
    pub async fn set_recording_config(&self, config: &RecordingConfig) -> Result<()> {
        self.send_command(Command::SetRecordingConfig(*config)).await
    }

    /// Encode and write any command.
    pub async fn send_command(&self, command: Command) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(LinkError::NotConnected);
        }
        debug!("Sending {:?} to {}", command, self.device_id);
        self.transport.send(&command.encode()).await.map_err(|e| {
            error!("Send {:?} to {} failed: {}", command, self.device_id, e);
            e
        })
    }

    async fn send_or_roll_back(&self, command: Command, rollback: Control) -> Result<()> {
        let result = self.send_command(command).await;
        if result.is_err() && self.control(rollback).await.is_err() {
            debug!("Driver gone, {:?} not applied", rollback);
        }
        result
    }

    async fn control(&self, request: Control) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(LinkError::NotConnected);
        }
        self.control.send(request).await.map_err(|_| LinkError::ChannelClosed { channel: "control" })
    }

    /// Next link event, or `None` once the driver has stopped.
    pub async fn next_event(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }

    /// Next link event, failing with [`LinkError::Timeout`] if none arrives in time.
    pub async fn next_event_timeout(&mut self, duration: Duration) -> Result<Option<LinkEvent>> {
        tokio::time::timeout(duration, self.events.recv())
            .await
            .map_err(|_| LinkError::Timeout { duration })
    }

    /// Link events as a stream.
    pub fn events(&mut self) -> impl Stream<Item = LinkEvent> + '_ {
        futures::stream::unfold(&mut self.events, |events| async move {
            events.recv().await.map(|event| (event, events))
        })
    }

    /// Download progress as a stream.
    ///
    /// Yields the current snapshot immediately, then changes. With
    /// `UpdateRate::Max`, intermediate snapshots are coalesced but a
    /// snapshot returning to `Idle` is always delivered.
    ///
    /// Events are never dropped: once `event_capacity` of them are waiting
    /// the driver stops reading notifications until they are drained. Keep
    /// calling [`next_event`](Self::next_event) (or polling
    /// [`events`](Self::events)) alongside this stream, or progress and the
    /// activity clock behind [`is_stalled`](Self::is_stalled) freeze.
    pub fn progress_updates(&self, rate: UpdateRate) -> BoxStream<'static, DownloadProgress> {
        let updates = WatchStream::new(self.progress.clone());
        match rate.interval() {
            None => updates.boxed(),
            Some(interval) => {
                updates.throttle_with(interval, |p: &DownloadProgress| p.is_idle()).boxed()
            }
        }
    }

    /// Current download progress.
    pub fn download_progress(&self) -> DownloadProgress {
        *self.progress.borrow()
    }

    /// Time since the last inbound chunk (or since connecting).
    pub fn idle_for(&self) -> Duration {
        self.activity.borrow().elapsed()
    }

    /// Whether a download is in progress but nothing has arrived within
    /// the configured stall timeout. The caller decides whether to cancel.
    ///
    /// Only meaningful while events are being drained; see
    /// [`progress_updates`](Self::progress_updates).
    pub fn is_stalled(&self) -> bool {
        let stalled = self.download_progress().state == DownloadState::Downloading
            && self.idle_for() >= self.config.stall_timeout();
        if stalled {
            warn!("Download from {} stalled for {:?}", self.device_id, self.idle_for());
        }
        stalled
    }

    /// Whether the driver task is still running.
    pub fn is_connected(&self) -> bool {
        !self.cancel.is_cancelled() && !self.control.is_closed()
    }

    /// Identifier this connection was opened with.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Active configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Stop the driver and release the transport.
    pub async fn disconnect(self) -> Result<()> {
        info!("Disconnecting from {}", self.device_id);
        self.cancel.cancel();
        self.transport.disconnect().await
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        debug!("Dropping connection to {}", self.device_id);
        self.cancel.cancel();
    }
}
