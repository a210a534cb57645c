//! Download session tracking for bulk history transfers
//!
//! `Idle -> Downloading -> Idle`. A download ends on whichever signal comes
//! first: the received count reaching the announced count, or an Ack/Nack
//! for the download command. Once `Idle`, later signals are no-ops, so
//! completion fires exactly once per download.
//!
//! The tracker has no timer. Liveness is the owner's job: watch the time
//! since the last inbound data and cancel when it stalls.

use serde::Serialize;
use tracing::{debug, info};

use crate::dispatch::{CLASS, Message, ids};

/// Session state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DownloadState {
    #[default]
    Idle,
    Downloading,
}

/// Why a download left the `Downloading` state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionReason {
    /// Every announced record arrived
    CountReached,
    /// The device acknowledged the download command (cancel confirmed or dump finished)
    Acknowledged,
    /// The device rejected the download command
    Rejected,
}

/// Snapshot of session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    pub state: DownloadState,
    pub received: u32,
    pub expected: u32,
}

impl DownloadProgress {
    /// Whether this snapshot describes a finished or never-started session.
    pub fn is_idle(&self) -> bool {
        self.state == DownloadState::Idle
    }
}

/// Output of the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DownloadEvent {
    Progress { received: u32, expected: u32 },
    Completed { received: u32, expected: u32, reason: CompletionReason },
}

/// Session fields a failed command write restores
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    progress: DownloadProgress,
    cancel_requested: bool,
}

/// In-progress bulk history transfer, owned by one connection
#[derive(Debug, Default, Clone)]
pub struct DownloadSession {
    state: DownloadState,
    expected: u32,
    received: u32,
    cancel_requested: bool,
    /// State before the last `begin`, until the device says anything about it
    before_begin: Option<Checkpoint>,
    /// Cancel flag before the last `request_cancel`
    cancel_before: Option<bool>,
}

impl DownloadSession {
    /// Create an idle session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The host issued the download-start command.
    pub fn begin(&mut self) {
        info!("Download requested");
        self.before_begin =
            Some(Checkpoint { progress: self.progress(), cancel_requested: self.cancel_requested });
        self.cancel_before = None;
        self.state = DownloadState::Downloading;
        self.expected = 0;
        self.received = 0;
        self.cancel_requested = false;
    }

    /// The host issued the cancel command. The session stays `Downloading`
    /// until the device answers or the count completes.
    pub fn request_cancel(&mut self) {
        if self.state == DownloadState::Downloading {
            debug!("Download cancel requested at {}/{}", self.received, self.expected);
            self.cancel_before = Some(self.cancel_requested);
            self.cancel_requested = true;
        }
    }

    /// The download-start command never reached the device: return to the
    /// state before [`begin`](Self::begin). No-op once the device has
    /// announced a count or sent a record.
    pub fn abort_begin(&mut self) {
        let Some(checkpoint) = self.before_begin.take() else {
            debug!("Download already under way, nothing to roll back");
            return;
        };
        info!("Download request not sent, back to {:?}", checkpoint.progress.state);
        self.state = checkpoint.progress.state;
        self.expected = checkpoint.progress.expected;
        self.received = checkpoint.progress.received;
        self.cancel_requested = checkpoint.cancel_requested;
    }

    /// The cancel command never reached the device.
    pub fn abort_cancel(&mut self) {
        if let Some(previous) = self.cancel_before.take() {
            debug!("Download cancel not sent");
            self.cancel_requested = previous;
        }
    }

    /// The device announced how many records it will send.
    ///
    /// A device-initiated dump also enters `Downloading`.
    pub fn on_download_started(&mut self, expected: u32) -> DownloadEvent {
        info!("Download started: {} records expected", expected);
        self.before_begin = None;
        self.state = DownloadState::Downloading;
        self.expected = expected;
        self.received = 0;
        DownloadEvent::Progress { received: 0, expected }
    }

    /// A history record arrived.
    pub fn on_record(&mut self) -> Vec<DownloadEvent> {
        if self.state != DownloadState::Downloading {
            return Vec::new();
        }

        self.before_begin = None;
        self.received = self.received.saturating_add(1);
        let mut events =
            vec![DownloadEvent::Progress { received: self.received, expected: self.expected }];

        if self.expected > 0 && self.received >= self.expected {
            events.push(self.complete(CompletionReason::CountReached));
        }
        events
    }

    /// An Ack arrived echoing `(class, id)`.
    pub fn on_ack(&mut self, echoed_class: u8, echoed_id: u8) -> Option<DownloadEvent> {
        self.on_answer(echoed_class, echoed_id, CompletionReason::Acknowledged)
    }

    /// A Nack arrived echoing `(class, id)`.
    pub fn on_nack(&mut self, echoed_class: u8, echoed_id: u8) -> Option<DownloadEvent> {
        self.on_answer(echoed_class, echoed_id, CompletionReason::Rejected)
    }

    /// Feed any dispatched message; returns the resulting session events.
    pub fn handle(&mut self, message: &Message) -> Vec<DownloadEvent> {
        match message {
            Message::DownloadStarted { expected } => vec![self.on_download_started(*expected)],
            Message::HistoryRecord(_) => self.on_record(),
            Message::Ack(ack) => self.on_ack(ack.echoed_class, ack.echoed_id).into_iter().collect(),
            Message::Nack(nack) => {
                self.on_nack(nack.echoed_class, nack.echoed_id).into_iter().collect()
            }
            Message::Status(_) => Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> DownloadState {
        self.state
    }

    /// Announced record count (0 until the device announces it).
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Records received since the last announcement.
    pub fn received(&self) -> u32 {
        self.received
    }

    /// Whether a cancel is pending for the current download.
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Counter snapshot.
    pub fn progress(&self) -> DownloadProgress {
        DownloadProgress { state: self.state, received: self.received, expected: self.expected }
    }

    fn on_answer(
        &mut self,
        echoed_class: u8,
        echoed_id: u8,
        reason: CompletionReason,
    ) -> Option<DownloadEvent> {
        let answers_download = echoed_class == CLASS && echoed_id == ids::DOWNLOAD;
        if !answers_download || self.state != DownloadState::Downloading {
            return None;
        }
        Some(self.complete(reason))
    }

    fn complete(&mut self, reason: CompletionReason) -> DownloadEvent {
        info!(
            "Download finished ({:?}): {}/{} records{}",
            reason,
            self.received,
            self.expected,
            if self.cancel_requested { ", cancelled" } else { "" }
        );
        self.state = DownloadState::Idle;
        self.cancel_requested = false;
        self.before_begin = None;
        self.cancel_before = None;
        DownloadEvent::Completed { received: self.received, expected: self.expected, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completions(events: &[DownloadEvent]) -> usize {
        events.iter().filter(|e| matches!(e, DownloadEvent::Completed { .. })).count()
    }

    #[test]
    fn counted_download_reports_progress_and_completes_once() {
        let mut session = DownloadSession::new();
        session.begin();

        assert_eq!(
            session.on_download_started(3),
            DownloadEvent::Progress { received: 0, expected: 3 }
        );

        let mut all = Vec::new();
        for _ in 0..3 {
            all.extend(session.on_record());
        }

        assert_eq!(
            all,
            vec![
                DownloadEvent::Progress { received: 1, expected: 3 },
                DownloadEvent::Progress { received: 2, expected: 3 },
                DownloadEvent::Progress { received: 3, expected: 3 },
                DownloadEvent::Completed {
                    received: 3,
                    expected: 3,
                    reason: CompletionReason::CountReached
                },
            ]
        );
        assert_eq!(session.state(), DownloadState::Idle);

        // A late ack for the download command is a no-op
        assert_eq!(session.on_ack(0xFF, 0x23), None);
    }

    #[test]
    fn ack_completes_before_count() {
        let mut session = DownloadSession::new();
        session.begin();
        session.on_download_started(10);
        session.on_record();
        session.request_cancel();
        assert!(session.cancel_requested());
        assert_eq!(session.state(), DownloadState::Downloading);

        let event = session.on_ack(0xFF, 0x23).unwrap();
        assert_eq!(
            event,
            DownloadEvent::Completed {
                received: 1,
                expected: 10,
                reason: CompletionReason::Acknowledged
            }
        );
        assert!(!session.cancel_requested());

        // Records still in flight after the ack do not reopen the session
        assert!(session.on_record().is_empty());
    }

    #[test]
    fn nack_for_download_rejects() {
        let mut session = DownloadSession::new();
        session.begin();
        let event = session.on_nack(0xFF, 0x23).unwrap();
        assert!(matches!(event, DownloadEvent::Completed { reason: CompletionReason::Rejected, .. }));
    }

    #[test]
    fn unrelated_answers_are_ignored() {
        let mut session = DownloadSession::new();
        session.begin();
        assert_eq!(session.on_ack(0xFF, 0x22), None);
        assert_eq!(session.on_nack(0xFF, 0x30), None);
        assert_eq!(session.on_ack(0x05, 0x23), None);
        assert_eq!(session.state(), DownloadState::Downloading);
    }

    #[test]
    fn unknown_count_never_completes_by_count() {
        let mut session = DownloadSession::new();
        session.begin();
        session.on_download_started(0);
        let events: Vec<_> = (0..5).flat_map(|_| session.on_record()).collect();
        assert_eq!(completions(&events), 0);
        assert_eq!(session.received(), 5);
    }

    #[test]
    fn idle_records_are_not_counted() {
        let mut session = DownloadSession::new();
        assert!(session.on_record().is_empty());
        assert_eq!(session.progress(), DownloadProgress::default());
    }

    #[test]
    fn device_initiated_dump_enters_downloading() {
        let mut session = DownloadSession::new();
        session.on_download_started(1);
        assert_eq!(session.state(), DownloadState::Downloading);
        assert_eq!(completions(&session.on_record()), 1);
    }

    #[test]
    fn begin_resets_counters() {
        let mut session = DownloadSession::new();
        session.on_download_started(5);
        session.on_record();
        session.begin();
        assert_eq!(
            session.progress(),
            DownloadProgress { state: DownloadState::Downloading, received: 0, expected: 0 }
        );
    }

    #[test]
    fn unsent_begin_restores_previous_state() {
        let mut session = DownloadSession::new();
        session.begin();
        session.abort_begin();
        assert_eq!(session.progress(), DownloadProgress::default());

        // A finished download keeps its counters
        session.on_download_started(2);
        session.on_record();
        session.on_record();
        session.begin();
        session.abort_begin();
        assert_eq!(
            session.progress(),
            DownloadProgress { state: DownloadState::Idle, received: 2, expected: 2 }
        );
    }

    #[test]
    fn abort_after_device_answer_is_ignored() {
        let mut session = DownloadSession::new();
        session.begin();
        session.on_download_started(4);
        session.abort_begin();
        assert_eq!(session.state(), DownloadState::Downloading);
        assert_eq!(session.expected(), 4);
    }

    #[test]
    fn unsent_cancel_clears_the_request() {
        let mut session = DownloadSession::new();
        session.begin();
        session.on_download_started(10);
        session.request_cancel();
        session.abort_cancel();
        assert!(!session.cancel_requested());
        assert_eq!(session.state(), DownloadState::Downloading);

        // An earlier cancel that did go out survives a failed retry
        session.request_cancel();
        session.request_cancel();
        session.abort_cancel();
        assert!(session.cancel_requested());
    }
}
