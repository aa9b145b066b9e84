//! Scan capabilities that do not need device drivers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use suq_core::ScanSource;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ScanCapability, ScanError, ScanPayload};

/// Buffered reads waiting for a scan to pick them up.
const FEED_CAPACITY: usize = 8;

/// A feed event stamped with its position in the feed.
struct FeedEvent {
    sequence: u64,
    event: Result<ScanPayload, ScanError>,
}

/// Capability fed by an external event source (a platform bridge, a test).
///
/// Each read takes the next event from the feed. Events pushed while no scan
/// is running stay buffered for the current session, but [`reset`] discards
/// everything sent before a new session started.
///
/// [`reset`]: ScanCapability::reset
pub struct ChannelScanner {
    source: ScanSource,
    events: Mutex<mpsc::Receiver<FeedEvent>>,
    sent: Arc<AtomicU64>,
    /// Events with a lower sequence number belong to an earlier session.
    floor: AtomicU64,
}

/// Sending half of a [`ChannelScanner`].
#[derive(Debug, Clone)]
pub struct ScanFeed {
    sender: mpsc::Sender<FeedEvent>,
    sent: Arc<AtomicU64>,
}

impl ChannelScanner {
    /// Create a scanner and the feed that drives it.
    #[must_use]
    pub fn new(source: ScanSource) -> (Self, ScanFeed) {
        let (sender, receiver) = mpsc::channel(FEED_CAPACITY);
        let sent = Arc::new(AtomicU64::new(0));
        (
            Self {
                source,
                events: Mutex::new(receiver),
                sent: Arc::clone(&sent),
                floor: AtomicU64::new(0),
            },
            ScanFeed { sender, sent },
        )
    }
}

impl ScanFeed {
    /// Report a successful read. Returns `false` if the scanner is gone.
    pub async fn detect(&self, payload: impl Into<ScanPayload>) -> bool {
        self.send(Ok(payload.into())).await
    }

    /// Report a reader error. Returns `false` if the scanner is gone.
    pub async fn fail(&self, error: ScanError) -> bool {
        self.send(Err(error)).await
    }

    async fn send(&self, event: Result<ScanPayload, ScanError>) -> bool {
        let sequence = self.sent.fetch_add(1, Ordering::AcqRel);
        self.sender.send(FeedEvent { sequence, event }).await.is_ok()
    }
}

#[async_trait]
impl ScanCapability for ChannelScanner {
    fn source(&self) -> ScanSource {
        self.source
    }

    async fn read(&self, cancel: CancellationToken) -> Result<ScanPayload, ScanError> {
        let mut events = tokio::select! {
            () = cancel.cancelled() => return Err(ScanError::Aborted),
            events = self.events.lock() => events,
        };

        loop {
            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ScanError::Aborted),
                received = events.recv() => received,
            };
            let Some(FeedEvent { sequence, event }) = received else {
                return Err(ScanError::Closed);
            };
            if sequence < self.floor.load(Ordering::Acquire) {
                debug!(sequence, "Dropping scan event left over from an earlier session");
                continue;
            }
            return event;
        }
    }

    fn reset(&self) {
        self.floor
            .store(self.sent.load(Ordering::Acquire), Ordering::Release);
    }
}

/// Capability reported when the device lacks a scanner.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedScanner {
    source: ScanSource,
}

impl UnsupportedScanner {
    #[must_use]
    pub const fn new(source: ScanSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ScanCapability for UnsupportedScanner {
    fn source(&self) -> ScanSource {
        self.source
    }

    async fn read(&self, _cancel: CancellationToken) -> Result<ScanPayload, ScanError> {
        Err(ScanError::Unsupported(self.source))
    }
}
