//! Single-flight scan sessions with a detection timeout.
//!
//! Starting a scan cancels the previous one before the new read begins. Every
//! session carries a generation number, and a session may only record its
//! terminal state while the adapter is still on that generation and still
//! scanning. Detection and timeout race inside one `select!`, so exactly one
//! of them resolves a session and the loser is dropped with it.

use std::sync::Arc;
use std::time::Duration;

use suq_core::ProductId;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ScanCapability, ScanState, resolve_payload};

/// How long a scan waits for a detection before offering manual continuation.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(8);

/// Product opened by manual continuation when no payload was read.
pub const DEFAULT_FALLBACK_PRODUCT: &str = "prod4";

/// Scan state tagged with the session that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSnapshot {
    pub generation: u64,
    pub state: ScanState,
}

/// Runs scan sessions against a [`ScanCapability`].
pub struct ScanAdapter {
    timeout: Duration,
    fallback: ProductId,
    state: Arc<watch::Sender<ScanSnapshot>>,
    in_flight: Option<CancellationToken>,
    generation: u64,
}

impl ScanAdapter {
    #[must_use]
    pub fn new(timeout: Duration, fallback: ProductId) -> Self {
        let (state, _) = watch::channel(ScanSnapshot::default());
        Self {
            timeout,
            fallback,
            state: Arc::new(state),
            in_flight: None,
            generation: 0,
        }
    }

    /// Current scan state.
    #[must_use]
    pub fn state(&self) -> ScanState {
        self.state.borrow().state.clone()
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.state.subscribe()
    }

    /// Begin a scan, cancelling any scan already in flight.
    ///
    /// Returns the generation number of the new session. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self, capability: Arc<dyn ScanCapability>) -> u64 {
        if self.in_flight.is_some() && self.state().is_scanning() {
            info!("Superseding in-flight scan");
        }
        self.abort_in_flight();

        self.generation += 1;
        let generation = self.generation;
        let source = capability.source();
        self.state.send_replace(ScanSnapshot {
            generation,
            state: ScanState::Scanning { source },
        });
        info!(generation, %source, "Scan started");

        capability.reset();
        let cancel = CancellationToken::new();
        tokio::spawn(run_scan(
            capability,
            Arc::clone(&self.state),
            generation,
            self.timeout,
            cancel.clone(),
        ));
        self.in_flight = Some(cancel);
        generation
    }

    /// Stop the current scan and return to `Idle`.
    pub fn cancel(&mut self) {
        self.abort_in_flight();
        if self.state().is_scanning() {
            debug!(generation = self.generation, "Scan cancelled");
        }
        self.set(ScanState::Idle);
    }

    /// After a timeout, continue with the fallback product.
    ///
    /// Returns `None` unless the current scan timed out.
    pub fn continue_manually(&mut self) -> Option<ProductId> {
        if self.state() != ScanState::TimedOut {
            return None;
        }
        info!(product_id = %self.fallback, "Continuing scan manually");
        self.set(ScanState::Detected(self.fallback.clone()));
        Some(self.fallback.clone())
    }

    /// Consume a detection, returning the adapter to `Idle`.
    pub fn take_detection(&mut self) -> Option<ProductId> {
        let ScanState::Detected(product_id) = self.state() else {
            return None;
        };
        self.set(ScanState::Idle);
        Some(product_id)
    }

    /// Clear a failure or timeout notice.
    pub fn acknowledge(&mut self) {
        if matches!(self.state(), ScanState::Failed(_) | ScanState::TimedOut) {
            self.set(ScanState::Idle);
        }
    }

    /// Wait until the current session resolves and return its state.
    pub async fn settled(&self) -> ScanState {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|snapshot| !snapshot.state.is_scanning())
            .await
            .map(|snapshot| snapshot.state.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    fn set(&self, state: ScanState) {
        self.state.send_replace(ScanSnapshot {
            generation: self.generation,
            state,
        });
    }

    fn abort_in_flight(&mut self) {
        if let Some(cancel) = self.in_flight.take() {
            cancel.cancel();
        }
    }
}

impl Drop for ScanAdapter {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}

/// One scan session: the read and the timeout race to a single result.
async fn run_scan(
    capability: Arc<dyn ScanCapability>,
    state: Arc<watch::Sender<ScanSnapshot>>,
    generation: u64,
    timeout: Duration,
    cancel: CancellationToken,
) {
    let read_cancel = cancel.child_token();

    // Cancellation reaches the capability through its token, so the read is
    // allowed to wind down instead of being dropped mid-operation.
    let outcome = tokio::select! {
        read = capability.read(read_cancel.clone()) => {
            if cancel.is_cancelled() {
                debug!(generation, "Scan session aborted");
                return;
            }
            match read.and_then(|payload| resolve_payload(&payload)) {
                Ok(product_id) => {
                    info!(generation, %product_id, "Scan detected product");
                    ScanState::Detected(product_id)
                }
                Err(e) => {
                    warn!(generation, error = %e, "Scan failed");
                    ScanState::Failed(e)
                }
            }
        }
        () = tokio::time::sleep(timeout) => {
            info!(generation, timeout_secs = timeout.as_secs(), "Scan timed out");
            ScanState::TimedOut
        }
    };

    read_cancel.cancel();

    state.send_if_modified(|snapshot| {
        if snapshot.generation != generation || !snapshot.state.is_scanning() {
            debug!(generation, "Discarding result of stale scan session");
            return false;
        }
        snapshot.state = outcome;
        true
    });
}
