//! Payment state machine driving the blocking confirmation overlay.
//!
//! Each checkout attempt gets a generation number. The spawned attempt only
//! writes its verdict if the state still belongs to its generation and is
//! still `Pending`, so a cancelled or superseded attempt can never flip the
//! status after the user has moved on.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use suq_core::PaymentStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CheckoutGateway, CheckoutPlan, CheckoutReceipt, CheckoutRequest};
use crate::cart::Cart;

/// A shop's checkout the gateway has accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShopReceipt {
    pub request: CheckoutRequest,
    pub receipt: CheckoutReceipt,
}

/// Observable payment state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaymentState {
    pub status: PaymentStatus,
    /// Generation of the attempt this state belongs to (0 before any attempt).
    pub attempt: u64,
    /// Shops accepted so far, in plan order. A failed attempt keeps the shops
    /// that went through before the failure.
    pub receipts: Vec<ShopReceipt>,
    /// Reason shown to the user when the attempt failed.
    pub error: Option<String>,
}

/// What a dismissal did, so the caller can react (e.g., navigate home).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissal {
    /// Nothing to dismiss.
    Ignored,
    /// An in-flight attempt was cancelled.
    Cancelled,
    /// A failure notice was acknowledged.
    Acknowledged,
    /// A successful payment was confirmed; return to the home page.
    ReturnHome,
}

struct InFlight {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Drives checkout attempts through a [`CheckoutGateway`].
///
/// Shops accepted by an attempt that later failed or was cancelled are
/// remembered, and the next attempt only submits the shops still unpaid.
pub struct CheckoutOrchestrator {
    gateway: Arc<dyn CheckoutGateway>,
    delivery_fee: Decimal,
    state: Arc<watch::Sender<PaymentState>>,
    in_flight: Option<InFlight>,
    attempts: u64,
    carried: Vec<ShopReceipt>,
}

impl CheckoutOrchestrator {
    #[must_use]
    pub fn new(gateway: Arc<dyn CheckoutGateway>, delivery_fee: Decimal) -> Self {
        let (state, _) = watch::channel(PaymentState::default());
        Self {
            gateway,
            delivery_fee,
            state: Arc::new(state),
            in_flight: None,
            attempts: 0,
            carried: Vec::new(),
        }
    }

    /// Current payment status.
    #[must_use]
    pub fn status(&self) -> PaymentStatus {
        self.state.borrow().status
    }

    /// Snapshot of the full payment state.
    #[must_use]
    pub fn state(&self) -> PaymentState {
        self.state.borrow().clone()
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PaymentState> {
        self.state.subscribe()
    }

    /// The requests that paying for `cart` would submit.
    #[must_use]
    pub fn plan(&self, cart: &Cart) -> Option<CheckoutPlan> {
        CheckoutPlan::from_cart(cart, self.delivery_fee)
    }

    /// Start paying for `cart`.
    ///
    /// Moves `Idle -> Pending` immediately and submits the checkout in the
    /// background. Returns `false` without doing anything when the cart is
    /// empty or a payment is already being shown.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin_checkout(&mut self, cart: &Cart) -> bool {
        let current = self.status();
        if current != PaymentStatus::Idle {
            warn!(status = %current, "Checkout requested while payment overlay is active");
            return false;
        }

        let Some(plan) = self.plan(cart) else {
            debug!("Checkout requested for empty cart");
            return false;
        };

        if plan.is_split() {
            info!(
                shops = plan.requests().len(),
                "Cart spans several shops, checking out per shop"
            );
        }

        let carried = std::mem::take(&mut self.carried);
        let (paid, unpaid): (Vec<_>, Vec<_>) = plan
            .requests()
            .iter()
            .cloned()
            .partition(|request| carried.iter().any(|shop| shop.request == *request));
        let receipts: Vec<ShopReceipt> = carried
            .into_iter()
            .filter(|shop| paid.contains(&shop.request))
            .collect();
        if !receipts.is_empty() {
            info!(
                paid = receipts.len(),
                unpaid = unpaid.len(),
                "Skipping shops already paid by an earlier attempt"
            );
        }

        self.attempts += 1;
        let attempt = self.attempts;
        self.state.send_replace(PaymentState {
            status: PaymentStatus::Pending,
            attempt,
            receipts,
            ..PaymentState::default()
        });
        info!(attempt, total = %plan.total(), "Checkout pending");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_attempt(
            Arc::clone(&self.gateway),
            Arc::clone(&self.state),
            unpaid,
            attempt,
            cancel.clone(),
        ));
        self.in_flight = Some(InFlight { cancel, task });
        true
    }

    /// Wait until the current attempt leaves `Pending` and return the state.
    pub async fn settled(&self) -> PaymentState {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|state| state.status != PaymentStatus::Pending)
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Close the payment overlay.
    ///
    /// `Success` and `Failed` return to `Idle`; `Pending` is cancelled and
    /// returns to `Idle`; `Idle` is left alone.
    pub fn dismiss(&mut self) -> Dismissal {
        let dismissal = match self.status() {
            PaymentStatus::Idle => return Dismissal::Ignored,
            PaymentStatus::Pending => {
                self.cancel_in_flight();
                Dismissal::Cancelled
            }
            PaymentStatus::Success => Dismissal::ReturnHome,
            PaymentStatus::Failed => Dismissal::Acknowledged,
        };

        let attempt = self.attempts;
        let previous = self.state.send_replace(PaymentState {
            status: PaymentStatus::Idle,
            attempt,
            ..PaymentState::default()
        });
        if dismissal != Dismissal::ReturnHome {
            self.carried = previous.receipts;
        }
        debug!(?dismissal, carried = self.carried.len(), "Payment overlay dismissed");
        dismissal
    }

    fn cancel_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
            if !in_flight.task.is_finished() {
                debug!("Cancelled in-flight checkout");
            }
        }
    }
}

impl Drop for CheckoutOrchestrator {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}

/// Submit the unpaid requests one shop at a time, recording each receipt as
/// it arrives, while this attempt still owns the state.
async fn run_attempt(
    gateway: Arc<dyn CheckoutGateway>,
    state: Arc<watch::Sender<PaymentState>>,
    requests: Vec<CheckoutRequest>,
    attempt: u64,
    cancel: CancellationToken,
) {
    for request in requests {
        let result = tokio::select! {
            () = cancel.cancelled() => {
                debug!(attempt, "Checkout attempt cancelled");
                return;
            }
            result = gateway.create_checkout(&request) => result,
        };

        let store_id = request.store_id.clone();
        let failed = result.is_err();
        let owned = state.send_if_modified(|current| {
            if current.attempt != attempt || current.status != PaymentStatus::Pending {
                debug!(attempt, "Discarding verdict for stale checkout attempt");
                return false;
            }
            match result {
                Ok(receipt) => {
                    debug!(attempt, %store_id, "Shop checkout accepted");
                    current.receipts.push(ShopReceipt { request, receipt });
                }
                Err(e) => {
                    warn!(attempt, %store_id, error = %e, "Payment failed");
                    current.status = PaymentStatus::Failed;
                    current.error = Some(format!("checkout for {store_id} failed: {e}"));
                }
            }
            true
        });
        if !owned || failed {
            return;
        }
    }

    state.send_if_modified(|current| {
        if current.attempt != attempt || current.status != PaymentStatus::Pending {
            return false;
        }
        info!(attempt, shops = current.receipts.len(), "Payment successful");
        current.status = PaymentStatus::Success;
        true
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use suq_core::{Product, ProductId, ShopId};

    use super::*;
    use crate::cart::DEFAULT_DELIVERY_FEE;
    use crate::checkout::{CheckoutError, CheckoutRequest, SimulatedGateway};

    struct RejectingGateway;

    /// Rejects one shop's first checkout and accepts everything else.
    struct FlakyGateway {
        reject_once: ShopId,
        rejected: std::sync::atomic::AtomicBool,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl FlakyGateway {
        fn new(shop: &str) -> Self {
            Self {
                reject_once: ShopId::new(shop),
                rejected: std::sync::atomic::AtomicBool::new(false),
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CheckoutGateway for FlakyGateway {
        async fn create_checkout(
            &self,
            request: &CheckoutRequest,
        ) -> Result<CheckoutReceipt, CheckoutError> {
            self.calls
                .lock()
                .unwrap()
                .push(request.store_id.as_str().to_string());
            if request.store_id == self.reject_once
                && !self
                    .rejected
                    .swap(true, std::sync::atomic::Ordering::SeqCst)
            {
                return Err(CheckoutError::Rejected {
                    status: 402,
                    message: "card declined".to_string(),
                });
            }
            Ok(CheckoutReceipt::default())
        }
    }

    #[async_trait]
    impl CheckoutGateway for RejectingGateway {
        async fn create_checkout(
            &self,
            _request: &CheckoutRequest,
        ) -> Result<CheckoutReceipt, CheckoutError> {
            Err(CheckoutError::Rejected {
                status: 402,
                message: "card declined".to_string(),
            })
        }
    }

    fn cart_with(items: &[(&str, i64, &str, u32)]) -> Cart {
        let mut cart = Cart::new();
        for (id, price, shop, qty) in items {
            let product = Product {
                id: ProductId::new(*id),
                name: (*id).to_string(),
                price: Decimal::new(*price, 0),
                old_price: None,
                shop_id: ShopId::new(*shop),
                rating: 0.0,
                reviews: 0,
                description: String::new(),
                image: String::new(),
            };
            cart.add_item(&product, *qty).unwrap();
        }
        cart
    }

    fn simulated() -> CheckoutOrchestrator {
        CheckoutOrchestrator::new(
            Arc::new(SimulatedGateway::new(Duration::from_millis(1500))),
            DEFAULT_DELIVERY_FEE,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_then_success_after_delay() {
        let mut orchestrator = simulated();
        let cart = cart_with(&[
            ("prod1", 90, "shoa", 1),
            ("prod3", 450, "shoa", 1),
            ("prod7", 10, "shoa", 1),
        ]);

        assert!(orchestrator.begin_checkout(&cart));
        assert_eq!(orchestrator.status(), PaymentStatus::Pending);

        let state = orchestrator.settled().await;
        assert_eq!(state.status, PaymentStatus::Success);
        assert_eq!(state.receipts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_cart_is_noop() {
        let mut orchestrator = simulated();
        assert!(!orchestrator.begin_checkout(&Cart::new()));
        assert_eq!(orchestrator.status(), PaymentStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_begin_while_pending_is_ignored() {
        let mut orchestrator = simulated();
        let cart = cart_with(&[("prod1", 90, "shoa", 1)]);

        assert!(orchestrator.begin_checkout(&cart));
        assert!(!orchestrator.begin_checkout(&cart));
        assert_eq!(orchestrator.state().attempt, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_surfaces_failed_status() {
        let mut orchestrator =
            CheckoutOrchestrator::new(Arc::new(RejectingGateway), DEFAULT_DELIVERY_FEE);
        let cart = cart_with(&[("prod1", 90, "shoa", 1)]);

        orchestrator.begin_checkout(&cart);
        let state = orchestrator.settled().await;

        assert_eq!(state.status, PaymentStatus::Failed);
        assert!(state.error.unwrap().contains("card declined"));
        assert_eq!(orchestrator.dismiss(), Dismissal::Acknowledged);
        assert_eq!(orchestrator.status(), PaymentStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_success_returns_home() {
        let mut orchestrator = simulated();
        orchestrator.begin_checkout(&cart_with(&[("prod1", 90, "shoa", 2)]));
        orchestrator.settled().await;

        assert_eq!(orchestrator.dismiss(), Dismissal::ReturnHome);
        assert_eq!(orchestrator.status(), PaymentStatus::Idle);
        assert_eq!(orchestrator.dismiss(), Dismissal::Ignored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_pending_discards_late_verdict() {
        let mut orchestrator = simulated();
        orchestrator.begin_checkout(&cart_with(&[("prod1", 90, "shoa", 1)]));

        assert_eq!(orchestrator.dismiss(), Dismissal::Cancelled);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(orchestrator.status(), PaymentStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_checkout_collects_receipt_per_shop() {
        let mut orchestrator = simulated();
        orchestrator.begin_checkout(&cart_with(&[
            ("prod2", 40, "tomoca", 1),
            ("prod1", 90, "shoa", 1),
        ]));

        let state = orchestrator.settled().await;
        assert_eq!(state.status, PaymentStatus::Success);
        assert_eq!(state.receipts.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_checkout_failure_keeps_paid_shops() {
        let gateway = Arc::new(FlakyGateway::new("gebeya"));
        let mut orchestrator = CheckoutOrchestrator::new(
            Arc::clone(&gateway) as Arc<dyn CheckoutGateway>,
            DEFAULT_DELIVERY_FEE,
        );
        let cart = cart_with(&[("prod1", 90, "shoa", 1), ("prod4", 2350, "gebeya", 1)]);

        orchestrator.begin_checkout(&cart);
        let failed = orchestrator.settled().await;
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert_eq!(failed.receipts.len(), 1);
        assert_eq!(failed.receipts[0].request.store_id.as_str(), "shoa");
        assert!(failed.error.unwrap().contains("gebeya"));

        assert_eq!(orchestrator.dismiss(), Dismissal::Acknowledged);
        assert!(orchestrator.begin_checkout(&cart));
        let retried = orchestrator.settled().await;

        assert_eq!(retried.status, PaymentStatus::Success);
        assert_eq!(retried.receipts.len(), 2);
        assert_eq!(gateway.calls(), ["shoa", "gebeya", "gebeya"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_cart_is_submitted_again() {
        let gateway = Arc::new(FlakyGateway::new("gebeya"));
        let mut orchestrator = CheckoutOrchestrator::new(
            Arc::clone(&gateway) as Arc<dyn CheckoutGateway>,
            DEFAULT_DELIVERY_FEE,
        );

        orchestrator.begin_checkout(&cart_with(&[
            ("prod1", 90, "shoa", 1),
            ("prod4", 2350, "gebeya", 1),
        ]));
        orchestrator.settled().await;
        orchestrator.dismiss();

        orchestrator.begin_checkout(&cart_with(&[
            ("prod1", 90, "shoa", 2),
            ("prod4", 2350, "gebeya", 1),
        ]));
        let state = orchestrator.settled().await;

        assert_eq!(state.status, PaymentStatus::Success);
        assert_eq!(gateway.calls(), ["shoa", "gebeya", "shoa", "gebeya"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_orchestrator_cancels_pending_checkout() {
        let mut orchestrator = simulated();
        orchestrator.begin_checkout(&cart_with(&[("prod1", 90, "shoa", 1)]));
        let payment = orchestrator.subscribe();

        drop(orchestrator);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(payment.borrow().status, PaymentStatus::Pending);
        assert!(payment.has_changed().is_err());
    }
}
