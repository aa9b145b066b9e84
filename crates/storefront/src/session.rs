//! A shopper's session: the single owner of cart, navigation, payment and
//! scan state.
//!
//! The presentation layer talks only to [`Session`]. Catalog failures never
//! surface as errors here; they degrade to empty results and leave a
//! [`Notice`] the shopper can dismiss.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use suq_core::{Category, CategoryId, PaymentStatus, Product, ProductId, Shop, ShopId};
use tracing::{info, warn};

use crate::cart::{Cart, CartError, CartTotals, QuantityChange, TotalsView, badge_label};
use crate::catalog::{CatalogError, CatalogService};
use crate::checkout::{CheckoutGateway, CheckoutOrchestrator, Dismissal, PaymentState};
use crate::config::SessionConfig;
use crate::error::add_breadcrumb;
use crate::navigation::{NavEntry, Navigator, Page, RouteParams, resolve_deep_link};
use crate::scan::{ScanAdapter, ScanCapability, ScanState};

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Catalog,
    Checkout,
    Scan,
    Navigation,
}

/// A dismissible message shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Everything one shopper is doing right now.
pub struct Session {
    catalog: Arc<dyn CatalogService>,
    config: SessionConfig,
    cart: Cart,
    navigator: Navigator,
    checkout: CheckoutOrchestrator,
    scan: ScanAdapter,
    notices: Vec<Notice>,
    next_notice_id: u64,
}

impl Session {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        gateway: Arc<dyn CheckoutGateway>,
        config: SessionConfig,
    ) -> Self {
        let checkout = CheckoutOrchestrator::new(gateway, config.delivery_fee);
        let scan = ScanAdapter::new(config.scan_timeout, config.scan_fallback_product.clone());
        Self {
            catalog,
            config,
            cart: Cart::new(),
            navigator: Navigator::new(),
            checkout,
            scan,
            notices: Vec::new(),
            next_notice_id: 1,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub const fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    #[must_use]
    pub const fn checkout(&self) -> &CheckoutOrchestrator {
        &self.checkout
    }

    #[must_use]
    pub const fn scan(&self) -> &ScanAdapter {
        &self.scan
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    pub async fn categories(&mut self) -> Vec<Category> {
        let result = self.catalog.categories().await;
        self.or_notice("categories", result)
    }

    pub async fn shops(&mut self, category: Option<&CategoryId>) -> Vec<Shop> {
        let result = self.catalog.shops(category).await;
        self.or_notice("shops", result)
    }

    pub async fn featured_shops(&mut self) -> Vec<Shop> {
        let result = self.catalog.featured_shops().await;
        self.or_notice("featured shops", result)
    }

    pub async fn products(&mut self, shop: &ShopId) -> Vec<Product> {
        let result = self.catalog.products(shop).await;
        self.or_notice("products", result)
    }

    /// Fetch one product, or `None` (with a notice) if it cannot be loaded.
    pub async fn product(&mut self, id: &ProductId) -> Option<Product> {
        let result = self.catalog.product(id).await.map(Some);
        self.or_notice("product", result)
    }

    fn or_notice<T: Default>(&mut self, what: &str, result: Result<T, CatalogError>) -> T {
        result.unwrap_or_else(|e| {
            warn!(resource = what, error = %e, "Catalog request failed");
            self.raise(NoticeKind::Catalog, format!("Could not load {what}: {e}"));
            T::default()
        })
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Push a drill-down page.
    pub fn navigate_to(&mut self, page: Page, params: RouteParams) {
        self.navigator.navigate_to(page, params);
    }

    /// Pop the current page. Returns `false` at the root.
    pub fn go_back(&mut self) -> bool {
        self.navigator.go_back()
    }

    /// Switch to a bottom-bar destination.
    pub fn navigate_tab(&mut self, page: Page) {
        self.navigator.navigate_tab(page);
    }

    /// Replace the navigation state from an external link.
    ///
    /// Links that do not resolve fall back to the home page.
    pub fn open_deep_link(&mut self, link: &str) -> &NavEntry {
        match resolve_deep_link(link) {
            Ok(navigator) => {
                info!(link, path = %navigator.current_path(), "Opened deep link");
                self.navigator = navigator;
            }
            Err(e) => {
                warn!(link, error = %e, "Deep link did not resolve, showing home");
                self.navigator = Navigator::new();
                self.raise(NoticeKind::Navigation, format!("Link not found: {link}"));
            }
        }
        self.navigator.current()
    }

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    /// Add a product and jump to the cart tab.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a zero quantity; the cart
    /// and navigation are left unchanged.
    pub fn add_to_cart(&mut self, product: &Product, quantity: u32) -> Result<(), CartError> {
        self.cart.add_item(product, quantity)?;
        add_breadcrumb(
            "cart",
            "Added to cart",
            Some(&[
                ("product_id", product.id.as_str()),
                ("shop_id", product.shop_id.as_str()),
            ]),
        );
        info!(
            product_id = %product.id,
            quantity,
            items = self.cart.item_count(),
            "Added to cart"
        );
        self.navigator.navigate_tab(Page::Cart);
        Ok(())
    }

    pub fn change_quantity(&mut self, product_id: &ProductId, delta: i64) -> QuantityChange {
        self.cart.change_quantity(product_id, delta)
    }

    #[must_use]
    pub fn totals(&self) -> CartTotals {
        self.cart.totals(self.config.delivery_fee)
    }

    /// Totals formatted in the session currency.
    #[must_use]
    pub fn totals_view(&self) -> TotalsView {
        self.totals().display(self.config.currency)
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.cart.item_count()
    }

    /// Label for the cart badge in the bottom bar.
    #[must_use]
    pub fn cart_badge(&self) -> Option<String> {
        badge_label(self.item_count())
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn payment_status(&self) -> PaymentStatus {
        self.checkout.status()
    }

    /// Start paying for the current cart. Returns `false` if nothing started.
    pub fn begin_checkout(&mut self) -> bool {
        let total = self
            .checkout
            .plan(&self.cart)
            .map(|plan| plan.total().to_string());
        let started = self.checkout.begin_checkout(&self.cart);
        if let (true, Some(total)) = (started, total) {
            add_breadcrumb(
                "checkout",
                "Checkout started",
                Some(&[("total", total.as_str())]),
            );
        }
        started
    }

    /// Wait for the payment verdict. A failure also leaves a notice.
    pub async fn settle_checkout(&mut self) -> PaymentState {
        let state = self.checkout.settled().await;
        if state.status == PaymentStatus::Failed {
            let reason = state.error.as_deref().unwrap_or("unknown error");
            self.raise(NoticeKind::Checkout, format!("Payment failed: {reason}"));
        }
        state
    }

    /// Close the payment overlay.
    ///
    /// After a confirmed payment this returns to the home tab and, when
    /// configured, empties the cart.
    pub fn dismiss_payment(&mut self) -> Dismissal {
        let dismissal = self.checkout.dismiss();
        if dismissal == Dismissal::ReturnHome {
            if self.config.clear_cart_on_success {
                self.cart.clear();
            }
            self.navigator.navigate_tab(Page::Home);
        }
        dismissal
    }

    // -------------------------------------------------------------------------
    // Scanning
    // -------------------------------------------------------------------------

    /// Start a scan, superseding any scan in progress.
    pub fn start_scan(&mut self, capability: Arc<dyn ScanCapability>) -> u64 {
        self.scan.start(capability)
    }

    pub fn cancel_scan(&mut self) {
        self.scan.cancel();
    }

    /// Wait for the current scan and act on it.
    ///
    /// A detection opens the product page. A failure leaves a notice and
    /// resets the scanner. A timeout is left in place so the shopper can
    /// continue manually.
    pub async fn settle_scan(&mut self) -> ScanState {
        let state = self.scan.settled().await;
        match &state {
            ScanState::Detected(_) => {
                if let Some(product_id) = self.scan.take_detection() {
                    self.open_product(product_id);
                }
            }
            ScanState::Failed(e) => {
                self.raise(NoticeKind::Scan, e.to_string());
                self.scan.acknowledge();
            }
            ScanState::Idle | ScanState::Scanning { .. } | ScanState::TimedOut => {}
        }
        state
    }

    /// After a timeout, open the fallback product.
    pub fn continue_scan_manually(&mut self) -> Option<ProductId> {
        self.scan.continue_manually()?;
        let product_id = self.scan.take_detection()?;
        self.open_product(product_id.clone());
        Some(product_id)
    }

    fn open_product(&mut self, product_id: ProductId) {
        info!(%product_id, "Opening scanned product");
        self.navigator
            .navigate_to(Page::ProductDetail, RouteParams::product(product_id));
    }

    // -------------------------------------------------------------------------
    // Notices
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Remove a notice. Returns `false` if it was already gone.
    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != id);
        self.notices.len() != before
    }

    fn raise(&mut self, kind: NoticeKind, message: String) {
        let id = self.next_notice_id;
        self.next_notice_id += 1;
        self.notices.push(Notice {
            id,
            kind,
            message,
            raised_at: Utc::now(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use suq_core::ScanSource;

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::checkout::SimulatedGateway;
    use crate::scan::{ChannelScanner, UnsupportedScanner};

    /// Catalog whose backend is unreachable.
    struct OfflineCatalog;

    #[async_trait]
    impl CatalogService for OfflineCatalog {
        async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
            Err(offline())
        }

        async fn shops(&self, _category: Option<&CategoryId>) -> Result<Vec<Shop>, CatalogError> {
            Err(offline())
        }

        async fn featured_shops(&self) -> Result<Vec<Shop>, CatalogError> {
            Err(offline())
        }

        async fn products(&self, _shop: &ShopId) -> Result<Vec<Product>, CatalogError> {
            Err(offline())
        }

        async fn product(&self, _id: &ProductId) -> Result<Product, CatalogError> {
            Err(offline())
        }
    }

    fn offline() -> CatalogError {
        CatalogError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    fn session_with(config: SessionConfig) -> Session {
        Session::new(
            Arc::new(StaticCatalog::from_fixture().unwrap()),
            Arc::new(SimulatedGateway::new(Duration::from_millis(1500))),
            config,
        )
    }

    fn session() -> Session {
        session_with(SessionConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_cart_is_charged_the_displayed_total() {
        let mut session = session();
        let avocado = session.product(&ProductId::new("prod1")).await.unwrap();
        let headphones = session.product(&ProductId::new("prod4")).await.unwrap();
        session.add_to_cart(&avocado, 1).unwrap();
        session.add_to_cart(&headphones, 1).unwrap();

        let displayed = session.totals().total;
        let plan = session.checkout().plan(session.cart()).unwrap();
        assert!(plan.is_split());
        assert_eq!(plan.total(), displayed);

        session.begin_checkout();
        let state = session.settle_checkout().await;
        let charged: Decimal = state
            .receipts
            .iter()
            .map(|shop| shop.request.total_amount)
            .sum();
        assert_eq!(charged, displayed);
    }

    #[tokio::test]
    async fn test_add_to_cart_jumps_to_cart_tab() {
        let mut session = session();
        session.navigate_to(Page::ShopList, RouteParams::default());
        let product = session.product(&ProductId::new("prod1")).await.unwrap();

        session.add_to_cart(&product, 2).unwrap();

        assert_eq!(session.navigator().current().page, Page::Cart);
        assert_eq!(session.navigator().depth(), 1);
        assert_eq!(session.item_count(), 2);
        assert_eq!(session.cart_badge().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_zero_quantity_changes_nothing() {
        let mut session = session();
        let product = session.product(&ProductId::new("prod1")).await.unwrap();

        assert!(session.add_to_cart(&product, 0).is_err());
        assert!(session.cart().is_empty());
        assert_eq!(session.navigator().current().page, Page::Home);
    }

    #[tokio::test]
    async fn test_totals_in_session_currency() {
        let mut session = session();
        let avocado = session.product(&ProductId::new("prod1")).await.unwrap();
        let honey = session.product(&ProductId::new("prod3")).await.unwrap();
        session.add_to_cart(&avocado, 2).unwrap();
        session.add_to_cart(&honey, 1).unwrap();

        let view = session.totals_view();
        assert_eq!(view.subtotal, "ETB 629.00");
        assert_eq!(view.delivery_fee, "ETB 50.00");
        assert_eq!(view.total, "ETB 679.00");
    }

    #[tokio::test]
    async fn test_catalog_failure_degrades_with_notice() {
        let mut session = Session::new(
            Arc::new(OfflineCatalog),
            Arc::new(SimulatedGateway::default()),
            SessionConfig::default(),
        );

        assert!(session.categories().await.is_empty());
        assert!(session.featured_shops().await.is_empty());
        assert!(session.product(&ProductId::new("prod1")).await.is_none());

        assert_eq!(session.notices().len(), 3);
        assert_eq!(session.notices()[0].kind, NoticeKind::Catalog);
        assert!(session.notices()[0].message.contains("categories"));

        let id = session.notices()[0].id;
        assert!(session.dismiss_notice(id));
        assert!(!session.dismiss_notice(id));
        assert_eq!(session.notices().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkout_success_returns_home_and_keeps_cart() {
        let mut session = session();
        let product = session.product(&ProductId::new("prod2")).await.unwrap();
        session.add_to_cart(&product, 1).unwrap();

        assert!(session.begin_checkout());
        assert_eq!(session.payment_status(), PaymentStatus::Pending);
        assert_eq!(session.settle_checkout().await.status, PaymentStatus::Success);

        assert_eq!(session.dismiss_payment(), Dismissal::ReturnHome);
        assert_eq!(session.navigator().current().page, Page::Home);
        assert_eq!(session.item_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkout_success_can_clear_cart() {
        let mut session = session_with(SessionConfig {
            clear_cart_on_success: true,
            ..SessionConfig::default()
        });
        let product = session.product(&ProductId::new("prod2")).await.unwrap();
        session.add_to_cart(&product, 1).unwrap();

        session.begin_checkout();
        session.settle_checkout().await;
        session.dismiss_payment();

        assert!(session.cart().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_cart_checkout_is_noop() {
        let mut session = session();
        assert!(!session.begin_checkout());
        assert_eq!(session.payment_status(), PaymentStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_detection_opens_product() {
        let mut session = session();
        let (scanner, feed) = ChannelScanner::new(ScanSource::Tag);

        session.start_scan(Arc::new(scanner));
        feed.detect("product:prod5").await;

        assert_eq!(
            session.settle_scan().await,
            ScanState::Detected(ProductId::new("prod5"))
        );
        let current = session.navigator().current();
        assert_eq!(current.page, Page::ProductDetail);
        assert_eq!(current.params.product_id, Some(ProductId::new("prod5")));
        assert_eq!(session.scan().state(), ScanState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_timeout_then_manual_continue() {
        let mut session = session();
        let (scanner, _feed) = ChannelScanner::new(ScanSource::Camera);

        session.start_scan(Arc::new(scanner));
        assert_eq!(session.settle_scan().await, ScanState::TimedOut);
        assert_eq!(session.navigator().current().page, Page::Home);

        assert_eq!(
            session.continue_scan_manually(),
            Some(ProductId::new("prod4"))
        );
        assert_eq!(session.navigator().current_path(), "/product/prod4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_failure_leaves_notice() {
        let mut session = session();
        session.start_scan(Arc::new(UnsupportedScanner::new(ScanSource::Tag)));

        assert!(matches!(session.settle_scan().await, ScanState::Failed(_)));
        assert_eq!(session.notices()[0].kind, NoticeKind::Scan);
        assert_eq!(session.scan().state(), ScanState::Idle);
        assert_eq!(session.continue_scan_manually(), None);
    }

    #[test]
    fn test_deep_link_resolution() {
        let mut session = session();

        let entry = session.open_deep_link("https://suq.et/product/prod1");
        assert_eq!(entry.page, Page::ProductDetail);
        assert!(session.go_back());
        assert_eq!(session.navigator().current().page, Page::Home);
    }

    #[test]
    fn test_unknown_deep_link_falls_back_home() {
        let mut session = session();
        session.navigate_tab(Page::Settings);

        let entry = session.open_deep_link("/no/such/page");
        assert_eq!(entry.page, Page::Home);
        assert_eq!(session.notices()[0].kind, NoticeKind::Navigation);
    }
}
