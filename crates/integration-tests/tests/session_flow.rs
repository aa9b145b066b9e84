//! Integration tests for a full shopping session against the embedded catalog.
//!
//! Timers run on tokio's paused clock, so the checkout delay and scan
//! timeout resolve instantly.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use suq_core::{CategoryId, PaymentStatus, ProductId, ScanSource, ShopId};
use suq_storefront::Session;
use suq_storefront::cart::QuantityChange;
use suq_storefront::catalog::StaticCatalog;
use suq_storefront::checkout::{Dismissal, SimulatedGateway};
use suq_storefront::config::SessionConfig;
use suq_storefront::navigation::{Page, RouteParams};
use suq_storefront::scan::{ChannelScanner, ScanState};

fn session() -> Session {
    Session::new(
        Arc::new(StaticCatalog::from_fixture().unwrap()),
        Arc::new(SimulatedGateway::new(Duration::from_millis(1500))),
        SessionConfig::default(),
    )
}

// ============================================================================
// Browse and buy
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_browse_add_and_pay() {
    let mut session = session();

    // Home -> Categories -> Cafe -> Tomoca -> Espresso
    assert_eq!(session.featured_shops().await.len(), 2);
    session.navigate_tab(Page::Categories);
    let categories = session.categories().await;
    assert!(categories.iter().any(|c| c.id.as_str() == "cafe"));

    let cafe = CategoryId::new("cafe");
    session.navigate_to(Page::ShopList, RouteParams::category(cafe.clone()));
    let shops = session.shops(Some(&cafe)).await;
    assert_eq!(shops.len(), 1);

    let tomoca = shops[0].id.clone();
    session.navigate_to(Page::Shop, RouteParams::shop(tomoca.clone()));
    assert!(!session.navigator().shows_tab_bar());
    let products = session.products(&tomoca).await;
    let espresso = products
        .iter()
        .find(|p| p.id.as_str() == "prod2")
        .unwrap()
        .clone();

    session.navigate_to(Page::ProductDetail, RouteParams::product(espresso.id.clone()));
    assert_eq!(session.navigator().depth(), 4);
    assert!(session.go_back());
    assert_eq!(session.navigator().current().page, Page::Shop);

    session.add_to_cart(&espresso, 3).unwrap();
    assert_eq!(session.navigator().active_tab(), Some(Page::Cart));

    let totals = session.totals();
    assert_eq!(totals.subtotal, Decimal::new(12000, 2));
    assert_eq!(totals.total, Decimal::new(17000, 2));

    assert!(session.begin_checkout());
    assert!(session.payment_status().is_blocking());
    assert!(!session.begin_checkout());

    let state = session.settle_checkout().await;
    assert_eq!(state.status, PaymentStatus::Success);
    assert_eq!(state.receipts.len(), 1);

    assert_eq!(session.dismiss_payment(), Dismissal::ReturnHome);
    assert_eq!(session.navigator().current().page, Page::Home);
    assert_eq!(session.payment_status(), PaymentStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_cart_quantity_edits() {
    let mut session = session();
    let avocado = session.product(&ProductId::new("prod1")).await.unwrap();
    let honey = session.product(&ProductId::new("prod3")).await.unwrap();

    session.add_to_cart(&avocado, 1).unwrap();
    session.add_to_cart(&avocado, 1).unwrap();
    session.add_to_cart(&honey, 1).unwrap();
    assert_eq!(session.cart().len(), 2);
    assert_eq!(session.item_count(), 3);

    assert_eq!(
        session.change_quantity(&avocado.id, -1),
        QuantityChange::Updated { quantity: 1 }
    );
    assert_eq!(
        session.change_quantity(&honey.id, -1),
        QuantityChange::Removed
    );
    assert_eq!(
        session.change_quantity(&ProductId::new("prod9"), 1),
        QuantityChange::Missing
    );

    assert_eq!(session.totals_view().total, "ETB 139.50");
}

#[tokio::test(start_paused = true)]
async fn test_multi_shop_cart_checks_out_per_shop() {
    let mut session = session();
    let avocado = session.product(&ProductId::new("prod1")).await.unwrap();
    let headphones = session.product(&ProductId::new("prod4")).await.unwrap();
    session.add_to_cart(&avocado, 1).unwrap();
    session.add_to_cart(&headphones, 1).unwrap();

    session.begin_checkout();
    let state = session.settle_checkout().await;

    assert_eq!(state.status, PaymentStatus::Success);
    assert_eq!(state.receipts.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelling_payment_keeps_cart() {
    let mut session = session();
    let espresso = session.product(&ProductId::new("prod2")).await.unwrap();
    session.add_to_cart(&espresso, 1).unwrap();

    session.begin_checkout();
    assert_eq!(session.dismiss_payment(), Dismissal::Cancelled);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(session.payment_status(), PaymentStatus::Idle);
    assert_eq!(session.item_count(), 1);
    assert_eq!(session.navigator().current().page, Page::Cart);
}

// ============================================================================
// Scanning
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_scan_then_add_scanned_product() {
    let mut session = session();
    let (scanner, feed) = ChannelScanner::new(ScanSource::Camera);

    session.start_scan(Arc::new(scanner));
    feed.detect("https://suq.et/product/prod6").await;
    session.settle_scan().await;

    let product_id = session
        .navigator()
        .current()
        .params
        .product_id
        .clone()
        .unwrap();
    let shirt = session.product(&product_id).await.unwrap();
    assert_eq!(shirt.shop_id, ShopId::new("apparel"));

    session.add_to_cart(&shirt, 1).unwrap();
    assert_eq!(session.cart_badge().as_deref(), Some("1"));
}

#[tokio::test(start_paused = true)]
async fn test_rescan_supersedes_and_times_out() {
    let mut session = session();
    let (first, first_feed) = ChannelScanner::new(ScanSource::Tag);
    let (second, _second_feed) = ChannelScanner::new(ScanSource::Tag);

    session.start_scan(Arc::new(first));
    session.start_scan(Arc::new(second));
    first_feed.detect("prod1").await;

    assert_eq!(session.settle_scan().await, ScanState::TimedOut);
    assert_eq!(
        session.continue_scan_manually(),
        Some(ProductId::new("prod4"))
    );
    assert_eq!(session.navigator().current_path(), "/product/prod4");
}

// ============================================================================
// Deep links
// ============================================================================

#[test]
fn test_deep_link_to_shop_list_has_categories_root() {
    let mut session = session();
    session.open_deep_link("/shops?category=groceries");

    let history: Vec<Page> = session.navigator().history().map(|e| e.page).collect();
    assert_eq!(history, [Page::Categories, Page::ShopList]);
    assert_eq!(session.navigator().current_path(), "/categories/groceries");
}
