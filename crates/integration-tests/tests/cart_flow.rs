//! Cart mutations against the mock store.

#![allow(clippy::unwrap_used)]

use cartsync_client::Storefront;
use cartsync_client::services::CartError;
use cartsync_core::{Money, ProductId, Quantity};
use cartsync_integration_tests::MockStore;
use secrecy::SecretString;
use tempfile::TempDir;

const ANA: &str = "ana@example.com";

async fn logged_in(store: &MockStore) -> (Storefront, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let storefront = store.storefront(dir.path());
    storefront
        .login(ANA, &SecretString::from("secreto".to_string()))
        .await
        .unwrap();
    store.clear_requests();
    (storefront, dir)
}

fn qty(n: i64) -> Quantity {
    Quantity::new(n).unwrap()
}

#[tokio::test]
async fn test_add_line_reflects_server_and_totals() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;

    storefront
        .cart()
        .add_line(ProductId::new(1), qty(2))
        .await
        .unwrap();

    assert_eq!(store.cart_of(ANA), vec![(1, 2)]);
    let snapshot = storefront.cart().snapshot();
    let line = snapshot.cart.line(ProductId::new(1)).unwrap();
    assert_eq!(line.display_name, "Mochila");
    assert_eq!(line.unit_price, Money::from_units(100));
    assert_eq!(line.image_ref.as_deref(), Some("/static/productos/1.jpg"));
    assert_eq!(snapshot.totals.subtotal, Money::from_units(200));
    assert_eq!(snapshot.totals.tax_estimate, Money::from_units(42));
    assert_eq!(snapshot.totals.shipping_estimate, Money::from_units(50));
    assert_eq!(snapshot.totals.total, Money::from_units(292));
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn test_fractional_prices_survive_float_wire_format() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;

    storefront
        .cart()
        .add_line(ProductId::new(2), qty(3))
        .await
        .unwrap();

    let totals = storefront.cart().totals();
    assert_eq!(totals.subtotal, Money::from_cents(4650));
    // 46.50 * 0.21 = 9.765 -> 9.77
    assert_eq!(totals.tax_estimate, Money::from_cents(977));
}

#[tokio::test]
async fn test_adding_again_accumulates() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;

    storefront.cart().add_line(ProductId::new(2), qty(1)).await.unwrap();
    storefront.cart().add_line(ProductId::new(2), qty(2)).await.unwrap();

    assert_eq!(store.cart_of(ANA), vec![(2, 3)]);
    assert_eq!(storefront.cart().cart().item_count(), 3);
}

#[tokio::test]
async fn test_insufficient_stock_leaves_cart_untouched() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;
    storefront.cart().add_line(ProductId::new(1), qty(4)).await.unwrap();

    let err = storefront
        .cart()
        .add_line(ProductId::new(1), qty(2))
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::InsufficientStock(ref m) if m.contains("stock")));
    assert_eq!(store.cart_of(ANA), vec![(1, 4)]);
    assert_eq!(
        storefront.cart().cart().line(ProductId::new(1)).unwrap().quantity,
        qty(4)
    );
}

#[tokio::test]
async fn test_unknown_product_is_product_not_found() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;

    let err = storefront
        .cart()
        .add_line(ProductId::new(99), qty(1))
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::ProductNotFound(id) if id == ProductId::new(99)));
    assert!(store.cart_of(ANA).is_empty());
}

#[tokio::test]
async fn test_change_quantity_up_posts_only_the_delta() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;
    storefront.cart().add_line(ProductId::new(2), qty(1)).await.unwrap();
    store.clear_requests();

    storefront
        .cart()
        .change_quantity(ProductId::new(2), 4)
        .await
        .unwrap();

    assert_eq!(store.cart_of(ANA), vec![(2, 4)]);
    assert!(store.requests().contains(&"POST /carrito 2 x3".to_string()));
}

#[tokio::test]
async fn test_change_quantity_down_replaces_line() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;
    storefront.cart().add_line(ProductId::new(2), qty(5)).await.unwrap();
    store.clear_requests();

    storefront
        .cart()
        .change_quantity(ProductId::new(2), 2)
        .await
        .unwrap();

    assert_eq!(store.cart_of(ANA), vec![(2, 2)]);
    let requests = store.requests();
    assert!(requests.contains(&"DELETE /carrito/2".to_string()));
    assert!(requests.contains(&"POST /carrito 2 x2".to_string()));
    assert_eq!(
        storefront.cart().cart().line(ProductId::new(2)).unwrap().quantity,
        qty(2)
    );
}

#[tokio::test]
async fn test_change_quantity_to_same_value_sends_no_mutation() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;
    storefront.cart().add_line(ProductId::new(1), qty(2)).await.unwrap();
    store.clear_requests();

    storefront
        .cart()
        .change_quantity(ProductId::new(1), 2)
        .await
        .unwrap();

    assert!(store
        .requests()
        .iter()
        .all(|r| r == "GET /carrito"));
}

#[tokio::test]
async fn test_change_quantity_to_zero_removes() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;
    storefront.cart().add_line(ProductId::new(1), qty(1)).await.unwrap();
    storefront.cart().add_line(ProductId::new(2), qty(1)).await.unwrap();

    storefront
        .cart()
        .change_quantity(ProductId::new(1), 0)
        .await
        .unwrap();

    assert_eq!(store.cart_of(ANA), vec![(2, 1)]);
    assert!(storefront.cart().cart().line(ProductId::new(1)).is_none());
}

#[tokio::test]
async fn test_removing_missing_line_is_already_satisfied() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;

    let err = storefront
        .cart()
        .remove_line(ProductId::new(1))
        .await
        .unwrap_err();

    assert!(err.is_already_satisfied());
    assert!(storefront.cart().cart().is_empty());
}

#[tokio::test]
async fn test_clear_empties_server_and_snapshot() {
    let store = MockStore::seeded().await;
    let (storefront, _dir) = logged_in(&store).await;
    storefront.cart().add_line(ProductId::new(1), qty(1)).await.unwrap();
    storefront.cart().add_line(ProductId::new(2), qty(2)).await.unwrap();

    storefront.cart().clear().await.unwrap();

    assert!(store.cart_of(ANA).is_empty());
    assert!(storefront.cart().cart().is_empty());
    assert!(storefront.cart().totals().total.is_zero());
}

#[tokio::test]
async fn test_cart_requires_login() {
    let store = MockStore::seeded().await;
    let dir = tempfile::tempdir().unwrap();
    let storefront = store.storefront(dir.path());

    let err = storefront
        .cart()
        .add_line(ProductId::new(1), qty(1))
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::NotAuthenticated));
    assert!(store.requests().is_empty());
}

#[tokio::test]
async fn test_cart_is_per_account() {
    let store = MockStore::seeded().await;
    store.add_account("Bruno", "bruno@example.com", "clave123");
    let (ana, _dir) = logged_in(&store).await;
    ana.cart().add_line(ProductId::new(1), qty(1)).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let bruno = store.storefront(dir.path());
    bruno
        .login("bruno@example.com", &SecretString::from("clave123".to_string()))
        .await
        .unwrap();

    assert!(bruno.cart().cart().is_empty());
    assert_eq!(store.cart_of(ANA), vec![(1, 1)]);
}
