mod common;

use chrono::Utc;
use common::{Harness, COLA, MILK, RAMYUN};
use futures::StreamExt;
use smart_cart_core::domain::{CartItem, Product};
use smart_cart_core::ports::{CartStore, CatalogGateway};
use smart_cart_core::services::MAX_QUANTITY;
use smart_cart_core::CartError;
use std::time::Duration;

#[tokio::test]
async fn detections_are_priced_from_the_catalog() {
    let h = Harness::new().await;
    h.state.inventory.record_detection("1", RAMYUN, 2).await.unwrap();
    h.state.inventory.record_detection("1", COLA, 1).await.unwrap();

    let view = h.state.inventory.view("1").await.unwrap();

    assert_eq!(view.lines.len(), 2);
    assert_eq!(view.total, 2 * 3500 + 1500);
    assert!(view.lines.iter().all(|line| line.in_stock));
}

#[tokio::test]
async fn set_quantity_is_reflected_in_the_view_total() {
    let h = Harness::new().await;
    h.state.inventory.record_detection("1", MILK, 1).await.unwrap();

    let quantity = h.state.inventory.set_quantity("1", MILK, 4).await.unwrap();

    assert_eq!(quantity, 4);
    let view = h.state.inventory.view("1").await.unwrap();
    assert_eq!(view.lines[0].quantity, 4);
    assert_eq!(view.total, 4 * 2500);
}

#[tokio::test]
async fn quantity_is_clamped_to_one() {
    let h = Harness::new().await;
    h.state.inventory.record_detection("1", MILK, 3).await.unwrap();

    assert_eq!(h.state.inventory.set_quantity("1", MILK, 0).await.unwrap(), 1);
    assert_eq!(h.state.inventory.set_quantity("1", MILK, -7).await.unwrap(), 1);
    assert_eq!(h.state.inventory.view("1").await.unwrap().total, 2500);
}

#[tokio::test]
async fn set_quantity_on_a_missing_item_is_not_found() {
    let h = Harness::new().await;
    let err = h.state.inventory.set_quantity("1", MILK, 2).await.unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));
}

#[tokio::test]
async fn removing_a_missing_item_is_a_no_op() {
    let h = Harness::new().await;
    h.state.inventory.record_detection("1", COLA, 1).await.unwrap();

    h.state.inventory.remove_item("1", MILK).await.unwrap();
    h.state.inventory.remove_item("1", COLA).await.unwrap();

    assert_eq!(h.state.inventory.view("1").await.unwrap().total, 0);
}

#[tokio::test]
async fn out_of_stock_products_are_not_detected() {
    let h = Harness::new().await;
    h.store
        .set_product(Product {
            barcode: "880000".to_string(),
            name: "Sold out".to_string(),
            price: 1000,
            stock: 0,
        })
        .await
        .unwrap();

    let err = h
        .state
        .inventory
        .record_detection("1", "880000", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Validation(_)));

    let err = h
        .state
        .inventory
        .record_detection("1", "does-not-exist", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));
}

#[tokio::test]
async fn items_missing_from_the_catalog_show_as_out_of_stock() {
    let h = Harness::new().await;
    h.store
        .put_item(
            "1",
            CartItem {
                barcode: "retired".to_string(),
                name: "Discontinued snack".to_string(),
                price: 900,
                quantity: 2,
                detected_at: Utc::now(),
            },
        )
        .await
        .unwrap();

    let view = h.state.inventory.view("1").await.unwrap();

    assert_eq!(view.lines[0].name, "Discontinued snack");
    assert!(!view.lines[0].in_stock);
    assert_eq!(view.total, 1800);
}

#[tokio::test]
async fn the_live_view_follows_item_changes() {
    let h = Harness::new().await;
    let mut views = h.state.inventory.watch_cart("2").await.unwrap();

    let initial = views.next().await.unwrap().unwrap();
    assert_eq!(initial.total, 0);

    h.state.inventory.record_detection("2", COLA, 3).await.unwrap();

    let updated = tokio::time::timeout(Duration::from_secs(1), views.next())
        .await
        .expect("no view update")
        .unwrap()
        .unwrap();
    assert_eq!(updated.cart_id, "2");
    assert_eq!(updated.total, 4500);
}

#[tokio::test]
async fn product_lookup_passes_through_the_catalog() {
    let h = Harness::new().await;
    let product = h.state.inventory.product(RAMYUN).await.unwrap();
    assert_eq!(product.price, 3500);
    assert!(product.in_stock());

    let err = h.state.inventory.product("nope").await.unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));
}

#[tokio::test]
async fn huge_quantities_are_capped_and_totals_saturate() {
    let h = Harness::new().await;
    h.store
        .set_product(Product {
            barcode: "880999".to_string(),
            name: "Gold bar".to_string(),
            price: 100_000_000_000,
            stock: 1,
        })
        .await
        .unwrap();
    h.state.inventory.record_detection("1", "880999", 1).await.unwrap();

    let quantity = h
        .state
        .inventory
        .set_quantity("1", "880999", i64::from(u32::MAX))
        .await
        .unwrap();

    assert_eq!(quantity, MAX_QUANTITY);
    let view = h.state.inventory.view("1").await.unwrap();
    assert_eq!(view.lines[0].quantity, MAX_QUANTITY);
    assert_eq!(view.total, u64::MAX);
}
