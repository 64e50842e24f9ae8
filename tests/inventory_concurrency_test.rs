mod common;

use assert_matches::assert_matches;
use common::{seed_item, setup};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use stockroom_api::entities::item;
use stockroom_api::errors::ServiceError;
use stockroom_api::services::inventory::{CreateItemRequest, UpdateItemRequest};
use stockroom_api::services::orders::{CreateOrderRequest, OrderLineRequest};
use uuid::Uuid;

#[tokio::test]
async fn concurrent_orders_cannot_oversell() {
    let app = setup().await;
    let item = seed_item(&app, "Scarce", "SC-1", 5, 100, 2).await;

    // Both orders pass the pre-validation snapshot (5 in stock, 4 asked),
    // but the conditional decrement admits only one.
    let make_order = |app: stockroom_api::AppServices| async move {
        app.orders
            .create_order(CreateOrderRequest {
                user_id: Uuid::new_v4(),
                lines: vec![OrderLineRequest {
                    item_id: item.id,
                    quantity: 4,
                }],
            })
            .await
    };

    let (a, b) = tokio::join!(make_order(app.clone()), make_order(app.clone()));
    let outcomes = [a, b];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one order may claim the stock");
    let loss = outcomes.into_iter().find(|r| r.is_err()).unwrap();
    assert_matches!(
        loss.unwrap_err(),
        ServiceError::InsufficientStock { requested: 4, .. }
    );

    let after = app.inventory.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(after.quantity, 1);
}

#[tokio::test]
async fn restock_is_additive_and_validated() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 2, 100, 3).await;

    let err = app.inventory.restock(item.id, 0).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    let err = app.inventory.restock(item.id, -5).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let updated = app.inventory.restock(item.id, 10).await.unwrap();
    assert_eq!(updated.quantity, 12);

    let err = app.inventory.restock(Uuid::new_v4(), 1).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
    let app = setup().await;
    seed_item(&app, "Widget", "WID-1", 10, 100, 3).await;

    let err = app
        .inventory
        .create_item(CreateItemRequest {
            name: "Impostor".to_string(),
            sku: "WID-1".to_string(),
            quantity: 1,
            price_cents: 100,
            reorder_threshold: 1,
            owner_id: Uuid::new_v4(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::SkuConflict(_));
}

#[tokio::test]
async fn updating_to_a_taken_sku_is_a_conflict() {
    let app = setup().await;
    seed_item(&app, "Widget", "WID-1", 10, 100, 3).await;
    let other = seed_item(&app, "Gadget", "GAD-1", 10, 100, 3).await;

    let err = app
        .inventory
        .update_item(
            other.id,
            UpdateItemRequest {
                sku: Some("WID-1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::SkuConflict(_));

    // Re-asserting its own SKU is fine.
    let same = app
        .inventory
        .update_item(
            other.id,
            UpdateItemRequest {
                sku: Some("GAD-1".to_string()),
                name: Some("Gadget v2".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(same.name, "Gadget v2");
}

#[tokio::test]
async fn sku_lookup_is_served_from_cache() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 10, 100, 3).await;

    let first = app.inventory.get_item_by_sku("WID-1").await.unwrap().unwrap();
    assert_eq!(first.name, "Widget");

    // Mutate the row behind the service's back; the cached copy wins until
    // a service-level write purges it.
    let mut active: item::ActiveModel = item::Entity::find_by_id(item.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
        .into();
    active.name = Set("Renamed".to_string());
    active.update(&*app.db).await.unwrap();

    let cached = app.inventory.get_item_by_sku("WID-1").await.unwrap().unwrap();
    assert_eq!(cached.name, "Widget");

    app.inventory.restock(item.id, 1).await.unwrap();
    let fresh = app.inventory.get_item_by_sku("WID-1").await.unwrap().unwrap();
    assert_eq!(fresh.name, "Renamed");
}

#[tokio::test]
async fn delete_item_purges_lookup_and_reports_absence() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 10, 100, 3).await;

    // Warm the SKU cache, then delete.
    app.inventory.get_item_by_sku("WID-1").await.unwrap();
    assert!(app.inventory.delete_item(item.id).await.unwrap());
    assert!(app.inventory.get_item_by_sku("WID-1").await.unwrap().is_none());
    assert!(app.inventory.get_item(item.id).await.unwrap().is_none());

    // Second delete is a clean false.
    assert!(!app.inventory.delete_item(item.id).await.unwrap());
}

#[tokio::test]
async fn deleting_an_alerted_item_keeps_the_alert_for_audit() {
    let app = setup().await;
    let item = seed_item(&app, "Fading", "F-1", 2, 100, 5).await;

    let (alerts, total) = app
        .alerts
        .list_alerts(Default::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 1);

    assert!(app.inventory.delete_item(item.id).await.unwrap());
    let low = app.inventory.get_low_stock_items(5).await.unwrap();
    assert!(low.is_empty(), "deleted items leave the low-stock listing");

    // The orphaned alert survives for audit and still acknowledges.
    let (_, total_after) = app
        .alerts
        .list_alerts(Default::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(total_after, 1);
    assert!(app.alerts.acknowledge(alerts[0].id).await.unwrap());
}

#[tokio::test]
async fn low_stock_listing_orders_by_risk() {
    let app = setup().await;
    seed_item(&app, "Comfortable", "C-1", 50, 100, 3).await;
    seed_item(&app, "Tight", "T-1", 4, 100, 3).await;
    seed_item(&app, "Empty", "E-1", 0, 100, 3).await;

    let low = app.inventory.get_low_stock_items(5).await.unwrap();
    let names: Vec<&str> = low.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["Empty", "Tight"]);
}
