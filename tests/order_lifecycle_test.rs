mod common;

use assert_matches::assert_matches;
use common::{seed_item, setup};
use sea_orm::{ActiveModelTrait, Set};
use stockroom_api::entities::order::{self, OrderStatus};
use stockroom_api::errors::ServiceError;
use stockroom_api::services::orders::{CreateOrderRequest, OrderLineRequest};
use uuid::Uuid;

#[tokio::test]
async fn create_order_decrements_stock_and_freezes_prices() {
    let app = setup().await;
    let widget = seed_item(&app, "Widget", "WID-1", 10, 250, 3).await;
    let gadget = seed_item(&app, "Gadget", "GAD-1", 8, 1000, 3).await;

    let order = app
        .orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![
                OrderLineRequest {
                    item_id: widget.id,
                    quantity: 2,
                },
                OrderLineRequest {
                    item_id: gadget.id,
                    quantity: 1,
                },
            ],
        })
        .await
        .unwrap();

    assert_eq!(order.order_number, "ORD-000001");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_cents, 2 * 250 + 1000);
    assert_eq!(order.lines.len(), 2);

    let widget_after = app.inventory.get_item(widget.id).await.unwrap().unwrap();
    let gadget_after = app.inventory.get_item(gadget.id).await.unwrap().unwrap();
    assert_eq!(widget_after.quantity, 8);
    assert_eq!(gadget_after.quantity, 7);

    // Prices are frozen at order time; later catalog changes do not bleed in.
    app.inventory
        .update_item(
            widget.id,
            stockroom_api::services::inventory::UpdateItemRequest {
                price_cents: Some(9999),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let reread = app.orders.get_order(order.id).await.unwrap().unwrap();
    let widget_line = reread
        .lines
        .iter()
        .find(|l| l.item_id == widget.id)
        .unwrap();
    assert_eq!(widget_line.unit_price_cents, 250);
    assert_eq!(reread.total_cents, order.total_cents);
}

#[tokio::test]
async fn duplicate_lines_merge_into_one() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 10, 100, 3).await;

    let order = app
        .orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![
                OrderLineRequest {
                    item_id: item.id,
                    quantity: 2,
                },
                OrderLineRequest {
                    item_id: item.id,
                    quantity: 3,
                },
            ],
        })
        .await
        .unwrap();

    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].quantity, 5);
    assert_eq!(order.total_cents, 500);

    let after = app.inventory.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(after.quantity, 5);
}

#[tokio::test]
async fn empty_and_nonpositive_orders_are_rejected() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 10, 100, 3).await;

    let err = app
        .orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![],
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![OrderLineRequest {
                item_id: item.id,
                quantity: 0,
            }],
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidQuantity { quantity: 0, .. });
}

#[tokio::test]
async fn insufficient_stock_rolls_back_everything() {
    let app = setup().await;
    let plenty = seed_item(&app, "Plenty", "PL-1", 100, 100, 3).await;
    let scarce = seed_item(&app, "Scarce", "SC-1", 2, 100, 3).await;

    let err = app
        .orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![
                OrderLineRequest {
                    item_id: plenty.id,
                    quantity: 10,
                },
                OrderLineRequest {
                    item_id: scarce.id,
                    quantity: 5,
                },
            ],
        })
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            available: 2,
            requested: 5,
            ..
        }
    );

    // No partial effects: neither item lost stock, no order exists.
    let plenty_after = app.inventory.get_item(plenty.id).await.unwrap().unwrap();
    let scarce_after = app.inventory.get_item(scarce.id).await.unwrap().unwrap();
    assert_eq!(plenty_after.quantity, 100);
    assert_eq!(scarce_after.quantity, 2);
    let list = app.orders.list_orders(1, 10, None).await.unwrap();
    assert_eq!(list.total, 0);
}

#[tokio::test]
async fn unknown_item_is_not_found() {
    let app = setup().await;
    let err = app
        .orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![OrderLineRequest {
                item_id: Uuid::new_v4(),
                quantity: 1,
            }],
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn order_numbers_are_sequential() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 100, 100, 3).await;

    for expected in ["ORD-000001", "ORD-000002", "ORD-000003"] {
        let order = app
            .orders
            .create_order(CreateOrderRequest {
                user_id: Uuid::new_v4(),
                lines: vec![OrderLineRequest {
                    item_id: item.id,
                    quantity: 1,
                }],
            })
            .await
            .unwrap();
        assert_eq!(order.order_number, expected);
    }
}

#[tokio::test]
async fn colliding_order_number_is_a_retryable_conflict() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 10, 100, 3).await;

    app.orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![OrderLineRequest {
                item_id: item.id,
                quantity: 1,
            }],
        })
        .await
        .unwrap();

    // Occupy the number the count-based sequence will derive next: with two
    // rows present the next create computes ORD-000003, which this row
    // already holds. That is the same collision two concurrent creates
    // produce when they read the same count.
    order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set("ORD-000003".to_string()),
        user_id: Set(Uuid::new_v4()),
        status: Set(OrderStatus::Pending.to_string()),
        total_cents: Set(0),
        ..Default::default()
    }
    .insert(&*app.db)
    .await
    .unwrap();

    let err = app
        .orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![OrderLineRequest {
                item_id: item.id,
                quantity: 2,
            }],
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::WriteConflict(_));
    assert!(err.is_retryable(), "the caller may simply retry");

    // The losing transaction rolled back before touching stock.
    let after = app.inventory.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(after.quantity, 9);
}

#[tokio::test]
async fn status_walks_the_full_lifecycle() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 10, 100, 3).await;
    let order = app
        .orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![OrderLineRequest {
                item_id: item.id,
                quantity: 1,
            }],
        })
        .await
        .unwrap();

    for status in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let updated = app
            .orders
            .update_order_status(order.id, status)
            .await
            .unwrap();
        assert_eq!(updated.status, status);
    }
}

#[tokio::test]
async fn skipping_a_state_is_rejected() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 10, 100, 3).await;
    let order = app
        .orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![OrderLineRequest {
                item_id: item.id,
                quantity: 1,
            }],
        })
        .await
        .unwrap();

    let err = app
        .orders
        .update_order_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatusTransition { .. });

    // The order is untouched by the failed transition.
    let reread = app.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(reread.status, OrderStatus::Pending);
}

#[tokio::test]
async fn same_status_is_a_noop_and_terminal_states_are_final() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 10, 100, 3).await;
    let order = app
        .orders
        .create_order(CreateOrderRequest {
            user_id: Uuid::new_v4(),
            lines: vec![OrderLineRequest {
                item_id: item.id,
                quantity: 1,
            }],
        })
        .await
        .unwrap();

    let noop = app
        .orders
        .update_order_status(order.id, OrderStatus::Pending)
        .await
        .unwrap();
    assert_eq!(noop.status, OrderStatus::Pending);

    app.orders
        .update_order_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    let err = app
        .orders
        .update_order_status(order.id, OrderStatus::Processing)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatusTransition { .. });
}

#[tokio::test]
async fn list_orders_filters_by_user_and_paginates() {
    let app = setup().await;
    let item = seed_item(&app, "Widget", "WID-1", 100, 100, 3).await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    for user in [alice, alice, bob] {
        app.orders
            .create_order(CreateOrderRequest {
                user_id: user,
                lines: vec![OrderLineRequest {
                    item_id: item.id,
                    quantity: 1,
                }],
            })
            .await
            .unwrap();
    }

    let all = app.orders.list_orders(1, 10, None).await.unwrap();
    assert_eq!(all.total, 3);

    let alices = app.orders.list_orders(1, 10, Some(alice)).await.unwrap();
    assert_eq!(alices.total, 2);
    assert!(alices.orders.iter().all(|o| o.user_id == alice));

    let first_page = app.orders.list_orders(1, 2, None).await.unwrap();
    assert_eq!(first_page.orders.len(), 2);
    let second_page = app.orders.list_orders(2, 2, None).await.unwrap();
    assert_eq!(second_page.orders.len(), 1);
}
