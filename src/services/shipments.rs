use crate::{
    db::DbPool,
    entities::item::{self, Entity as ItemEntity},
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::shipment::{self, Entity as ShipmentEntity, Model as ShipmentModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::alerts::AlertService,
    services::search::{SearchEntity, SearchIndex},
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateShipmentRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Carrier is required"))]
    pub carrier: String,
    #[validate(length(min = 1, max = 100, message = "Tracking number is required"))]
    pub tracking_number: String,
    #[validate(length(min = 1, max = 500, message = "Destination is required"))]
    pub destination: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Creates shipments for orders and keeps order status in sync with
/// shipment status, including inventory restoration when a shipment fails
/// after the stock already left the books.
#[derive(Clone)]
pub struct ShipmentService {
    db: Arc<DbPool>,
    index: SearchIndex,
    alerts: AlertService,
    event_sender: EventSender,
}

impl ShipmentService {
    pub fn new(
        db: Arc<DbPool>,
        index: SearchIndex,
        alerts: AlertService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            index,
            alerts,
            event_sender,
        }
    }

    /// Creates a shipment and moves the order to SHIPPED in the same
    /// transaction, so a shipment never exists for an order that is not
    /// marked shipped. At most one non-terminal shipment per order.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_shipment(
        &self,
        request: CreateShipmentRequest,
    ) -> Result<ShipmentModel, ServiceError> {
        request.validate()?;
        let txn = self.db.begin().await?;

        let order_row = OrderEntity::find_by_id(request.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", request.order_id))
            })?;
        let old_status = order_row.status_enum()?;
        // An order that is already shipped owns its shipment; only a real
        // forward transition into Shipped qualifies here.
        if old_status == OrderStatus::Shipped
            || !old_status.can_transition_to(OrderStatus::Shipped)
        {
            txn.rollback().await?;
            return Err(ServiceError::InvalidStatusTransition {
                from: old_status.to_string(),
                to: OrderStatus::Shipped.to_string(),
            });
        }

        let open = ShipmentEntity::find()
            .filter(shipment::Column::OrderId.eq(request.order_id))
            .all(&txn)
            .await?;
        if open.iter().any(|s| !shipment::is_terminal_status(&s.status)) {
            txn.rollback().await?;
            return Err(ServiceError::Conflict(format!(
                "Order {} already has an active shipment",
                request.order_id
            )));
        }

        let now = Utc::now();
        let created = shipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(request.order_id),
            carrier: Set(request.carrier),
            tracking_number: Set(request.tracking_number),
            destination: Set(request.destination),
            status: Set(shipment::STATUS_PROCESSING.to_string()),
            shipped_at: Set(Some(now)),
            estimated_delivery: Set(request.estimated_delivery),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        let order_id = order_row.id;
        let mut active: order::ActiveModel = order_row.into();
        active.status = Set(OrderStatus::Shipped.to_string());
        active.updated_at = Set(Some(now));
        let updated_order = active.update(&txn).await?;

        txn.commit().await?;

        info!(shipment_id = %created.id, order_id = %order_id, "Shipment created, order marked shipped");
        self.order_sync_effects(&updated_order, old_status, OrderStatus::Shipped)
            .await;
        if let Err(e) = self
            .event_sender
            .send(Event::ShipmentCreated {
                shipment_id: created.id,
                order_id,
            })
            .await
        {
            warn!(shipment_id = %created.id, error = %e, "Failed to send shipment event");
        }

        Ok(created)
    }

    /// Applies a shipment status change and synchronizes the order:
    /// Delivered completes it; Failed/Returned/Cancelled cancel it and
    /// restore every line's quantity back onto its item. Other recognized
    /// statuses leave the order untouched.
    #[instrument(skip(self), fields(shipment_id = %shipment_id, new_status))]
    pub async fn update_shipment_status(
        &self,
        shipment_id: Uuid,
        new_status: &str,
    ) -> Result<ShipmentModel, ServiceError> {
        if !shipment::RECOGNIZED_STATUSES.contains(&new_status) {
            return Err(ServiceError::ValidationError(format!(
                "Unknown shipment status '{}', expected one of {:?}",
                new_status,
                shipment::RECOGNIZED_STATUSES
            )));
        }

        let txn = self.db.begin().await?;
        let found = ShipmentEntity::find_by_id(shipment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shipment {} not found", shipment_id))
            })?;
        let order_id = found.order_id;

        let mut active: shipment::ActiveModel = found.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        let target = match new_status {
            shipment::STATUS_DELIVERED => Some(OrderStatus::Delivered),
            shipment::STATUS_FAILED | shipment::STATUS_RETURNED | shipment::STATUS_CANCELLED => {
                Some(OrderStatus::Cancelled)
            }
            _ => None,
        };

        let mut order_change: Option<(OrderModel, OrderStatus, OrderStatus)> = None;
        let mut restored = false;
        if let Some(target) = target {
            let order_row = OrderEntity::find_by_id(order_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Order {} not found", order_id))
                })?;
            let old_status = order_row.status_enum()?;

            if old_status != target {
                if !old_status.can_transition_to(target) {
                    txn.rollback().await?;
                    return Err(ServiceError::InvalidStatusTransition {
                        from: old_status.to_string(),
                        to: target.to_string(),
                    });
                }

                if target == OrderStatus::Cancelled {
                    restored = self.restore_order_stock(&txn, order_id).await?;
                }

                let mut active: order::ActiveModel = order_row.into();
                active.status = Set(target.to_string());
                active.updated_at = Set(Some(Utc::now()));
                let updated_order = active.update(&txn).await?;
                order_change = Some((updated_order, old_status, target));
            }
        }

        txn.commit().await?;
        info!(shipment_id = %shipment_id, status = new_status, "Shipment status updated");

        if let Some((order_row, old_status, target)) = order_change {
            self.order_sync_effects(&order_row, old_status, target).await;
        }
        if restored {
            self.index.invalidate(SearchEntity::Items).await;
        }
        if let Err(e) = self
            .event_sender
            .send(Event::ShipmentStatusChanged {
                shipment_id,
                order_id,
                new_status: new_status.to_string(),
            })
            .await
        {
            warn!(shipment_id = %shipment_id, error = %e, "Failed to send shipment event");
        }

        Ok(updated)
    }

    /// Re-adds every line quantity onto its item. Goods never reached the
    /// customer, so the stock comes back. A line whose item was deleted in
    /// the meantime is skipped. Returns whether anything was restored.
    async fn restore_order_stock(
        &self,
        txn: &DatabaseTransaction,
        order_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let lines = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(txn)
            .await?;

        let mut restored = false;
        for line in &lines {
            let result = ItemEntity::update_many()
                .col_expr(
                    item::Column::Quantity,
                    Expr::col(item::Column::Quantity).add(line.quantity),
                )
                .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(item::Column::Id.eq(line.item_id))
                .exec(txn)
                .await?;
            if result.rows_affected == 0 {
                warn!(order_id = %order_id, item_id = %line.item_id, "Restore skipped: item no longer exists");
            } else {
                restored = true;
            }
        }
        info!(order_id = %order_id, lines = lines.len(), "Order stock restored");
        Ok(restored)
    }

    async fn order_sync_effects(
        &self,
        order_row: &OrderModel,
        old_status: OrderStatus,
        new_status: OrderStatus,
    ) {
        if let Err(e) = self
            .alerts
            .order_status_alert(
                order_row.id,
                &old_status.to_string(),
                &new_status.to_string(),
            )
            .await
        {
            warn!(order_id = %order_row.id, error = %e, "Order status alert failed (ignored)");
        }
        self.index.invalidate(SearchEntity::Orders).await;
        if let Err(e) = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id: order_row.id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await
        {
            warn!(order_id = %order_row.id, error = %e, "Failed to send status event");
        }
    }

    #[instrument(skip(self), fields(shipment_id = %shipment_id))]
    pub async fn get_shipment(
        &self,
        shipment_id: Uuid,
    ) -> Result<Option<ShipmentModel>, ServiceError> {
        Ok(ShipmentEntity::find_by_id(shipment_id).one(&*self.db).await?)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_shipments_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<ShipmentModel>, ServiceError> {
        Ok(ShipmentEntity::find()
            .filter(shipment::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }
}
