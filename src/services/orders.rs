use crate::{
    db::DbPool,
    entities::item::{self, Entity as ItemEntity, Model as ItemModel},
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::alerts::AlertService,
    services::search::{SearchEntity, SearchIndex},
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineResponse {
    pub item_id: Uuid,
    /// Item summary at read time; `None` when the item was hard-deleted.
    pub name: Option<String>,
    pub sku: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

/// Validates a requested line set against current stock, computes totals,
/// and performs the atomic create-order-and-decrement-stock transaction.
/// Also owns status transitions; inventory restoration on failed shipments
/// belongs to the shipment service.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    index: SearchIndex,
    alerts: AlertService,
    event_sender: EventSender,
    txn_timeout: Duration,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        index: SearchIndex,
        alerts: AlertService,
        event_sender: EventSender,
        txn_timeout: Duration,
    ) -> Self {
        Self {
            db,
            index,
            alerts,
            event_sender,
            txn_timeout,
        }
    }

    /// Creates an order.
    ///
    /// All lines are validated against a fresh stock snapshot before any
    /// mutation; the decrement itself is a conditional DB-side update
    /// (`quantity = quantity - n` guarded by `quantity >= n`), so two
    /// concurrent orders can both pass validation but only one wins the
    /// decrement; the loser's transaction rolls back with
    /// `InsufficientStock`. Stock reads here deliberately bypass the
    /// search cache.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, lines = request.lines.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        if request.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one line".to_string(),
            ));
        }
        for line in &request.lines {
            if line.quantity <= 0 {
                return Err(ServiceError::InvalidQuantity {
                    item_id: line.item_id,
                    quantity: line.quantity,
                });
            }
        }

        // Duplicate item ids collapse into one line with summed quantity.
        let mut merged: Vec<(Uuid, i32)> = Vec::new();
        for line in &request.lines {
            match merged.iter_mut().find(|(id, _)| *id == line.item_id) {
                Some((_, qty)) => *qty += line.quantity,
                None => merged.push((line.item_id, line.quantity)),
            }
        }

        let item_ids: Vec<Uuid> = merged.iter().map(|(id, _)| *id).collect();
        let snapshot: HashMap<Uuid, ItemModel> = ItemEntity::find()
            .filter(item::Column::Id.is_in(item_ids.clone()))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        // Validate every line before any mutation, freezing the snapshot
        // price into the priced line set as we go.
        let mut priced: Vec<(Uuid, i32, i64)> = Vec::with_capacity(merged.len());
        let mut total_cents: i64 = 0;
        for (item_id, quantity) in &merged {
            let item = snapshot
                .get(item_id)
                .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;
            if item.quantity < *quantity {
                return Err(ServiceError::InsufficientStock {
                    item_id: *item_id,
                    available: item.quantity,
                    requested: *quantity,
                });
            }
            priced.push((*item_id, *quantity, item.price_cents));
            total_cents += *quantity as i64 * item.price_cents;
        }

        let user_id = request.user_id;
        let order = tokio::time::timeout(
            self.txn_timeout,
            self.persist_order(user_id, &priced, total_cents),
        )
        .await
        .map_err(|_| {
            error!(user_id = %user_id, "Order creation timed out waiting on the database");
            ServiceError::LockTimeout("order creation exceeded transaction timeout".to_string())
        })??;

        info!(order_id = %order.id, order_number = %order.order_number, total_cents, "Order created");
        self.post_commit_effects(&order, &item_ids).await;

        self.hydrate(order, Some(&snapshot)).await
    }

    /// The atomic part: order number assignment, order + line inserts, and
    /// one conditional decrement per line, all in a single transaction.
    async fn persist_order(
        &self,
        user_id: Uuid,
        lines: &[(Uuid, i32, i64)],
        total_cents: i64,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        // Count-derived sequence; the unique index on order_number backstops
        // a concurrent assignment of the same number.
        let existing = OrderEntity::find().count(&txn).await?;
        let order_number = format!("ORD-{:06}", existing + 1);

        let order_id = Uuid::new_v4();
        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending.to_string()),
            total_cents: Set(total_cents),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::order_number_conflict_from_db(e, &order_number))?;

        let line_models: Vec<order_item::ActiveModel> = lines
            .iter()
            .map(|(item_id, quantity, unit_price_cents)| order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                item_id: Set(*item_id),
                quantity: Set(*quantity),
                unit_price_cents: Set(*unit_price_cents),
                created_at: Set(now),
            })
            .collect();
        OrderItemEntity::insert_many(line_models).exec(&txn).await?;

        for (item_id, quantity, _) in lines {
            let result = ItemEntity::update_many()
                .col_expr(
                    item::Column::Quantity,
                    Expr::col(item::Column::Quantity).sub(*quantity),
                )
                .col_expr(item::Column::UpdatedAt, Expr::value(now))
                .filter(item::Column::Id.eq(*item_id))
                .filter(item::Column::Quantity.gte(*quantity))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                // Stock raced away (or the item vanished) between snapshot
                // and commit. Re-read for an accurate error, then roll back.
                let available = ItemEntity::find_by_id(*item_id)
                    .one(&txn)
                    .await?
                    .map(|i| i.quantity)
                    .unwrap_or(0);
                txn.rollback().await?;
                warn!(item_id = %item_id, available, requested = quantity, "Conditional decrement lost the race");
                return Err(ServiceError::InsufficientStock {
                    item_id: *item_id,
                    available,
                    requested: *quantity,
                });
            }
        }

        txn.commit().await?;
        Ok(order_model)
    }

    /// Best-effort side effects after the transaction commits: low-stock
    /// rechecks, index invalidation, and the created event. Failures are
    /// logged; the committed order is never reported as failed.
    async fn post_commit_effects(&self, order: &OrderModel, item_ids: &[Uuid]) {
        match ItemEntity::find()
            .filter(item::Column::Id.is_in(item_ids.to_vec()))
            .all(&*self.db)
            .await
        {
            Ok(items) => {
                for item in &items {
                    if let Err(e) = self.alerts.check_low_stock(item).await {
                        warn!(item_id = %item.id, error = %e, "Low-stock check failed (ignored)");
                    }
                }
            }
            Err(e) => warn!(order_id = %order.id, error = %e, "Post-commit item re-read failed (ignored)"),
        }

        self.index.invalidate(SearchEntity::Items).await;
        self.index.invalidate(SearchEntity::Orders).await;

        if let Err(e) = self.event_sender.send(Event::OrderCreated(order.id)).await {
            warn!(order_id = %order.id, error = %e, "Failed to send order created event");
        }
    }

    /// Applies a status transition through the guarded table. Does not touch
    /// inventory; restoration on failed shipments is the shipment service's
    /// job.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let found = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let old_status = found.status_enum()?;

        if old_status == new_status {
            txn.rollback().await?;
            return self.hydrate(found, None).await;
        }
        if !old_status.can_transition_to(new_status) {
            txn.rollback().await?;
            return Err(ServiceError::InvalidStatusTransition {
                from: old_status.to_string(),
                to: new_status.to_string(),
            });
        }

        let mut active: order::ActiveModel = found.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(order_id = %order_id, from = %old_status, to = %new_status, "Order status updated");
        self.after_status_change(&updated, old_status, new_status)
            .await;
        self.hydrate(updated, None).await
    }

    pub(crate) async fn after_status_change(
        &self,
        order: &OrderModel,
        old_status: OrderStatus,
        new_status: OrderStatus,
    ) {
        if let Err(e) = self
            .alerts
            .order_status_alert(order.id, &old_status.to_string(), &new_status.to_string())
            .await
        {
            warn!(order_id = %order.id, error = %e, "Order status alert failed (ignored)");
        }
        self.index.invalidate(SearchEntity::Orders).await;
        if let Err(e) = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id: order.id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await
        {
            warn!(order_id = %order.id, error = %e, "Failed to send status event");
        }
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let Some(found) = OrderEntity::find_by_id(order_id).one(&*self.db).await? else {
            return Ok(None);
        };
        Ok(Some(self.hydrate(found, None).await?))
    }

    /// Lists orders newest first; lines are not hydrated on the list path.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        page_size: u64,
        user_id: Option<Uuid>,
    ) -> Result<OrderListResponse, ServiceError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 50);

        let mut query = OrderEntity::find();
        if let Some(user_id) = user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }
        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        let mut responses = Vec::with_capacity(orders.len());
        for model in orders {
            let status = model.status_enum()?;
            responses.push(OrderResponse {
                id: model.id,
                order_number: model.order_number,
                user_id: model.user_id,
                status,
                total_cents: model.total_cents,
                created_at: model.created_at,
                lines: Vec::new(),
            });
        }

        Ok(OrderListResponse {
            orders: responses,
            total,
            page,
            page_size,
        })
    }

    /// Builds the full response: lines plus item summaries. A pre-fetched
    /// snapshot avoids the extra item query on the create path.
    async fn hydrate(
        &self,
        model: OrderModel,
        known_items: Option<&HashMap<Uuid, ItemModel>>,
    ) -> Result<OrderResponse, ServiceError> {
        let status = model.status_enum()?;
        let lines = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(model.id))
            .all(&*self.db)
            .await?;

        let fetched: HashMap<Uuid, ItemModel>;
        let items: &HashMap<Uuid, ItemModel> = match known_items {
            Some(map) => map,
            None => {
                let ids: Vec<Uuid> = lines.iter().map(|l| l.item_id).collect();
                fetched = ItemEntity::find()
                    .filter(item::Column::Id.is_in(ids))
                    .all(&*self.db)
                    .await?
                    .into_iter()
                    .map(|m| (m.id, m))
                    .collect();
                &fetched
            }
        };

        let lines = lines
            .into_iter()
            .map(|line| {
                let summary = items.get(&line.item_id);
                OrderLineResponse {
                    item_id: line.item_id,
                    name: summary.map(|i| i.name.clone()),
                    sku: summary.map(|i| i.sku.clone()),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price_cents,
                    line_total_cents: line.quantity as i64 * line.unit_price_cents,
                }
            })
            .collect();

        Ok(OrderResponse {
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            status,
            total_cents: model.total_cents,
            created_at: model.created_at,
            lines,
        })
    }
}
