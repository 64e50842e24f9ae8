use crate::{
    db::DbPool,
    entities::alert::{self, AlertSeverity, AlertType, Entity as AlertEntity},
    entities::item::{self, Entity as ItemEntity},
    errors::ServiceError,
    notifications::NotificationDispatcher,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm::sea_query::Expr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Severity policy for stock alerts. Returns `None` when the quantity is
/// above the item's reorder threshold.
pub fn classify_stock_level(quantity: i32, threshold: i32) -> Option<(AlertType, AlertSeverity)> {
    match quantity {
        0 => Some((AlertType::OutOfStock, AlertSeverity::Critical)),
        q if q <= 5 && q <= threshold => Some((AlertType::LowStock, AlertSeverity::High)),
        q if q <= threshold => Some((AlertType::LowStock, AlertSeverity::Medium)),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlertFilters {
    pub alert_type: Option<AlertType>,
    pub acknowledged: Option<bool>,
    pub item_id: Option<Uuid>,
}

/// Derives and de-duplicates alerts from item and order mutations. Invoked
/// synchronously by the inventory and order services; owns no scheduling.
#[derive(Clone)]
pub struct AlertService {
    db: Arc<DbPool>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    recipients: Vec<String>,
}

impl AlertService {
    pub fn new(
        db: Arc<DbPool>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            db,
            dispatcher,
            recipients,
        }
    }

    /// Rechecks one item's stock level and raises a LOW_STOCK/OUT_OF_STOCK
    /// alert when warranted.
    ///
    /// De-duplication is a read-then-insert: at most one unacknowledged
    /// alert per (item, type) under sequential callers. The check/insert
    /// window is a known relaxation. Alerts are advisory, and a rare
    /// duplicate beats serializing every stock mutation.
    #[instrument(skip(self, item), fields(item_id = %item.id, quantity = item.quantity))]
    pub async fn check_low_stock(
        &self,
        item: &item::Model,
    ) -> Result<Option<alert::Model>, ServiceError> {
        let Some((alert_type, severity)) = classify_stock_level(item.quantity, item.reorder_threshold)
        else {
            return Ok(None);
        };

        let existing = AlertEntity::find()
            .filter(alert::Column::ItemId.eq(item.id))
            .filter(alert::Column::AlertType.eq(alert_type.to_string()))
            .filter(alert::Column::Acknowledged.eq(false))
            .one(&*self.db)
            .await?;

        if existing.is_some() {
            info!(item_id = %item.id, alert_type = %alert_type, "Unacknowledged alert already present, skipping");
            return Ok(None);
        }

        let message = match alert_type {
            AlertType::OutOfStock => {
                format!("{} (SKU {}) is out of stock", item.name, item.sku)
            }
            _ => format!(
                "Low stock for {} (SKU {}): {} remaining, reorder threshold {}",
                item.name, item.sku, item.quantity, item.reorder_threshold
            ),
        };

        let model = alert::ActiveModel {
            id: Set(Uuid::new_v4()),
            alert_type: Set(alert_type.to_string()),
            severity: Set(severity.to_string()),
            message: Set(message.clone()),
            item_id: Set(Some(item.id)),
            acknowledged: Set(false),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(alert_id = %model.id, item_id = %item.id, severity = %severity, "Stock alert raised");

        if severity >= AlertSeverity::High && !self.recipients.is_empty() {
            if let Err(e) = self
                .dispatcher
                .dispatch(&self.recipients, &format!("[{}] stock alert", severity), &message)
                .await
            {
                warn!(alert_id = %model.id, error = %e, "Alert notification failed (ignored)");
            }
        }

        Ok(Some(model))
    }

    /// Records an ORDER_STATUS_CHANGED alert. Never de-duplicated; each
    /// transition is its own fact.
    #[instrument(skip(self))]
    pub async fn order_status_alert(
        &self,
        order_id: Uuid,
        old_status: &str,
        new_status: &str,
    ) -> Result<alert::Model, ServiceError> {
        let model = alert::ActiveModel {
            id: Set(Uuid::new_v4()),
            alert_type: Set(AlertType::OrderStatusChanged.to_string()),
            severity: Set(AlertSeverity::Low.to_string()),
            message: Set(format!(
                "Order {} moved from '{}' to '{}'",
                order_id, old_status, new_status
            )),
            item_id: Set(None),
            acknowledged: Set(false),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        Ok(model)
    }

    /// One-way acknowledge. Returns false when the alert does not exist.
    #[instrument(skip(self), fields(alert_id = %alert_id))]
    pub async fn acknowledge(&self, alert_id: Uuid) -> Result<bool, ServiceError> {
        let Some(found) = AlertEntity::find_by_id(alert_id).one(&*self.db).await? else {
            return Ok(false);
        };
        if found.acknowledged {
            return Ok(true);
        }
        let mut active: alert::ActiveModel = found.into();
        active.acknowledged = Set(true);
        active.update(&*self.db).await?;
        info!(alert_id = %alert_id, "Alert acknowledged");
        Ok(true)
    }

    /// Scans every item at or below its reorder threshold and rechecks each.
    /// A failure on a single item is logged and skipped; the batch keeps
    /// going. Returns the number of alerts raised.
    #[instrument(skip(self))]
    pub async fn check_all_for_low_stock(&self) -> Result<u32, ServiceError> {
        let candidates = ItemEntity::find()
            .filter(
                Expr::col(item::Column::Quantity).lte(Expr::col(item::Column::ReorderThreshold)),
            )
            .all(&*self.db)
            .await?;

        let mut raised = 0u32;
        for candidate in &candidates {
            match self.check_low_stock(candidate).await {
                Ok(Some(_)) => raised += 1,
                Ok(None) => {}
                Err(e) => {
                    error!(item_id = %candidate.id, error = %e, "Low-stock recheck failed, skipping item");
                }
            }
        }

        info!(
            scanned = candidates.len(),
            raised, "Low-stock sweep complete"
        );
        Ok(raised)
    }

    /// Lists alerts newest first with optional filters.
    #[instrument(skip(self))]
    pub async fn list_alerts(
        &self,
        filters: AlertFilters,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<alert::Model>, u64), ServiceError> {
        let mut query = AlertEntity::find();
        if let Some(alert_type) = filters.alert_type {
            query = query.filter(alert::Column::AlertType.eq(alert_type.to_string()));
        }
        if let Some(acknowledged) = filters.acknowledged {
            query = query.filter(alert::Column::Acknowledged.eq(acknowledged));
        }
        if let Some(item_id) = filters.item_id {
            query = query.filter(alert::Column::ItemId.eq(item_id));
        }

        let paginator = query
            .order_by_desc(alert::Column::CreatedAt)
            .paginate(&*self.db, page_size.max(1));
        let total = paginator.num_items().await?;
        let alerts = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((alerts, total))
    }
}
