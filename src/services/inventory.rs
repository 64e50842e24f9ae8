use crate::{
    cache::CacheFacade,
    db::DbPool,
    entities::item::{self, Entity as ItemEntity, Model as ItemModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::alerts::AlertService,
    services::search::{SearchEntity, SearchIndex},
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 255, message = "Item name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 100, message = "SKU is required"))]
    pub sku: String,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(range(min = 0))]
    pub price_cents: i64,
    #[validate(range(min = 0))]
    pub reorder_threshold: i32,
    pub owner_id: Uuid,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub sku: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    #[validate(range(min = 0))]
    pub reorder_threshold: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub quantity: i32,
    pub price_cents: i64,
    pub reorder_threshold: i32,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ItemModel> for ItemResponse {
    fn from(model: ItemModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            sku: model.sku,
            quantity: model.quantity,
            price_cents: model.price_cents,
            reorder_threshold: model.reorder_threshold,
            owner_id: model.owner_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn sku_cache_key(sku: &str) -> String {
    format!("item:sku:{}", sku)
}

/// Owns item records: stock quantity, price, SKU uniqueness. Every
/// successful write invalidates the `items` search index; quantity changes
/// run through the alert engine.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
    cache: CacheFacade,
    index: SearchIndex,
    alerts: AlertService,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(
        db: Arc<DbPool>,
        cache: CacheFacade,
        index: SearchIndex,
        alerts: AlertService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            cache,
            index,
            alerts,
            event_sender,
        }
    }

    /// Creates an item. The SKU pre-check gives a friendly fast-path error;
    /// the unique index is the real guard, so a lost race still comes back
    /// as `SkuConflict`.
    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create_item(
        &self,
        request: CreateItemRequest,
    ) -> Result<ItemResponse, ServiceError> {
        request.validate()?;

        let existing = ItemEntity::find()
            .filter(item::Column::Sku.eq(request.sku.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::SkuConflict(format!(
                "SKU '{}' already exists",
                request.sku
            )));
        }

        let sku = request.sku.clone();
        let model = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            sku: Set(request.sku),
            quantity: Set(request.quantity),
            price_cents: Set(request.price_cents),
            reorder_threshold: Set(request.reorder_threshold),
            owner_id: Set(request.owner_id),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::sku_conflict_from_db(e, &sku))?;

        info!(item_id = %model.id, sku = %model.sku, "Item created");
        self.after_quantity_change(&model, 0).await;
        Ok(model.into())
    }

    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn get_item(&self, id: Uuid) -> Result<Option<ItemResponse>, ServiceError> {
        let item = ItemEntity::find_by_id(id).one(&*self.db).await?;
        Ok(item.map(Into::into))
    }

    /// Read-through lookup by SKU, cached under `item:sku:{sku}`.
    #[instrument(skip(self))]
    pub async fn get_item_by_sku(&self, sku: &str) -> Result<Option<ItemResponse>, ServiceError> {
        let key = sku_cache_key(sku);
        if let Some(cached) = self.cache.get_json::<ItemModel>(&key).await {
            return Ok(Some(cached.into()));
        }

        let item = ItemEntity::find()
            .filter(item::Column::Sku.eq(sku))
            .one(&*self.db)
            .await?;
        if let Some(model) = &item {
            self.cache
                .set_json(&key, model, self.cache.default_ttl().as_secs())
                .await;
        }
        Ok(item.map(Into::into))
    }

    /// Applies a partial update. SKU changes re-run the conflict check and
    /// purge both old and new cache keys.
    #[instrument(skip(self, request), fields(item_id = %id))]
    pub async fn update_item(
        &self,
        id: Uuid,
        request: UpdateItemRequest,
    ) -> Result<ItemResponse, ServiceError> {
        request.validate()?;

        let found = ItemEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))?;

        let old_sku = found.sku.clone();
        let old_quantity = found.quantity;

        if let Some(new_sku) = &request.sku {
            if *new_sku != old_sku {
                let taken = ItemEntity::find()
                    .filter(item::Column::Sku.eq(new_sku.clone()))
                    .one(&*self.db)
                    .await?;
                if taken.is_some() {
                    return Err(ServiceError::SkuConflict(format!(
                        "SKU '{}' already exists",
                        new_sku
                    )));
                }
            }
        }

        let target_sku = request.sku.clone().unwrap_or_else(|| old_sku.clone());
        let mut active: item::ActiveModel = found.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(sku) = request.sku {
            active.sku = Set(sku);
        }
        if let Some(quantity) = request.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(price_cents) = request.price_cents {
            active.price_cents = Set(price_cents);
        }
        if let Some(reorder_threshold) = request.reorder_threshold {
            active.reorder_threshold = Set(reorder_threshold);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active
            .update(&*self.db)
            .await
            .map_err(|e| ServiceError::sku_conflict_from_db(e, &target_sku))?;

        self.cache.delete(&sku_cache_key(&old_sku)).await;
        if updated.sku != old_sku {
            self.cache.delete(&sku_cache_key(&updated.sku)).await;
        }

        info!(item_id = %updated.id, "Item updated");
        if updated.quantity != old_quantity {
            self.after_quantity_change(&updated, old_quantity).await;
        } else {
            self.index.invalidate(SearchEntity::Items).await;
        }
        Ok(updated.into())
    }

    /// Hard delete. The item's SKU cache key is purged; alerts referencing
    /// the item are retained for audit.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn delete_item(&self, id: Uuid) -> Result<bool, ServiceError> {
        let Some(found) = ItemEntity::find_by_id(id).one(&*self.db).await? else {
            return Ok(false);
        };
        let sku = found.sku.clone();

        ItemEntity::delete_by_id(id).exec(&*self.db).await?;

        self.cache.delete(&sku_cache_key(&sku)).await;
        self.index.invalidate(SearchEntity::Items).await;
        if let Err(e) = self.event_sender.send(Event::ItemDeleted(id)).await {
            warn!(item_id = %id, error = %e, "Failed to send item deleted event");
        }
        info!(item_id = %id, sku = %sku, "Item deleted");
        Ok(true)
    }

    /// Additive restock, applied as a single DB-side update so concurrent
    /// restocks never lose increments. Always rechecks the low-stock state:
    /// a restock that lands at or under the threshold keeps the alert.
    #[instrument(skip(self), fields(item_id = %id, amount))]
    pub async fn restock(&self, id: Uuid, amount: i32) -> Result<ItemResponse, ServiceError> {
        if amount <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Restock amount must be positive, got {}",
                amount
            )));
        }

        let result = ItemEntity::update_many()
            .col_expr(
                item::Column::Quantity,
                Expr::col(item::Column::Quantity).add(amount),
            )
            .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(item::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Item {} not found", id)));
        }

        let updated = ItemEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))?;

        info!(item_id = %id, amount, new_quantity = updated.quantity, "Item restocked");
        self.after_quantity_change(&updated, updated.quantity - amount)
            .await;
        Ok(updated.into())
    }

    /// Items at or below the given quantity threshold, lowest stock first.
    #[instrument(skip(self))]
    pub async fn get_low_stock_items(
        &self,
        threshold: i32,
    ) -> Result<Vec<ItemResponse>, ServiceError> {
        let items = ItemEntity::find()
            .filter(item::Column::Quantity.lte(threshold))
            .order_by_asc(item::Column::Quantity)
            .order_by_asc(item::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    /// Secondary effects of a quantity change: alert recheck, cache purge,
    /// index invalidation, event. All best-effort; the committed write is
    /// never failed retroactively.
    async fn after_quantity_change(&self, item: &ItemModel, old_quantity: i32) {
        match self.alerts.check_low_stock(item).await {
            Ok(Some(_)) => {
                if let Err(e) = self
                    .event_sender
                    .send(Event::LowStockDetected {
                        item_id: item.id,
                        quantity: item.quantity,
                        threshold: item.reorder_threshold,
                    })
                    .await
                {
                    warn!(item_id = %item.id, error = %e, "Failed to send low-stock event");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Low-stock check failed (ignored)");
            }
        }
        self.cache.delete(&sku_cache_key(&item.sku)).await;
        self.index.invalidate(SearchEntity::Items).await;
        if old_quantity != item.quantity {
            if let Err(e) = self
                .event_sender
                .send(Event::InventoryAdjusted {
                    item_id: item.id,
                    old_quantity,
                    new_quantity: item.quantity,
                })
                .await
            {
                warn!(item_id = %item.id, error = %e, "Failed to send inventory event");
            }
        }
    }
}
