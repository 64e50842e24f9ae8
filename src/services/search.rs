use crate::{
    cache::CacheFacade,
    db::DbPool,
    entities::item::{self, Entity as ItemEntity},
    entities::order::{self, Entity as OrderEntity},
    errors::ServiceError,
};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Hard cap on page size regardless of what the caller asks for.
pub const MAX_PAGE_SIZE: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEntity {
    Items,
    Orders,
}

impl SearchEntity {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchEntity::Items => "items",
            SearchEntity::Orders => "orders",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemFilters {
    pub sku: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub low_stock_only: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderFilters {
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

/// Versioned cache namespace for listing pages.
///
/// `invalidate` bumps a per-entity version counter; every read keys off the
/// current version, so anything cached before the bump is unreachable and
/// ages out by TTL. This keeps the "no pre-write data after invalidate"
/// contract without pattern-deleting keys.
#[derive(Clone)]
pub struct SearchIndex {
    cache: CacheFacade,
    ttl_secs: u64,
}

impl SearchIndex {
    pub fn new(cache: CacheFacade, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }

    fn version_key(entity: SearchEntity) -> String {
        format!("search:{}:version", entity.as_str())
    }

    async fn current_version(&self, entity: SearchEntity) -> i64 {
        self.cache
            .get(&Self::version_key(entity))
            .await
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    pub async fn invalidate(&self, entity: SearchEntity) {
        let version = self.cache.increment(&Self::version_key(entity)).await;
        debug!(entity = entity.as_str(), version, "Search index invalidated");
    }

    async fn page_key(&self, entity: SearchEntity, fingerprint: &str) -> String {
        let version = self.current_version(entity).await;
        format!("search:{}:v{}:{}", entity.as_str(), version, fingerprint)
    }

    pub async fn cached_page<T: serde::de::DeserializeOwned>(
        &self,
        entity: SearchEntity,
        fingerprint: &str,
    ) -> Option<SearchPage<T>> {
        let key = self.page_key(entity, fingerprint).await;
        self.cache.get_json(&key).await
    }

    pub async fn store_page<T: Serialize>(
        &self,
        entity: SearchEntity,
        fingerprint: &str,
        page: &SearchPage<T>,
    ) {
        let key = self.page_key(entity, fingerprint).await;
        self.cache.set_json(&key, page, self.ttl_secs).await;
    }
}

/// Deterministic fingerprint of a full search parameter set. Identical
/// requests must map to the same key, so the query text is trimmed and the
/// filters are serialized in declaration order.
pub fn fingerprint<F: Serialize>(query: &str, page: u64, page_size: u64, filters: &F) -> String {
    let filters_json = serde_json::to_string(filters).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(query.trim().as_bytes());
    hasher.update([0u8]);
    hasher.update(page.to_le_bytes());
    hasher.update(page_size.to_le_bytes());
    hasher.update(filters_json.as_bytes());
    hex::encode(hasher.finalize())
}

fn clamp_paging(page: u64, page_size: u64) -> (u64, u64) {
    (page.max(1), page_size.clamp(1, MAX_PAGE_SIZE))
}

fn total_pages(total: u64, page_size: u64) -> u64 {
    total.div_ceil(page_size)
}

/// Read path for item and order listings, optionally served from cache.
#[derive(Clone)]
pub struct SearchService {
    db: Arc<DbPool>,
    index: SearchIndex,
}

impl SearchService {
    pub fn new(db: Arc<DbPool>, index: SearchIndex) -> Self {
        Self { db, index }
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Searches items by name or SKU substring. Results put operational
    /// risk first: lowest quantity, then name.
    #[instrument(skip(self, filters))]
    pub async fn search_items(
        &self,
        query: &str,
        page: u64,
        page_size: u64,
        filters: &ItemFilters,
    ) -> Result<SearchPage<item::Model>, ServiceError> {
        let (page, page_size) = clamp_paging(page, page_size);
        let fp = fingerprint(query, page, page_size, filters);

        if let Some(cached) = self.index.cached_page(SearchEntity::Items, &fp).await {
            debug!(fingerprint = %fp, "Item search served from cache");
            return Ok(cached);
        }

        let mut select = ItemEntity::find();
        let trimmed = query.trim();
        if !trimmed.is_empty() {
            let pattern = format!("%{}%", trimmed);
            select = select.filter(
                Condition::any()
                    .add(item::Column::Name.like(pattern.clone()))
                    .add(item::Column::Sku.like(pattern)),
            );
        }
        if let Some(sku) = &filters.sku {
            select = select.filter(item::Column::Sku.eq(sku.clone()));
        }
        if let Some(min) = filters.min_price_cents {
            select = select.filter(item::Column::PriceCents.gte(min));
        }
        if let Some(max) = filters.max_price_cents {
            select = select.filter(item::Column::PriceCents.lte(max));
        }
        if filters.low_stock_only {
            select = select.filter(
                sea_orm::sea_query::Expr::col(item::Column::Quantity)
                    .lte(sea_orm::sea_query::Expr::col(item::Column::ReorderThreshold)),
            );
        }

        let paginator = select
            .order_by_asc(item::Column::Quantity)
            .order_by_asc(item::Column::Name)
            .paginate(&*self.db, page_size);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        let result = SearchPage {
            items,
            total,
            page,
            page_size,
            total_pages: total_pages(total, page_size),
        };
        self.index
            .store_page(SearchEntity::Items, &fp, &result)
            .await;
        info!(total, page, "Item search executed");
        Ok(result)
    }

    /// Searches orders by order number substring, newest first.
    #[instrument(skip(self, filters))]
    pub async fn search_orders(
        &self,
        query: &str,
        page: u64,
        page_size: u64,
        filters: &OrderFilters,
    ) -> Result<SearchPage<order::Model>, ServiceError> {
        let (page, page_size) = clamp_paging(page, page_size);
        let fp = fingerprint(query, page, page_size, filters);

        if let Some(cached) = self.index.cached_page(SearchEntity::Orders, &fp).await {
            debug!(fingerprint = %fp, "Order search served from cache");
            return Ok(cached);
        }

        let mut select = OrderEntity::find();
        let trimmed = query.trim();
        if !trimmed.is_empty() {
            select = select.filter(order::Column::OrderNumber.like(format!("%{}%", trimmed)));
        }
        if let Some(status) = &filters.status {
            select = select.filter(order::Column::Status.eq(status.clone()));
        }
        if let Some(user_id) = filters.user_id {
            select = select.filter(order::Column::UserId.eq(user_id));
        }

        let paginator = select
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, page_size);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        let result = SearchPage {
            items,
            total,
            page,
            page_size,
            total_pages: total_pages(total, page_size),
        };
        self.index
            .store_page(SearchEntity::Orders, &fp, &result)
            .await;
        info!(total, page, "Order search executed");
        Ok(result)
    }
}
