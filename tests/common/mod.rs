#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use stockroom_api::cache::CacheFacade;
use stockroom_api::config::AppConfig;
use stockroom_api::db::{establish_connection_with_config, run_migrations, DbConfig};
use stockroom_api::events::EventSender;
use stockroom_api::notifications::NotificationDispatcher;
use stockroom_api::services::inventory::{CreateItemRequest, ItemResponse};
use stockroom_api::AppServices;
use uuid::Uuid;

/// Fresh in-memory database with all migrations applied. A single pooled
/// connection keeps every handle on the same SQLite instance.
pub async fn setup() -> AppServices {
    let config = AppConfig::new("sqlite::memory:");
    setup_with(&config, None).await
}

pub async fn setup_with(
    config: &AppConfig,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
) -> AppServices {
    let db_config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let db = establish_connection_with_config(&db_config)
        .await
        .expect("connect to in-memory sqlite");
    run_migrations(&db).await.expect("apply migrations");

    let cache = CacheFacade::in_memory_only(
        config.cache.capacity,
        Duration::from_secs(config.cache.default_ttl_secs),
    );
    let events = EventSender::spawn_default();

    match dispatcher {
        Some(dispatcher) => AppServices::with_dispatcher(db, config, events, cache, dispatcher),
        None => AppServices::new(db, config, events, cache),
    }
}

pub async fn seed_item(
    app: &AppServices,
    name: &str,
    sku: &str,
    quantity: i32,
    price_cents: i64,
    reorder_threshold: i32,
) -> ItemResponse {
    app.inventory
        .create_item(CreateItemRequest {
            name: name.to_string(),
            sku: sku.to_string(),
            quantity,
            price_cents,
            reorder_threshold,
            owner_id: Uuid::new_v4(),
        })
        .await
        .expect("seed item")
}
