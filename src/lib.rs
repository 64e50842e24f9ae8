//! Order and inventory consistency engine for a warehouse backend.
//!
//! Services own all write paths: orders decrement stock atomically at
//! creation, shipments push order status forward (and restore stock on
//! failure), and every mutation feeds the alert engine and invalidates the
//! search cache. The relational store is the single source of truth; Redis
//! is an optional accelerator with an in-process fallback.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod notifications;
pub mod services;

use crate::cache::CacheFacade;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::notifications::{LoggingDispatcher, NotificationDispatcher};
use crate::services::alerts::AlertService;
use crate::services::inventory::InventoryService;
use crate::services::orders::OrderService;
use crate::services::search::{SearchIndex, SearchService};
use crate::services::shipments::ShipmentService;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber, honoring `RUST_LOG` with an
/// `info` default. Call once from the embedding binary.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Fully wired service set sharing one pool, one cache, and one event
/// channel. Embedders construct this once at startup and clone the
/// individual services as needed.
#[derive(Clone)]
pub struct AppServices {
    pub db: Arc<DbPool>,
    pub cache: CacheFacade,
    pub inventory: InventoryService,
    pub orders: OrderService,
    pub shipments: ShipmentService,
    pub alerts: AlertService,
    pub search: SearchService,
    pub events: EventSender,
}

impl AppServices {
    /// Wires every service from an established pool and the application
    /// config, with the default logging notification dispatcher.
    pub fn new(db: DbPool, config: &AppConfig, events: EventSender, cache: CacheFacade) -> Self {
        Self::with_dispatcher(db, config, events, cache, Arc::new(LoggingDispatcher))
    }

    pub fn with_dispatcher(
        db: DbPool,
        config: &AppConfig,
        events: EventSender,
        cache: CacheFacade,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let db = Arc::new(db);
        let index = SearchIndex::new(cache.clone(), config.cache.search_ttl_secs);
        let alerts = AlertService::new(db.clone(), dispatcher, config.alert_recipients.clone());
        let inventory = InventoryService::new(
            db.clone(),
            cache.clone(),
            index.clone(),
            alerts.clone(),
            events.clone(),
        );
        let orders = OrderService::new(
            db.clone(),
            index.clone(),
            alerts.clone(),
            events.clone(),
            Duration::from_secs(config.txn_timeout_secs),
        );
        let shipments = ShipmentService::new(
            db.clone(),
            index.clone(),
            alerts.clone(),
            events.clone(),
        );
        let search = SearchService::new(db.clone(), index);

        Self {
            db,
            cache,
            inventory,
            orders,
            shipments,
            alerts,
            search,
            events,
        }
    }

    /// Connects, optionally migrates, and wires everything from config.
    pub async fn from_config(config: &AppConfig) -> Result<Self, errors::ServiceError> {
        let db = db::establish_connection_from_app_config(config).await?;
        if config.auto_migrate {
            db::run_migrations(&db).await?;
        }
        let cache = CacheFacade::connect(
            &config.cache.redis_url,
            config.cache.capacity,
            Duration::from_secs(config.cache.default_ttl_secs),
        )
        .await;
        let events = EventSender::spawn_default();
        Ok(Self::new(db, config, events, cache))
    }
}
