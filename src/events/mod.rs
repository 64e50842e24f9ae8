use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Events emitted by the services after their transactions commit.
/// Consumers are advisory; a lost event never invalidates a committed write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    InventoryAdjusted {
        item_id: Uuid,
        old_quantity: i32,
        new_quantity: i32,
    },
    ItemDeleted(Uuid),
    LowStockDetected {
        item_id: Uuid,
        quantity: i32,
        threshold: i32,
    },
    ShipmentCreated {
        shipment_id: Uuid,
        order_id: Uuid,
    },
    ShipmentStatusChanged {
        shipment_id: Uuid,
        order_id: Uuid,
        new_status: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender wired to a logging consumer; handy for tests and
    /// embedders that do not care about events.
    pub fn spawn_default() -> Self {
        let (tx, rx) = mpsc::channel(128);
        tokio::spawn(process_events(rx));
        Self::new(tx)
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. Embedders that fan out to
/// external systems replace this consumer with their own.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id = %order_id, from = %old_status, to = %new_status, "Order status changed");
            }
            Event::LowStockDetected {
                item_id,
                quantity,
                threshold,
            } => {
                info!(item_id = %item_id, quantity, threshold, "Low stock detected");
            }
            other => debug!(event = ?other, "Event processed"),
        }
    }
    info!("Event processor stopped");
}
