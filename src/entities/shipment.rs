use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recognized shipment status values. The column stays a free-form string;
/// only these values drive order-status synchronization.
pub const STATUS_PROCESSING: &str = "Processing";
pub const STATUS_IN_TRANSIT: &str = "In Transit";
pub const STATUS_DELIVERED: &str = "Delivered";
pub const STATUS_DELAYED: &str = "Delayed";
pub const STATUS_FAILED: &str = "Failed";
pub const STATUS_RETURNED: &str = "Returned";
pub const STATUS_CANCELLED: &str = "Cancelled";

pub const RECOGNIZED_STATUSES: &[&str] = &[
    STATUS_PROCESSING,
    STATUS_IN_TRANSIT,
    STATUS_DELIVERED,
    STATUS_DELAYED,
    STATUS_FAILED,
    STATUS_RETURNED,
    STATUS_CANCELLED,
];

/// True when the shipment can no longer progress; a new shipment may be
/// created for the order only if every existing one is terminal.
pub fn is_terminal_status(status: &str) -> bool {
    matches!(
        status,
        STATUS_DELIVERED | STATUS_FAILED | STATUS_RETURNED | STATUS_CANCELLED
    )
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub carrier: String,
    pub tracking_number: String,
    pub destination: String,
    pub status: String,
    pub shipped_at: Option<DateTime<Utc>>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
