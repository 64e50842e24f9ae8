use sea_orm::error::DbErr;
use uuid::Uuid;

/// Error type shared by every service in the crate.
///
/// Business failures (validation, conflicts, missing rows, insufficient
/// stock) carry enough structure for callers to react without string
/// matching. Infrastructure failures that only affect secondary effects
/// (cache invalidation, alert fan-out) are logged at the call site and
/// never surface through this type.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid quantity {quantity} for item {item_id}")]
    InvalidQuantity { item_id: Uuid, quantity: i32 },

    #[error("Insufficient stock for item {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error("SKU conflict: {0}")]
    SkuConflict(String),

    #[error("Invalid status transition from '{from}' to '{to}'")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Lock wait timed out: {0}")]
    LockTimeout(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// True when retrying the same request may succeed (lock contention,
    /// stock raced away between the snapshot read and the commit, or a
    /// concurrently assigned order number).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::LockTimeout(_)
                | ServiceError::InsufficientStock { .. }
                | ServiceError::WriteConflict(_)
        )
    }

    /// Maps a database error to `SkuConflict` when it is a unique-constraint
    /// violation. The SKU pre-check is a fast path only; the unique index is
    /// the actual guard, so a race between check and insert lands here.
    pub fn sku_conflict_from_db(err: DbErr, sku: &str) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
                ServiceError::SkuConflict(format!("SKU '{}' already exists", sku))
            }
            _ => ServiceError::DatabaseError(err),
        }
    }

    /// Maps a unique-constraint violation on the order insert to a retryable
    /// conflict. Two transactions can derive the same count-based order
    /// number; the unique index fails the loser, and a retry re-reads the
    /// count and picks the next free number.
    pub fn order_number_conflict_from_db(err: DbErr, order_number: &str) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => ServiceError::WriteConflict(
                format!("Order number '{}' was assigned concurrently", order_number),
            ),
            _ => ServiceError::DatabaseError(err),
        }
    }
}
