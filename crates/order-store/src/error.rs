use common::OrderId;
use domain::{OrderError, OrderStatus};
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// The order was not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// An order with this ID already exists.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The idempotency key is already bound to another order.
    #[error("Idempotency key '{key}' already bound to order {existing}")]
    IdempotencyConflict { key: String, existing: OrderId },

    /// The conditional write lost: the row's status changed since it was
    /// last read by this caller.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// The requested transition is illegal in the state machine.
    #[error(transparent)]
    Transition(#[from] OrderError),

    /// A payment reference is already recorded with a different value.
    #[error("Payment reference already set for order {order_id}")]
    PaymentReferenceAlreadySet { order_id: OrderId },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, OrderStoreError>;
