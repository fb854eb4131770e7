//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by order validation and state transitions.
///
/// Every variant except `InvalidStateTransition` is client-caused and is
/// surfaced synchronously at order creation; transition errors arise only
/// from illegal state-machine moves.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order must contain at least one item")]
    NoItems,

    /// An item has a non-positive quantity.
    #[error("Item '{product_id}' must have a positive quantity, got {quantity}")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// An item has a negative unit price.
    #[error("Item '{product_id}' must have a non-negative price, got {cents} cents")]
    InvalidPrice { product_id: String, cents: i64 },

    /// The requested status transition is not allowed by the state machine.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    /// The order cannot be cancelled any more.
    #[error("Order cannot be cancelled: {reason}")]
    NotCancellable { reason: String },
}
