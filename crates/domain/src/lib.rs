//! Domain layer for the order processing system.
//!
//! This crate provides the core domain model:
//! - Value objects (customer/product identifiers, money amounts, order items)
//! - The order status state machine
//! - The `Order` record with creation-time validation
//!
//! The domain layer is pure: it performs no I/O and holds no clocks beyond
//! the timestamps captured at creation and on transitions.

pub mod error;
pub mod order;

pub use common::OrderId;
pub use error::OrderError;
pub use order::{
    CustomerId, Money, NewOrder, Order, OrderItem, OrderStatus, ProductId, total_of,
    validate_items,
};
