//! Core trait for order store implementations.

use async_trait::async_trait;
use common::OrderId;
use domain::{Order, OrderStatus};

use crate::{Result, StatusQuery};

/// Persistent table of orders keyed by order ID.
///
/// All mutating operations are conditional: they name the status the caller
/// last observed and fail with [`crate::OrderStoreError::StatusConflict`]
/// when the row moved underneath them. Implementations must be thread-safe
/// (`Send + Sync`); orders are never physically deleted.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order.
    ///
    /// Fails with `DuplicateOrder` when the order ID exists, and with
    /// `IdempotencyConflict` when the order carries an idempotency key
    /// already bound to another order.
    async fn create(&self, order: &Order) -> Result<()>;

    /// Retrieves an order by ID. Returns `None` if it does not exist.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Looks up the order bound to a client idempotency key, if any.
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>>;

    /// Transitions the order's status, conditional on the expected current
    /// status and on state-machine legality. Bumps `updated_at` and records
    /// `failure_reason` when moving to `Failed`.
    ///
    /// Returns the updated order.
    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        failure_reason: Option<String>,
    ) -> Result<Order>;

    /// Records the payment reference produced by a successful payment
    /// reservation, conditional on the expected current status.
    ///
    /// Setting the same reference twice is a no-op (the reservation is
    /// idempotent per order); setting a different one fails with
    /// `PaymentReferenceAlreadySet`.
    async fn set_payment_reference(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        reference: &str,
    ) -> Result<Order>;

    /// Lists orders in a given status, ordered by `created_at` descending.
    async fn query_by_status(&self, query: StatusQuery) -> Result<Vec<Order>>;

    /// Lists the most recently created orders regardless of status,
    /// ordered by `created_at` descending.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Order>>;
}
