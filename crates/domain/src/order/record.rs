//! The order record and creation-time validation.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

use super::{CustomerId, Money, OrderItem, OrderStatus};

/// A validated order-creation request.
///
/// Produced by the ingress boundary and turned into an [`Order`] exactly
/// once; the idempotency key makes repeated submissions of the same
/// logical request safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Customer placing the order.
    pub customer_id: CustomerId,

    /// Items requested, in submission order.
    pub items: Vec<OrderItem>,

    /// Optional client-supplied idempotency key.
    pub idempotency_key: Option<String>,
}

impl NewOrder {
    /// Creates a new order request.
    pub fn new(customer_id: CustomerId, items: Vec<OrderItem>) -> Self {
        Self {
            customer_id,
            items,
            idempotency_key: None,
        }
    }

    /// Attaches an idempotency key to the request.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// The persisted order record.
///
/// `order_id`, `created_at`, `customer_id`, `items` and `total_amount` are
/// immutable after creation. `total_amount` is computed exactly once; a
/// later refund is a capability-side ledger entry, never a mutation of the
/// total. Only the orchestration path mutates `status`, `updated_at`,
/// `payment_reference` and `failure_reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub order_id: OrderId,

    /// Creation timestamp; also the sort key for chronological listings.
    pub created_at: DateTime<Utc>,

    /// Customer who placed the order.
    pub customer_id: CustomerId,

    /// Items in the order.
    pub items: Vec<OrderItem>,

    /// Total amount, computed at creation as Σ quantity × unit price.
    pub total_amount: Money,

    /// Current status in the state machine.
    pub status: OrderStatus,

    /// Bumped on every status transition.
    pub updated_at: DateTime<Utc>,

    /// Set once payment reservation succeeds; required before any
    /// compensation can run.
    pub payment_reference: Option<String>,

    /// Set only when the order fails.
    pub failure_reason: Option<String>,

    /// Client-supplied idempotency key, if any.
    pub idempotency_key: Option<String>,
}

/// Validates an item list against the creation rules: non-empty, positive
/// quantities, non-negative prices.
pub fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::NoItems);
    }
    for item in items {
        if item.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id.to_string(),
                quantity: item.quantity,
            });
        }
        if item.unit_price.is_negative() {
            return Err(OrderError::InvalidPrice {
                product_id: item.product_id.to_string(),
                cents: item.unit_price.cents(),
            });
        }
    }
    Ok(())
}

/// Computes the order total as Σ quantity × unit price.
pub fn total_of(items: &[OrderItem]) -> Money {
    items
        .iter()
        .fold(Money::zero(), |acc, item| acc + item.total_price())
}

impl Order {
    /// Creates a new order in `Pending` status from a validated request.
    ///
    /// Fails with a client error when the item list is empty or any
    /// quantity/price is invalid.
    pub fn create(request: NewOrder) -> Result<Order, OrderError> {
        validate_items(&request.items)?;

        let now = Utc::now();
        let total_amount = total_of(&request.items);

        Ok(Order {
            order_id: OrderId::new(),
            created_at: now,
            customer_id: request.customer_id,
            items: request.items,
            total_amount,
            status: OrderStatus::Pending,
            updated_at: now,
            payment_reference: None,
            failure_reason: None,
            idempotency_key: request.idempotency_key,
        })
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if the order can still be cancelled: it must be in a
    /// cancellable status and no payment may have been captured.
    pub fn can_cancel(&self) -> bool {
        self.status.can_cancel() && self.payment_reference.is_none()
    }

    /// Applies a status transition, bumping `updated_at` and recording the
    /// failure reason when moving to `Failed`.
    ///
    /// The caller (the store's conditional update) is responsible for the
    /// optimistic-concurrency check; this method enforces state-machine
    /// legality only.
    pub fn apply_transition(
        &mut self,
        next: OrderStatus,
        failure_reason: Option<String>,
    ) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next == OrderStatus::Failed {
            self.failure_reason = failure_reason;
        }
        Ok(())
    }
}
