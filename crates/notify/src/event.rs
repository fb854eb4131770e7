//! Status change event.

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::OrderStatus;
use serde::{Deserialize, Serialize};

/// One event per order status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// The order whose status changed.
    pub order_id: OrderId,

    /// The status the order transitioned into.
    pub status: OrderStatus,

    /// When the transition was observed.
    pub timestamp: DateTime<Utc>,

    /// Failure reason, present only for `Failed` transitions.
    pub failure_reason: Option<String>,
}

impl StatusEvent {
    /// Creates an event for a status transition happening now.
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            order_id,
            status,
            timestamp: Utc::now(),
            failure_reason: None,
        }
    }

    /// Attaches the failure reason for a `Failed` transition.
    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}
