//! Queue message types.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message enqueued when an order is accepted for processing.
///
/// Deliberately minimal: the consumer re-reads the authoritative order
/// record from the store, so a stale or duplicate delivery carries no
/// state worth trusting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMessage {
    /// The order to process.
    pub order_id: OrderId,

    /// Creation timestamp of the order.
    pub created_at: DateTime<Utc>,
}

impl OrderMessage {
    /// Creates a new order message.
    pub fn new(order_id: OrderId, created_at: DateTime<Utc>) -> Self {
        Self {
            order_id,
            created_at,
        }
    }
}

/// Opaque handle identifying one delivery (lease) of a message.
///
/// A fresh handle is issued on every delivery; handles from an expired
/// lease are rejected by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptHandle(Uuid);

impl ReceiptHandle {
    /// Creates a new random receipt handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ReceiptHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message delivered to a consumer together with its delivery metadata.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// The message payload.
    pub message: OrderMessage,

    /// Lease handle for acknowledging or releasing this delivery.
    pub receipt: ReceiptHandle,

    /// How many times this message has been delivered, this one included.
    pub receive_count: u32,

    /// When the first processing failure was recorded, if any.
    pub first_failure_at: Option<DateTime<Utc>>,

    /// The most recent processing error recorded via nack, if any.
    pub last_error: Option<String>,
}
