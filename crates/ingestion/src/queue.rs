//! Core trait and configuration for the ingestion queue.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::message::{OrderMessage, ReceiptHandle, ReceivedMessage};

/// Queue tuning knobs.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum messages returned by a single receive call.
    pub batch_size: usize,

    /// How long a received message stays invisible to other consumers.
    /// Must exceed the worst-case processing time of one order through the
    /// full workflow, capability retries included.
    pub visibility_timeout: Duration,

    /// Deliveries allowed before a message is quarantined.
    pub max_receive_count: u32,

    /// How long a consumer sleeps when a receive returns nothing.
    pub poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            visibility_timeout: Duration::from_secs(180),
            max_receive_count: 3,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Buffer of order-processing messages with at-least-once delivery.
///
/// Receiving a message leases it: it becomes invisible to other consumers
/// until the visibility timeout elapses, then reappears with an
/// incremented receive count and a fresh receipt. The lease is a soft
/// mutual-exclusion mechanism, not a mutex; consumers must stay correct
/// under occasional overlap.
#[async_trait]
pub trait IngestionQueue: Send + Sync {
    /// Enqueues a message for processing.
    async fn send(&self, message: OrderMessage) -> Result<()>;

    /// Receives up to `max_messages` currently visible messages, leasing
    /// each for the visibility timeout.
    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>>;

    /// Acknowledges a delivery, removing the message permanently.
    ///
    /// Only called once the order reached a terminal status durably.
    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()>;

    /// Releases a delivery early, making the message immediately visible
    /// again and recording the processing error for the eventual
    /// dead-letter record.
    async fn nack(&self, receipt: &ReceiptHandle, error: &str) -> Result<()>;
}
