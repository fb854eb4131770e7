//! Dead-letter quarantine for messages that exhausted their redelivery
//! budget.
//!
//! Quarantined messages are kept with the reason they were pulled aside so
//! an operator can root-cause and manually replay them. Nothing is ever
//! auto-replayed or silently dropped.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::Result;
use crate::message::{OrderMessage, ReceivedMessage};

/// A quarantined message plus the evidence an operator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// Identifier for operator addressing (listing, replay).
    pub id: Uuid,

    /// The original message as it was enqueued.
    pub message: OrderMessage,

    /// How many deliveries the message consumed before quarantine.
    pub receive_count: u32,

    /// When the first processing failure was recorded.
    pub first_failure_at: DateTime<Utc>,

    /// The last error observed while processing the message.
    pub last_error: String,

    /// When the message was quarantined.
    pub quarantined_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    /// Builds a record from an exhausted delivery.
    ///
    /// Falls back to the quarantine time and a generic reason when the
    /// message never recorded an explicit failure (e.g. every attempt died
    /// mid-lease without a nack).
    pub fn from_received(received: &ReceivedMessage) -> Self {
        let quarantined_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            message: received.message.clone(),
            receive_count: received.receive_count,
            first_failure_at: received.first_failure_at.unwrap_or(quarantined_at),
            last_error: received
                .last_error
                .clone()
                .unwrap_or_else(|| "processing never completed within the lease".to_string()),
            quarantined_at,
        }
    }
}

/// Durable, inspectable store of quarantined messages.
#[async_trait]
pub trait DeadLetterQueue: Send + Sync {
    /// Quarantines a message.
    async fn push(&self, record: DeadLetterRecord) -> Result<()>;

    /// Lists all quarantined messages, oldest first.
    async fn list(&self) -> Result<Vec<DeadLetterRecord>>;

    /// Removes and returns a record for manual replay.
    ///
    /// Returns `None` if the record does not exist (e.g. it was already
    /// replayed by another operator).
    async fn take(&self, id: Uuid) -> Result<Option<DeadLetterRecord>>;
}

/// In-memory dead-letter queue.
#[derive(Clone, Default)]
pub struct InMemoryDeadLetterQueue {
    records: Arc<RwLock<Vec<DeadLetterRecord>>>,
}

impl InMemoryDeadLetterQueue {
    /// Creates a new empty dead-letter queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of quarantined messages.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if nothing is quarantined.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DeadLetterQueue for InMemoryDeadLetterQueue {
    async fn push(&self, record: DeadLetterRecord) -> Result<()> {
        tracing::warn!(
            %record.message.order_id,
            receive_count = record.receive_count,
            last_error = %record.last_error,
            "message quarantined to dead-letter queue"
        );
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DeadLetterRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn take(&self, id: Uuid) -> Result<Option<DeadLetterRecord>> {
        let mut records = self.records.write().await;
        let index = records.iter().position(|r| r.id == id);
        Ok(index.map(|i| records.remove(i)))
    }
}
