use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::message::{OrderMessage, ReceiptHandle, ReceivedMessage};
use crate::queue::IngestionQueue;
use crate::{QueueError, Result};

struct Entry {
    message: OrderMessage,
    receive_count: u32,
    visible_at: Instant,
    lease: Option<ReceiptHandle>,
    first_failure_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// In-memory ingestion queue for testing and single-process deployments.
///
/// Provides the same lease semantics as a hosted queue service: each
/// delivery hides the message for the visibility timeout and issues a
/// fresh receipt; stale receipts are rejected.
#[derive(Clone)]
pub struct InMemoryQueue {
    entries: Arc<RwLock<Vec<Entry>>>,
    visibility_timeout: Duration,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(180))
    }
}

impl InMemoryQueue {
    /// Creates a new empty queue with the given visibility timeout.
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            visibility_timeout,
        }
    }

    /// Returns the number of messages in the queue, leased ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the queue holds no messages at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Returns the number of currently leased (invisible) messages.
    pub async fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.visible_at > now)
            .count()
    }
}

#[async_trait]
impl IngestionQueue for InMemoryQueue {
    async fn send(&self, message: OrderMessage) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.push(Entry {
            message,
            receive_count: 0,
            visible_at: Instant::now(),
            lease: None,
            first_failure_at: None,
            last_error: None,
        });
        metrics::counter!("queue_messages_sent_total").increment(1);
        Ok(())
    }

    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut received = Vec::new();

        for entry in entries.iter_mut() {
            if received.len() >= max_messages {
                break;
            }
            if entry.visible_at > now {
                continue;
            }

            let receipt = ReceiptHandle::new();
            entry.receive_count += 1;
            entry.visible_at = now + self.visibility_timeout;
            entry.lease = Some(receipt);

            received.push(ReceivedMessage {
                message: entry.message.clone(),
                receipt,
                receive_count: entry.receive_count,
                first_failure_at: entry.first_failure_at,
                last_error: entry.last_error.clone(),
            });
        }

        Ok(received)
    }

    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()> {
        let mut entries = self.entries.write().await;
        let index = entries
            .iter()
            .position(|e| e.lease == Some(*receipt))
            .ok_or(QueueError::ReceiptNotFound(*receipt))?;
        entries.swap_remove(index);
        metrics::counter!("queue_messages_deleted_total").increment(1);
        Ok(())
    }

    async fn nack(&self, receipt: &ReceiptHandle, error: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.lease == Some(*receipt))
            .ok_or(QueueError::ReceiptNotFound(*receipt))?;

        entry.visible_at = Instant::now();
        entry.lease = None;
        entry.first_failure_at.get_or_insert_with(Utc::now);
        entry.last_error = Some(error.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    fn make_message() -> OrderMessage {
        OrderMessage::new(OrderId::new(), Utc::now())
    }

    fn short_visibility() -> InMemoryQueue {
        InMemoryQueue::new(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let queue = short_visibility();
        let message = make_message();
        queue.send(message.clone()).await.unwrap();

        let received = queue.receive(10).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].message, message);
        assert_eq!(received[0].receive_count, 1);
    }

    #[tokio::test]
    async fn test_received_message_is_invisible_until_timeout() {
        let queue = short_visibility();
        queue.send(make_message()).await.unwrap();

        let first = queue.receive(10).await.unwrap();
        assert_eq!(first.len(), 1);

        // Within the visibility window the message is leased out.
        assert!(queue.receive(10).await.unwrap().is_empty());
        assert_eq!(queue.in_flight().await, 1);

        // After the window it reappears with a bumped receive count and a
        // fresh receipt.
        tokio::time::sleep(Duration::from_millis(70)).await;
        let second = queue.receive(10).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].receive_count, 2);
        assert_ne!(second[0].receipt, first[0].receipt);
    }

    #[tokio::test]
    async fn test_delete_acknowledges_message() {
        let queue = short_visibility();
        queue.send(make_message()).await.unwrap();

        let received = queue.receive(10).await.unwrap();
        queue.delete(&received[0].receipt).await.unwrap();

        assert!(queue.is_empty().await);
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(queue.receive(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_receipt_is_rejected() {
        let queue = short_visibility();
        queue.send(make_message()).await.unwrap();

        let first = queue.receive(10).await.unwrap();
        tokio::time::sleep(Duration::from_millis(70)).await;
        let second = queue.receive(10).await.unwrap();
        assert_eq!(second.len(), 1);

        // The original lease expired; its receipt must not delete the
        // message out from under the new holder.
        let err = queue.delete(&first[0].receipt).await.unwrap_err();
        assert!(matches!(err, QueueError::ReceiptNotFound(_)));

        queue.delete(&second[0].receipt).await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_nack_makes_message_immediately_visible() {
        let queue = InMemoryQueue::new(Duration::from_secs(300));
        queue.send(make_message()).await.unwrap();

        let received = queue.receive(10).await.unwrap();
        queue
            .nack(&received[0].receipt, "store unavailable")
            .await
            .unwrap();

        let again = queue.receive(10).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].receive_count, 2);
        assert_eq!(again[0].last_error.as_deref(), Some("store unavailable"));
        assert!(again[0].first_failure_at.is_some());
    }

    #[tokio::test]
    async fn test_first_failure_timestamp_is_sticky() {
        let queue = InMemoryQueue::new(Duration::from_secs(300));
        queue.send(make_message()).await.unwrap();

        let first = queue.receive(10).await.unwrap();
        queue.nack(&first[0].receipt, "error one").await.unwrap();

        let second = queue.receive(10).await.unwrap();
        let first_failure = second[0].first_failure_at.unwrap();
        queue.nack(&second[0].receipt, "error two").await.unwrap();

        let third = queue.receive(10).await.unwrap();
        assert_eq!(third[0].first_failure_at, Some(first_failure));
        assert_eq!(third[0].last_error.as_deref(), Some("error two"));
    }

    #[tokio::test]
    async fn test_receive_respects_batch_size() {
        let queue = short_visibility();
        for _ in 0..5 {
            queue.send(make_message()).await.unwrap();
        }

        let batch = queue.receive(3).await.unwrap();
        assert_eq!(batch.len(), 3);
        let rest = queue.receive(10).await.unwrap();
        assert_eq!(rest.len(), 2);
    }
}
