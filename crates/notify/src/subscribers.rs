//! Concrete subscribers: customer messaging and analytics.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;
use domain::OrderStatus;

use crate::error::PublishError;
use crate::event::StatusEvent;
use crate::topic::Subscriber;

/// A customer-facing message produced from a status event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// The order the message is about.
    pub order_id: OrderId,

    /// Message subject line.
    pub subject: String,

    /// Message body.
    pub body: String,
}

/// Formats order-update messages for customers.
///
/// Stands in for a real email/SMS gateway; messages are recorded in memory
/// so tests can assert on what would have been sent.
#[derive(Debug, Clone, Default)]
pub struct CustomerMessenger {
    sent: Arc<RwLock<Vec<OutboundMessage>>>,
}

impl CustomerMessenger {
    /// Creates a new customer messenger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of messages sent.
    pub fn sent_count(&self) -> usize {
        self.sent.read().unwrap().len()
    }

    /// Returns all messages sent for an order.
    pub fn messages_for(&self, order_id: OrderId) -> Vec<OutboundMessage> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.order_id == order_id)
            .cloned()
            .collect()
    }

    fn subject_for(status: OrderStatus) -> &'static str {
        match status {
            OrderStatus::Pending => "Order received",
            OrderStatus::Processing => "Order processing started",
            OrderStatus::Completed => "Order completed",
            OrderStatus::Failed => "Order failed",
            OrderStatus::Cancelled => "Order cancelled",
        }
    }
}

#[async_trait]
impl Subscriber for CustomerMessenger {
    fn name(&self) -> &'static str {
        "customer-messenger"
    }

    async fn on_event(&self, event: &StatusEvent) -> Result<(), PublishError> {
        let mut body = format!("Order {} is now {}.", event.order_id, event.status);
        if let Some(ref reason) = event.failure_reason {
            body.push_str(&format!(" Reason: {reason}."));
        }

        self.sent.write().unwrap().push(OutboundMessage {
            order_id: event.order_id,
            subject: Self::subject_for(event.status).to_string(),
            body,
        });
        Ok(())
    }
}

/// Tallies status transitions for dashboards.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsRecorder {
    counts: Arc<RwLock<HashMap<OrderStatus, u64>>>,
}

impl AnalyticsRecorder {
    /// Creates a new analytics recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many transitions into `status` have been observed.
    pub fn count_for(&self, status: OrderStatus) -> u64 {
        self.counts
            .read()
            .unwrap()
            .get(&status)
            .copied()
            .unwrap_or(0)
    }

    /// Returns the total number of observed transitions.
    pub fn total(&self) -> u64 {
        self.counts.read().unwrap().values().sum()
    }
}

#[async_trait]
impl Subscriber for AnalyticsRecorder {
    fn name(&self) -> &'static str {
        "analytics-recorder"
    }

    async fn on_event(&self, event: &StatusEvent) -> Result<(), PublishError> {
        *self.counts.write().unwrap().entry(event.status).or_insert(0) += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    events: Vec<StatusEvent>,
    attempts: u32,
    transient_failures_left: u32,
    fail_permanently: bool,
}

/// Test subscriber that records events and can be scripted to fail.
#[derive(Debug, Clone)]
pub struct RecordingSubscriber {
    name: &'static str,
    state: Arc<RwLock<RecordingState>>,
}

impl RecordingSubscriber {
    /// Creates a new recording subscriber.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(RwLock::new(RecordingState::default())),
        }
    }

    /// Makes the next `count` deliveries fail transiently.
    pub fn fail_transiently(&self, count: u32) {
        self.state.write().unwrap().transient_failures_left = count;
    }

    /// Makes every delivery fail permanently.
    pub fn fail_permanently(&self, fail: bool) {
        self.state.write().unwrap().fail_permanently = fail;
    }

    /// Returns the number of delivery attempts observed.
    pub fn attempt_count(&self) -> u32 {
        self.state.read().unwrap().attempts
    }

    /// Returns the number of events accepted.
    pub fn event_count(&self) -> usize {
        self.state.read().unwrap().events.len()
    }

    /// Returns all accepted events.
    pub fn events(&self) -> Vec<StatusEvent> {
        self.state.read().unwrap().events.clone()
    }

    /// Returns the statuses of accepted events, in delivery order.
    pub fn statuses(&self) -> Vec<OrderStatus> {
        self.state
            .read()
            .unwrap()
            .events
            .iter()
            .map(|e| e.status)
            .collect()
    }
}

#[async_trait]
impl Subscriber for RecordingSubscriber {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn on_event(&self, event: &StatusEvent) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap();
        state.attempts += 1;

        if state.fail_permanently {
            return Err(PublishError::Permanent("subscriber rejected event".into()));
        }
        if state.transient_failures_left > 0 {
            state.transient_failures_left -= 1;
            return Err(PublishError::Transient("subscriber timed out".into()));
        }

        state.events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_customer_messenger_formats_failure_reason() {
        let messenger = CustomerMessenger::new();
        let order_id = OrderId::new();

        let event = StatusEvent::new(order_id, OrderStatus::Failed)
            .with_failure_reason("Insufficient stock");
        messenger.on_event(&event).await.unwrap();

        let messages = messenger.messages_for(order_id);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].subject, "Order failed");
        assert!(messages[0].body.contains("Insufficient stock"));
    }

    #[tokio::test]
    async fn test_customer_messenger_per_order_lookup() {
        let messenger = CustomerMessenger::new();
        let order_a = OrderId::new();
        let order_b = OrderId::new();

        messenger
            .on_event(&StatusEvent::new(order_a, OrderStatus::Processing))
            .await
            .unwrap();
        messenger
            .on_event(&StatusEvent::new(order_b, OrderStatus::Completed))
            .await
            .unwrap();

        assert_eq!(messenger.sent_count(), 2);
        assert_eq!(messenger.messages_for(order_a).len(), 1);
        assert_eq!(
            messenger.messages_for(order_b)[0].subject,
            "Order completed"
        );
    }

    #[tokio::test]
    async fn test_analytics_recorder_tallies_by_status() {
        let analytics = AnalyticsRecorder::new();

        for _ in 0..3 {
            analytics
                .on_event(&StatusEvent::new(OrderId::new(), OrderStatus::Completed))
                .await
                .unwrap();
        }
        analytics
            .on_event(&StatusEvent::new(OrderId::new(), OrderStatus::Failed))
            .await
            .unwrap();

        assert_eq!(analytics.count_for(OrderStatus::Completed), 3);
        assert_eq!(analytics.count_for(OrderStatus::Failed), 1);
        assert_eq!(analytics.count_for(OrderStatus::Pending), 0);
        assert_eq!(analytics.total(), 4);
    }

    #[tokio::test]
    async fn test_recording_subscriber_failure_script() {
        let sub = RecordingSubscriber::new("scripted");
        sub.fail_transiently(1);

        let event = StatusEvent::new(OrderId::new(), OrderStatus::Processing);
        assert!(sub.on_event(&event).await.unwrap_err().is_transient());
        assert!(sub.on_event(&event).await.is_ok());
        assert_eq!(sub.attempt_count(), 2);
        assert_eq!(sub.event_count(), 1);
    }
}
