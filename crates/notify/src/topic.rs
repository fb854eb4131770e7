//! Publish/subscribe topic with bounded-retry delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PublishError;
use crate::event::StatusEvent;

/// A consumer of status events.
///
/// Subscribers are independent: one subscriber failing never affects
/// delivery to the others, and no subscriber can affect orchestrator
/// state.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Returns the subscriber's name for logging.
    fn name(&self) -> &'static str;

    /// Handles a single status event.
    async fn on_event(&self, event: &StatusEvent) -> Result<(), PublishError>;
}

/// Result of one publish call across all subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOutcome {
    /// Subscribers that accepted the event.
    pub delivered: usize,

    /// Subscribers that did not accept the event within the retry budget.
    pub failed: usize,
}

/// Fan-out topic for status events.
///
/// Publishing is fire-and-forget from the caller's perspective: transient
/// subscriber failures are retried up to `max_attempts`, anything still
/// failing is logged and counted, and `publish` itself never fails.
pub struct NotificationTopic {
    subscribers: Vec<Arc<dyn Subscriber>>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl Default for NotificationTopic {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationTopic {
    /// Creates an empty topic with the default retry budget (3 attempts,
    /// 100ms between them).
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            max_attempts: 3,
            retry_delay: Duration::from_millis(100),
        }
    }

    /// Overrides the per-subscriber retry budget.
    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Registers a subscriber.
    pub fn subscribe(&mut self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Delivers an event to every subscriber, retrying transient failures.
    pub async fn publish(&self, event: &StatusEvent) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();

        for subscriber in &self.subscribers {
            if self.deliver(subscriber.as_ref(), event).await {
                outcome.delivered += 1;
            } else {
                outcome.failed += 1;
            }
        }

        metrics::counter!("notifications_published_total").increment(outcome.delivered as u64);
        if outcome.failed > 0 {
            metrics::counter!("notification_failures_total").increment(outcome.failed as u64);
        }
        outcome
    }

    async fn deliver(&self, subscriber: &dyn Subscriber, event: &StatusEvent) -> bool {
        for attempt in 1..=self.max_attempts {
            match subscriber.on_event(event).await {
                Ok(()) => return true,
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    tracing::debug!(
                        subscriber = subscriber.name(),
                        %event.order_id,
                        attempt,
                        error = %e,
                        "transient publish failure, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        %event.order_id,
                        status = %event.status,
                        attempt,
                        error = %e,
                        "dropping status event for subscriber"
                    );
                    return false;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::RecordingSubscriber;
    use common::OrderId;
    use domain::OrderStatus;

    fn fast_topic() -> NotificationTopic {
        NotificationTopic::new().with_retry(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let mut topic = fast_topic();
        let a = Arc::new(RecordingSubscriber::new("sub-a"));
        let b = Arc::new(RecordingSubscriber::new("sub-b"));
        topic.subscribe(a.clone());
        topic.subscribe(b.clone());

        let event = StatusEvent::new(OrderId::new(), OrderStatus::Completed);
        let outcome = topic.publish(&event).await;

        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(a.event_count(), 1);
        assert_eq!(b.event_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let mut topic = fast_topic();
        let flaky = Arc::new(RecordingSubscriber::new("flaky"));
        flaky.fail_transiently(2);
        topic.subscribe(flaky.clone());

        let event = StatusEvent::new(OrderId::new(), OrderStatus::Processing);
        let outcome = topic.publish(&event).await;

        assert_eq!(outcome.delivered, 1);
        assert_eq!(flaky.attempt_count(), 3);
        assert_eq!(flaky.event_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_never_propagate() {
        let mut topic = fast_topic();
        let broken = Arc::new(RecordingSubscriber::new("broken"));
        broken.fail_transiently(u32::MAX);
        topic.subscribe(broken.clone());

        let event = StatusEvent::new(OrderId::new(), OrderStatus::Failed);
        let outcome = topic.publish(&event).await;

        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.failed, 1);
        assert_eq!(broken.attempt_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let mut topic = fast_topic();
        let rejecting = Arc::new(RecordingSubscriber::new("rejecting"));
        rejecting.fail_permanently(true);
        topic.subscribe(rejecting.clone());

        let event = StatusEvent::new(OrderId::new(), OrderStatus::Completed);
        let outcome = topic.publish(&event).await;

        assert_eq!(outcome.failed, 1);
        assert_eq!(rejecting.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_affect_others() {
        let mut topic = fast_topic();
        let broken = Arc::new(RecordingSubscriber::new("broken"));
        broken.fail_permanently(true);
        let healthy = Arc::new(RecordingSubscriber::new("healthy"));
        topic.subscribe(broken);
        topic.subscribe(healthy.clone());

        let event = StatusEvent::new(OrderId::new(), OrderStatus::Completed);
        let outcome = topic.publish(&event).await;

        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(healthy.event_count(), 1);
    }
}
