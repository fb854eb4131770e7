//! Workflow orchestrator driving orders through the state machine.

use std::sync::Arc;

use common::OrderId;
use domain::{Order, OrderStatus, validate_items};
use notify::{NotificationTopic, StatusEvent};
use order_store::OrderStore;

use crate::capabilities::{InventoryCapability, PaymentCapability};
use crate::error::{StepFailure, WorkflowError};
use crate::retry::RetryPolicy;
use crate::step::WorkflowStep;

/// Drives one order at a time through
/// Validate → ReservePayment → ReserveInventory → Complete, with
/// CompensatePayment → MarkFailed on the failure edge.
///
/// The orchestrator owns no in-flight state: every call re-reads the
/// persisted order and resumes from the step its fields imply, so the
/// queue's at-least-once redelivery is safe. All status writes are
/// conditional on the status this call last observed.
pub struct Orchestrator<S, P, I>
where
    S: OrderStore,
    P: PaymentCapability,
    I: InventoryCapability,
{
    store: S,
    payment: P,
    inventory: I,
    topic: Arc<NotificationTopic>,
    retry: RetryPolicy,
}

impl<S, P, I> Orchestrator<S, P, I>
where
    S: OrderStore,
    P: PaymentCapability,
    I: InventoryCapability,
{
    /// Creates a new orchestrator with the default retry policy.
    pub fn new(store: S, payment: P, inventory: I, topic: Arc<NotificationTopic>) -> Self {
        Self {
            store,
            payment,
            inventory,
            topic,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the capability retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Processes one order to a terminal status.
    ///
    /// Returns the terminal status reached. An `Err` means the attempt was
    /// aborted by a system error (store unavailable, conditional write
    /// lost); the caller releases the message and queue redelivery retries
    /// later.
    #[tracing::instrument(skip(self), fields(workflow = "order_processing"))]
    pub async fn process(&self, order_id: OrderId) -> Result<OrderStatus, WorkflowError> {
        metrics::counter!("workflow_executions_total").increment(1);
        let started = std::time::Instant::now();

        let mut order = self
            .store
            .get(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;

        let terminal = loop {
            let step = WorkflowStep::for_order(&order);
            tracing::debug!(step = %step, status = %order.status, "executing workflow step");

            match step {
                WorkflowStep::AlreadyTerminal => break order.status,
                WorkflowStep::Validate => {
                    order = self.validate(order).await?;
                }
                WorkflowStep::ReservePayment => {
                    order = self.reserve_payment(order).await?;
                }
                WorkflowStep::ReserveInventory => {
                    order = self.reserve_inventory(order).await?;
                }
            }
        };

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("workflow_duration_seconds").record(duration);
        tracing::info!(status = %terminal, duration, "order reached terminal status");

        Ok(terminal)
    }

    /// Validate step: check the item list and claim the order for
    /// processing. No compensation is needed on failure because no
    /// payment has been taken yet.
    async fn validate(&self, order: Order) -> Result<Order, WorkflowError> {
        match validate_items(&order.items) {
            Ok(()) => self.transition(order, OrderStatus::Processing, None).await,
            Err(e) => {
                // Failed is only reachable from Processing, so the claim
                // happens first even for an invalid order.
                let order = self.transition(order, OrderStatus::Processing, None).await?;
                tracing::info!(%order.order_id, error = %e, "order failed validation");
                self.mark_failed(order, format!("Validation failed: {e}"))
                    .await
            }
        }
    }

    /// ReservePayment step. On success the payment reference is persisted
    /// before anything else happens, which is what makes redelivery skip
    /// this step. On failure the order fails without compensation;
    /// nothing was captured.
    async fn reserve_payment(&self, order: Order) -> Result<Order, WorkflowError> {
        // Validation is pure; re-checking guards the crash window between
        // the claim and a validation-failure MarkFailed.
        if let Err(e) = validate_items(&order.items) {
            return self
                .mark_failed(order, format!("Validation failed: {e}"))
                .await;
        }

        let result = self
            .retry
            .run("reserve_payment", || {
                self.payment
                    .reserve(order.order_id, order.customer_id, order.total_amount)
            })
            .await;

        match result {
            Ok(authorization) => {
                let order = self
                    .store
                    .set_payment_reference(
                        order.order_id,
                        OrderStatus::Processing,
                        &authorization.reference,
                    )
                    .await?;
                tracing::info!(
                    %order.order_id,
                    reference = %authorization.reference,
                    "payment reserved"
                );
                Ok(order)
            }
            Err(failure) => {
                self.log_step_failure("reserve_payment", &failure);
                let reason = failure_reason("Payment reservation", &failure);
                self.mark_failed(order, reason).await
            }
        }
    }

    /// ReserveInventory step. Failure routes through CompensatePayment:
    /// the stored payment reference is refunded before the order may fail.
    async fn reserve_inventory(&self, order: Order) -> Result<Order, WorkflowError> {
        let result = self
            .retry
            .run("reserve_inventory", || {
                self.inventory.reserve(order.order_id, &order.items)
            })
            .await;

        match result {
            Ok(reservation) => {
                tracing::info!(
                    %order.order_id,
                    reservation = %reservation.reservation_id,
                    "inventory reserved"
                );
                let order = self.transition(order, OrderStatus::Completed, None).await?;
                metrics::counter!("workflow_completed").increment(1);
                Ok(order)
            }
            Err(failure) => {
                self.log_step_failure("reserve_inventory", &failure);
                self.compensate_payment(&order).await;
                let reason = failure_reason("Inventory reservation", &failure);
                self.mark_failed(order, reason).await
            }
        }
    }

    /// CompensatePayment step: refund the captured payment. Once started
    /// it runs to a terminal outcome (success or exhausted retries)
    /// before the order may be marked failed. An exhausted refund is
    /// never swallowed silently: it means funds may remain captured
    /// against a failed order.
    async fn compensate_payment(&self, order: &Order) {
        let Some(reference) = order.payment_reference.clone() else {
            return;
        };

        tracing::info!(%order.order_id, reference = %reference, "compensating payment");
        let result = self
            .retry
            .run("compensate_payment", || self.payment.refund(&reference))
            .await;

        match result {
            Ok(receipt) => {
                tracing::info!(
                    %order.order_id,
                    reference = %reference,
                    refund = %receipt.reference,
                    "payment compensated"
                );
            }
            Err(failure) => {
                metrics::counter!("compensation_failures_total").increment(1);
                tracing::error!(
                    %order.order_id,
                    reference = %reference,
                    error = %failure.reason(),
                    "payment compensation failed; funds may remain captured against a failed order"
                );
            }
        }
    }

    /// MarkFailed step: terminal failure write plus failure event.
    async fn mark_failed(&self, order: Order, reason: String) -> Result<Order, WorkflowError> {
        let updated = self
            .store
            .update_status(
                order.order_id,
                order.status,
                OrderStatus::Failed,
                Some(reason.clone()),
            )
            .await?;

        metrics::counter!("workflow_failed").increment(1);
        tracing::warn!(%order.order_id, reason = %reason, "order failed");

        self.publish(
            StatusEvent::new(updated.order_id, OrderStatus::Failed).with_failure_reason(reason),
        )
        .await;
        Ok(updated)
    }

    /// Applies a conditional status transition and publishes the matching
    /// status event once the write is durable.
    async fn transition(
        &self,
        order: Order,
        next: OrderStatus,
        failure_reason: Option<String>,
    ) -> Result<Order, WorkflowError> {
        let updated = self
            .store
            .update_status(order.order_id, order.status, next, failure_reason)
            .await?;
        self.publish(StatusEvent::new(updated.order_id, next)).await;
        Ok(updated)
    }

    /// Fire-and-forget event publish: failures are logged and counted by
    /// the topic, never allowed to block or roll back a transition.
    async fn publish(&self, event: StatusEvent) {
        self.topic.publish(&event).await;
    }

    fn log_step_failure(&self, step: &'static str, failure: &StepFailure) {
        match failure {
            StepFailure::Declined(reason) => {
                tracing::info!(step, reason = %reason, "capability declined, routing to failure edge");
            }
            StepFailure::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::warn!(
                    step,
                    attempts,
                    error = %last_error,
                    "transient retries exhausted, routing to failure edge"
                );
            }
        }
    }
}

/// Renders the failure reason recorded on the order: a decline speaks for
/// itself ("Payment declined"), an exhaustion names the step.
fn failure_reason(step_label: &str, failure: &StepFailure) -> String {
    match failure {
        StepFailure::Declined(reason) => reason.clone(),
        StepFailure::Exhausted { .. } => format!("{step_label} {}", failure.reason()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{InMemoryInventoryService, InMemoryPaymentGateway};
    use domain::{CustomerId, Money, NewOrder, OrderItem};
    use notify::RecordingSubscriber;
    use order_store::InMemoryOrderStore;
    use std::time::Duration;

    struct Harness {
        orchestrator: Orchestrator<InMemoryOrderStore, InMemoryPaymentGateway, InMemoryInventoryService>,
        store: InMemoryOrderStore,
        payment: InMemoryPaymentGateway,
        inventory: InMemoryInventoryService,
        events: Arc<RecordingSubscriber>,
    }

    fn setup() -> Harness {
        let store = InMemoryOrderStore::new();
        let payment = InMemoryPaymentGateway::new();
        let inventory = InMemoryInventoryService::new();

        let events = Arc::new(RecordingSubscriber::new("recorder"));
        let mut topic = NotificationTopic::new().with_retry(3, Duration::from_millis(1));
        topic.subscribe(events.clone());

        let orchestrator = Orchestrator::new(
            store.clone(),
            payment.clone(),
            inventory.clone(),
            Arc::new(topic),
        )
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1), 2.0));

        Harness {
            orchestrator,
            store,
            payment,
            inventory,
            events,
        }
    }

    async fn create_order(store: &InMemoryOrderStore) -> Order {
        let order = Order::create(NewOrder::new(
            CustomerId::new(),
            vec![
                OrderItem::new("SKU-001", 2, Money::from_cents(2999)),
                OrderItem::new("SKU-002", 1, Money::from_cents(4999)),
            ],
        ))
        .unwrap();
        store.create(&order).await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_happy_path() {
        let h = setup();
        let order = create_order(&h.store).await;

        let status = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(status, OrderStatus::Completed);

        let stored = h.store.get(order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
        assert!(stored.payment_reference.is_some());
        assert!(stored.failure_reason.is_none());
        assert_eq!(stored.total_amount.cents(), 10997);

        assert_eq!(h.payment.active_payment_count(), 1);
        assert_eq!(h.inventory.reservation_count(), 1);
        assert_eq!(
            h.events.statuses(),
            vec![OrderStatus::Processing, OrderStatus::Completed]
        );
    }

    #[tokio::test]
    async fn test_payment_declined_fails_without_compensation() {
        let h = setup();
        let order = create_order(&h.store).await;
        h.payment.decline_reserve(true);

        let status = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(status, OrderStatus::Failed);

        let stored = h.store.get(order.order_id).await.unwrap().unwrap();
        assert!(stored.payment_reference.is_none());
        assert!(
            stored
                .failure_reason
                .as_deref()
                .unwrap()
                .contains("Payment declined")
        );

        // No payment taken, so no refund must have been attempted.
        assert_eq!(h.payment.refund_calls(), 0);
        assert_eq!(h.inventory.reserve_calls(), 0);
    }

    #[tokio::test]
    async fn test_out_of_stock_compensates_payment() {
        let h = setup();
        let order = create_order(&h.store).await;
        h.inventory.set_out_of_stock(true);

        let status = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(status, OrderStatus::Failed);

        let stored = h.store.get(order.order_id).await.unwrap().unwrap();
        let reference = stored.payment_reference.clone().unwrap();

        // The refund ran against the stored reference before the order
        // became Failed, and the payment is no longer held.
        let attempts = h.payment.refund_attempts_for(&reference);
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].succeeded);
        assert_eq!(h.payment.active_payment_count(), 0);
        assert!(
            stored
                .failure_reason
                .as_deref()
                .unwrap()
                .contains("Insufficient stock")
        );
    }

    #[tokio::test]
    async fn test_transient_inventory_failures_recover() {
        let h = setup();
        let order = create_order(&h.store).await;
        h.inventory.fail_transiently(2);

        let status = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(status, OrderStatus::Completed);
        // Two timeouts plus the success.
        assert_eq!(h.inventory.reserve_calls(), 3);
    }

    #[tokio::test]
    async fn test_transient_payment_exhaustion_fails_order() {
        let h = setup();
        let order = create_order(&h.store).await;
        h.payment.fail_reserve_transiently(u32::MAX);

        let status = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(status, OrderStatus::Failed);

        let stored = h.store.get(order.order_id).await.unwrap().unwrap();
        assert!(stored.payment_reference.is_none());
        assert!(
            stored
                .failure_reason
                .as_deref()
                .unwrap()
                .contains("failed after 3 attempts")
        );
        assert_eq!(h.payment.reserve_calls(), 3);
    }

    #[tokio::test]
    async fn test_resume_with_payment_reference_skips_reserve() {
        let h = setup();
        let order = create_order(&h.store).await;

        // Simulate a crashed worker that claimed the order and reserved
        // payment before dying.
        h.store
            .update_status(
                order.order_id,
                OrderStatus::Pending,
                OrderStatus::Processing,
                None,
            )
            .await
            .unwrap();
        let auth = h
            .payment
            .reserve(order.order_id, order.customer_id, order.total_amount)
            .await
            .unwrap();
        h.store
            .set_payment_reference(order.order_id, OrderStatus::Processing, &auth.reference)
            .await
            .unwrap();
        let reserve_calls_before = h.payment.reserve_calls();

        let status = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(status, OrderStatus::Completed);
        // Resume never re-invoked the payment capability.
        assert_eq!(h.payment.reserve_calls(), reserve_calls_before);
    }

    #[tokio::test]
    async fn test_terminal_order_is_acknowledged_without_side_effects() {
        let h = setup();
        let order = create_order(&h.store).await;

        let first = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(first, OrderStatus::Completed);
        let reserve_calls = h.payment.reserve_calls();
        let events_before = h.events.event_count();

        // Duplicate delivery: nothing is re-executed, nothing republished.
        let second = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(second, OrderStatus::Completed);
        assert_eq!(h.payment.reserve_calls(), reserve_calls);
        assert_eq!(h.events.event_count(), events_before);
    }

    #[tokio::test]
    async fn test_invalid_order_fails_through_processing() {
        let h = setup();
        // Bypass creation-time validation to model a corrupted row.
        let mut order = Order::create(NewOrder::new(
            CustomerId::new(),
            vec![OrderItem::new("SKU-001", 1, Money::from_cents(100))],
        ))
        .unwrap();
        order.items[0].quantity = 0;
        h.store.create(&order).await.unwrap();

        let status = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(status, OrderStatus::Failed);

        let stored = h.store.get(order.order_id).await.unwrap().unwrap();
        assert!(
            stored
                .failure_reason
                .as_deref()
                .unwrap()
                .starts_with("Validation failed")
        );
        // The order passed through Processing on its way to Failed.
        assert_eq!(
            h.events.statuses(),
            vec![OrderStatus::Processing, OrderStatus::Failed]
        );
        assert_eq!(h.payment.reserve_calls(), 0);
    }

    #[tokio::test]
    async fn test_compensation_failure_still_fails_order() {
        let h = setup();
        let order = create_order(&h.store).await;
        h.inventory.set_out_of_stock(true);
        h.payment.fail_refund_transiently(u32::MAX);

        let status = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(status, OrderStatus::Failed);

        let stored = h.store.get(order.order_id).await.unwrap().unwrap();
        let reference = stored.payment_reference.clone().unwrap();

        // All refund attempts were recorded even though none succeeded.
        let attempts = h.payment.refund_attempts_for(&reference);
        assert_eq!(attempts.len(), 3);
        assert!(attempts.iter().all(|a| !a.succeeded));
        assert!(h.payment.has_payment(&reference));
    }

    #[tokio::test]
    async fn test_missing_order_is_a_system_error() {
        let h = setup();
        let result = h.orchestrator.process(OrderId::new()).await;
        assert!(matches!(result, Err(WorkflowError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancelled_order_is_left_alone() {
        let h = setup();
        let order = create_order(&h.store).await;
        h.store
            .update_status(
                order.order_id,
                OrderStatus::Pending,
                OrderStatus::Cancelled,
                None,
            )
            .await
            .unwrap();

        let status = h.orchestrator.process(order.order_id).await.unwrap();
        assert_eq!(status, OrderStatus::Cancelled);
        assert_eq!(h.payment.reserve_calls(), 0);
    }
}
