//! Order intake: validated creation, enqueue, idempotent replay and
//! pre-payment cancellation.

use std::sync::Arc;

use common::OrderId;
use domain::{NewOrder, Order, OrderError, OrderStatus};
use ingestion::{IngestionQueue, OrderMessage};
use notify::{NotificationTopic, StatusEvent};
use order_store::{OrderStore, OrderStoreError};

use crate::error::IntakeError;

/// Ingress-facing service: accepts validated order submissions, persists
/// them as `Pending` and enqueues them for asynchronous processing.
///
/// Callers only ever see validation errors synchronously; every
/// downstream processing failure surfaces through the order's status and
/// failure reason.
pub struct OrderIntake<S, Q>
where
    S: OrderStore,
    Q: IngestionQueue,
{
    store: S,
    queue: Q,
    topic: Arc<NotificationTopic>,
}

impl<S, Q> OrderIntake<S, Q>
where
    S: OrderStore,
    Q: IngestionQueue,
{
    /// Creates a new intake service.
    pub fn new(store: S, queue: Q, topic: Arc<NotificationTopic>) -> Self {
        Self {
            store,
            queue,
            topic,
        }
    }

    /// Accepts an order submission.
    ///
    /// Re-submitting with an already-seen idempotency key returns the
    /// original order without creating a second row or enqueuing a second
    /// message.
    #[tracing::instrument(skip(self, request))]
    pub async fn submit(&self, request: NewOrder) -> Result<Order, IntakeError> {
        if let Some(ref key) = request.idempotency_key
            && let Some(existing) = self.store.find_by_idempotency_key(key).await?
        {
            tracing::info!(%existing.order_id, key = %key, "idempotent replay of order submission");
            return Ok(existing);
        }

        let order = Order::create(request)?;

        match self.store.create(&order).await {
            Ok(()) => {}
            // Two submissions raced on the same key; the first insert won.
            Err(OrderStoreError::IdempotencyConflict { existing, .. }) => {
                return self
                    .store
                    .get(existing)
                    .await?
                    .ok_or(IntakeError::NotFound(existing));
            }
            Err(e) => return Err(e.into()),
        }

        self.queue
            .send(OrderMessage::new(order.order_id, order.created_at))
            .await?;

        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("order_value_cents").record(order.total_amount.cents() as f64);
        tracing::info!(
            %order.order_id,
            total = %order.total_amount,
            items = order.items.len(),
            "order accepted"
        );

        Ok(order)
    }

    /// Cancels an order that has not progressed past the cancellable
    /// window (pre-payment, non-terminal).
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order, IntakeError> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or(IntakeError::NotFound(order_id))?;

        if !order.can_cancel() {
            return Err(IntakeError::Validation(OrderError::NotCancellable {
                reason: if order.payment_reference.is_some() {
                    "payment already captured".to_string()
                } else {
                    format!("order is {}", order.status)
                },
            }));
        }

        let cancelled = self
            .store
            .update_status(order_id, order.status, OrderStatus::Cancelled, None)
            .await?;

        tracing::info!(%order_id, "order cancelled");
        self.topic
            .publish(&StatusEvent::new(order_id, OrderStatus::Cancelled))
            .await;

        Ok(cancelled)
    }
}
