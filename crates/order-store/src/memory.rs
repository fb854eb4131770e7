use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use domain::{Order, OrderStatus};
use tokio::sync::RwLock;

use crate::{
    OrderStoreError, Result, StatusQuery,
    query::MAX_LIMIT,
    store::OrderStore,
};

/// In-memory order store implementation for testing.
///
/// This implementation stores all orders in memory and provides
/// the same conditional-write semantics as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    idempotency_index: HashMap<String, OrderId>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.orders.contains_key(&order.order_id) {
            return Err(OrderStoreError::DuplicateOrder(order.order_id));
        }

        if let Some(ref key) = order.idempotency_key
            && let Some(&existing) = inner.idempotency_index.get(key)
        {
            return Err(OrderStoreError::IdempotencyConflict {
                key: key.clone(),
                existing,
            });
        }

        if let Some(ref key) = order.idempotency_key {
            inner.idempotency_index.insert(key.clone(), order.order_id);
        }
        inner.orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&order_id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        let inner = self.inner.read().await;
        Ok(inner
            .idempotency_index
            .get(key)
            .and_then(|id| inner.orders.get(id))
            .cloned())
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        failure_reason: Option<String>,
    ) -> Result<Order> {
        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(OrderStoreError::NotFound(order_id))?;

        if order.status != expected {
            return Err(OrderStoreError::StatusConflict {
                order_id,
                expected,
                actual: order.status,
            });
        }

        order.apply_transition(next, failure_reason)?;
        Ok(order.clone())
    }

    async fn set_payment_reference(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        reference: &str,
    ) -> Result<Order> {
        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(OrderStoreError::NotFound(order_id))?;

        if order.status != expected {
            return Err(OrderStoreError::StatusConflict {
                order_id,
                expected,
                actual: order.status,
            });
        }

        match order.payment_reference.as_deref() {
            None => {
                order.payment_reference = Some(reference.to_string());
                Ok(order.clone())
            }
            Some(existing) if existing == reference => Ok(order.clone()),
            Some(_) => Err(OrderStoreError::PaymentReferenceAlreadySet { order_id }),
        }
    }

    async fn query_by_status(&self, query: StatusQuery) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.status == query.status)
            .filter(|o| {
                query
                    .created_before
                    .is_none_or(|cursor| o.created_at < cursor)
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(query.limit.min(MAX_LIMIT));
        Ok(orders)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit.min(MAX_LIMIT));
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CustomerId, Money, NewOrder, OrderItem};

    fn make_order() -> Order {
        Order::create(NewOrder::new(
            CustomerId::new(),
            vec![OrderItem::new("SKU-001", 2, Money::from_cents(1000))],
        ))
        .unwrap()
    }

    fn make_order_with_key(key: &str) -> Order {
        Order::create(
            NewOrder::new(
                CustomerId::new(),
                vec![OrderItem::new("SKU-001", 1, Money::from_cents(500))],
            )
            .with_idempotency_key(key),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryOrderStore::new();
        let order = make_order();

        store.create(&order).await.unwrap();
        let loaded = store.get(order.order_id).await.unwrap().unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemoryOrderStore::new();
        assert!(store.get(OrderId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_order_id() {
        let store = InMemoryOrderStore::new();
        let order = make_order();

        store.create(&order).await.unwrap();
        let err = store.create(&order).await.unwrap_err();
        assert!(matches!(err, OrderStoreError::DuplicateOrder(_)));
    }

    #[tokio::test]
    async fn test_idempotency_key_conflict_names_existing_order() {
        let store = InMemoryOrderStore::new();
        let first = make_order_with_key("key-1");
        let second = make_order_with_key("key-1");

        store.create(&first).await.unwrap();
        let err = store.create(&second).await.unwrap_err();
        match err {
            OrderStoreError::IdempotencyConflict { key, existing } => {
                assert_eq!(key, "key-1");
                assert_eq!(existing, first.order_id);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_idempotency_key() {
        let store = InMemoryOrderStore::new();
        let order = make_order_with_key("key-7");
        store.create(&order).await.unwrap();

        let found = store.find_by_idempotency_key("key-7").await.unwrap();
        assert_eq!(found.map(|o| o.order_id), Some(order.order_id));
        assert!(
            store
                .find_by_idempotency_key("missing")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_update_status_conditional() {
        let store = InMemoryOrderStore::new();
        let order = make_order();
        store.create(&order).await.unwrap();

        let updated = store
            .update_status(
                order.order_id,
                OrderStatus::Pending,
                OrderStatus::Processing,
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Processing);
        assert!(updated.updated_at >= order.updated_at);
    }

    #[tokio::test]
    async fn test_update_status_conflict_on_stale_expectation() {
        let store = InMemoryOrderStore::new();
        let order = make_order();
        store.create(&order).await.unwrap();

        store
            .update_status(
                order.order_id,
                OrderStatus::Pending,
                OrderStatus::Processing,
                None,
            )
            .await
            .unwrap();

        // A second writer still expecting Pending loses.
        let err = store
            .update_status(
                order.order_id,
                OrderStatus::Pending,
                OrderStatus::Processing,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderStoreError::StatusConflict {
                expected: OrderStatus::Pending,
                actual: OrderStatus::Processing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_update_status_rejects_illegal_transition() {
        let store = InMemoryOrderStore::new();
        let order = make_order();
        store.create(&order).await.unwrap();

        let err = store
            .update_status(
                order.order_id,
                OrderStatus::Pending,
                OrderStatus::Completed,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderStoreError::Transition(_)));
    }

    #[tokio::test]
    async fn test_failure_reason_recorded_on_failed() {
        let store = InMemoryOrderStore::new();
        let order = make_order();
        store.create(&order).await.unwrap();

        store
            .update_status(
                order.order_id,
                OrderStatus::Pending,
                OrderStatus::Processing,
                None,
            )
            .await
            .unwrap();
        let failed = store
            .update_status(
                order.order_id,
                OrderStatus::Processing,
                OrderStatus::Failed,
                Some("Payment declined".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(failed.failure_reason.as_deref(), Some("Payment declined"));
    }

    #[tokio::test]
    async fn test_set_payment_reference_is_idempotent_for_same_value() {
        let store = InMemoryOrderStore::new();
        let order = make_order();
        store.create(&order).await.unwrap();
        store
            .update_status(
                order.order_id,
                OrderStatus::Pending,
                OrderStatus::Processing,
                None,
            )
            .await
            .unwrap();

        store
            .set_payment_reference(order.order_id, OrderStatus::Processing, "PAY-0001")
            .await
            .unwrap();
        let again = store
            .set_payment_reference(order.order_id, OrderStatus::Processing, "PAY-0001")
            .await
            .unwrap();
        assert_eq!(again.payment_reference.as_deref(), Some("PAY-0001"));

        let err = store
            .set_payment_reference(order.order_id, OrderStatus::Processing, "PAY-0002")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderStoreError::PaymentReferenceAlreadySet { .. }
        ));
    }

    #[tokio::test]
    async fn test_query_by_status_orders_newest_first() {
        let store = InMemoryOrderStore::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let order = make_order();
            ids.push(order.order_id);
            store.create(&order).await.unwrap();
            // Distinct created_at values for a stable ordering.
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let listed = store
            .query_by_status(StatusQuery::new(OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(listed.last().map(|o| o.order_id), Some(ids[0]));
    }

    #[tokio::test]
    async fn test_query_by_status_respects_limit_and_cursor() {
        let store = InMemoryOrderStore::new();
        for _ in 0..5 {
            store.create(&make_order()).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let first_page = store
            .query_by_status(StatusQuery::new(OrderStatus::Pending).with_limit(2))
            .await
            .unwrap();
        assert_eq!(first_page.len(), 2);

        let cursor = first_page.last().unwrap().created_at;
        let second_page = store
            .query_by_status(
                StatusQuery::new(OrderStatus::Pending)
                    .with_limit(2)
                    .created_before(cursor),
            )
            .await
            .unwrap();
        assert_eq!(second_page.len(), 2);
        assert!(second_page.iter().all(|o| o.created_at < cursor));
    }

    #[tokio::test]
    async fn test_query_by_status_filters_status() {
        let store = InMemoryOrderStore::new();
        let order = make_order();
        store.create(&order).await.unwrap();
        store.create(&make_order()).await.unwrap();

        store
            .update_status(
                order.order_id,
                OrderStatus::Pending,
                OrderStatus::Processing,
                None,
            )
            .await
            .unwrap();

        let pending = store
            .query_by_status(StatusQuery::new(OrderStatus::Pending))
            .await
            .unwrap();
        let processing = store
            .query_by_status(StatusQuery::new(OrderStatus::Processing))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].order_id, order.order_id);
    }
}
