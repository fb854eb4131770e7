//! Inventory capability trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;
use domain::OrderItem;

use crate::error::CapabilityError;

/// Result of a successful inventory reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryReservation {
    /// The reservation ID assigned by the inventory capability.
    pub reservation_id: String,
}

/// Trait for inventory operations.
#[async_trait]
pub trait InventoryCapability: Send + Sync {
    /// Reserves stock for every item of an order in one invocation.
    ///
    /// Idempotent per order: a repeated reserve returns the recorded
    /// reservation instead of reserving again.
    async fn reserve(
        &self,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<InventoryReservation, CapabilityError>;

    /// Releases a previously made reservation.
    async fn release(&self, reservation_id: &str) -> Result<(), CapabilityError>;
}

#[derive(Debug, Default)]
struct ServiceState {
    reservations: HashMap<String, (OrderId, Vec<OrderItem>)>,
    by_order: HashMap<OrderId, String>,
    next_id: u32,
    reserve_calls: u32,
    out_of_stock: bool,
    transient_failures: u32,
}

/// In-memory inventory service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<ServiceState>>,
}

impl InMemoryInventoryService {
    /// Creates a new in-memory inventory service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to permanently report items out of stock.
    pub fn set_out_of_stock(&self, out: bool) {
        self.state.write().unwrap().out_of_stock = out;
    }

    /// Makes the next `count` reserve calls fail transiently.
    pub fn fail_transiently(&self, count: u32) {
        self.state.write().unwrap().transient_failures = count;
    }

    /// Returns how many reserve invocations were made.
    pub fn reserve_calls(&self) -> u32 {
        self.state.read().unwrap().reserve_calls
    }

    /// Returns the number of active reservations.
    pub fn reservation_count(&self) -> usize {
        self.state.read().unwrap().reservations.len()
    }

    /// Returns true if a reservation exists with the given ID.
    pub fn has_reservation(&self, reservation_id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .reservations
            .contains_key(reservation_id)
    }
}

#[async_trait]
impl InventoryCapability for InMemoryInventoryService {
    async fn reserve(
        &self,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<InventoryReservation, CapabilityError> {
        let mut state = self.state.write().unwrap();
        state.reserve_calls += 1;

        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(CapabilityError::Transient(
                "inventory service timeout".to_string(),
            ));
        }
        if state.out_of_stock {
            return Err(CapabilityError::Permanent(
                "Insufficient stock".to_string(),
            ));
        }

        if let Some(reservation_id) = state.by_order.get(&order_id) {
            return Ok(InventoryReservation {
                reservation_id: reservation_id.clone(),
            });
        }

        state.next_id += 1;
        let reservation_id = format!("RES-{:06}", state.next_id);
        state
            .reservations
            .insert(reservation_id.clone(), (order_id, items.to_vec()));
        state.by_order.insert(order_id, reservation_id.clone());

        Ok(InventoryReservation { reservation_id })
    }

    async fn release(&self, reservation_id: &str) -> Result<(), CapabilityError> {
        let mut state = self.state.write().unwrap();
        if let Some((order_id, _)) = state.reservations.remove(reservation_id) {
            state.by_order.remove(&order_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;

    fn items() -> Vec<OrderItem> {
        vec![OrderItem::new("SKU-001", 2, Money::from_cents(1000))]
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let service = InMemoryInventoryService::new();
        let reservation = service.reserve(OrderId::new(), &items()).await.unwrap();

        assert!(reservation.reservation_id.starts_with("RES-"));
        assert_eq!(service.reservation_count(), 1);
        assert!(service.has_reservation(&reservation.reservation_id));

        service.release(&reservation.reservation_id).await.unwrap();
        assert_eq!(service.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_reserve_is_idempotent_per_order() {
        let service = InMemoryInventoryService::new();
        let order_id = OrderId::new();

        let first = service.reserve(order_id, &items()).await.unwrap();
        let second = service.reserve(order_id, &items()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.reservation_count(), 1);
        assert_eq!(service.reserve_calls(), 2);
    }

    #[tokio::test]
    async fn test_out_of_stock_is_permanent() {
        let service = InMemoryInventoryService::new();
        service.set_out_of_stock(true);

        let err = service.reserve(OrderId::new(), &items()).await.unwrap_err();
        assert_eq!(err, CapabilityError::Permanent("Insufficient stock".into()));
        assert_eq!(service.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let service = InMemoryInventoryService::new();
        service.fail_transiently(2);
        let order_id = OrderId::new();

        assert!(
            service
                .reserve(order_id, &items())
                .await
                .unwrap_err()
                .is_transient()
        );
        assert!(
            service
                .reserve(order_id, &items())
                .await
                .unwrap_err()
                .is_transient()
        );
        service.reserve(order_id, &items()).await.unwrap();
        assert_eq!(service.reserve_calls(), 3);
    }

    #[tokio::test]
    async fn test_release_after_reserve_allows_new_reservation() {
        let service = InMemoryInventoryService::new();
        let order_id = OrderId::new();

        let first = service.reserve(order_id, &items()).await.unwrap();
        service.release(&first.reservation_id).await.unwrap();

        let second = service.reserve(order_id, &items()).await.unwrap();
        assert_ne!(first.reservation_id, second.reservation_id);
    }
}
