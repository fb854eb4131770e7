//! Payment capability trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;
use domain::{CustomerId, Money};

use crate::error::CapabilityError;

/// Result of a successful payment reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAuthorization {
    /// Reference assigned by the payment capability; recorded on the order
    /// and required for any later refund.
    pub reference: String,
}

/// Result of a successful refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundReceipt {
    /// Reference for the refund ledger entry.
    pub reference: String,

    /// The payment the refund reverses.
    pub original_payment: String,
}

/// Trait for payment operations.
#[async_trait]
pub trait PaymentCapability: Send + Sync {
    /// Reserves payment for an order.
    ///
    /// Idempotent per order: a repeated reserve for an order that already
    /// holds an authorization returns the recorded authorization instead
    /// of charging again.
    async fn reserve(
        &self,
        order_id: OrderId,
        customer_id: CustomerId,
        amount: Money,
    ) -> Result<PaymentAuthorization, CapabilityError>;

    /// Refunds a previously reserved payment (the compensating
    /// transaction). Every attempt is recorded in the gateway's ledger,
    /// successful or not.
    async fn refund(&self, payment_reference: &str) -> Result<RefundReceipt, CapabilityError>;
}

/// One entry in the refund ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundAttempt {
    /// The payment reference the refund targeted.
    pub payment_reference: String,

    /// Whether the attempt succeeded.
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct GatewayState {
    payments: HashMap<String, (OrderId, CustomerId, Money)>,
    by_order: HashMap<OrderId, String>,
    refunds: HashMap<String, RefundReceipt>,
    ledger: Vec<RefundAttempt>,
    next_payment: u32,
    next_refund: u32,
    reserve_calls: u32,
    refund_calls: u32,
    decline_reserve: bool,
    transient_reserve_failures: u32,
    transient_refund_failures: u32,
    fail_refund_permanently: bool,
}

/// In-memory payment gateway for testing.
///
/// Failure behavior is scriptable: a permanent decline, or N transient
/// failures before success, for both reserve and refund.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<GatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to permanently decline reservations.
    pub fn decline_reserve(&self, decline: bool) {
        self.state.write().unwrap().decline_reserve = decline;
    }

    /// Makes the next `count` reserve calls fail transiently.
    pub fn fail_reserve_transiently(&self, count: u32) {
        self.state.write().unwrap().transient_reserve_failures = count;
    }

    /// Makes the next `count` refund calls fail transiently.
    pub fn fail_refund_transiently(&self, count: u32) {
        self.state.write().unwrap().transient_refund_failures = count;
    }

    /// Configures the gateway to permanently fail refunds.
    pub fn fail_refund_permanently(&self, fail: bool) {
        self.state.write().unwrap().fail_refund_permanently = fail;
    }

    /// Returns how many reserve invocations were made.
    pub fn reserve_calls(&self) -> u32 {
        self.state.read().unwrap().reserve_calls
    }

    /// Returns how many refund invocations were made.
    pub fn refund_calls(&self) -> u32 {
        self.state.read().unwrap().refund_calls
    }

    /// Returns the number of payments still held (reserved, not refunded).
    pub fn active_payment_count(&self) -> usize {
        self.state.read().unwrap().payments.len()
    }

    /// Returns true if a payment exists with the given reference.
    pub fn has_payment(&self, reference: &str) -> bool {
        self.state.read().unwrap().payments.contains_key(reference)
    }

    /// Returns all refund attempts recorded against a payment reference.
    pub fn refund_attempts_for(&self, reference: &str) -> Vec<RefundAttempt> {
        self.state
            .read()
            .unwrap()
            .ledger
            .iter()
            .filter(|a| a.payment_reference == reference)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PaymentCapability for InMemoryPaymentGateway {
    async fn reserve(
        &self,
        order_id: OrderId,
        customer_id: CustomerId,
        amount: Money,
    ) -> Result<PaymentAuthorization, CapabilityError> {
        let mut state = self.state.write().unwrap();
        state.reserve_calls += 1;

        if state.transient_reserve_failures > 0 {
            state.transient_reserve_failures -= 1;
            return Err(CapabilityError::Transient(
                "payment service timeout".to_string(),
            ));
        }
        if state.decline_reserve {
            return Err(CapabilityError::Permanent("Payment declined".to_string()));
        }

        if let Some(reference) = state.by_order.get(&order_id) {
            return Ok(PaymentAuthorization {
                reference: reference.clone(),
            });
        }

        state.next_payment += 1;
        let reference = format!("PAY-{:06}", state.next_payment);
        state
            .payments
            .insert(reference.clone(), (order_id, customer_id, amount));
        state.by_order.insert(order_id, reference.clone());

        Ok(PaymentAuthorization { reference })
    }

    async fn refund(&self, payment_reference: &str) -> Result<RefundReceipt, CapabilityError> {
        let mut state = self.state.write().unwrap();
        state.refund_calls += 1;

        if state.transient_refund_failures > 0 {
            state.transient_refund_failures -= 1;
            state.ledger.push(RefundAttempt {
                payment_reference: payment_reference.to_string(),
                succeeded: false,
            });
            return Err(CapabilityError::Transient(
                "payment service timeout".to_string(),
            ));
        }
        if state.fail_refund_permanently {
            state.ledger.push(RefundAttempt {
                payment_reference: payment_reference.to_string(),
                succeeded: false,
            });
            return Err(CapabilityError::Permanent("Refund rejected".to_string()));
        }

        if let Some(receipt) = state.refunds.get(payment_reference) {
            // Already refunded; refunds are idempotent per payment.
            return Ok(receipt.clone());
        }

        if state.payments.remove(payment_reference).is_none() {
            state.ledger.push(RefundAttempt {
                payment_reference: payment_reference.to_string(),
                succeeded: false,
            });
            return Err(CapabilityError::Permanent(format!(
                "unknown payment reference {payment_reference}"
            )));
        }

        state.next_refund += 1;
        let receipt = RefundReceipt {
            reference: format!("REF-{:06}", state.next_refund),
            original_payment: payment_reference.to_string(),
        };
        state.refunds.insert(payment_reference.to_string(), receipt.clone());
        state.ledger.push(RefundAttempt {
            payment_reference: payment_reference.to_string(),
            succeeded: true,
        });

        Ok(receipt)
    }
}
