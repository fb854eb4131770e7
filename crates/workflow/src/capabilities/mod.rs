//! Capability adapter traits and in-memory implementations.
//!
//! Adapters carry no order state of their own; all state lives in the
//! order store. Operations are idempotent where possible: reserving twice
//! for the same order returns the originally recorded result.

pub mod inventory;
pub mod payment;

pub use inventory::{InMemoryInventoryService, InventoryCapability, InventoryReservation};
pub use payment::{InMemoryPaymentGateway, PaymentAuthorization, PaymentCapability, RefundReceipt};
