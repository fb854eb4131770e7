//! Workflow orchestration for order processing.
//!
//! This crate drives each order through its state machine:
//!
//! ```text
//! Validate ──► ReservePayment ──► ReserveInventory ──► Complete
//!     │               │                   │
//!     │               │                   └──► CompensatePayment ──► MarkFailed
//!     └───────────────┴──────────────────────────────────────────► MarkFailed
//! ```
//!
//! Capability invocations are retried with exponential backoff after
//! classifying each error as transient or permanent. The orchestrator
//! resumes from the step implied by the persisted order fields, so an
//! at-least-once redelivery never re-executes a step whose side effect is
//! already recorded.

pub mod capabilities;
pub mod error;
pub mod intake;
pub mod orchestrator;
pub mod retry;
pub mod step;
pub mod worker;

pub use capabilities::{
    InMemoryInventoryService, InMemoryPaymentGateway, InventoryCapability, InventoryReservation,
    PaymentAuthorization, PaymentCapability, RefundReceipt,
};
pub use error::{CapabilityError, IntakeError, StepFailure, WorkflowError};
pub use intake::OrderIntake;
pub use orchestrator::Orchestrator;
pub use retry::RetryPolicy;
pub use step::WorkflowStep;
pub use worker::WorkerPool;
