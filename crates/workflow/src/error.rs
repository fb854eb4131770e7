//! Workflow error types.

use common::OrderId;
use domain::OrderError;
use ingestion::QueueError;
use order_store::OrderStoreError;
use thiserror::Error;

/// Failure reported by a capability adapter.
///
/// Every adapter operation returns this trichotomy (success, permanent,
/// transient) rather than a bare boolean, so the orchestrator can apply
/// one retry/compensation policy uniformly: transient failures (timeouts,
/// throttling) are retried with backoff, permanent failures (payment
/// declined, out of stock) route straight to the failure edge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// Infrastructure-caused failure that may succeed if retried.
    #[error("transient capability failure: {0}")]
    Transient(String),

    /// Business-rule decline that will not succeed no matter how often it
    /// is retried.
    #[error("{0}")]
    Permanent(String),
}

impl CapabilityError {
    /// Returns true if the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, CapabilityError::Transient(_))
    }
}

/// Terminal outcome of a retried capability step.
///
/// Both variants route along the failure edge; they differ only in how
/// they are logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    /// The capability declined; retrying would not help.
    Declined(String),

    /// The transient-retry budget was exhausted.
    Exhausted { attempts: u32, last_error: String },
}

impl StepFailure {
    /// Returns the failure reason recorded on the order.
    pub fn reason(&self) -> String {
        match self {
            StepFailure::Declined(reason) => reason.clone(),
            StepFailure::Exhausted {
                attempts,
                last_error,
            } => format!("failed after {attempts} attempts: {last_error}"),
        }
    }
}

/// Errors that abort the current processing attempt.
///
/// These are system errors (store unavailable, conditional write lost,
/// stale lease): the worker releases the message and relies on queue
/// redelivery for recovery.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The message references an order that does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Order store error, including lost conditional writes.
    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),

    /// Queue error (stale receipt, missing record).
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Errors surfaced synchronously to callers of the intake boundary.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Client-caused validation failure; the only error callers of order
    /// creation ever see synchronously.
    #[error("Validation error: {0}")]
    Validation(#[from] OrderError),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Order store error.
    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),

    /// Queue error.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}
