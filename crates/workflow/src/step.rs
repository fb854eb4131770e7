//! Workflow step derivation.

use domain::{Order, OrderStatus};

/// The step the orchestrator resumes from for a given persisted order.
///
/// The cursor is never taken from message payload: it is re-derived from
/// the order's status and recorded side effects on every delivery. That
/// makes redelivery a resume, not a replay: a step whose side effect is
/// already recorded (a payment reservation with its reference persisted)
/// is never re-executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    /// Re-read and validate the order, then claim it for processing.
    Validate,

    /// Reserve payment and persist the payment reference.
    ///
    /// A `Processing` order without a payment reference resumes here;
    /// validation is pure and is re-checked as a guard before the
    /// capability is invoked.
    ReservePayment,

    /// Reserve inventory for every item, then complete.
    ///
    /// A `Processing` order holding a payment reference resumes here;
    /// the payment side effect is recorded, so ReservePayment is never
    /// re-executed.
    ReserveInventory,

    /// The order already reached a terminal status; acknowledge only.
    AlreadyTerminal,
}

impl WorkflowStep {
    /// Derives the resume step from the persisted order fields.
    pub fn for_order(order: &Order) -> WorkflowStep {
        match order.status {
            OrderStatus::Pending => WorkflowStep::Validate,
            OrderStatus::Processing if order.payment_reference.is_none() => {
                WorkflowStep::ReservePayment
            }
            OrderStatus::Processing => WorkflowStep::ReserveInventory,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled => {
                WorkflowStep::AlreadyTerminal
            }
        }
    }

    /// Returns the step name used in logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Validate => "validate",
            WorkflowStep::ReservePayment => "reserve_payment",
            WorkflowStep::ReserveInventory => "reserve_inventory",
            WorkflowStep::AlreadyTerminal => "already_terminal",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
