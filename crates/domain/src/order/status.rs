//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Processing ──┬──► Completed
///    │             │       └──► Failed
///    └─────────────┴──► Cancelled   (only before payment capture)
/// ```
///
/// `Completed`, `Failed` and `Cancelled` are terminal: no transition
/// ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order has been accepted and is waiting to be processed.
    #[default]
    Pending,

    /// A worker is driving the order through the workflow.
    Processing,

    /// Payment and inventory reserved; the order is done (terminal).
    Completed,

    /// Processing failed; any captured payment was compensated (terminal).
    Failed,

    /// Order was cancelled before payment capture (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if processing can start from this status.
    pub fn can_start_processing(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be completed from this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Processing)
    }

    /// Returns true if the order can be failed from this status.
    pub fn can_fail(&self) -> bool {
        matches!(self, OrderStatus::Processing)
    }

    /// Returns true if the order can be cancelled from this status.
    ///
    /// Cancellation additionally requires that no payment has been
    /// captured; that check lives on [`super::Order::can_cancel`].
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    /// Returns true if the state machine allows moving from `self` to `next`.
    ///
    /// Transitions are monotonic along the status graph: no status is
    /// skipped and nothing leaves a terminal status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match next {
            OrderStatus::Pending => false,
            OrderStatus::Processing => self.can_start_processing(),
            OrderStatus::Completed => self.can_complete(),
            OrderStatus::Failed => self.can_fail(),
            OrderStatus::Cancelled => self.can_cancel(),
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parses a status from its string form.
    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(OrderStatus::Pending),
            "PROCESSING" => Some(OrderStatus::Processing),
            "COMPLETED" => Some(OrderStatus::Completed),
            "FAILED" => Some(OrderStatus::Failed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
