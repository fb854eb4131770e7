//! Status-based listing query.

use chrono::{DateTime, Utc};
use domain::OrderStatus;

/// Hard cap on how many orders a single listing may return.
pub const MAX_LIMIT: usize = 100;

/// Default page size for listings.
pub const DEFAULT_LIMIT: usize = 50;

/// A query for orders in a given status, ordered by `created_at`
/// descending. `created_before` is the pagination cursor: pass the
/// `created_at` of the last order of the previous page to fetch the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusQuery {
    /// Status to filter by.
    pub status: OrderStatus,

    /// Maximum number of orders to return, capped at [`MAX_LIMIT`].
    pub limit: usize,

    /// Only return orders created strictly before this timestamp.
    pub created_before: Option<DateTime<Utc>>,
}

impl StatusQuery {
    /// Creates a query for all orders in `status` with the default limit.
    pub fn new(status: OrderStatus) -> Self {
        Self {
            status,
            limit: DEFAULT_LIMIT,
            created_before: None,
        }
    }

    /// Sets the page size (capped at [`MAX_LIMIT`]).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_LIMIT);
        self
    }

    /// Sets the pagination cursor.
    pub fn created_before(mut self, cursor: DateTime<Utc>) -> Self {
        self.created_before = Some(cursor);
        self
    }
}
