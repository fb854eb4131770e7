use thiserror::Error;

/// Failure reported by a subscriber when handling an event.
///
/// Mirrors the capability trichotomy: transient failures are retried a
/// bounded number of times, permanent failures are not.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Delivery may succeed if retried (timeout, throttling).
    #[error("transient publish failure: {0}")]
    Transient(String),

    /// Delivery will not succeed no matter how often it is retried.
    #[error("permanent publish failure: {0}")]
    Permanent(String),
}

impl PublishError {
    /// Returns true if the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Transient(_))
    }
}
