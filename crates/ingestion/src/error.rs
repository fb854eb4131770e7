use thiserror::Error;

use crate::message::ReceiptHandle;

/// Errors that can occur when interacting with the ingestion queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The receipt handle does not identify a currently leased message.
    ///
    /// This happens when the lease expired and the message was redelivered
    /// to another consumer; the stale holder must not act on the message.
    #[error("Receipt not found or lease expired: {0}")]
    ReceiptNotFound(ReceiptHandle),
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
