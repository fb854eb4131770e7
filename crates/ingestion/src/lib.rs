//! Ingestion queue for asynchronous order processing.
//!
//! Delivery is at-least-once: a received message is leased to its consumer
//! for the visibility timeout and reappears if it is neither deleted nor
//! nacked within the window. Messages carry only `{order_id, created_at}`
//! so consumers re-read authoritative order state instead of trusting
//! stale payloads. Messages that exhaust their redelivery budget are moved
//! to the dead-letter quarantine, never dropped.

pub mod dead_letter;
pub mod error;
pub mod memory;
pub mod message;
pub mod queue;

pub use dead_letter::{DeadLetterQueue, DeadLetterRecord, InMemoryDeadLetterQueue};
pub use error::{QueueError, Result};
pub use memory::InMemoryQueue;
pub use message::{OrderMessage, ReceiptHandle, ReceivedMessage};
pub use queue::{IngestionQueue, QueueConfig};
