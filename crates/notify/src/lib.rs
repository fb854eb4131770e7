//! Notification fan-out for order status changes.
//!
//! The orchestrator publishes one [`StatusEvent`] per status transition to
//! a topic with independent subscribers. Delivery is best-effort with
//! bounded retry: a failing subscriber is logged and counted, never allowed
//! to block or roll back an order's state transition.

pub mod error;
pub mod event;
pub mod subscribers;
pub mod topic;

pub use error::PublishError;
pub use event::StatusEvent;
pub use subscribers::{AnalyticsRecorder, CustomerMessenger, OutboundMessage, RecordingSubscriber};
pub use topic::{NotificationTopic, PublishOutcome, Subscriber};
