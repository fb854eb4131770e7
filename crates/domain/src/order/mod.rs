//! Order domain model.

pub mod record;
pub mod status;
pub mod value_objects;

pub use record::{NewOrder, Order, total_of, validate_items};
pub use status::OrderStatus;
pub use value_objects::{CustomerId, Money, OrderItem, ProductId};
