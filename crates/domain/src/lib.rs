pub mod order;
pub mod test_support;

pub use order::{Delivery, Item, Order, Payment};
