//! Two-sided order book: levels, own-order overlay and user orders.

mod book;
mod level;
mod order;

pub use book::{FullDepthSnapshot, LastChange, OrderBook, UserOrderEvent};
pub use level::Level;
pub use order::Order;
