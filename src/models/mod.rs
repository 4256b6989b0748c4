//! Data models for signals and tracked orders.

mod order;
mod signal;

pub use order::{Order, OrderStatus, Side};
pub use signal::Signal;
