//! CAN sensor bus: frame codec and connection handling.

pub mod connection;
pub mod frame;

pub use connection::{CanBus, CanEvents, Connection};
pub use frame::Frame;
