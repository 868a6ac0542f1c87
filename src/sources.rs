//! Sensor adapters.
//!
//! One adapter per hardware source, each implementing
//! [`Retryable`](crate::core::retry::Retryable) so the supervisor can drive
//! its lifecycle. Adapters translate vendor callbacks into normalized
//! samples and push them into their single-slot mailbox; they never retry
//! themselves.
//!
//! Adapters push a copy of their working sample on every individual field
//! update, not per completed group, so one pushed sample may mix fields
//! from different hardware sampling instants. Later pushes carry the
//! remaining updates.

pub mod canbus;
pub mod ecu;
pub mod gps;

pub use canbus::CanSource;
pub use ecu::EcuSource;
pub use gps::GpsSource;
