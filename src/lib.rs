//! # Vehicle Gateway (vgw)
//!
//! A telemetry collector for instrumented vehicles: three unreliable
//! hardware sources are sampled continuously, merged into one canonical
//! snapshot, and redistributed to downstream consumers.
//!
//! ## Architecture
//!
//! ```text
//! ECU link ──┐                                    ┌── CAN speed echo
//! GPS link ──┼─ adapters ── mailboxes ── collector ┤
//! CAN bus  ──┘  (supervised)                      └── UDP uplink (rate-limited)
//! ```
//!
//! - Every hardware connection is driven by the same reconnect-with-backoff
//!   supervisor ([`core::retry`]); adapters carry no retry logic of their own.
//! - Sources hand samples to the collector through single-slot, oldest-wins
//!   mailboxes ([`core::mailbox`]); every outbound path is best-effort and
//!   may drop samples under load.
//! - The collector promotes a snapshot only when it actually changed; that
//!   comparison is the sole gate for forwarding.
//!
//! The vendor protocol stacks for the ECU diagnostic link and the GPS
//! receiver live in separate driver crates consumed through the
//! [`sources::ecu::EcuLink`] and [`sources::gps::GpsLink`] contracts; the
//! CAN sensor bus is driven in-crate over SocketCAN.

pub mod can;
pub mod collector;
pub mod config;
pub mod core;
pub mod forward;
pub mod sources;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::collector::{Collector, Intake};
    pub use crate::config::Config;
    pub use crate::core::error::{GatewayError, Result};
    pub use crate::core::mailbox::{mailbox, MailboxReceiver, MailboxSender};
    pub use crate::core::retry::{supervise, Retryable, RETRY_BACKOFF};
    pub use crate::core::telemetry::Telemetry;
    pub use crate::forward::Forwarder;
}

// Re-export the workhorse types at the crate root.
pub use crate::collector::Collector;
pub use crate::core::error::{GatewayError, Result};
pub use crate::core::telemetry::Telemetry;
