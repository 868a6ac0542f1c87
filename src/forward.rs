//! Downstream telemetry sinks.
//!
//! Sinks implement [`Forwarder`] and are invoked by the collector once per
//! detected snapshot change, in registration order. Delivery is best-effort
//! throughout: a failing sink is logged and skipped, never retried.

pub mod can_speed;
pub mod udp;
pub mod wire;

pub use can_speed::CanSpeedForwarder;
pub use udp::{UdpForwarder, UdpPump};

use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::telemetry::Telemetry;

/// A sink invoked on every detected telemetry change.
#[async_trait]
pub trait Forwarder: Send {
    /// Sink identity used in log records.
    fn name(&self) -> &'static str;

    /// Deliver one change. `previous` is the snapshot before the change.
    async fn forward(&mut self, previous: &Telemetry, current: &Telemetry) -> Result<()>;
}
