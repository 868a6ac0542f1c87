//! Core abstractions for the vehicle gateway.
//!
//! Everything here is shared by the sensor adapters, the collector and the
//! forwarders: the error type, the single-slot mailbox, the reconnect
//! supervisor and the telemetry data model.

pub mod error;
pub mod mailbox;
pub mod retry;
pub mod telemetry;

pub use error::{GatewayError, Result};
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender};
pub use retry::{supervise, Retryable, RETRY_BACKOFF};
pub use telemetry::{CanSensorSample, EcuSample, GpsSample, MetricValue, Telemetry};
