//! CAN sensor-bus adapter.
//!
//! Unlike the other adapters this one owns an in-crate connection (the
//! frame codec lives in [`crate::can`]) and shares it with the speed
//! forwarder through a slot that is filled on open and cleared on close.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};

use crate::can::connection::{CanEvents, Connection};
use crate::core::error::{GatewayError, Result};
use crate::core::mailbox::MailboxSender;
use crate::core::retry::Retryable;
use crate::core::telemetry::CanSensorSample;

/// Factory producing an open connection; injected so tests can substitute
/// a stub transport.
pub type CanConnectFn = Box<dyn Fn(&str) -> Result<Connection> + Send + Sync>;

/// Shared handle to the live connection, read by the speed forwarder.
/// `None` until the supervisor completes the first open.
pub type SharedConnection = Arc<RwLock<Option<Connection>>>;

/// Supervised CAN bus source.
pub struct CanSource {
    device: String,
    connect: CanConnectFn,
    conn: SharedConnection,
    tx: MailboxSender<CanSensorSample>,
    // the working sample survives reconnects: a bus drop must not zero the
    // last known fuel and temperature readings
    sample: CanSensorSample,
}

impl CanSource {
    pub fn new(
        device: impl Into<String>,
        connect: CanConnectFn,
        tx: MailboxSender<CanSensorSample>,
    ) -> Self {
        Self {
            device: device.into(),
            connect,
            conn: Arc::new(RwLock::new(None)),
            tx,
            sample: CanSensorSample::default(),
        }
    }

    /// Handle for the speed forwarder.
    pub fn connection(&self) -> SharedConnection {
        Arc::clone(&self.conn)
    }
}

struct SampleSink<'a> {
    sample: &'a mut CanSensorSample,
    tx: &'a MailboxSender<CanSensorSample>,
}

impl SampleSink<'_> {
    fn push(&self) {
        self.tx.offer(*self.sample);
    }
}

impl CanEvents for SampleSink<'_> {
    fn oil_temp(&mut self, value: i32) {
        self.sample.oil_temp = value;
        self.push();
    }

    fn coolant_temp(&mut self, value: i32) {
        self.sample.coolant_temp = value;
        self.push();
    }

    fn fuel(&mut self, value: i32) {
        self.sample.fuel_level = value;
        self.push();
    }
}

#[async_trait]
impl Retryable for CanSource {
    fn name(&self) -> &'static str {
        "canbus"
    }

    async fn open(&mut self) -> Result<()> {
        let conn = (self.connect)(&self.device)?;
        *self.conn.write().await = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.conn.write().await.take() {
            Some(conn) => conn.close(),
            None => Ok(()),
        }
    }

    async fn start(&mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let conn = match self.conn.read().await.as_ref() {
            Some(conn) => conn.clone(),
            None => return Err(GatewayError::NotInitialized("canbus")),
        };
        let mut sink = SampleSink {
            sample: &mut self.sample,
            tx: &self.tx,
        };
        conn.start(shutdown, &mut sink).await
    }
}
