//! Speed echo back onto the sensor bus.
//!
//! The dashboard instruments listen for the speed frame, so every vehicle
//! speed change is echoed onto the CAN bus. The forwarder reads the shared
//! connection slot owned by the CAN adapter; until the adapter's supervisor
//! completes its first open the slot is empty and forwarding fails with a
//! typed not-initialized error instead of panicking.

use async_trait::async_trait;

use crate::core::error::{GatewayError, Result};
use crate::core::telemetry::Telemetry;
use crate::forward::Forwarder;
use crate::sources::canbus::SharedConnection;

/// Forwards vehicle speed changes onto the CAN bus.
pub struct CanSpeedForwarder {
    conn: SharedConnection,
}

impl CanSpeedForwarder {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Forwarder for CanSpeedForwarder {
    fn name(&self) -> &'static str {
        "can-speed"
    }

    async fn forward(&mut self, previous: &Telemetry, current: &Telemetry) -> Result<()> {
        if previous.speed == current.speed {
            return Ok(());
        }

        let guard = self.conn.read().await;
        let conn = guard
            .as_ref()
            .ok_or(GatewayError::NotInitialized("canbus"))?;
        conn.send_speed(current.speed as i32)
            .map_err(|err| GatewayError::forward(format!("unable to send speed to CAN bus: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::can::connection::{CanBus, Connection};
    use crate::can::frame::{Frame, FRAME_SPEED};
    use std::sync::{Arc, Mutex};
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct RecordingBus {
        sent: Mutex<Vec<Frame>>,
    }

    impl CanBus for RecordingBus {
        fn recv(&self) -> Result<Option<Frame>> {
            Ok(None)
        }

        fn send(&self, frame: &Frame) -> Result<()> {
            self.sent.lock().unwrap().push(*frame);
            Ok(())
        }

        fn disconnect(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sends_only_on_speed_change() {
        let bus = Arc::new(RecordingBus::default());
        let conn: SharedConnection = Arc::new(RwLock::new(Some(Connection::new(
            Arc::clone(&bus) as Arc<dyn CanBus>,
        ))));
        let mut forwarder = CanSpeedForwarder::new(conn);

        let prev = Telemetry::default();
        let mut current = Telemetry {
            speed: 100.0,
            ..Default::default()
        };

        // speed changed: one send
        forwarder.forward(&prev, &current).await.unwrap();
        {
            let sent = bus.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].id, FRAME_SPEED);
            assert_eq!(sent[0].payload(), &[100]);
        }

        // unchanged: no send
        let prev = current;
        forwarder.forward(&prev, &current).await.unwrap();
        assert_eq!(bus.sent.lock().unwrap().len(), 1);

        // changed again: second send
        current.speed = 200.0;
        forwarder.forward(&prev, &current).await.unwrap();
        {
            let sent = bus.sent.lock().unwrap();
            assert_eq!(sent.len(), 2);
            assert_eq!(sent[1].payload(), &[200]);
        }
    }

    #[tokio::test]
    async fn test_not_initialized_before_first_open() {
        let conn: SharedConnection = Arc::new(RwLock::new(None));
        let mut forwarder = CanSpeedForwarder::new(conn);

        let prev = Telemetry::default();
        let current = Telemetry {
            speed: 10.0,
            ..Default::default()
        };

        let err = forwarder.forward(&prev, &current).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotInitialized("canbus")));
    }

    #[tokio::test]
    async fn test_unchanged_speed_needs_no_connection() {
        // nothing to send, so the empty slot is never touched
        let conn: SharedConnection = Arc::new(RwLock::new(None));
        let mut forwarder = CanSpeedForwarder::new(conn);

        let telemetry = Telemetry::default();
        assert!(forwarder.forward(&telemetry, &telemetry).await.is_ok());
    }
}
