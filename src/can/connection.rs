//! Sensor-bus connection handling.
//!
//! [`Connection`] wraps a low-level [`CanBus`] transport and turns inbound
//! frames into typed sensor events. The production transport is a
//! non-blocking SocketCAN socket polled from the receive loop; tests inject
//! stub buses through the same trait.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::can::frame::{self, Frame, FRAME_COOLANT_TEMP, FRAME_FUEL, FRAME_OIL_TEMP};
use crate::core::error::{GatewayError, Result};

/// How often the receive loop polls the non-blocking transport.
const RX_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Low-level frame transport.
pub trait CanBus: Send + Sync {
    /// Non-blocking read; `Ok(None)` when no frame is pending.
    fn recv(&self) -> Result<Option<Frame>>;

    /// Publish a frame onto the bus.
    fn send(&self, frame: &Frame) -> Result<()>;

    /// Detach from the bus.
    fn disconnect(&self) -> Result<()>;
}

/// Inbound sensor readings decoded from the bus.
pub trait CanEvents: Send {
    fn oil_temp(&mut self, value: i32);
    fn coolant_temp(&mut self, value: i32);
    fn fuel(&mut self, value: i32);
}

/// An open connection to the sensor bus.
///
/// Cheap to clone; the speed forwarder holds a clone of the same connection
/// the receive loop runs on.
#[derive(Clone)]
pub struct Connection {
    bus: Arc<dyn CanBus>,
}

impl Connection {
    /// Wrap an already-connected transport.
    pub fn new(bus: Arc<dyn CanBus>) -> Self {
        Self { bus }
    }

    /// Open the SocketCAN interface with the given name.
    #[cfg(target_os = "linux")]
    pub fn open(interface: &str) -> Result<Self> {
        Ok(Self::new(Arc::new(SocketCanBus::open(interface)?)))
    }

    /// Receive frames and dispatch them into `events` until the transport
    /// fails or shutdown fires. On shutdown the bus is disconnected.
    pub async fn start(
        &self,
        mut shutdown: watch::Receiver<bool>,
        events: &mut dyn CanEvents,
    ) -> Result<()> {
        info!("CAN bus opened and subscribed");
        let mut poll = tokio::time::interval(RX_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if let Err(err) = self.bus.disconnect() {
                        warn!(%err, "unable to disconnect CAN bus after shutdown");
                    }
                    return Err(GatewayError::Cancelled);
                }
                _ = poll.tick() => {
                    while let Some(frame) = self.bus.recv()? {
                        dispatch(&frame, events);
                    }
                }
            }
        }
    }

    /// Echo the vehicle speed onto the bus.
    pub fn send_speed(&self, speed: i32) -> Result<()> {
        debug!(speed, "sending speed over CAN bus");
        self.bus.send(&frame::speed_frame(speed))
    }

    /// Detach from the bus.
    pub fn close(&self) -> Result<()> {
        self.bus.disconnect()
    }
}

/// Route one inbound frame to its sensor event.
///
/// Unknown IDs are logged and dropped. A wrong-length payload is logged but
/// the event still fires with a best-effort zero, so a glitching sensor
/// cannot stall the pipeline.
fn dispatch(frame: &Frame, events: &mut dyn CanEvents) {
    debug!(id = frame.id, len = frame.len, "received CAN frame");

    let handler: fn(&mut dyn CanEvents, i32) = match frame.id {
        FRAME_OIL_TEMP => |events, value| events.oil_temp(value),
        FRAME_COOLANT_TEMP => |events, value| events.coolant_temp(value),
        FRAME_FUEL => |events, value| events.fuel(value),
        id => {
            error!(id, "unknown CAN id");
            return;
        }
    };

    let value = match frame::decode_u16(frame) {
        Ok(value) => value,
        Err(err) => {
            error!(id = frame.id, %err, "unable to decode sensor frame");
            0
        }
    };
    handler(events, value);
}

// ============================================================================
// SocketCAN transport (Linux)
// ============================================================================

/// SocketCAN-backed transport.
#[cfg(target_os = "linux")]
pub struct SocketCanBus {
    socket: socketcan::CanSocket,
}

#[cfg(target_os = "linux")]
impl SocketCanBus {
    /// Open the named interface in non-blocking mode.
    pub fn open(interface: &str) -> Result<Self> {
        use socketcan::Socket;

        let socket = socketcan::CanSocket::open(interface).map_err(|err| {
            GatewayError::connection(format!("unable to open CAN interface {interface}: {err}"))
        })?;
        socket.set_nonblocking(true).map_err(|err| {
            GatewayError::connection(format!("unable to set non-blocking mode: {err}"))
        })?;
        Ok(Self { socket })
    }
}

#[cfg(target_os = "linux")]
impl CanBus for SocketCanBus {
    fn recv(&self) -> Result<Option<Frame>> {
        use socketcan::{EmbeddedFrame, Frame as _, Socket};

        match self.socket.read_frame() {
            Ok(inbound) => Ok(Some(Frame::new(inbound.raw_id(), inbound.data()))),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(GatewayError::connection(format!("CAN read error: {err}"))),
        }
    }

    fn send(&self, frame: &Frame) -> Result<()> {
        use socketcan::{EmbeddedFrame, Socket, StandardId};

        let id = StandardId::new(frame.id as u16)
            .ok_or_else(|| GatewayError::decode(format!("invalid CAN id {:#x}", frame.id)))?;
        let outbound = socketcan::CanFrame::new(id, frame.payload())
            .ok_or_else(|| GatewayError::decode("payload exceeds frame size"))?;
        self.socket
            .write_frame(&outbound)
            .map_err(|err| GatewayError::connection(format!("CAN write error: {err}")))
    }

    fn disconnect(&self) -> Result<()> {
        // dropping the socket closes the descriptor; nothing to flush
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubBus {
        inbound: Mutex<VecDeque<Frame>>,
        sent: Mutex<Vec<Frame>>,
        disconnected: Mutex<bool>,
    }

    impl StubBus {
        fn with_frames(frames: Vec<Frame>) -> Arc<Self> {
            Arc::new(Self {
                inbound: Mutex::new(frames.into()),
                ..Default::default()
            })
        }
    }

    impl CanBus for StubBus {
        fn recv(&self) -> Result<Option<Frame>> {
            Ok(self.inbound.lock().unwrap().pop_front())
        }

        fn send(&self, frame: &Frame) -> Result<()> {
            self.sent.lock().unwrap().push(*frame);
            Ok(())
        }

        fn disconnect(&self) -> Result<()> {
            *self.disconnected.lock().unwrap() = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingEvents {
        oil: Vec<i32>,
        coolant: Vec<i32>,
        fuel: Vec<i32>,
    }

    impl CanEvents for RecordingEvents {
        fn oil_temp(&mut self, value: i32) {
            self.oil.push(value);
        }

        fn coolant_temp(&mut self, value: i32) {
            self.coolant.push(value);
        }

        fn fuel(&mut self, value: i32) {
            self.fuel.push(value);
        }
    }

    #[test]
    fn test_dispatch_by_frame_id() {
        let mut events = RecordingEvents::default();

        dispatch(&Frame::new(FRAME_OIL_TEMP, &[10, 0]), &mut events);
        dispatch(&Frame::new(FRAME_COOLANT_TEMP, &[90, 0]), &mut events);
        dispatch(&Frame::new(FRAME_FUEL, &[0x2C, 0x01]), &mut events);

        assert_eq!(events.oil, vec![10]);
        assert_eq!(events.coolant, vec![90]);
        assert_eq!(events.fuel, vec![300]);
    }

    #[test]
    fn test_dispatch_drops_unknown_id() {
        let mut events = RecordingEvents::default();
        dispatch(&Frame::new(0x1FF, &[1, 2]), &mut events);

        assert!(events.oil.is_empty());
        assert!(events.coolant.is_empty());
        assert!(events.fuel.is_empty());
    }

    #[test]
    fn test_dispatch_bad_length_yields_zero() {
        let mut events = RecordingEvents::default();
        // declared length 1: decode fails, the event still fires with 0
        dispatch(&Frame::new(FRAME_FUEL, &[5]), &mut events);

        assert_eq!(events.fuel, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_consumes_frames_and_stops_on_shutdown() {
        let bus = StubBus::with_frames(vec![
            Frame::new(FRAME_OIL_TEMP, &[7, 0]),
            Frame::new(FRAME_FUEL, &[3, 0]),
        ]);
        let conn = Connection::new(Arc::clone(&bus) as Arc<dyn CanBus>);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut events = RecordingEvents::default();
        let err = {
            let run = conn.start(shutdown_rx, &mut events);
            tokio::pin!(run);

            // let the receive loop drain the queued frames, then stop it
            tokio::select! {
                _ = &mut run => panic!("receive loop exited early"),
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
            shutdown_tx.send(true).unwrap();
            run.await.unwrap_err()
        };

        assert!(err.is_cancelled());
        assert_eq!(events.oil, vec![7]);
        assert_eq!(events.fuel, vec![3]);
        assert!(*bus.disconnected.lock().unwrap());
    }

    #[test]
    fn test_send_speed_publishes_speed_frame() {
        let bus = StubBus::with_frames(vec![]);
        let conn = Connection::new(Arc::clone(&bus) as Arc<dyn CanBus>);

        conn.send_speed(88).unwrap();

        let sent = bus.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, frame::FRAME_SPEED);
        assert_eq!(sent[0].payload(), &[88]);
    }
}
