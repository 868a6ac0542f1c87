//! Telemetry fan-in and change detection.
//!
//! The collector blocks on the three source mailboxes, merges whichever
//! sample arrives into a candidate snapshot, and promotes the candidate only
//! when it differs from the current snapshot. Each source owns a fixed set
//! of snapshot fields, so readings from different sources compose over time.

use tracing::error;

use crate::core::mailbox::{mailbox, MailboxReceiver, MailboxSender};
use crate::core::telemetry::{CanSensorSample, EcuSample, GpsSample, Telemetry};
use crate::forward::Forwarder;

/// Producer handles for the three sources.
pub struct Intake {
    pub gps: MailboxSender<GpsSample>,
    pub ecu: MailboxSender<EcuSample>,
    pub can: MailboxSender<CanSensorSample>,
}

/// Merges source samples into the canonical snapshot pair.
pub struct Collector {
    previous: Telemetry,
    current: Telemetry,
    gps_rx: MailboxReceiver<GpsSample>,
    ecu_rx: MailboxReceiver<EcuSample>,
    can_rx: MailboxReceiver<CanSensorSample>,
    forwarders: Vec<Box<dyn Forwarder>>,
}

impl Collector {
    /// Create a collector plus the intake handles its sources feed.
    pub fn new() -> (Self, Intake) {
        let (gps_tx, gps_rx) = mailbox();
        let (ecu_tx, ecu_rx) = mailbox();
        let (can_tx, can_rx) = mailbox();

        let collector = Self {
            previous: Telemetry::default(),
            current: Telemetry::default(),
            gps_rx,
            ecu_rx,
            can_rx,
            forwarders: Vec::new(),
        };
        let intake = Intake {
            gps: gps_tx,
            ecu: ecu_tx,
            can: can_tx,
        };
        (collector, intake)
    }

    /// Register a sink. Sinks run in registration order on every change.
    pub fn add_forwarder(&mut self, forwarder: Box<dyn Forwarder>) {
        self.forwarders.push(forwarder);
    }

    /// The snapshot before the most recent change.
    pub fn previous(&self) -> Telemetry {
        self.previous
    }

    /// The current snapshot.
    pub fn current(&self) -> Telemetry {
        self.current
    }

    /// Wait for one sample from any source and merge it.
    ///
    /// Returns `Some(true)` when the merge changed the snapshot,
    /// `Some(false)` when the sample was redundant, and `None` once every
    /// intake handle is gone. When several mailboxes are ready the pick
    /// among them is random; no source has priority.
    pub async fn poll_once(&mut self) -> Option<bool> {
        let mut candidate = self.current;

        tokio::select! {
            Some(gps) = self.gps_rx.recv() => {
                candidate.latitude = gps.latitude as f64 / 1e7;
                candidate.longitude = gps.longitude as f64 / 1e7;
                candidate.altitude = gps.altitude as f32 / 100.0;
                candidate.track = gps.track as f32;
                candidate.gps_speed = gps.speed as f32;
            }
            Some(ecu) = self.ecu_rx.recv() => {
                candidate.gas_pedal_angle = ecu.gas_pedal_angle as u8;
                candidate.rpm = ecu.rpm;
                candidate.oil_pressure = ecu.oil_pressure;
                candidate.speed = ecu.speed as f32;
                candidate.air_intake_temp = ecu.air_intake_temp;
                candidate.battery_voltage = ecu.battery_voltage;
                // coolant temperature belongs to the CAN sensors, not the ECU
            }
            Some(can) = self.can_rx.recv() => {
                candidate.fuel_remaining = can.fuel_remaining;
                candidate.fuel_level = can.fuel_level as u8;
                candidate.coolant_temp = can.coolant_temp as f32;
                candidate.oil_temp = can.oil_temp as f32;
            }
            else => return None,
        }

        if candidate != self.current {
            self.previous = self.current;
            self.current = candidate;
            return Some(true);
        }
        Some(false)
    }

    /// Run every registered forwarder against the latest change.
    ///
    /// A failing forwarder is logged with its identity and does not stop
    /// the remaining ones.
    pub async fn notify_forwarders(&mut self) {
        for forwarder in &mut self.forwarders {
            if let Err(err) = forwarder.forward(&self.previous, &self.current).await {
                error!(forwarder = forwarder.name(), %err, "unable to forward telemetry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{GatewayError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_gps_merge_and_change_detection() {
        let (mut collector, intake) = Collector::new();

        let gps = GpsSample {
            latitude: 1,
            longitude: 2,
            altitude: 3,
            track: 4.0,
            speed: 5.0,
        };
        intake.gps.offer(gps);
        assert_eq!(collector.poll_once().await, Some(true));
        assert_eq!(collector.current().latitude, 0.0000001);
        assert_eq!(collector.current().longitude, 0.0000002);
        assert_eq!(collector.current().altitude, 0.03);
        assert_eq!(collector.current().track, 4.0);
        assert_eq!(collector.current().gps_speed, 5.0);

        // the same data again is not a change
        intake.gps.offer(gps);
        let before = collector.current();
        assert_eq!(collector.poll_once().await, Some(false));
        assert_eq!(collector.current(), before);

        intake.gps.offer(GpsSample {
            latitude: 6,
            longitude: 7,
            altitude: 8,
            track: 9.0,
            speed: 10.0,
        });
        assert_eq!(collector.poll_once().await, Some(true));
        assert_eq!(collector.current().latitude, 0.0000006);
        assert_eq!(collector.current().longitude, 0.0000007);
        assert_eq!(collector.current().altitude, 0.08);
        assert_eq!(collector.current().track, 9.0);
        assert_eq!(collector.current().gps_speed, 10.0);
        assert_eq!(collector.previous().latitude, 0.0000001);
    }

    #[tokio::test]
    async fn test_ecu_merge_skips_coolant_temp() {
        let (mut collector, intake) = Collector::new();

        let ecu = EcuSample {
            gas_pedal_angle: 1,
            rpm: 2.0,
            oil_pressure: 3.0,
            speed: 4,
            coolant_temp: 5.0,
            air_intake_temp: 6.0,
            battery_voltage: 7.0,
        };
        intake.ecu.offer(ecu);
        assert_eq!(collector.poll_once().await, Some(true));
        assert_eq!(collector.current().gas_pedal_angle, 1);
        assert_eq!(collector.current().rpm, 2.0);
        assert_eq!(collector.current().oil_pressure, 3.0);
        assert_eq!(collector.current().speed, 4.0);
        assert_eq!(
            collector.current().coolant_temp,
            0.0,
            "coolant temp must not come from the ECU"
        );
        assert_eq!(collector.current().air_intake_temp, 6.0);
        assert_eq!(collector.current().battery_voltage, 7.0);

        intake.ecu.offer(ecu);
        assert_eq!(collector.poll_once().await, Some(false));
    }

    #[tokio::test]
    async fn test_can_merge() {
        let (mut collector, intake) = Collector::new();

        let can = CanSensorSample {
            fuel_remaining: 1.0,
            fuel_level: 2,
            coolant_temp: 3,
            oil_temp: 4,
        };
        intake.can.offer(can);
        assert_eq!(collector.poll_once().await, Some(true));
        assert_eq!(collector.current().fuel_remaining, 1.0);
        assert_eq!(collector.current().fuel_level, 2);
        assert_eq!(collector.current().coolant_temp, 3.0);
        assert_eq!(collector.current().oil_temp, 4.0);

        intake.can.offer(can);
        assert_eq!(collector.poll_once().await, Some(false));
    }

    #[tokio::test]
    async fn test_fields_compose_across_sources() {
        let (mut collector, intake) = Collector::new();

        intake.ecu.offer(EcuSample {
            speed: 4,
            ..Default::default()
        });
        assert_eq!(collector.poll_once().await, Some(true));
        assert_eq!(collector.current().speed, 4.0);

        intake.can.offer(CanSensorSample {
            fuel_remaining: 1.0,
            ..Default::default()
        });
        assert_eq!(collector.poll_once().await, Some(true));
        // both fields now present in one snapshot
        assert_eq!(collector.current().speed, 4.0);
        assert_eq!(collector.current().fuel_remaining, 1.0);
    }

    #[tokio::test]
    async fn test_poll_ends_when_intake_dropped() {
        let (mut collector, intake) = Collector::new();
        drop(intake);
        assert_eq!(collector.poll_once().await, None);
    }

    struct CountingForwarder {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Forwarder for CountingForwarder {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn forward(&mut self, _previous: &Telemetry, _current: &Telemetry) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GatewayError::forward("sink unavailable"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_forwarder_does_not_stop_siblings() {
        let (mut collector, _intake) = Collector::new();

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        collector.add_forwarder(Box::new(CountingForwarder {
            calls: Arc::clone(&first),
            fail: true,
        }));
        collector.add_forwarder(Box::new(CountingForwarder {
            calls: Arc::clone(&second),
            fail: false,
        }));

        collector.notify_forwarders().await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
