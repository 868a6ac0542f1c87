//! Engine-control-unit diagnostic-link adapter.
//!
//! The serial diagnostic protocol itself lives in a vendor driver consumed
//! through [`EcuLink`]. The adapter asks the unit for measurement groups in
//! a loop and routes the resulting metric callbacks into an [`EcuSample`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info};

use crate::core::error::{GatewayError, Result};
use crate::core::mailbox::MailboxSender;
use crate::core::retry::Retryable;
use crate::core::telemetry::{normalize, EcuSample, MetricValue};

/// Low-frequency group request interval.
const SLOW_GROUP_INTERVAL: Duration = Duration::from_secs(2);

/// Measurement groups the unit can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementGroup {
    /// RPM, throttle angle and intake air temperature (high frequency).
    RpmThrottleIntakeAir,
    /// RPM and vehicle speed (high frequency).
    RpmSpeed,
    /// RPM, battery voltage and injection time (low frequency).
    RpmBatteryInjectionTime,
}

/// Metric kinds delivered within a measurement group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Rpm,
    BatteryVoltage,
    ThrottleAngle,
    AirIntakeTemp,
    Speed,
    /// Kinds the collector does not consume (injection time and friends).
    Other,
}

/// A single measurement within a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub metric: Metric,
    pub value: MetricValue,
}

/// Identification data the unit sends right after connecting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EcuDetails {
    pub part_number: String,
    pub details: Vec<String>,
}

/// Diagnostic-link event sink.
pub trait EcuEvents: Send {
    fn details(&mut self, details: &EcuDetails);
    fn measurement(&mut self, group: MeasurementGroup, measurements: &[Measurement]);
}

/// Vendor diagnostic-link handle.
#[async_trait]
pub trait EcuLink: Send + Sync {
    async fn close(&self) -> Result<()>;
    async fn start(
        &self,
        shutdown: watch::Receiver<bool>,
        events: &mut dyn EcuEvents,
    ) -> Result<()>;

    /// Ask the unit to send one measurement group.
    async fn request_group(&self, group: MeasurementGroup) -> Result<()>;
}

/// Factory producing a connected diagnostic-link handle.
pub type EcuConnectFn = Box<dyn Fn(&str) -> Result<Arc<dyn EcuLink>> + Send + Sync>;

/// Supervised ECU source.
pub struct EcuSource {
    device: String,
    connect: EcuConnectFn,
    link: Option<Arc<dyn EcuLink>>,
    tx: MailboxSender<EcuSample>,
}

impl EcuSource {
    pub fn new(
        device: impl Into<String>,
        connect: EcuConnectFn,
        tx: MailboxSender<EcuSample>,
    ) -> Self {
        Self {
            device: device.into(),
            connect,
            link: None,
            tx,
        }
    }
}

struct MeasurementSink<'a> {
    sample: EcuSample,
    tx: &'a MailboxSender<EcuSample>,
    link: Arc<dyn EcuLink>,
    shutdown: watch::Receiver<bool>,
}

impl EcuEvents for MeasurementSink<'_> {
    fn details(&mut self, details: &EcuDetails) {
        info!(part_number = %details.part_number, "connected to engine control unit");
        for line in &details.details {
            info!("ECU: {line}");
        }

        // the unit only sends measurements when asked; keep asking until the
        // link dies
        tokio::spawn(run_measurement_requests(
            Arc::clone(&self.link),
            self.shutdown.clone(),
        ));
    }

    fn measurement(&mut self, _group: MeasurementGroup, measurements: &[Measurement]) {
        for m in measurements {
            match m.metric {
                Metric::Rpm => self.sample.rpm = normalize(&m.value),
                Metric::BatteryVoltage => self.sample.battery_voltage = normalize(&m.value),
                Metric::ThrottleAngle => self.sample.gas_pedal_angle = normalize(&m.value) as i32,
                Metric::AirIntakeTemp => self.sample.air_intake_temp = normalize(&m.value),
                Metric::Speed => self.sample.speed = normalize(&m.value) as i32,
                Metric::Other => {}
            }
        }
        self.tx.offer(self.sample);
    }
}

/// Request the two high-frequency groups every iteration and the
/// low-frequency group at most every [`SLOW_GROUP_INTERVAL`]. Stops on the
/// first request failure or on shutdown.
async fn run_measurement_requests(link: Arc<dyn EcuLink>, shutdown: watch::Receiver<bool>) {
    info!("starting measurement requests");
    let mut last_slow = Instant::now();
    loop {
        if *shutdown.borrow() {
            return;
        }

        let mut result = link.request_group(MeasurementGroup::RpmThrottleIntakeAir).await;
        if result.is_ok() {
            result = link.request_group(MeasurementGroup::RpmSpeed).await;
        }
        if result.is_ok() && last_slow.elapsed() >= SLOW_GROUP_INTERVAL {
            result = link
                .request_group(MeasurementGroup::RpmBatteryInjectionTime)
                .await;
            last_slow = Instant::now();
        }

        if let Err(err) = result {
            error!(%err, "unable to request measurement group");
            return;
        }
    }
}

#[async_trait]
impl Retryable for EcuSource {
    fn name(&self) -> &'static str {
        "ecu"
    }

    async fn open(&mut self) -> Result<()> {
        self.link = Some((self.connect)(&self.device)?);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.link.take() {
            Some(link) => link.close().await,
            None => Ok(()),
        }
    }

    async fn start(&mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let link = self
            .link
            .clone()
            .ok_or_else(|| GatewayError::NotInitialized("ecu"))?;
        // a reconnect starts from a blank sample; stale readings from the
        // previous session are not replayed
        let mut sink = MeasurementSink {
            sample: EcuSample::default(),
            tx: &self.tx,
            link: Arc::clone(&link),
            shutdown: shutdown.clone(),
        };
        link.start(shutdown, &mut sink).await
    }
}
