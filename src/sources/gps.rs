//! GPS receiver adapter.
//!
//! The vendor receiver stack is consumed through the [`GpsLink`] contract;
//! a connect factory is injected at construction so tests (and alternative
//! receiver drivers) can substitute their own implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::core::error::{GatewayError, Result};
use crate::core::mailbox::MailboxSender;
use crate::core::retry::Retryable;
use crate::core::telemetry::GpsSample;

/// Maximum horizontal dilution of precision accepted from the receiver.
const MAX_HDOP: u32 = 500;

/// Satellite fix quality reported with each navigation update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fix {
    None,
    TwoD,
    ThreeD,
    ThreeDDgps,
}

/// One navigation update from the receiver.
///
/// Positions are in 1e-7 degrees, altitude in centimeters, velocities in
/// cm/s, matching the receiver's native units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavData {
    pub fix: Fix,
    pub hdop: u32,
    pub latitude: i32,
    pub longitude: i32,
    pub altitude: i32,
    pub vx: i32,
    pub vy: i32,
}

/// Receiver event sink.
pub trait GpsEvents: Send {
    fn software_version(&mut self, version: &str);
    fn nav_data(&mut self, nav: &NavData);
}

/// Vendor receiver handle.
#[async_trait]
pub trait GpsLink: Send + Sync {
    async fn close(&self) -> Result<()>;
    async fn start(
        &self,
        shutdown: watch::Receiver<bool>,
        events: &mut dyn GpsEvents,
    ) -> Result<()>;
}

/// Factory producing a connected receiver handle.
pub type GpsConnectFn = Box<dyn Fn(&str) -> Result<Arc<dyn GpsLink>> + Send + Sync>;

/// Supervised GPS source.
pub struct GpsSource {
    device: String,
    connect: GpsConnectFn,
    link: Option<Arc<dyn GpsLink>>,
    tx: MailboxSender<GpsSample>,
}

impl GpsSource {
    pub fn new(
        device: impl Into<String>,
        connect: GpsConnectFn,
        tx: MailboxSender<GpsSample>,
    ) -> Self {
        Self {
            device: device.into(),
            connect,
            link: None,
            tx,
        }
    }
}

struct NavSink<'a> {
    tx: &'a MailboxSender<GpsSample>,
}

impl GpsEvents for NavSink<'_> {
    fn software_version(&mut self, version: &str) {
        info!(version, "receiver software version");
    }

    fn nav_data(&mut self, nav: &NavData) {
        if nav.fix == Fix::None {
            warn!("no satellite fix");
            return;
        }
        if nav.hdop > MAX_HDOP {
            warn!(hdop = nav.hdop, "poor resolution");
            return;
        }

        let vx = nav.vx as f64;
        let vy = nav.vy as f64;
        let speed = (vx * vx + vy * vy).sqrt();
        let mut track = (vx / vy).atan();
        if track.is_nan() {
            // both velocity components zero: heading is undefined
            track = 0.0;
        }

        self.tx.offer(GpsSample {
            latitude: nav.latitude,
            longitude: nav.longitude,
            altitude: nav.altitude,
            track,
            speed,
        });
    }
}

#[async_trait]
impl Retryable for GpsSource {
    fn name(&self) -> &'static str {
        "gps"
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
            .ok_or_else(|| GatewayError::NotInitialized("gps"))?;
        let mut sink = NavSink { tx: &self.tx };
        link.start(shutdown, &mut sink).await
    }
}
