//! Gateway configuration.
//!
//! Loaded from a TOML file at startup. Device paths default to the wiring
//! of the reference installation; the UDP endpoint must be given.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::{GatewayError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub devices: Devices,
    pub udp: UdpConfig,
}

/// Hardware device paths.
#[derive(Debug, Clone, Deserialize)]
pub struct Devices {
    /// Serial port of the ECU diagnostic link.
    #[serde(default = "default_ecu_device")]
    pub ecu: String,

    /// Serial port of the GPS receiver.
    #[serde(default = "default_gps_device")]
    pub gps: String,

    /// SocketCAN interface name.
    #[serde(default = "default_can_device")]
    pub can: String,
}

impl Default for Devices {
    fn default() -> Self {
        Self {
            ecu: default_ecu_device(),
            gps: default_gps_device(),
            can: default_can_device(),
        }
    }
}

fn default_ecu_device() -> String {
    "/dev/obd".to_string()
}

fn default_gps_device() -> String {
    "/dev/ttyAMA0".to_string()
}

fn default_can_device() -> String {
    "can0".to_string()
}

/// UDP forwarding endpoint and pacing.
#[derive(Debug, Clone, Deserialize)]
pub struct UdpConfig {
    pub server: String,
    pub port: u16,

    /// Minimum spacing between packets, in milliseconds.
    #[serde(default = "default_gate_interval_ms")]
    pub gate_interval_ms: u64,

    /// Maximum silence before a keep-alive re-send, in milliseconds.
    #[serde(default = "default_min_send_delay_ms")]
    pub min_send_delay_ms: u64,
}

fn default_gate_interval_ms() -> u64 {
    100
}

fn default_min_send_delay_ms() -> u64 {
    1000
}

impl UdpConfig {
    pub fn gate_interval(&self) -> Duration {
        Duration::from_millis(self.gate_interval_ms)
    }

    pub fn min_send_delay(&self) -> Duration {
        Duration::from_millis(self.min_send_delay_ms)
    }
}

impl Config {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            GatewayError::Config(format!("unable to read {}: {err}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|err| {
            GatewayError::Config(format!("unable to parse {}: {err}", path.display()))
        })
    }
}
