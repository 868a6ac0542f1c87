//! Telemetry packet layout for the UDP uplink.
//!
//! Packets are a fixed 63-byte little-endian layout with no padding: a
//! one-byte type header followed by the snapshot fields in wire order. The
//! layout is shared with the receiving side and must not change without a
//! protocol version bump.

use crate::core::error::{GatewayError, Result};
use crate::core::telemetry::Telemetry;

/// Header type for telemetry packets.
pub const TYPE_TELEMETRY: u8 = 1;
/// Header type reserved for timing packets.
pub const TYPE_TIMING: u8 = 2;

/// Exact on-wire size of a telemetry packet.
pub const TELEMETRY_PACKET_LEN: usize = 63;

/// Encode a snapshot into its on-wire form.
pub fn encode_telemetry(telemetry: &Telemetry) -> [u8; TELEMETRY_PACKET_LEN] {
    let mut buf = [0u8; TELEMETRY_PACKET_LEN];
    let mut w = Writer { buf: &mut buf, at: 0 };

    w.u8(TYPE_TELEMETRY);
    w.f32(telemetry.rpm);
    w.f32(telemetry.oil_pressure);
    w.f32(telemetry.speed);
    w.f32(telemetry.fuel_remaining);
    w.u8(telemetry.fuel_level);
    w.f32(telemetry.oil_temp);
    w.f32(telemetry.coolant_temp);
    w.f32(telemetry.air_intake_temp);
    w.f32(telemetry.battery_voltage);
    w.f64(telemetry.latitude);
    w.f64(telemetry.longitude);
    w.f32(telemetry.altitude);
    w.f32(telemetry.track);
    w.f32(telemetry.gps_speed);
    w.u8(telemetry.gas_pedal_angle);
    debug_assert_eq!(w.at, TELEMETRY_PACKET_LEN);

    buf
}

/// Decode a telemetry packet.
///
/// Rejects packets with the wrong size or a non-telemetry header.
pub fn decode_telemetry(packet: &[u8]) -> Result<Telemetry> {
    if packet.len() != TELEMETRY_PACKET_LEN {
        return Err(GatewayError::decode(format!(
            "incorrect telemetry packet size: {}",
            packet.len()
        )));
    }
    let mut r = Reader { buf: packet, at: 0 };

    let header = r.u8();
    if header != TYPE_TELEMETRY {
        return Err(GatewayError::decode(format!(
            "unexpected packet type: {header}"
        )));
    }

    Ok(Telemetry {
        rpm: r.f32(),
        oil_pressure: r.f32(),
        speed: r.f32(),
        fuel_remaining: r.f32(),
        fuel_level: r.u8(),
        oil_temp: r.f32(),
        coolant_temp: r.f32(),
        air_intake_temp: r.f32(),
        battery_voltage: r.f32(),
        latitude: r.f64(),
        longitude: r.f64(),
        altitude: r.f32(),
        track: r.f32(),
        gps_speed: r.f32(),
        gas_pedal_angle: r.u8(),
    })
}

struct Writer<'a> {
    buf: &'a mut [u8],
    at: usize,
}

impl Writer<'_> {
    fn u8(&mut self, v: u8) {
        self.buf[self.at] = v;
        self.at += 1;
    }

    fn f32(&mut self, v: f32) {
        self.buf[self.at..self.at + 4].copy_from_slice(&v.to_le_bytes());
        self.at += 4;
    }

    fn f64(&mut self, v: f64) {
        self.buf[self.at..self.at + 8].copy_from_slice(&v.to_le_bytes());
        self.at += 8;
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    at: usize,
}

impl Reader<'_> {
    fn u8(&mut self) -> u8 {
        let v = self.buf[self.at];
        self.at += 1;
        v
    }

    fn f32(&mut self) -> f32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buf[self.at..self.at + 4]);
        self.at += 4;
        f32::from_le_bytes(bytes)
    }

    fn f64(&mut self) -> f64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.buf[self.at..self.at + 8]);
        self.at += 8;
        f64::from_le_bytes(bytes)
    }
}
