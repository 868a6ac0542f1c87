//! Frame layout for the sensor bus.
//!
//! The bus carries four fixed-purpose frames: three inbound sensor readings
//! (2-byte little-endian unsigned payloads) and one outbound speed echo
//! (single byte).

use crate::core::error::{GatewayError, Result};

/// Inbound oil temperature.
pub const FRAME_OIL_TEMP: u32 = 0x100;
/// Inbound coolant temperature.
pub const FRAME_COOLANT_TEMP: u32 = 0x101;
/// Inbound fuel level.
pub const FRAME_FUEL: u32 = 0x102;
/// Outbound vehicle speed.
pub const FRAME_SPEED: u32 = 0x103;

/// A raw CAN frame. Bytes past `len` are unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    pub id: u32,
    pub len: u8,
    pub data: [u8; 8],
}

impl Frame {
    /// Create a frame from a payload slice (truncated to 8 bytes).
    pub fn new(id: u32, payload: &[u8]) -> Self {
        let mut data = [0u8; 8];
        let len = payload.len().min(8);
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id,
            len: len as u8,
            data,
        }
    }

    /// The valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..(self.len as usize).min(8)]
    }
}

/// Decode a 2-byte little-endian unsigned sensor reading.
///
/// Any other declared length is a decode error; the sensor frames on this
/// bus are always exactly two bytes.
pub fn decode_u16(frame: &Frame) -> Result<i32> {
    if frame.len != 2 {
        return Err(GatewayError::decode(format!(
            "incorrect frame size for u16: {}",
            frame.len
        )));
    }
    Ok(u16::from_le_bytes([frame.data[0], frame.data[1]]) as i32)
}

/// Build the outbound speed frame. The speed is truncated to 8 bits.
pub fn speed_frame(speed: i32) -> Frame {
    Frame::new(FRAME_SPEED, &[speed as u8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_u16_little_endian() {
        let frame = Frame::new(FRAME_FUEL, &[0x34, 0x12]);
        assert_eq!(decode_u16(&frame).unwrap(), 0x1234);
    }

    #[test]
    fn test_decode_u16_rejects_wrong_length() {
        let frame = Frame::new(FRAME_OIL_TEMP, &[0x01]);
        assert!(decode_u16(&frame).is_err());

        let frame = Frame::new(FRAME_OIL_TEMP, &[1, 2, 3]);
        assert!(decode_u16(&frame).is_err());
    }

    #[test]
    fn test_speed_frame_truncates() {
        let frame = speed_frame(100);
        assert_eq!(frame.id, FRAME_SPEED);
        assert_eq!(frame.len, 1);
        assert_eq!(frame.data[0], 100);

        // 300 does not fit in a byte; only the low 8 bits go on the wire
        let frame = speed_frame(300);
        assert_eq!(frame.data[0], 44);
    }

    #[test]
    fn test_payload_bounds() {
        let frame = Frame::new(FRAME_FUEL, &[1, 2]);
        assert_eq!(frame.payload(), &[1, 2]);

        let frame = Frame::new(FRAME_FUEL, &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(frame.len, 8);
        assert_eq!(frame.payload().len(), 8);
    }
}
