//! DPT 5.xxx - 8-bit unsigned value (1 byte).
//!
//! Two families share the major: scaled subtypes map a percentage or angle
//! onto the full byte range, raw subtypes carry the byte as-is.
//!
//! ## Common subtypes
//!
//! - **5.001** - Scaling (0-100 %), scaled by 255/100
//! - **5.003** - Angle (0-360 degrees), scaled by 255/360
//! - **5.004** - Percent 0-255 (raw)
//! - **5.005** - Ratio (raw)
//! - **5.006** - Tariff (0-254)
//! - **5.010** - Counter pulses (raw)
//!
//! Scaled subtypes decode to values rounded to two decimals, so a
//! round trip stays within one scale step of the original.

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

/// DPT 5.xxx 8-bit unsigned types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dpt5 {
    /// DPT 5.001 - Scaling (0-100 %)
    Scaling,
    /// DPT 5.003 - Angle (0-360 degrees)
    Angle,
    /// DPT 5.004 - Percent 0-255
    PercentU8,
    /// DPT 5.005 - Ratio (0-255)
    Ratio,
    /// DPT 5.006 - Tariff (0-254)
    Tariff,
    /// DPT 5.010 - Counter pulses (0-255)
    Counter,
}

impl Dpt5 {
    /// Resolve a subtype number.
    pub const fn from_sub(sub: u16) -> Option<Self> {
        match sub {
            1 => Some(Self::Scaling),
            3 => Some(Self::Angle),
            4 => Some(Self::PercentU8),
            5 => Some(Self::Ratio),
            6 => Some(Self::Tariff),
            10 => Some(Self::Counter),
            _ => None,
        }
    }

    /// The DPT identifier string.
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::Scaling => "5.001",
            Self::Angle => "5.003",
            Self::PercentU8 => "5.004",
            Self::Ratio => "5.005",
            Self::Tariff => "5.006",
            Self::Counter => "5.010",
        }
    }

    /// The unit string.
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Scaling => "%",
            Self::Angle => "°",
            Self::Counter => "pulses",
            Self::PercentU8 | Self::Ratio | Self::Tariff => "",
        }
    }

    /// Whether this subtype scales its value onto the byte range.
    pub const fn is_scaled(&self) -> bool {
        matches!(self, Self::Scaling | Self::Angle)
    }

    /// Upper bound of the scaled value range.
    const fn scale_max(&self) -> f32 {
        match self {
            Self::Angle => 360.0,
            _ => 100.0,
        }
    }

    /// Encode a raw (unscaled) byte value.
    pub fn encode_raw(&self, value: u8, buf: &mut [u8]) -> Result<usize> {
        if self.is_scaled() {
            return Err(KnxError::dpt_type_mismatch());
        }
        if matches!(self, Self::Tariff) && value == 255 {
            return Err(KnxError::dpt_value_out_of_range());
        }
        if buf.is_empty() {
            return Err(KnxError::buffer_too_small());
        }
        buf[0] = value;
        Ok(1)
    }

    /// Decode a raw (unscaled) byte value.
    pub fn decode_raw(&self, data: &[u8]) -> Result<u8> {
        if data.len() != 1 {
            return Err(KnxError::dpt_length_mismatch());
        }
        if matches!(self, Self::Tariff) && data[0] == 255 {
            return Err(KnxError::dpt_value_out_of_range());
        }
        Ok(data[0])
    }
}

/// Round half-up to two decimals (values here are always non-negative).
fn round2(value: f32) -> f32 {
    ((value * 100.0 + 0.5) as i32) as f32 / 100.0
}

impl DptEncode<f32> for Dpt5 {
    /// Encode a scaled value (Scaling / Angle subtypes only).
    fn encode(&self, value: f32, buf: &mut [u8]) -> Result<usize> {
        if !self.is_scaled() {
            return Err(KnxError::dpt_type_mismatch());
        }
        let max = self.scale_max();
        if !value.is_finite() || value < 0.0 || value > max {
            return Err(KnxError::dpt_value_out_of_range());
        }
        if buf.is_empty() {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = (value * 255.0 / max + 0.5) as u8;
        Ok(1)
    }
}

impl DptDecode<f32> for Dpt5 {
    /// Decode a scaled value, rounded to two decimals.
    fn decode(&self, data: &[u8]) -> Result<f32> {
        if !self.is_scaled() {
            return Err(KnxError::dpt_type_mismatch());
        }
        if data.len() != 1 {
            return Err(KnxError::dpt_length_mismatch());
        }

        Ok(round2(f32::from(data[0]) * self.scale_max() / 255.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_encode() {
        let mut buf = [0u8; 1];
        Dpt5::Scaling.encode(0.0, &mut buf).unwrap();
        assert_eq!(buf[0], 0x00);
        Dpt5::Scaling.encode(100.0, &mut buf).unwrap();
        assert_eq!(buf[0], 0xFF);
        Dpt5::Scaling.encode(50.0, &mut buf).unwrap();
        assert_eq!(buf[0], 128); // round(50 * 255 / 100)
    }

    #[test]
    fn scaling_decode_rounds_to_two_decimals() {
        let value = Dpt5::Scaling.decode(&[128]).unwrap();
        assert_eq!(value, 50.2); // 128 * 100 / 255 = 50.196...
        assert_eq!(Dpt5::Scaling.decode(&[0xFF]).unwrap(), 100.0);
    }

    #[test]
    fn scaling_round_trip_within_one_step() {
        let mut buf = [0u8; 1];
        for value in [0.0f32, 12.5, 25.0, 50.0, 75.0, 99.6, 100.0] {
            Dpt5::Scaling.encode(value, &mut buf).unwrap();
            let decoded = Dpt5::Scaling.decode(&buf).unwrap();
            // one scale step is 100/255 ≈ 0.39
            assert!((decoded - value).abs() < 0.4, "{} -> {}", value, decoded);
        }
    }

    #[test]
    fn angle_scaling() {
        let mut buf = [0u8; 1];
        Dpt5::Angle.encode(360.0, &mut buf).unwrap();
        assert_eq!(buf[0], 0xFF);
        Dpt5::Angle.encode(180.0, &mut buf).unwrap();
        assert_eq!(buf[0], 128);

        let decoded = Dpt5::Angle.decode(&[128]).unwrap();
        assert!((decoded - 180.0).abs() < 1.5);
    }

    #[test]
    fn out_of_range_rejected() {
        let mut buf = [0u8; 1];
        assert_eq!(
            Dpt5::Scaling.encode(100.5, &mut buf).unwrap_err(),
            KnxError::dpt_value_out_of_range()
        );
        assert!(Dpt5::Scaling.encode(-1.0, &mut buf).is_err());
        assert!(Dpt5::Angle.encode(361.0, &mut buf).is_err());
        assert!(Dpt5::Scaling.encode(f32::NAN, &mut buf).is_err());
    }

    #[test]
    fn raw_subtypes() {
        let mut buf = [0u8; 1];
        assert_eq!(Dpt5::Counter.encode_raw(255, &mut buf).unwrap(), 1);
        assert_eq!(Dpt5::Counter.decode_raw(&[255]).unwrap(), 255);
        assert_eq!(Dpt5::PercentU8.decode_raw(&[42]).unwrap(), 42);
    }

    #[test]
    fn tariff_excludes_255() {
        let mut buf = [0u8; 1];
        assert!(Dpt5::Tariff.encode_raw(254, &mut buf).is_ok());
        assert!(Dpt5::Tariff.encode_raw(255, &mut buf).is_err());
        assert!(Dpt5::Tariff.decode_raw(&[255]).is_err());
    }

    #[test]
    fn scaled_and_raw_apis_are_disjoint() {
        let mut buf = [0u8; 1];
        assert!(Dpt5::Scaling.encode_raw(10, &mut buf).is_err());
        assert!(Dpt5::Counter.encode(10.0, &mut buf).is_err());
        assert!(Dpt5::Counter.decode(&[10]).is_err());
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(Dpt5::Scaling.decode(&[]).is_err());
        assert!(Dpt5::Counter.decode_raw(&[1, 2]).is_err());
    }
}
