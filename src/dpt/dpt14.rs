//! DPT 14.xxx - 32-bit IEEE-754 float (4 bytes, big-endian).
//!
//! All subtypes share the wire format; they differ only in unit. The
//! subtype table follows the normalized three-digit keys (the upstream
//! table carried a stray `0013` key and truncated names).

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

/// DPT 14.xxx 32-bit float types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dpt14 {
    /// DPT 14.000 - Acceleration (m/s²)
    Acceleration,
    /// DPT 14.007 - Angle (degrees)
    AngleDeg,
    /// DPT 14.019 - Electric current (A)
    ElectricCurrent,
    /// DPT 14.027 - Electric potential (V)
    ElectricPotential,
    /// DPT 14.031 - Energy (J)
    Energy,
    /// DPT 14.033 - Frequency (Hz)
    Frequency,
    /// DPT 14.056 - Power (W)
    Power,
    /// DPT 14.057 - Power factor
    PowerFactor,
    /// DPT 14.065 - Speed (m/s)
    Speed,
    /// DPT 14.068 - Temperature (°C)
    Temperature,
    /// DPT 14.076 - Volume (m³)
    Volume,
    /// Any other 14.xxx subtype (same wire format, unspecified unit)
    Generic,
}

impl Dpt14 {
    /// Resolve a subtype number. Unknown subtypes fall back to
    /// [`Dpt14::Generic`] since the wire format depends only on the major.
    pub const fn from_sub(sub: u16) -> Option<Self> {
        match sub {
            0 => Some(Self::Acceleration),
            7 => Some(Self::AngleDeg),
            19 => Some(Self::ElectricCurrent),
            27 => Some(Self::ElectricPotential),
            31 => Some(Self::Energy),
            33 => Some(Self::Frequency),
            56 => Some(Self::Power),
            57 => Some(Self::PowerFactor),
            65 => Some(Self::Speed),
            68 => Some(Self::Temperature),
            76 => Some(Self::Volume),
            _ => Some(Self::Generic),
        }
    }

    /// The DPT identifier string.
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::Acceleration => "14.000",
            Self::AngleDeg => "14.007",
            Self::ElectricCurrent => "14.019",
            Self::ElectricPotential => "14.027",
            Self::Energy => "14.031",
            Self::Frequency => "14.033",
            Self::Power => "14.056",
            Self::PowerFactor => "14.057",
            Self::Speed => "14.065",
            Self::Temperature => "14.068",
            Self::Volume => "14.076",
            Self::Generic => "14.xxx",
        }
    }

    /// The unit string.
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Acceleration => "m/s²",
            Self::AngleDeg => "°",
            Self::ElectricCurrent => "A",
            Self::ElectricPotential => "V",
            Self::Energy => "J",
            Self::Frequency => "Hz",
            Self::Power => "W",
            Self::PowerFactor => "",
            Self::Speed => "m/s",
            Self::Temperature => "°C",
            Self::Volume => "m³",
            Self::Generic => "",
        }
    }
}

impl DptEncode<f32> for Dpt14 {
    fn encode(&self, value: f32, buf: &mut [u8]) -> Result<usize> {
        if !value.is_finite() {
            return Err(KnxError::dpt_value_out_of_range());
        }
        if buf.len() < 4 {
            return Err(KnxError::buffer_too_small());
        }
        buf[0..4].copy_from_slice(&value.to_be_bytes());
        Ok(4)
    }
}

impl DptDecode<f32> for Dpt14 {
    fn decode(&self, data: &[u8]) -> Result<f32> {
        if data.len() != 4 {
            return Err(KnxError::dpt_length_mismatch());
        }
        Ok(f32::from_be_bytes([data[0], data[1], data[2], data[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ieee_round_trip_is_exact() {
        let mut buf = [0u8; 4];
        for value in [
            0.0f32,
            -0.0,
            1.0,
            -1.0,
            0.1,
            1234.5,
            -98765.4,
            f32::MIN,
            f32::MAX,
            f32::MIN_POSITIVE,
        ] {
            Dpt14::Power.encode(value, &mut buf).unwrap();
            let decoded = Dpt14::Power.decode(&buf).unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn big_endian_layout() {
        let mut buf = [0u8; 4];
        Dpt14::Power.encode(1.0, &mut buf).unwrap();
        assert_eq!(buf, [0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn non_finite_rejected() {
        let mut buf = [0u8; 4];
        assert!(Dpt14::Power.encode(f32::NAN, &mut buf).is_err());
        assert!(Dpt14::Power.encode(f32::INFINITY, &mut buf).is_err());
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(Dpt14::Power.decode(&[0, 0, 0]).is_err());
        assert!(Dpt14::Power.decode(&[0; 5]).is_err());
    }

    #[test]
    fn subtype_table_normalized() {
        // the upstream table's truncated "DPT_Value_Energ" entry
        assert_eq!(Dpt14::Energy.identifier(), "14.031");
        assert_eq!(Dpt14::Energy.unit(), "J");
        assert_eq!(Dpt14::from_sub(56), Some(Dpt14::Power));
        assert_eq!(Dpt14::from_sub(500), Some(Dpt14::Generic));
    }
}
