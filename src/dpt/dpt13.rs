//! DPT 13.xxx - 32-bit signed value (4 bytes, big-endian two's complement).
//!
//! Energy counters, flow rates and long counters.

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

/// DPT 13.xxx 32-bit signed types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dpt13 {
    /// DPT 13.001 - Counter pulses
    Counter,
    /// DPT 13.002 - Flow rate (l/h)
    FlowRate,
    /// DPT 13.010 - Active energy (Wh)
    ActiveEnergy,
    /// DPT 13.011 - Apparent energy (VAh)
    ApparentEnergy,
    /// DPT 13.012 - Reactive energy (VArh)
    ReactiveEnergy,
    /// DPT 13.013 - Active energy (kWh)
    ActiveEnergyKwh,
    /// DPT 13.100 - Long time delta (s)
    LongDeltaTimeSec,
}

impl Dpt13 {
    /// Resolve a subtype number.
    pub const fn from_sub(sub: u16) -> Option<Self> {
        match sub {
            1 => Some(Self::Counter),
            2 => Some(Self::FlowRate),
            10 => Some(Self::ActiveEnergy),
            11 => Some(Self::ApparentEnergy),
            12 => Some(Self::ReactiveEnergy),
            13 => Some(Self::ActiveEnergyKwh),
            100 => Some(Self::LongDeltaTimeSec),
            _ => None,
        }
    }

    /// The DPT identifier string.
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::Counter => "13.001",
            Self::FlowRate => "13.002",
            Self::ActiveEnergy => "13.010",
            Self::ApparentEnergy => "13.011",
            Self::ReactiveEnergy => "13.012",
            Self::ActiveEnergyKwh => "13.013",
            Self::LongDeltaTimeSec => "13.100",
        }
    }

    /// The unit string.
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Counter => "pulses",
            Self::FlowRate => "l/h",
            Self::ActiveEnergy => "Wh",
            Self::ApparentEnergy => "VAh",
            Self::ReactiveEnergy => "VArh",
            Self::ActiveEnergyKwh => "kWh",
            Self::LongDeltaTimeSec => "s",
        }
    }
}

impl DptEncode<i32> for Dpt13 {
    fn encode(&self, value: i32, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 4 {
            return Err(KnxError::buffer_too_small());
        }
        buf[0..4].copy_from_slice(&value.to_be_bytes());
        Ok(4)
    }
}

impl DptDecode<i32> for Dpt13 {
    fn decode(&self, data: &[u8]) -> Result<i32> {
        if data.len() != 4 {
            return Err(KnxError::dpt_length_mismatch());
        }
        Ok(i32::from_be_bytes([data[0], data[1], data[2], data[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut buf = [0u8; 4];
        for value in [i32::MIN, -1000, -1, 0, 1, 500_000, i32::MAX] {
            Dpt13::ActiveEnergy.encode(value, &mut buf).unwrap();
            assert_eq!(Dpt13::ActiveEnergy.decode(&buf).unwrap(), value);
        }
    }

    #[test]
    fn twos_complement_layout() {
        let mut buf = [0u8; 4];
        Dpt13::ActiveEnergy.encode(500_000, &mut buf).unwrap();
        assert_eq!(buf, [0x00, 0x07, 0xA1, 0x20]);

        Dpt13::FlowRate.encode(-1000, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF, 0xFC, 0x18]);
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(Dpt13::Counter.decode(&[0, 0]).is_err());
        assert!(Dpt13::Counter.decode(&[0, 0, 0, 0, 0]).is_err());
    }
}
