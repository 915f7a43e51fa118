//! DPT 8.xxx - 16-bit signed value (2 bytes, big-endian two's complement).

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

/// DPT 8.xxx 16-bit signed types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dpt8 {
    /// DPT 8.001 - Pulse difference
    PulsesDiff,
    /// DPT 8.002 - Time delta (ms)
    DeltaTimeMs,
    /// DPT 8.005 - Time delta (s)
    DeltaTimeSec,
    /// DPT 8.011 - Rotation angle (degrees)
    RotationAngle,
}

impl Dpt8 {
    /// Resolve a subtype number.
    pub const fn from_sub(sub: u16) -> Option<Self> {
        match sub {
            1 => Some(Self::PulsesDiff),
            2 => Some(Self::DeltaTimeMs),
            5 => Some(Self::DeltaTimeSec),
            11 => Some(Self::RotationAngle),
            _ => None,
        }
    }

    /// The DPT identifier string.
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::PulsesDiff => "8.001",
            Self::DeltaTimeMs => "8.002",
            Self::DeltaTimeSec => "8.005",
            Self::RotationAngle => "8.011",
        }
    }
}

impl DptEncode<i16> for Dpt8 {
    fn encode(&self, value: i16, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 2 {
            return Err(KnxError::buffer_too_small());
        }
        buf[0..2].copy_from_slice(&value.to_be_bytes());
        Ok(2)
    }
}

impl DptDecode<i16> for Dpt8 {
    fn decode(&self, data: &[u8]) -> Result<i16> {
        if data.len() != 2 {
            return Err(KnxError::dpt_length_mismatch());
        }
        Ok(i16::from_be_bytes([data[0], data[1]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut buf = [0u8; 2];
        for value in [i16::MIN, -12345, -1, 0, 1, i16::MAX] {
            Dpt8::PulsesDiff.encode(value, &mut buf).unwrap();
            assert_eq!(Dpt8::PulsesDiff.decode(&buf).unwrap(), value);
        }
    }

    #[test]
    fn twos_complement_layout() {
        let mut buf = [0u8; 2];
        Dpt8::DeltaTimeMs.encode(-1, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF]);
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(Dpt8::PulsesDiff.decode(&[0]).is_err());
    }
}
