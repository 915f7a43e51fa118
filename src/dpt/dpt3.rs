//! DPT 3.xxx - 3-bit controlled (4 bit).
//!
//! Stepwise dimming and blind positioning commands:
//!
//! ```text
//! Bit 3: control (direction)
//! Bits 2-0: step code (0 = break, 1-7 = intervals)
//! ```
//!
//! A step code of `n` (1-7) means `2^(n-1)` intervals; 0 halts the
//! running operation.

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

/// DPT 3.xxx step control types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dpt3 {
    /// DPT 3.007 - Dimming control (decrease/increase)
    Dimming,
    /// DPT 3.008 - Blind control (up/down)
    Blind,
}

/// Step code of a DPT 3 command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StepCode {
    /// Break - halt the current operation
    Break = 0,
    /// 1 interval
    Intervals1 = 1,
    /// 2 intervals
    Intervals2 = 2,
    /// 4 intervals
    Intervals4 = 3,
    /// 8 intervals
    Intervals8 = 4,
    /// 16 intervals
    Intervals16 = 5,
    /// 32 intervals
    Intervals32 = 6,
    /// 64 intervals
    Intervals64 = 7,
}

impl StepCode {
    /// Resolve a raw 3-bit step code.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Break),
            1 => Some(Self::Intervals1),
            2 => Some(Self::Intervals2),
            3 => Some(Self::Intervals4),
            4 => Some(Self::Intervals8),
            5 => Some(Self::Intervals16),
            6 => Some(Self::Intervals32),
            7 => Some(Self::Intervals64),
            _ => None,
        }
    }
}

impl Dpt3 {
    /// Resolve a subtype number.
    pub const fn from_sub(sub: u16) -> Option<Self> {
        match sub {
            7 => Some(Self::Dimming),
            8 => Some(Self::Blind),
            _ => None,
        }
    }

    /// The DPT identifier string.
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::Dimming => "3.007",
            Self::Blind => "3.008",
        }
    }
}

impl DptEncode<(bool, StepCode)> for Dpt3 {
    /// Encode `(control, step)` as `(control << 3) | step`.
    fn encode(&self, (control, step): (bool, StepCode), buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(KnxError::buffer_too_small());
        }
        buf[0] = (u8::from(control) << 3) | step as u8;
        Ok(1)
    }
}

impl DptDecode<(bool, StepCode)> for Dpt3 {
    fn decode(&self, data: &[u8]) -> Result<(bool, StepCode)> {
        if data.len() != 1 {
            return Err(KnxError::dpt_length_mismatch());
        }
        let control = (data[0] & 0x08) != 0;
        // from_u8 cannot fail after masking to 3 bits
        let step = StepCode::from_u8(data[0] & 0x07).unwrap_or(StepCode::Break);
        Ok((control, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_packing() {
        let mut buf = [0u8; 1];
        Dpt3::Dimming.encode((true, StepCode::Intervals16), &mut buf).unwrap();
        assert_eq!(buf[0], 0x0D); // 0x08 | 5

        Dpt3::Dimming.encode((false, StepCode::Break), &mut buf).unwrap();
        assert_eq!(buf[0], 0x00);
    }

    #[test]
    fn round_trip_all_commands() {
        let mut buf = [0u8; 1];
        for control in [false, true] {
            for raw in 0..=7u8 {
                let step = StepCode::from_u8(raw).unwrap();
                Dpt3::Blind.encode((control, step), &mut buf).unwrap();
                assert_eq!(Dpt3::Blind.decode(&buf).unwrap(), (control, step));
            }
        }
    }

    #[test]
    fn decode_ignores_upper_nibble() {
        // Only the low 4 bits are significant
        assert_eq!(
            Dpt3::Dimming.decode(&[0x3D]).unwrap(),
            (true, StepCode::Intervals16)
        );
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(Dpt3::Dimming.decode(&[]).is_err());
    }
}
