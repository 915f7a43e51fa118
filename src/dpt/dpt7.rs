//! DPT 7.xxx - 16-bit unsigned value (2 bytes, big-endian).
//!
//! ## Common subtypes
//!
//! - **7.001** - Pulses
//! - **7.002..7.007** - Time periods (ms to h)
//! - **7.012** - Current (mA)
//! - **7.013** - Brightness (lux)
//! - **7.600** - Colour temperature (K)

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

/// DPT 7.xxx 16-bit unsigned types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dpt7 {
    /// DPT 7.001 - Pulses
    Pulses,
    /// DPT 7.002 - Time period (ms)
    TimePeriodMs,
    /// DPT 7.003 - Time period (10 ms)
    TimePeriod10Ms,
    /// DPT 7.004 - Time period (100 ms)
    TimePeriod100Ms,
    /// DPT 7.005 - Time period (s)
    TimePeriodSec,
    /// DPT 7.006 - Time period (min)
    TimePeriodMin,
    /// DPT 7.007 - Time period (h)
    TimePeriodHr,
    /// DPT 7.011 - Length (mm)
    LengthMm,
    /// DPT 7.012 - Current (mA)
    CurrentMa,
    /// DPT 7.013 - Brightness (lux)
    Brightness,
    /// DPT 7.600 - Colour temperature (K)
    ColorTemperature,
}

impl Dpt7 {
    /// Resolve a subtype number.
    pub const fn from_sub(sub: u16) -> Option<Self> {
        match sub {
            1 => Some(Self::Pulses),
            2 => Some(Self::TimePeriodMs),
            3 => Some(Self::TimePeriod10Ms),
            4 => Some(Self::TimePeriod100Ms),
            5 => Some(Self::TimePeriodSec),
            6 => Some(Self::TimePeriodMin),
            7 => Some(Self::TimePeriodHr),
            11 => Some(Self::LengthMm),
            12 => Some(Self::CurrentMa),
            13 => Some(Self::Brightness),
            600 => Some(Self::ColorTemperature),
            _ => None,
        }
    }

    /// The DPT identifier string.
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::Pulses => "7.001",
            Self::TimePeriodMs => "7.002",
            Self::TimePeriod10Ms => "7.003",
            Self::TimePeriod100Ms => "7.004",
            Self::TimePeriodSec => "7.005",
            Self::TimePeriodMin => "7.006",
            Self::TimePeriodHr => "7.007",
            Self::LengthMm => "7.011",
            Self::CurrentMa => "7.012",
            Self::Brightness => "7.013",
            Self::ColorTemperature => "7.600",
        }
    }

    /// The unit string.
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Pulses => "pulses",
            Self::TimePeriodMs => "ms",
            Self::TimePeriod10Ms => "ms",
            Self::TimePeriod100Ms => "ms",
            Self::TimePeriodSec => "s",
            Self::TimePeriodMin => "min",
            Self::TimePeriodHr => "h",
            Self::LengthMm => "mm",
            Self::CurrentMa => "mA",
            Self::Brightness => "lux",
            Self::ColorTemperature => "K",
        }
    }
}

impl DptEncode<u16> for Dpt7 {
    fn encode(&self, value: u16, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 2 {
            return Err(KnxError::buffer_too_small());
        }
        buf[0..2].copy_from_slice(&value.to_be_bytes());
        Ok(2)
    }
}

impl DptDecode<u16> for Dpt7 {
    fn decode(&self, data: &[u8]) -> Result<u16> {
        if data.len() != 2 {
            return Err(KnxError::dpt_length_mismatch());
        }
        Ok(u16::from_be_bytes([data[0], data[1]]))
    }
}
