//! DPT 1.xxx - Boolean (1 bit).
//!
//! Binary states encoded in the least significant bit of the APCI data
//! value. All subtypes share the wire encoding; they only rename the two
//! states (off/on, up/down, open/close, ...).
//!
//! ## Common subtypes
//!
//! - **1.001** - Switch (off/on)
//! - **1.002** - Bool (false/true)
//! - **1.008** - UpDown (up/down)
//! - **1.009** - OpenClose (open/close)

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

/// DPT 1.xxx boolean types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dpt1 {
    /// DPT 1.001 - Switch (off/on)
    Switch,
    /// DPT 1.002 - Bool (false/true)
    Bool,
    /// DPT 1.003 - Enable (disable/enable)
    Enable,
    /// DPT 1.004 - Ramp (no ramp/ramp)
    Ramp,
    /// DPT 1.005 - Alarm (no alarm/alarm)
    Alarm,
    /// DPT 1.006 - BinaryValue (low/high)
    BinaryValue,
    /// DPT 1.007 - Step (decrease/increase)
    Step,
    /// DPT 1.008 - UpDown (up/down)
    UpDown,
    /// DPT 1.009 - OpenClose (open/close)
    OpenClose,
    /// DPT 1.010 - Start (stop/start)
    Start,
    /// DPT 1.011 - State (inactive/active)
    State,
    /// DPT 1.012 - Invert (not inverted/inverted)
    Invert,
}

impl Dpt1 {
    /// Resolve a subtype number.
    pub const fn from_sub(sub: u16) -> Option<Self> {
        match sub {
            1 => Some(Self::Switch),
            2 => Some(Self::Bool),
            3 => Some(Self::Enable),
            4 => Some(Self::Ramp),
            5 => Some(Self::Alarm),
            6 => Some(Self::BinaryValue),
            7 => Some(Self::Step),
            8 => Some(Self::UpDown),
            9 => Some(Self::OpenClose),
            10 => Some(Self::Start),
            11 => Some(Self::State),
            12 => Some(Self::Invert),
            _ => None,
        }
    }

    /// The DPT identifier string, e.g. `"1.001"`.
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::Switch => "1.001",
            Self::Bool => "1.002",
            Self::Enable => "1.003",
            Self::Ramp => "1.004",
            Self::Alarm => "1.005",
            Self::BinaryValue => "1.006",
            Self::Step => "1.007",
            Self::UpDown => "1.008",
            Self::OpenClose => "1.009",
            Self::Start => "1.010",
            Self::State => "1.011",
            Self::Invert => "1.012",
        }
    }

    /// Semantic labels for the (false, true) states.
    pub const fn labels(&self) -> (&'static str, &'static str) {
        match self {
            Self::Switch => ("off", "on"),
            Self::Bool => ("false", "true"),
            Self::Enable => ("disable", "enable"),
            Self::Ramp => ("no ramp", "ramp"),
            Self::Alarm => ("no alarm", "alarm"),
            Self::BinaryValue => ("low", "high"),
            Self::Step => ("decrease", "increase"),
            Self::UpDown => ("up", "down"),
            Self::OpenClose => ("open", "close"),
            Self::Start => ("stop", "start"),
            Self::State => ("inactive", "active"),
            Self::Invert => ("not inverted", "inverted"),
        }
    }
}

impl DptEncode<bool> for Dpt1 {
    fn encode(&self, value: bool, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(KnxError::buffer_too_small());
        }
        buf[0] = u8::from(value);
        Ok(1)
    }
}

impl DptDecode<bool> for Dpt1 {
    fn decode(&self, data: &[u8]) -> Result<bool> {
        if data.len() != 1 {
            return Err(KnxError::dpt_length_mismatch());
        }
        Ok((data[0] & 0x01) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_states() {
        let mut buf = [0u8; 1];
        assert_eq!(Dpt1::Switch.encode(false, &mut buf).unwrap(), 1);
        assert_eq!(buf[0], 0x00);
        assert_eq!(Dpt1::Switch.encode(true, &mut buf).unwrap(), 1);
        assert_eq!(buf[0], 0x01);
    }

    #[test]
    fn decode_masks_upper_bits() {
        assert!(Dpt1::Switch.decode(&[0x01]).unwrap());
        assert!(!Dpt1::Switch.decode(&[0x00]).unwrap());
        assert!(Dpt1::Switch.decode(&[0x3F]).unwrap());
        assert!(!Dpt1::Switch.decode(&[0x3E]).unwrap());
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(
            Dpt1::Switch.decode(&[]).unwrap_err(),
            KnxError::dpt_length_mismatch()
        );
        assert!(Dpt1::Switch.decode(&[0, 1]).is_err());
    }

    #[test]
    fn all_subtypes_share_encoding() {
        let mut a = [0u8; 1];
        let mut b = [0u8; 1];
        Dpt1::Switch.encode(true, &mut a).unwrap();
        Dpt1::OpenClose.encode(true, &mut b).unwrap();
        assert_eq!(a, b);
        assert_eq!(Dpt1::Switch.labels().1, "on");
        assert_eq!(Dpt1::OpenClose.labels().1, "close");
    }

    #[test]
    fn subtype_resolution() {
        assert_eq!(Dpt1::from_sub(1), Some(Dpt1::Switch));
        assert_eq!(Dpt1::from_sub(9), Some(Dpt1::OpenClose));
        assert_eq!(Dpt1::from_sub(13), None);
        assert_eq!(Dpt1::UpDown.identifier(), "1.008");
    }
}
