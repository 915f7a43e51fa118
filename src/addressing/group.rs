//! KNX Group Address implementation.
//!
//! Group addresses identify logical bus variables shared by cooperating
//! devices. Three textual forms exist:
//! - 3-level: Main/Middle/Sub (e.g. `1/2/3`) - most common
//! - 2-level: Main/Sub (e.g. `1/234`)
//! - flat: the raw 16-bit value as a decimal (e.g. `2563`)
//!
//! The canonical internal form is the raw 16-bit integer:
//! - Main: 5 bits (0-31)
//! - Middle: 3 bits (0-7)
//! - Sub: 8 bits (0-255)

use crate::error::{KnxError, Result};
use core::fmt;

/// KNX Group Address.
///
/// # Examples
///
/// ```
/// use knx_tunnel::addressing::GroupAddress;
///
/// // 3-level form
/// let addr = GroupAddress::new(1, 2, 3).unwrap();
/// assert_eq!(u16::from(addr), 0x0A03);
/// assert_eq!(addr.to_string(), "1/2/3");
///
/// // All three textual forms parse to the same raw value
/// let a: GroupAddress = "1/2/3".parse().unwrap();
/// let b: GroupAddress = "1/515".parse().unwrap();
/// let c: GroupAddress = "2563".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(b, c);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GroupAddress {
    raw: u16,
}

impl GroupAddress {
    /// Maximum main group value (5 bits)
    pub const MAX_MAIN: u8 = 31;
    /// Maximum middle group value (3 bits)
    pub const MAX_MIDDLE: u8 = 7;
    /// Maximum sub value for the 2-level form (11 bits)
    pub const MAX_SUB_2LEVEL: u16 = 2047;

    /// Create a 3-level Group Address (Main/Middle/Sub).
    ///
    /// # Errors
    ///
    /// Returns `KnxError::Addressing` if a component is out of range.
    pub fn new(main: u8, middle: u8, sub: u8) -> Result<Self> {
        if main > Self::MAX_MAIN || middle > Self::MAX_MIDDLE {
            return Err(KnxError::address_out_of_range());
        }

        let raw = (u16::from(main) << 11) | (u16::from(middle) << 8) | u16::from(sub);
        Ok(Self { raw })
    }

    /// Create a 2-level Group Address (Main/Sub).
    ///
    /// # Errors
    ///
    /// Returns `KnxError::Addressing` if a component is out of range.
    pub fn new_2level(main: u8, sub: u16) -> Result<Self> {
        if main > Self::MAX_MAIN || sub > Self::MAX_SUB_2LEVEL {
            return Err(KnxError::address_out_of_range());
        }

        let raw = (u16::from(main) << 11) | sub;
        Ok(Self { raw })
    }

    /// Raw 16-bit representation (the canonical form).
    #[inline(always)]
    pub const fn raw(self) -> u16 {
        self.raw
    }

    /// Main group component (0-31).
    #[inline(always)]
    pub const fn main(self) -> u8 {
        ((self.raw >> 11) & 0x1F) as u8
    }

    /// Middle group component of the 3-level form (0-7).
    #[inline(always)]
    pub const fn middle(self) -> u8 {
        ((self.raw >> 8) & 0x07) as u8
    }

    /// Sub component of the 3-level form (0-255).
    #[inline(always)]
    pub const fn sub(self) -> u8 {
        (self.raw & 0xFF) as u8
    }

    /// Sub component of the 2-level form (0-2047).
    #[inline(always)]
    pub const fn sub_2level(self) -> u16 {
        self.raw & 0x07FF
    }

    /// Format as a 3-level string (Main/Middle/Sub).
    pub fn to_string_3level(&self) -> heapless::String<16> {
        use core::fmt::Write;
        let mut s = heapless::String::new();
        let _ = write!(s, "{}/{}/{}", self.main(), self.middle(), self.sub());
        s
    }

    /// Format as a 2-level string (Main/Sub).
    pub fn to_string_2level(&self) -> heapless::String<16> {
        use core::fmt::Write;
        let mut s = heapless::String::new();
        let _ = write!(s, "{}/{}", self.main(), self.sub_2level());
        s
    }

    /// Encode the address big-endian into a byte buffer.
    ///
    /// # Errors
    ///
    /// Returns `KnxError::Transport` if the buffer is shorter than 2 bytes.
    #[inline]
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 2 {
            return Err(KnxError::buffer_too_small());
        }
        buf[0..2].copy_from_slice(&self.raw.to_be_bytes());
        Ok(2)
    }

    /// Decode an address from a big-endian byte buffer.
    ///
    /// # Errors
    ///
    /// Returns `KnxError::Frame` if the buffer is shorter than 2 bytes.
    #[inline]
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(KnxError::truncated());
        }
        let raw = u16::from_be_bytes([buf[0], buf[1]]);
        Ok(Self { raw })
    }
}

impl From<u16> for GroupAddress {
    #[inline(always)]
    fn from(raw: u16) -> Self {
        Self { raw }
    }
}

impl From<GroupAddress> for u16 {
    #[inline(always)]
    fn from(addr: GroupAddress) -> u16 {
        addr.raw
    }
}

impl fmt::Display for GroupAddress {
    /// Formats in the 3-level form by default.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.main(), self.middle(), self.sub())
    }
}

impl core::str::FromStr for GroupAddress {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        // Flat form: a plain decimal is the raw 16-bit value.
        if !s.contains('/') {
            return s
                .parse::<u16>()
                .map(Self::from)
                .map_err(|_| KnxError::invalid_group_address());
        }

        let mut parts = s.split('/');

        let main = parts
            .next()
            .and_then(|p| p.parse::<u8>().ok())
            .ok_or_else(KnxError::invalid_group_address)?;

        let second = parts
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(KnxError::invalid_group_address)?;

        match parts.next() {
            Some(sub_str) => {
                // 3-level form: the second component is the middle group.
                let sub = sub_str
                    .parse::<u8>()
                    .map_err(|_| KnxError::invalid_group_address())?;

                if parts.next().is_some() || second > u16::from(u8::MAX) {
                    return Err(KnxError::invalid_group_address());
                }

                Self::new(main, second as u8, sub)
            }
            None => Self::new_2level(main, second),
        }
    }
}
