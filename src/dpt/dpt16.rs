//! DPT 16.xxx - Character string (14 bytes, zero-padded).
//!
//! - **16.000** - ASCII only
//! - **16.001** - ISO-8859-1 (Latin-1)
//!
//! Strings longer than 14 bytes are truncated; the truncation is logged at
//! warn level and the truncated form is emitted. Latin-1 maps byte-for-byte
//! onto the first 256 Unicode code points, so decoding never fails on
//! content for 16.001; 16.000 rejects non-ASCII bytes.

use crate::dpt::{DptDecode, DptEncode, TEXT_CAPACITY, TEXT_WIDTH};
use crate::error::{KnxError, Result};

/// DPT 16.xxx string types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dpt16 {
    /// DPT 16.000 - ASCII string
    Ascii,
    /// DPT 16.001 - ISO-8859-1 string
    Latin1,
}

impl Dpt16 {
    /// Resolve a subtype number.
    pub const fn from_sub(sub: u16) -> Option<Self> {
        match sub {
            0 => Some(Self::Ascii),
            1 => Some(Self::Latin1),
            _ => None,
        }
    }

    /// The DPT identifier string.
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::Ascii => "16.000",
            Self::Latin1 => "16.001",
        }
    }
}

impl DptEncode<&str> for Dpt16 {
    fn encode(&self, value: &str, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < TEXT_WIDTH {
            return Err(KnxError::buffer_too_small());
        }

        buf[..TEXT_WIDTH].fill(0);

        let mut written = 0;
        let mut truncated = false;
        for ch in value.chars() {
            let byte = match self {
                Self::Ascii => {
                    if !ch.is_ascii() {
                        return Err(KnxError::dpt_value_out_of_range());
                    }
                    ch as u8
                }
                Self::Latin1 => {
                    let cp = ch as u32;
                    if cp > 0xFF {
                        return Err(KnxError::dpt_value_out_of_range());
                    }
                    cp as u8
                }
            };

            if written == TEXT_WIDTH {
                truncated = true;
                break;
            }
            buf[written] = byte;
            written += 1;
        }

        if truncated {
            crate::knx_log!(warn, "DPT16 string truncated to {} bytes", TEXT_WIDTH);
        }

        Ok(TEXT_WIDTH)
    }
}

impl DptDecode<heapless::String<TEXT_CAPACITY>> for Dpt16 {
    fn decode(&self, data: &[u8]) -> Result<heapless::String<TEXT_CAPACITY>> {
        if data.len() != TEXT_WIDTH {
            return Err(KnxError::dpt_length_mismatch());
        }

        let mut out = heapless::String::new();
        for &byte in data {
            if byte == 0 {
                break;
            }
            let ch = match self {
                Self::Ascii => {
                    if byte > 0x7F {
                        return Err(KnxError::dpt_value_out_of_range());
                    }
                    byte as char
                }
                Self::Latin1 => byte as char,
            };
            // capacity covers the worst case of 14 two-byte code points
            let _ = out.push(ch);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_zero_padded() {
        let mut buf = [0xFFu8; 14];
        let len = Dpt16::Ascii.encode("KNX", &mut buf).unwrap();
        assert_eq!(len, 14);
        assert_eq!(&buf[..3], b"KNX");
        assert!(buf[3..14].iter().all(|&b| b == 0));
    }

    #[test]
    fn round_trip_ascii() {
        let mut buf = [0u8; 14];
        Dpt16::Ascii.encode("Hello KNX", &mut buf).unwrap();
        let decoded = Dpt16::Ascii.decode(&buf).unwrap();
        assert_eq!(decoded.as_str(), "Hello KNX");
    }

    #[test]
    fn round_trip_latin1() {
        let mut buf = [0u8; 14];
        Dpt16::Latin1.encode("Küche", &mut buf).unwrap();
        assert_eq!(buf[1], 0xFC); // ü in Latin-1
        let decoded = Dpt16::Latin1.decode(&buf).unwrap();
        assert_eq!(decoded.as_str(), "Küche");
    }

    #[test]
    fn full_latin1_field_decodes() {
        // 14 high bytes expand to 28 UTF-8 bytes
        let decoded = Dpt16::Latin1.decode(&[0xE9; 14]).unwrap();
        assert_eq!(decoded.chars().count(), 14);
        assert!(decoded.chars().all(|c| c == 'é'));
    }

    #[test]
    fn overlong_string_truncates() {
        let mut buf = [0u8; 14];
        Dpt16::Ascii
            .encode("a string well over 14 bytes", &mut buf)
            .unwrap();
        let decoded = Dpt16::Ascii.decode(&buf).unwrap();
        assert_eq!(decoded.as_str(), "a string well ");
    }

    #[test]
    fn ascii_rejects_non_ascii() {
        let mut buf = [0u8; 14];
        assert!(Dpt16::Ascii.encode("Küche", &mut buf).is_err());
        assert!(Dpt16::Ascii.decode(&[0x80; 14]).is_err());
    }

    #[test]
    fn latin1_rejects_wide_chars() {
        let mut buf = [0u8; 14];
        assert!(Dpt16::Latin1.encode("温度", &mut buf).is_err());
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(Dpt16::Ascii.decode(&[0; 13]).is_err());
        assert!(Dpt16::Ascii.decode(&[0; 15]).is_err());
    }
}
