//! KNX Datapoint Types (DPT).
//!
//! DPTs define how the payload bytes of a group telegram are interpreted.
//! Each major number fixes the bit width and encoding; the subtype fixes
//! unit and value range. One module per major, in the pattern of
//! `dpt1`..`dpt232`; the [`Dpt`] registry dispatches dynamically for
//! datapoints configured from `"<major>.<sub>"` strings.
//!
//! ## Supported majors
//!
//! | Major | Width   | Value                          |
//! |-------|---------|--------------------------------|
//! | 1     | 1 bit   | boolean (switch, up/down, ...) |
//! | 2     | 2 bit   | boolean with control bit       |
//! | 3     | 4 bit   | dimming / blind step control   |
//! | 5     | 1 byte  | unsigned, optionally scaled    |
//! | 6     | 1 byte  | signed                         |
//! | 7     | 2 byte  | unsigned                       |
//! | 8     | 2 byte  | signed                         |
//! | 9     | 2 byte  | KNX float                      |
//! | 10    | 3 byte  | time of day                    |
//! | 11    | 3 byte  | date                           |
//! | 12    | 4 byte  | unsigned                       |
//! | 13    | 4 byte  | signed                         |
//! | 14    | 4 byte  | IEEE-754 float                 |
//! | 15    | 4 byte  | access control data            |
//! | 16    | 14 byte | character string               |
//! | 18    | 1 byte  | scene control                  |
//! | 19    | 8 byte  | date + time                    |
//! | 20    | 1 byte  | enumeration                    |
//! | 232   | 3 byte  | RGB colour                     |
//!
//! ## Usage
//!
//! ```
//! use knx_tunnel::dpt::{Dpt, KnxValue};
//!
//! let dpt: Dpt = "9.001".parse().unwrap();
//! let mut buf = [0u8; 2];
//! let len = dpt.encode_value(&KnxValue::F32(21.5), &mut buf).unwrap();
//! assert_eq!(&buf[..len], &[0x0C, 0x33]);
//! ```

use crate::error::{KnxError, Result};
use core::fmt;

pub mod dpt1;
pub mod dpt10;
pub mod dpt11;
pub mod dpt12;
pub mod dpt13;
pub mod dpt14;
pub mod dpt15;
pub mod dpt16;
pub mod dpt18;
pub mod dpt19;
pub mod dpt2;
pub mod dpt20;
pub mod dpt232;
pub mod dpt3;
pub mod dpt5;
pub mod dpt6;
pub mod dpt7;
pub mod dpt8;
pub mod dpt9;

#[doc(inline)]
pub use dpt1::Dpt1;
#[doc(inline)]
pub use dpt10::{Dpt10, TimeOfDay};
#[doc(inline)]
pub use dpt11::{Date, Dpt11};
#[doc(inline)]
pub use dpt12::Dpt12;
#[doc(inline)]
pub use dpt13::Dpt13;
#[doc(inline)]
pub use dpt14::Dpt14;
#[doc(inline)]
pub use dpt15::{AccessData, Dpt15};
#[doc(inline)]
pub use dpt16::Dpt16;
#[doc(inline)]
pub use dpt18::Dpt18;
#[doc(inline)]
pub use dpt19::{DateTime, DateTimeFlags, Dpt19};
#[doc(inline)]
pub use dpt2::Dpt2;
#[doc(inline)]
pub use dpt20::Dpt20;
#[doc(inline)]
pub use dpt232::Dpt232;
#[doc(inline)]
pub use dpt3::{Dpt3, StepCode};
#[doc(inline)]
pub use dpt5::Dpt5;
#[doc(inline)]
pub use dpt6::Dpt6;
#[doc(inline)]
pub use dpt7::Dpt7;
#[doc(inline)]
pub use dpt8::Dpt8;
#[doc(inline)]
pub use dpt9::Dpt9;

/// Wire width of a DPT16 string in bytes.
pub const TEXT_WIDTH: usize = 14;

/// Capacity of the decoded string type. Latin-1 bytes above 0x7F expand to
/// two UTF-8 bytes, so a full 14-byte field needs up to 28.
pub const TEXT_CAPACITY: usize = 2 * TEXT_WIDTH;

/// Trait for encoding a typed value into its KNX byte representation.
///
/// Encoders write into a caller-provided buffer and return the number of
/// bytes written. Values outside the DPT's range are rejected with
/// `KnxError::Dpt(DptError::ValueOutOfRange)` before anything is written.
pub trait DptEncode<T> {
    /// Encode `value` into `buf`.
    fn encode(&self, value: T, buf: &mut [u8]) -> Result<usize>;
}

/// Trait for decoding a KNX byte representation into a typed value.
///
/// Decoders reject buffers whose length differs from the DPT's declared
/// width with `KnxError::Dpt(DptError::LengthMismatch)`.
pub trait DptDecode<T> {
    /// Decode a value from `data`.
    fn decode(&self, data: &[u8]) -> Result<T>;
}

/// A datapoint type identifier, e.g. `9.001`.
///
/// Subtypes are normalized to three decimal digits when displayed, so
/// `"9.1"` and `"9.001"` parse to the same identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DptId {
    /// Major type number (fixes width and encoding)
    pub major: u16,
    /// Subtype number (fixes unit and range)
    pub sub: u16,
}

impl DptId {
    /// Create an identifier from its components.
    pub const fn new(major: u16, sub: u16) -> Self {
        Self { major, sub }
    }
}

impl fmt::Display for DptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.major, self.sub)
    }
}

impl core::str::FromStr for DptId {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let (major, sub) = s.split_once('.').ok_or_else(KnxError::unknown_dpt)?;
        let major = major.parse::<u16>().map_err(|_| KnxError::unknown_dpt())?;
        let sub = sub.parse::<u16>().map_err(|_| KnxError::unknown_dpt())?;
        Ok(Self { major, sub })
    }
}

/// A decoded bus value, tagged with its shape.
///
/// This is what datapoint listeners receive and what `write()` accepts.
/// The variant must match the shape of the bound DPT.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KnxValue {
    /// 1-bit boolean (DPT 1)
    Bool(bool),
    /// 1-bit boolean with control/priority bit (DPT 2)
    Controlled {
        /// Control bit: the value bit is enforced
        control: bool,
        /// The controlled value bit
        value: bool,
    },
    /// 4-bit step control (DPT 3)
    Step {
        /// Direction: false = decrease/up, true = increase/down
        control: bool,
        /// Step code: 0 = break, 1-7 = interval count
        step_code: u8,
    },
    /// 8-bit unsigned (DPT 5 raw subtypes, DPT 20)
    U8(u8),
    /// 8-bit signed (DPT 6)
    I8(i8),
    /// 16-bit unsigned (DPT 7)
    U16(u16),
    /// 16-bit signed (DPT 8)
    I16(i16),
    /// 32-bit unsigned (DPT 12)
    U32(u32),
    /// 32-bit signed (DPT 13)
    I32(i32),
    /// Floating point (DPT 9, DPT 14, scaled DPT 5 subtypes)
    F32(f32),
    /// Time of day (DPT 10)
    TimeOfDay(TimeOfDay),
    /// Date (DPT 11)
    Date(Date),
    /// Date and time (DPT 19)
    DateTime(DateTime),
    /// 14-byte character string (DPT 16)
    Text(heapless::String<TEXT_CAPACITY>),
    /// Scene control (DPT 18)
    Scene {
        /// Scene number (0-63)
        scene: u8,
        /// Learn bit: true = store scene, false = activate
        learn: bool,
    },
    /// Access control data (DPT 15)
    Access(AccessData),
    /// RGB colour (DPT 232)
    Rgb {
        red: u8,
        green: u8,
        blue: u8,
    },
}

/// Registry entry dispatching to the per-major codec modules.
///
/// Obtained from a textual identifier via `FromStr` or from a [`DptId`]
/// via [`Dpt::from_id`]; unknown identifiers are a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dpt {
    /// DPT 1.xxx
    Bool(Dpt1),
    /// DPT 2.xxx
    Controlled(Dpt2),
    /// DPT 3.xxx
    StepControl(Dpt3),
    /// DPT 5.xxx
    Unsigned8(Dpt5),
    /// DPT 6.xxx
    Signed8(Dpt6),
    /// DPT 7.xxx
    Unsigned16(Dpt7),
    /// DPT 8.xxx
    Signed16(Dpt8),
    /// DPT 9.xxx
    Float16(Dpt9),
    /// DPT 10.001
    TimeOfDay(Dpt10),
    /// DPT 11.001
    Date(Dpt11),
    /// DPT 12.xxx
    Unsigned32(Dpt12),
    /// DPT 13.xxx
    Signed32(Dpt13),
    /// DPT 14.xxx
    Float32(Dpt14),
    /// DPT 15.000
    Access(Dpt15),
    /// DPT 16.xxx
    Text(Dpt16),
    /// DPT 18.001
    SceneControl(Dpt18),
    /// DPT 19.001
    DateTime(Dpt19),
    /// DPT 20.xxx
    Enum8(Dpt20),
    /// DPT 232.600
    ColorRgb(Dpt232),
}

impl Dpt {
    /// Resolve an identifier to a registry entry.
    ///
    /// # Errors
    ///
    /// Returns `KnxError::Dpt(DptError::UnknownType)` when the major or
    /// subtype is not implemented.
    pub fn from_id(id: DptId) -> Result<Self> {
        let unknown = KnxError::unknown_dpt;
        Ok(match id.major {
            1 => Self::Bool(Dpt1::from_sub(id.sub).ok_or_else(unknown)?),
            2 => Self::Controlled(Dpt2::from_sub(id.sub).ok_or_else(unknown)?),
            3 => Self::StepControl(Dpt3::from_sub(id.sub).ok_or_else(unknown)?),
            5 => Self::Unsigned8(Dpt5::from_sub(id.sub).ok_or_else(unknown)?),
            6 => Self::Signed8(Dpt6::from_sub(id.sub).ok_or_else(unknown)?),
            7 => Self::Unsigned16(Dpt7::from_sub(id.sub).ok_or_else(unknown)?),
            8 => Self::Signed16(Dpt8::from_sub(id.sub).ok_or_else(unknown)?),
            9 => Self::Float16(Dpt9::from_sub(id.sub).ok_or_else(unknown)?),
            10 => Self::TimeOfDay(Dpt10::from_sub(id.sub).ok_or_else(unknown)?),
            11 => Self::Date(Dpt11::from_sub(id.sub).ok_or_else(unknown)?),
            12 => Self::Unsigned32(Dpt12::from_sub(id.sub).ok_or_else(unknown)?),
            13 => Self::Signed32(Dpt13::from_sub(id.sub).ok_or_else(unknown)?),
            14 => Self::Float32(Dpt14::from_sub(id.sub).ok_or_else(unknown)?),
            15 => Self::Access(Dpt15::from_sub(id.sub).ok_or_else(unknown)?),
            16 => Self::Text(Dpt16::from_sub(id.sub).ok_or_else(unknown)?),
            18 => Self::SceneControl(Dpt18::from_sub(id.sub).ok_or_else(unknown)?),
            19 => Self::DateTime(Dpt19::from_sub(id.sub).ok_or_else(unknown)?),
            20 => Self::Enum8(Dpt20::from_sub(id.sub).ok_or_else(unknown)?),
            232 => Self::ColorRgb(Dpt232::from_sub(id.sub).ok_or_else(unknown)?),
            _ => return Err(unknown()),
        })
    }

    /// Whether the value fits in 6 bits and rides inside the APCI byte.
    pub const fn is_small(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Controlled(_) | Self::StepControl(_)
        )
    }

    /// The byte width of the payload (0 for small values).
    pub const fn byte_length(&self) -> usize {
        match self {
            Self::Bool(_) | Self::Controlled(_) | Self::StepControl(_) => 0,
            Self::Unsigned8(_) | Self::Signed8(_) | Self::SceneControl(_) | Self::Enum8(_) => 1,
            Self::Unsigned16(_) | Self::Signed16(_) | Self::Float16(_) => 2,
            Self::TimeOfDay(_) | Self::Date(_) | Self::ColorRgb(_) => 3,
            Self::Unsigned32(_) | Self::Signed32(_) | Self::Float32(_) | Self::Access(_) => 4,
            Self::DateTime(_) => 8,
            Self::Text(_) => TEXT_WIDTH,
        }
    }

    /// Encode a typed value into `buf`.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when the value variant does not fit this DPT,
    /// `ValueOutOfRange` when the value does.
    pub fn encode_value(&self, value: &KnxValue, buf: &mut [u8]) -> Result<usize> {
        match (self, value) {
            (Self::Bool(d), KnxValue::Bool(v)) => d.encode(*v, buf),
            (Self::Controlled(d), KnxValue::Controlled { control, value }) => {
                d.encode((*control, *value), buf)
            }
            (Self::StepControl(d), KnxValue::Step { control, step_code }) => {
                let step = StepCode::from_u8(*step_code).ok_or_else(KnxError::dpt_value_out_of_range)?;
                d.encode((*control, step), buf)
            }
            (Self::Unsigned8(d), KnxValue::F32(v)) if d.is_scaled() => d.encode(*v, buf),
            (Self::Unsigned8(d), KnxValue::U8(v)) if !d.is_scaled() => d.encode_raw(*v, buf),
            (Self::Signed8(d), KnxValue::I8(v)) => d.encode(*v, buf),
            (Self::Unsigned16(d), KnxValue::U16(v)) => d.encode(*v, buf),
            (Self::Signed16(d), KnxValue::I16(v)) => d.encode(*v, buf),
            (Self::Float16(d), KnxValue::F32(v)) => d.encode(*v, buf),
            (Self::TimeOfDay(d), KnxValue::TimeOfDay(v)) => d.encode(*v, buf),
            (Self::Date(d), KnxValue::Date(v)) => d.encode(*v, buf),
            (Self::Unsigned32(d), KnxValue::U32(v)) => d.encode(*v, buf),
            (Self::Signed32(d), KnxValue::I32(v)) => d.encode(*v, buf),
            (Self::Float32(d), KnxValue::F32(v)) => d.encode(*v, buf),
            (Self::Access(d), KnxValue::Access(v)) => d.encode(*v, buf),
            (Self::Text(d), KnxValue::Text(v)) => d.encode(v.as_str(), buf),
            (Self::SceneControl(d), KnxValue::Scene { scene, learn }) => {
                d.encode((*scene, *learn), buf)
            }
            (Self::DateTime(d), KnxValue::DateTime(v)) => d.encode(*v, buf),
            (Self::Enum8(d), KnxValue::U8(v)) => d.encode(*v, buf),
            (Self::ColorRgb(d), KnxValue::Rgb { red, green, blue }) => {
                d.encode((*red, *green, *blue), buf)
            }
            _ => Err(KnxError::dpt_type_mismatch()),
        }
    }

    /// Decode a payload into a typed value.
    pub fn decode_value(&self, data: &[u8]) -> Result<KnxValue> {
        Ok(match self {
            Self::Bool(d) => KnxValue::Bool(d.decode(data)?),
            Self::Controlled(d) => {
                let (control, value) = d.decode(data)?;
                KnxValue::Controlled { control, value }
            }
            Self::StepControl(d) => {
                let (control, step) = d.decode(data)?;
                KnxValue::Step {
                    control,
                    step_code: step as u8,
                }
            }
            Self::Unsigned8(d) => {
                if d.is_scaled() {
                    KnxValue::F32(d.decode(data)?)
                } else {
                    KnxValue::U8(d.decode_raw(data)?)
                }
            }
            Self::Signed8(d) => KnxValue::I8(d.decode(data)?),
            Self::Unsigned16(d) => KnxValue::U16(d.decode(data)?),
            Self::Signed16(d) => KnxValue::I16(d.decode(data)?),
            Self::Float16(d) => KnxValue::F32(d.decode(data)?),
            Self::TimeOfDay(d) => KnxValue::TimeOfDay(d.decode(data)?),
            Self::Date(d) => KnxValue::Date(d.decode(data)?),
            Self::Unsigned32(d) => KnxValue::U32(d.decode(data)?),
            Self::Signed32(d) => KnxValue::I32(d.decode(data)?),
            Self::Float32(d) => KnxValue::F32(d.decode(data)?),
            Self::Access(d) => KnxValue::Access(d.decode(data)?),
            Self::Text(d) => KnxValue::Text(d.decode(data)?),
            Self::SceneControl(d) => {
                let (scene, learn) = d.decode(data)?;
                KnxValue::Scene { scene, learn }
            }
            Self::DateTime(d) => KnxValue::DateTime(d.decode(data)?),
            Self::Enum8(d) => KnxValue::U8(d.decode(data)?),
            Self::ColorRgb(d) => {
                let (red, green, blue) = d.decode(data)?;
                KnxValue::Rgb { red, green, blue }
            }
        })
    }
}

impl core::str::FromStr for Dpt {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_id(s.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_parse_and_normalize() {
        let id: DptId = "9.001".parse().unwrap();
        assert_eq!(id, DptId::new(9, 1));
        assert_eq!(format!("{}", id), "9.001");

        // short subtype keys normalize to three digits
        let id: DptId = "14.56".parse().unwrap();
        assert_eq!(format!("{}", id), "14.056");

        assert!("9".parse::<DptId>().is_err());
        assert!("a.b".parse::<DptId>().is_err());
    }

    #[test]
    fn registry_resolves_known_types() {
        assert_eq!("1.001".parse::<Dpt>().unwrap(), Dpt::Bool(Dpt1::Switch));
        assert_eq!("9.001".parse::<Dpt>().unwrap(), Dpt::Float16(Dpt9::Temperature));
        assert_eq!("232.600".parse::<Dpt>().unwrap(), Dpt::ColorRgb(Dpt232::ColorRgb));
    }

    #[test]
    fn registry_rejects_unknown_types() {
        assert!("4.001".parse::<Dpt>().is_err());
        assert!("999.001".parse::<Dpt>().is_err());
        assert!("1.999".parse::<Dpt>().is_err());
    }

    #[test]
    fn small_classification() {
        assert!("1.001".parse::<Dpt>().unwrap().is_small());
        assert!("3.007".parse::<Dpt>().unwrap().is_small());
        assert!(!"5.001".parse::<Dpt>().unwrap().is_small());
        assert!(!"16.000".parse::<Dpt>().unwrap().is_small());
    }

    #[test]
    fn dispatch_rejects_type_mismatch() {
        let dpt: Dpt = "9.001".parse().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(
            dpt.encode_value(&KnxValue::Bool(true), &mut buf).unwrap_err(),
            KnxError::dpt_type_mismatch()
        );
    }

    #[test]
    fn dispatch_round_trips() {
        let mut buf = [0u8; 16];

        let cases: &[(&str, KnxValue)] = &[
            ("1.001", KnxValue::Bool(true)),
            ("2.001", KnxValue::Controlled { control: true, value: false }),
            ("3.007", KnxValue::Step { control: true, step_code: 5 }),
            ("5.004", KnxValue::U8(200)),
            ("6.010", KnxValue::I8(-100)),
            ("7.001", KnxValue::U16(54321)),
            ("8.001", KnxValue::I16(-12345)),
            ("12.001", KnxValue::U32(3_000_000_000)),
            ("13.010", KnxValue::I32(-2_000_000)),
            ("14.056", KnxValue::F32(1234.5)),
            ("18.001", KnxValue::Scene { scene: 12, learn: false }),
            ("20.102", KnxValue::U8(3)),
            ("232.600", KnxValue::Rgb { red: 10, green: 20, blue: 30 }),
        ];

        for (id, value) in cases {
            let dpt: Dpt = id.parse().unwrap();
            let len = dpt.encode_value(value, &mut buf).unwrap();
            assert_eq!(len, dpt.byte_length().max(1), "width for {}", id);
            let decoded = dpt.decode_value(&buf[..len]).unwrap();
            assert_eq!(&decoded, value, "round trip for {}", id);
        }
    }
}
