//! Common External Message Interface (cEMI) codec.
//!
//! cEMI is the media-independent KNX telegram format carried inside
//! TUNNELING_REQUEST and ROUTING_INDICATION frames. This module parses and
//! builds `L_Data` frames for group communication.
//!
//! ## Frame structure
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Message Code (1 byte)                    │
//! ├──────────────────────────────────────────┤
//! │ Additional Info Length (1 byte)          │
//! ├──────────────────────────────────────────┤
//! │ Additional Info (variable, usually 0)    │
//! ├──────────────────────────────────────────┤
//! │ L_Data service information               │
//! │  ├─ Control Field 1 (1 byte)             │
//! │  ├─ Control Field 2 (1 byte)             │
//! │  ├─ Source Address (2 bytes)             │
//! │  ├─ Destination Address (2 bytes)        │
//! │  ├─ NPDU Length (1 byte)                 │
//! │  ├─ TPCI / APCI high bits (1 byte)       │
//! │  └─ APCI low bits | data (NPDU bytes)    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! The NPDU length counts the octets following the TPCI byte: 1 for values
//! of up to 6 bits (packed into the low bits of the APCI byte), `1 + n` for
//! an `n`-byte payload trailing the APCI byte.

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::error::{KnxError, Result};
use crate::protocol::constants::{CemiMessageCode, Priority, MAX_CEMI_SIZE};

/// Control Field 1 of an `L_Data` frame.
///
/// ```text
/// Bit 7: Frame Type (1 = standard)
/// Bit 6: Reserved
/// Bit 5: Repeat (1 = repeat allowed on medium)
/// Bit 4: System Broadcast (1 = broadcast)
/// Bits 3-2: Priority
/// Bit 1: Acknowledge Request
/// Bit 0: Confirm (1 = error, meaningful in L_Data.con)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlField1 {
    raw: u8,
}

impl From<u8> for ControlField1 {
    #[inline(always)]
    fn from(raw: u8) -> Self {
        Self { raw }
    }
}

impl From<ControlField1> for u8 {
    #[inline(always)]
    fn from(ctrl: ControlField1) -> u8 {
        ctrl.raw
    }
}

impl ControlField1 {
    /// Raw byte value.
    #[inline(always)]
    pub const fn raw(self) -> u8 {
        self.raw
    }

    /// Whether this is a standard (not extended) frame.
    #[inline(always)]
    pub const fn is_standard_frame(self) -> bool {
        (self.raw & 0x80) != 0
    }

    /// Frame priority.
    #[inline(always)]
    pub const fn priority(self) -> Priority {
        Priority::from_u8((self.raw >> 2) & 0x03)
    }

    /// Whether a layer-2 acknowledge was requested.
    #[inline(always)]
    pub const fn ack_requested(self) -> bool {
        (self.raw & 0x02) != 0
    }

    /// Confirm-error flag. In an `L_Data.con` a set bit means the gateway
    /// rejected the request.
    #[inline(always)]
    pub const fn has_error(self) -> bool {
        (self.raw & 0x01) != 0
    }
}

impl Default for ControlField1 {
    #[inline]
    fn default() -> Self {
        // 0xBC = standard frame, repeat allowed, broadcast,
        // low priority, no ack request, no error
        Self { raw: 0xBC }
    }
}

/// Control Field 2 of an `L_Data` frame.
///
/// ```text
/// Bit 7: Destination Address Type (1 = group)
/// Bits 6-4: Hop Count (0-7)
/// Bits 3-0: Extended Frame Format (0 = standard)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlField2 {
    raw: u8,
}

impl From<u8> for ControlField2 {
    #[inline(always)]
    fn from(raw: u8) -> Self {
        Self { raw }
    }
}

impl From<ControlField2> for u8 {
    #[inline(always)]
    fn from(ctrl: ControlField2) -> u8 {
        ctrl.raw
    }
}

impl ControlField2 {
    /// Raw byte value.
    #[inline(always)]
    pub const fn raw(self) -> u8 {
        self.raw
    }

    /// Whether the destination is a group address.
    #[inline(always)]
    pub const fn is_group_address(self) -> bool {
        (self.raw & 0x80) != 0
    }

    /// Hop count (0-7).
    #[inline(always)]
    pub const fn hop_count(self) -> u8 {
        (self.raw >> 4) & 0x07
    }

    /// Build a control field 2 with the given destination type and hop count.
    pub const fn new(is_group: bool, hop_count: u8) -> Self {
        let mut raw = (hop_count & 0x07) << 4;
        if is_group {
            raw |= 0x80;
        }
        Self { raw }
    }
}

impl Default for ControlField2 {
    #[inline]
    fn default() -> Self {
        // 0xE0 = group destination, hop count 6, standard format
        Self { raw: 0xE0 }
    }
}

/// APCI - the application-layer operation inside a telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Apci {
    /// `A_GroupValue_Read` (0x000)
    GroupValueRead,
    /// `A_GroupValue_Response` (0x040)
    GroupValueResponse,
    /// `A_GroupValue_Write` (0x080)
    GroupValueWrite,
    /// Anything this stack does not handle
    Unknown(u16),
}

impl Apci {
    /// Parse the APCI from the TPCI byte and the following byte.
    ///
    /// The APCI occupies the low 2 bits of the first byte and the high
    /// 2 bits of the second; bits 5-0 of the second byte may carry a
    /// small data value and are masked out here.
    pub const fn from_bytes(byte1: u8, byte2: u8) -> Self {
        let apci = ((byte1 as u16 & 0x03) << 8) | (byte2 as u16 & 0xC0);

        match apci {
            0x000 => Self::GroupValueRead,
            0x040 => Self::GroupValueResponse,
            0x080 => Self::GroupValueWrite,
            _ => Self::Unknown(apci),
        }
    }

    /// The 10-bit APCI value.
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::GroupValueRead => 0x000,
            Self::GroupValueResponse => 0x040,
            Self::GroupValueWrite => 0x080,
            Self::Unknown(val) => val,
        }
    }
}

/// The application payload of a group telegram.
///
/// Values of up to 6 bits ride inside the APCI byte; anything longer
/// trails it as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GroupPayload<'a> {
    /// Up to 6 bits, packed into the low bits of the APCI byte.
    Small(u8),
    /// One or more full bytes trailing the APCI byte.
    Bytes(&'a [u8]),
}

impl GroupPayload<'_> {
    /// Number of APDU octets this payload occupies (APCI byte included).
    pub const fn npdu_length(&self) -> usize {
        match self {
            Self::Small(_) => 1,
            Self::Bytes(b) => 1 + b.len(),
        }
    }
}

/// Parsed `L_Data` frame (borrowed from the datagram).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LDataFrame<'a> {
    /// Control field 1
    pub ctrl1: ControlField1,
    /// Control field 2
    pub ctrl2: ControlField2,
    /// Source individual address
    pub source: IndividualAddress,
    /// Destination address, group or individual per `ctrl2`
    pub destination_raw: u16,
    /// Application operation
    pub apci: Apci,
    /// APDU octets: APCI byte plus trailing payload bytes
    apdu: &'a [u8],
}

impl<'a> LDataFrame<'a> {
    /// Minimum `L_Data` length: ctrl1 + ctrl2 + source(2) + dest(2) +
    /// NPDU length + TPCI + APCI = 9 bytes.
    pub const MIN_SIZE: usize = 9;

    /// Parse an `L_Data` service block.
    ///
    /// # Errors
    ///
    /// Returns `KnxError::Frame` on truncation or an NPDU length that
    /// overruns the buffer.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE {
            return Err(KnxError::truncated());
        }

        let ctrl1 = ControlField1::from(data[0]);
        let ctrl2 = ControlField2::from(data[1]);
        let source = IndividualAddress::from(u16::from_be_bytes([data[2], data[3]]));
        let destination_raw = u16::from_be_bytes([data[4], data[5]]);
        let npdu_length = data[6] as usize;

        // NPDU octets follow the TPCI byte at index 7.
        let apdu_end = 8 + npdu_length;
        if npdu_length == 0 || data.len() < apdu_end {
            return Err(KnxError::length_mismatch());
        }

        let apci = Apci::from_bytes(data[7], data[8]);

        Ok(Self {
            ctrl1,
            ctrl2,
            source,
            destination_raw,
            apci,
            apdu: &data[8..apdu_end],
        })
    }

    /// The telegram payload.
    #[inline]
    pub fn payload(&self) -> GroupPayload<'a> {
        if self.apdu.len() == 1 {
            GroupPayload::Small(self.apdu[0] & 0x3F)
        } else {
            GroupPayload::Bytes(&self.apdu[1..])
        }
    }

    /// Destination as a group address, if `ctrl2` says so.
    #[inline]
    pub fn destination_group(&self) -> Option<GroupAddress> {
        self.ctrl2
            .is_group_address()
            .then(|| GroupAddress::from(self.destination_raw))
    }

    /// Destination as an individual address, if `ctrl2` says so.
    #[inline]
    pub fn destination_individual(&self) -> Option<IndividualAddress> {
        (!self.ctrl2.is_group_address()).then(|| IndividualAddress::from(self.destination_raw))
    }

    /// Whether this is a group value write.
    #[inline(always)]
    pub const fn is_group_write(&self) -> bool {
        matches!(self.apci, Apci::GroupValueWrite)
    }

    /// Whether this is a group value read.
    #[inline(always)]
    pub const fn is_group_read(&self) -> bool {
        matches!(self.apci, Apci::GroupValueRead)
    }

    /// Whether this is a group value response.
    #[inline(always)]
    pub const fn is_group_response(&self) -> bool {
        matches!(self.apci, Apci::GroupValueResponse)
    }
}

/// Parsed cEMI frame: message code plus the `L_Data` block behind any
/// additional-info bytes.
#[derive(Debug)]
pub struct CemiFrame<'a> {
    /// Message code
    pub message_code: CemiMessageCode,
    data: &'a [u8],
}

impl<'a> CemiFrame<'a> {
    /// Minimum cEMI frame size (message code + additional-info length).
    pub const MIN_SIZE: usize = 2;

    /// Parse a cEMI frame.
    ///
    /// # Errors
    ///
    /// Returns `KnxError::Protocol` for unknown message codes and
    /// `KnxError::Frame` on truncation.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE {
            return Err(KnxError::truncated());
        }

        let message_code =
            CemiMessageCode::from_u8(data[0]).ok_or(KnxError::invalid_message_code(data[0]))?;

        Ok(Self { message_code, data })
    }

    /// Additional-info block length.
    #[inline(always)]
    pub fn additional_info_length(&self) -> u8 {
        self.data[1]
    }

    /// Parse the `L_Data` block, skipping any additional info.
    pub fn ldata(&self) -> Result<LDataFrame<'a>> {
        let service_start = 2 + self.additional_info_length() as usize;
        if self.data.len() < service_start {
            return Err(KnxError::truncated());
        }

        LDataFrame::parse(&self.data[service_start..])
    }
}

/// Build a complete cEMI group telegram into `buf`, returning its length.
///
/// Layout per the module docs; control fields take their defaults
/// (`0xBC` / `0xE0 | group`), the hop count is 6.
pub fn encode_group_frame(
    message_code: CemiMessageCode,
    source: IndividualAddress,
    destination: GroupAddress,
    apci: Apci,
    payload: GroupPayload<'_>,
    buf: &mut [u8],
) -> Result<usize> {
    // 8 fixed octets, the NPDU length byte, the TPCI byte, then the APDU.
    let total = 10 + payload.npdu_length();
    if total > MAX_CEMI_SIZE || buf.len() < total {
        return Err(KnxError::buffer_too_small());
    }

    let apci_raw = apci.to_u16();

    buf[0] = message_code.to_u8();
    buf[1] = 0x00; // no additional info
    buf[2] = ControlField1::default().raw();
    buf[3] = ControlField2::default().raw();
    buf[4..6].copy_from_slice(&source.raw().to_be_bytes());
    buf[6..8].copy_from_slice(&destination.raw().to_be_bytes());
    buf[8] = payload.npdu_length() as u8;
    buf[9] = ((apci_raw >> 8) & 0x03) as u8; // TPCI = unnumbered data

    match payload {
        GroupPayload::Small(v) => {
            buf[10] = (apci_raw & 0xC0) as u8 | (v & 0x3F);
        }
        GroupPayload::Bytes(bytes) => {
            buf[10] = (apci_raw & 0xC0) as u8;
            buf[11..11 + bytes.len()].copy_from_slice(bytes);
        }
    }

    Ok(total)
}

/// Build an `L_Data.req` carrying a GroupValue_Write.
pub fn encode_group_write(
    source: IndividualAddress,
    destination: GroupAddress,
    payload: GroupPayload<'_>,
    buf: &mut [u8],
) -> Result<usize> {
    encode_group_frame(
        CemiMessageCode::LDataReq,
        source,
        destination,
        Apci::GroupValueWrite,
        payload,
        buf,
    )
}

/// Build an `L_Data.req` carrying a GroupValue_Response.
pub fn encode_group_response(
    source: IndividualAddress,
    destination: GroupAddress,
    payload: GroupPayload<'_>,
    buf: &mut [u8],
) -> Result<usize> {
    encode_group_frame(
        CemiMessageCode::LDataReq,
        source,
        destination,
        Apci::GroupValueResponse,
        payload,
        buf,
    )
}

/// Build an `L_Data.req` carrying a GroupValue_Read (empty payload).
pub fn encode_group_read(
    source: IndividualAddress,
    destination: GroupAddress,
    buf: &mut [u8],
) -> Result<usize> {
    encode_group_frame(
        CemiMessageCode::LDataReq,
        source,
        destination,
        Apci::GroupValueRead,
        GroupPayload::Small(0),
        buf,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_field1_default_is_bc() {
        let ctrl = ControlField1::default();
        assert_eq!(ctrl.raw(), 0xBC);
        assert!(ctrl.is_standard_frame());
        assert_eq!(ctrl.priority(), Priority::Low);
        assert!(!ctrl.ack_requested());
        assert!(!ctrl.has_error());
    }

    #[test]
    fn control_field2_default() {
        let ctrl = ControlField2::default();
        assert_eq!(ctrl.raw(), 0xE0);
        assert!(ctrl.is_group_address());
        assert_eq!(ctrl.hop_count(), 6);
        assert_eq!(ControlField2::new(true, 6), ctrl);
    }

    #[test]
    fn apci_parse() {
        assert_eq!(Apci::from_bytes(0x00, 0x00), Apci::GroupValueRead);
        assert_eq!(Apci::from_bytes(0x00, 0x40), Apci::GroupValueResponse);
        assert_eq!(Apci::from_bytes(0x00, 0x80), Apci::GroupValueWrite);
        // data bits must not disturb the operation
        assert_eq!(Apci::from_bytes(0x00, 0x81), Apci::GroupValueWrite);
        assert_eq!(Apci::from_bytes(0x00, 0xBF), Apci::GroupValueWrite);
        assert_eq!(Apci::from_bytes(0x03, 0xC0), Apci::Unknown(0x3C0));
    }

    #[test]
    fn encode_small_write() {
        // GroupValue_Write true to 1/2/3 from 0.0.0:
        // on-wire APCI word is 0x00 0x81
        let mut buf = [0u8; 16];
        let len = encode_group_write(
            IndividualAddress::UNSPECIFIED,
            GroupAddress::from(0x0A03),
            GroupPayload::Small(1),
            &mut buf,
        )
        .unwrap();

        assert_eq!(
            &buf[..len],
            &[0x11, 0x00, 0xBC, 0xE0, 0x00, 0x00, 0x0A, 0x03, 0x01, 0x00, 0x81]
        );
    }

    #[test]
    fn encode_byte_write() {
        let mut buf = [0u8; 16];
        let payload = [0x0C, 0x66];
        let len = encode_group_write(
            IndividualAddress::from(0x1101),
            GroupAddress::from(0x0A03),
            GroupPayload::Bytes(&payload),
            &mut buf,
        )
        .unwrap();

        assert_eq!(
            &buf[..len],
            &[0x11, 0x00, 0xBC, 0xE0, 0x11, 0x01, 0x0A, 0x03, 0x03, 0x00, 0x80, 0x0C, 0x66]
        );
    }

    #[test]
    fn encode_read() {
        let mut buf = [0u8; 16];
        let len = encode_group_read(
            IndividualAddress::UNSPECIFIED,
            GroupAddress::from(0x0A03),
            &mut buf,
        )
        .unwrap();

        assert_eq!(
            &buf[..len],
            &[0x11, 0x00, 0xBC, 0xE0, 0x00, 0x00, 0x0A, 0x03, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn parse_small_write_round_trip() {
        let mut buf = [0u8; 16];
        let len = encode_group_write(
            IndividualAddress::from(0x1101),
            GroupAddress::from(0x0A03),
            GroupPayload::Small(1),
            &mut buf,
        )
        .unwrap();

        let cemi = CemiFrame::parse(&buf[..len]).unwrap();
        assert_eq!(cemi.message_code, CemiMessageCode::LDataReq);
        let ldata = cemi.ldata().unwrap();
        assert!(ldata.is_group_write());
        assert_eq!(ldata.source, IndividualAddress::from(0x1101));
        assert_eq!(ldata.destination_group().unwrap(), GroupAddress::from(0x0A03));
        assert_eq!(ldata.payload(), GroupPayload::Small(1));
    }

    #[test]
    fn parse_byte_write_round_trip() {
        let mut buf = [0u8; 16];
        let payload = [0x0C, 0x66];
        let len = encode_group_write(
            IndividualAddress::UNSPECIFIED,
            GroupAddress::from(0x0A03),
            GroupPayload::Bytes(&payload),
            &mut buf,
        )
        .unwrap();

        let ldata = CemiFrame::parse(&buf[..len]).unwrap().ldata().unwrap();
        assert_eq!(ldata.payload(), GroupPayload::Bytes(&payload[..]));
    }

    #[test]
    fn parse_with_additional_info() {
        // L_Data.ind with a 4-byte additional-info block
        let data = [
            0x29, 0x04, 0xAA, 0xBB, 0xCC, 0xDD, // code + addl info
            0xBC, 0xE0, 0x11, 0x01, 0x0A, 0x03, 0x01, 0x00, 0x81,
        ];

        let cemi = CemiFrame::parse(&data).unwrap();
        assert_eq!(cemi.additional_info_length(), 4);
        let ldata = cemi.ldata().unwrap();
        assert!(ldata.is_group_write());
        assert_eq!(ldata.payload(), GroupPayload::Small(1));
    }

    #[test]
    fn parse_confirmation_error_bit() {
        // L_Data.con with the confirm-error bit set in control field 1
        let data = [0x2E, 0x00, 0xBD, 0xE0, 0x11, 0x01, 0x0A, 0x03, 0x01, 0x00, 0x81];
        let cemi = CemiFrame::parse(&data).unwrap();
        assert_eq!(cemi.message_code, CemiMessageCode::LDataCon);
        let ldata = cemi.ldata().unwrap();
        assert!(ldata.ctrl1.has_error());
    }

    #[test]
    fn parse_rejects_unknown_message_code() {
        let data = [0xFF, 0x00];
        assert_eq!(
            CemiFrame::parse(&data).unwrap_err(),
            KnxError::invalid_message_code(0xFF)
        );
    }

    #[test]
    fn parse_rejects_npdu_overrun() {
        // NPDU length claims 5 octets but only 1 follows the TPCI
        let data = [0xBC, 0xE0, 0x11, 0x01, 0x0A, 0x03, 0x05, 0x00, 0x81];
        assert!(LDataFrame::parse(&data).is_err());
    }

    #[test]
    fn parse_rejects_truncated() {
        assert!(LDataFrame::parse(&[0xBC, 0xE0, 0x11]).is_err());
        assert!(CemiFrame::parse(&[0x29]).is_err());
    }

    #[test]
    fn byte_sequence_round_trip() {
        // encode(decode(b)) == b for a representative inbound indication
        let original = [0x29, 0x00, 0xBC, 0xE0, 0x11, 0x01, 0x0A, 0x03, 0x01, 0x00, 0x81];
        let ldata = CemiFrame::parse(&original).unwrap().ldata().unwrap();

        let mut rebuilt = [0u8; 16];
        let len = encode_group_frame(
            CemiMessageCode::LDataInd,
            ldata.source,
            ldata.destination_group().unwrap(),
            ldata.apci,
            ldata.payload(),
            &mut rebuilt,
        )
        .unwrap();

        assert_eq!(&rebuilt[..len], &original);
    }
}
