//! KNXnet/IP frame parsing and encoding.
//!
//! Every KNXnet/IP frame starts with the same 6-byte header:
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────┐
//! │ Header Len   │ Protocol Ver │  Service Type ID    │
//! │   (0x06)     │   (0x10)     │     (2 bytes BE)    │
//! ├──────────────┴──────────────┴─────────────────────┤
//! │         Total Length incl. header (2 bytes BE)    │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! Parsing is zero-copy: [`KnxnetIpFrame`] borrows the datagram and exposes
//! the body as a slice. Building goes through [`FrameBuilder`] or the
//! service-specific builders in [`super::services`], all of which write into
//! caller-provided buffers.

use crate::error::{KnxError, Result};
use crate::net::{IpEndpoint, Ipv4Addr};
use crate::protocol::constants::{
    ServiceType, HEADER_SIZE_10, IPV4_UDP, KNXNETIP_VERSION_10, MAX_FRAME_SIZE,
};

/// KNXnet/IP frame header (6 bytes).
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KnxnetIpHeader {
    /// Header length (always 0x06)
    pub header_length: u8,
    /// Protocol version (always 0x10 for v1.0)
    pub protocol_version: u8,
    /// Service type identifier
    pub service_type: ServiceType,
    /// Total frame length including the header
    pub total_length: u16,
}

impl KnxnetIpHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = 6;

    /// Create a header for a frame with the given body length.
    pub const fn new(service_type: ServiceType, body_length: u16) -> Self {
        Self {
            header_length: HEADER_SIZE_10,
            protocol_version: KNXNETIP_VERSION_10,
            service_type,
            total_length: Self::SIZE as u16 + body_length,
        }
    }

    /// Parse a header from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns `KnxError::Frame` if the buffer is too short, the header
    /// length or protocol version mismatch, or the service type is unknown.
    #[inline]
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(KnxError::truncated());
        }

        let header_length = data[0];
        let protocol_version = data[1];
        let service_type_raw = u16::from_be_bytes([data[2], data[3]]);
        let total_length = u16::from_be_bytes([data[4], data[5]]);

        if header_length != HEADER_SIZE_10 {
            return Err(KnxError::header_mismatch());
        }
        if protocol_version != KNXNETIP_VERSION_10 {
            return Err(KnxError::unsupported_version());
        }

        let service_type = ServiceType::from_u16(service_type_raw)
            .ok_or(KnxError::unknown_service_type(service_type_raw))?;

        Ok(Self {
            header_length,
            protocol_version,
            service_type,
            total_length,
        })
    }

    /// Encode the header into a byte buffer.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = self.header_length;
        buf[1] = self.protocol_version;
        buf[2..4].copy_from_slice(&self.service_type.to_u16().to_be_bytes());
        buf[4..6].copy_from_slice(&self.total_length.to_be_bytes());

        Ok(Self::SIZE)
    }

    /// Expected body length according to the header.
    pub const fn body_length(&self) -> u16 {
        self.total_length.saturating_sub(Self::SIZE as u16)
    }
}

/// Zero-copy view of a received KNXnet/IP frame.
#[derive(Debug)]
pub struct KnxnetIpFrame<'a> {
    data: &'a [u8],
    header: KnxnetIpHeader,
}

impl<'a> KnxnetIpFrame<'a> {
    /// Parse a KNXnet/IP frame from a datagram.
    ///
    /// # Errors
    ///
    /// Returns `KnxError::Frame` on a bad header or when the datagram is
    /// shorter than the total length the header claims.
    #[inline]
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = KnxnetIpHeader::parse(data)?;

        if (header.total_length as usize) < KnxnetIpHeader::SIZE
            || data.len() < header.total_length as usize
        {
            return Err(KnxError::length_mismatch());
        }

        Ok(Self { data, header })
    }

    /// The parsed frame header.
    #[inline(always)]
    pub const fn header(&self) -> &KnxnetIpHeader {
        &self.header
    }

    /// The service type, for routing decisions.
    #[inline(always)]
    pub const fn service_type(&self) -> ServiceType {
        self.header.service_type
    }

    /// The frame body (payload after the 6-byte header).
    #[inline]
    pub fn body(&self) -> &'a [u8] {
        &self.data[KnxnetIpHeader::SIZE..self.header.total_length as usize]
    }
}

/// Builder that prepends a header to an already-encoded body.
#[derive(Debug)]
pub struct FrameBuilder<'a> {
    service_type: ServiceType,
    body: &'a [u8],
}

impl<'a> FrameBuilder<'a> {
    /// Create a new frame builder.
    pub const fn new(service_type: ServiceType, body: &'a [u8]) -> Self {
        Self { service_type, body }
    }

    /// Build the frame into a buffer, returning the total length.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let total_size = KnxnetIpHeader::SIZE + self.body.len();

        if total_size > MAX_FRAME_SIZE {
            return Err(KnxError::buffer_too_small());
        }
        if buf.len() < total_size {
            return Err(KnxError::buffer_too_small());
        }

        let header = KnxnetIpHeader::new(self.service_type, self.body.len() as u16);
        header.encode(buf)?;
        buf[KnxnetIpHeader::SIZE..total_size].copy_from_slice(self.body);

        Ok(total_size)
    }
}

/// Host Protocol Address Information (HPAI).
///
/// Endpoint descriptor carried in connection-management frames:
///
/// ```text
/// ┌──────────────┬──────────────┬─────────────────────┐
/// │ Structure Len│ Host Protocol│   IPv4 Address      │
/// │   (0x08)     │  (0x01 UDP)  │     (4 bytes)       │
/// ├──────────────┴──────────────┴─────────────────────┤
/// │                Port (2 bytes BE)                  │
/// └───────────────────────────────────────────────────┘
/// ```
///
/// For NAT traversal the client advertises `0.0.0.0:0`; the gateway then
/// replies to the datagram's source address instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hpai {
    /// Structure length (8 for IPv4)
    pub structure_length: u8,
    /// Host protocol code
    pub host_protocol: u8,
    /// IPv4 address
    pub ip_address: [u8; 4],
    /// UDP port
    pub port: u16,
}

impl Hpai {
    /// Size of the IPv4 HPAI structure
    pub const SIZE: usize = 8;

    /// Create a new HPAI for IPv4 UDP.
    pub const fn new(ip_address: [u8; 4], port: u16) -> Self {
        Self {
            structure_length: Self::SIZE as u8,
            host_protocol: IPV4_UDP,
            ip_address,
            port,
        }
    }

    /// The NAT-mode HPAI (`0.0.0.0:0`).
    pub const fn nat() -> Self {
        Self::new([0, 0, 0, 0], 0)
    }

    /// Parse an HPAI from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(KnxError::truncated());
        }

        let structure_length = data[0];
        if structure_length != Self::SIZE as u8 {
            return Err(KnxError::length_mismatch());
        }

        Ok(Self {
            structure_length,
            host_protocol: data[1],
            ip_address: [data[2], data[3], data[4], data[5]],
            port: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    /// Encode the HPAI into a buffer.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = self.structure_length;
        buf[1] = self.host_protocol;
        buf[2..6].copy_from_slice(&self.ip_address);
        buf[6..8].copy_from_slice(&self.port.to_be_bytes());

        Ok(Self::SIZE)
    }

    /// The endpoint this HPAI describes.
    pub fn endpoint(&self) -> IpEndpoint {
        IpEndpoint::new(Ipv4Addr::from(self.ip_address), self.port)
    }
}

impl From<IpEndpoint> for Hpai {
    fn from(ep: IpEndpoint) -> Self {
        Self::new(ep.addr.octets(), ep.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parse() {
        let data = [0x06, 0x10, 0x02, 0x05, 0x00, 0x1A];
        let header = KnxnetIpHeader::parse(&data).unwrap();
        assert_eq!(header.service_type, ServiceType::ConnectRequest);
        assert_eq!(header.total_length, 26);
        assert_eq!(header.body_length(), 20);
    }

    #[test]
    fn header_rejects_bad_length_byte() {
        let data = [0x05, 0x10, 0x02, 0x05, 0x00, 0x1A];
        assert_eq!(
            KnxnetIpHeader::parse(&data).unwrap_err(),
            KnxError::header_mismatch()
        );
    }

    #[test]
    fn header_rejects_bad_version() {
        let data = [0x06, 0x20, 0x02, 0x05, 0x00, 0x1A];
        assert_eq!(
            KnxnetIpHeader::parse(&data).unwrap_err(),
            KnxError::unsupported_version()
        );
    }

    #[test]
    fn header_rejects_unknown_service() {
        let data = [0x06, 0x10, 0x09, 0x51, 0x00, 0x08];
        assert_eq!(
            KnxnetIpHeader::parse(&data).unwrap_err(),
            KnxError::unknown_service_type(0x0951)
        );
    }

    #[test]
    fn header_encode() {
        let header = KnxnetIpHeader::new(ServiceType::TunnelingAck, 5);
        let mut buf = [0u8; 6];
        assert_eq!(header.encode(&mut buf).unwrap(), 6);
        assert_eq!(buf, [0x06, 0x10, 0x04, 0x21, 0x00, 0x0B]);
    }

    #[test]
    fn frame_parse_and_body() {
        let data = [
            0x06, 0x10, 0x04, 0x21, 0x00, 0x0A, // header, total = 10
            0x04, 0x07, 0x00, 0x00, // body
        ];
        let frame = KnxnetIpFrame::parse(&data).unwrap();
        assert_eq!(frame.service_type(), ServiceType::TunnelingAck);
        assert_eq!(frame.body(), &[0x04, 0x07, 0x00, 0x00]);
    }

    #[test]
    fn frame_rejects_truncated_datagram() {
        let data = [0x06, 0x10, 0x04, 0x21, 0x00, 0x0A, 0x04];
        assert_eq!(
            KnxnetIpFrame::parse(&data).unwrap_err(),
            KnxError::length_mismatch()
        );
    }

    #[test]
    fn frame_builder() {
        let body = [0x01, 0x02, 0x03, 0x04];
        let mut buf = [0u8; 32];
        let size = FrameBuilder::new(ServiceType::RoutingIndication, &body)
            .build(&mut buf)
            .unwrap();

        assert_eq!(size, 10);
        assert_eq!(&buf[0..6], &[0x06, 0x10, 0x05, 0x30, 0x00, 0x0A]);
        assert_eq!(&buf[6..10], &body);
    }

    #[test]
    fn hpai_round_trip() {
        let hpai = Hpai::new([192, 168, 1, 100], 3671);
        let mut buf = [0u8; 8];
        assert_eq!(hpai.encode(&mut buf).unwrap(), 8);
        assert_eq!(buf, [0x08, 0x01, 192, 168, 1, 100, 0x0E, 0x57]);
        assert_eq!(Hpai::parse(&buf).unwrap(), hpai);
    }

    #[test]
    fn hpai_nat_mode() {
        let hpai = Hpai::nat();
        assert_eq!(hpai.ip_address, [0, 0, 0, 0]);
        assert_eq!(hpai.port, 0);
    }

    #[test]
    fn hpai_rejects_bad_structure_length() {
        let data = [0x07, 0x01, 0, 0, 0, 0, 0, 0];
        assert!(Hpai::parse(&data).is_err());
    }
}
