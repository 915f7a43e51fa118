//! KNXnet/IP service body builders and parsers.
//!
//! One type per service the tunnel exchanges with the gateway. Builders
//! write complete frames (header included) into caller-provided buffers;
//! parsers consume the frame *body* (header already stripped by
//! [`super::frame::KnxnetIpFrame`]).
//!
//! ## Protocol flow
//!
//! ```text
//! Client                          Gateway
//!   |                                |
//!   |------- CONNECT_REQUEST ------->|
//!   |<------ CONNECT_RESPONSE -------|
//!   |                                |
//!   |------ TUNNELING_REQUEST ------>|
//!   |<------ TUNNELING_ACK ----------|
//!   |                                |
//!   |--- CONNECTIONSTATE_REQUEST --->|  (every 60 s)
//!   |<-- CONNECTIONSTATE_RESPONSE ---|
//!   |                                |
//!   |------ DISCONNECT_REQUEST ----->|
//!   |<----- DISCONNECT_RESPONSE -----|
//! ```

use crate::addressing::IndividualAddress;
use crate::error::{KnxError, Result};
use crate::protocol::constants::{
    SERVICE_CONNECTIONSTATE_REQUEST, SERVICE_CONNECT_REQUEST, SERVICE_DISCONNECT_REQUEST,
    SERVICE_DISCONNECT_RESPONSE, SERVICE_ROUTING_INDICATION, SERVICE_TUNNELING_ACK,
    SERVICE_TUNNELING_REQUEST, TUNNEL_CONNECTION, TUNNEL_LINKLAYER,
};
use crate::protocol::frame::Hpai;

/// Connection Request Information (CRI) for a tunnel connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRequestInfo {
    /// Connection type (`TUNNEL_CONNECTION` = 0x04)
    pub connection_type: u8,
    /// KNX layer (`TUNNEL_LINKLAYER` = 0x02)
    pub knx_layer: u8,
}

impl ConnectionRequestInfo {
    /// CRI for a link-layer tunnel.
    pub const fn tunnel_link_layer() -> Self {
        Self {
            connection_type: TUNNEL_CONNECTION,
            knx_layer: TUNNEL_LINKLAYER,
        }
    }

    /// Encode the CRI to bytes.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 4 {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = 4; // structure length
        buf[1] = self.connection_type;
        buf[2] = self.knx_layer;
        buf[3] = 0x00; // reserved

        Ok(4)
    }
}

/// Connection Response Data (CRD) of a tunnel CONNECT_RESPONSE.
///
/// Carries the individual address the gateway assigned to this tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionResponseData {
    /// Connection type echoed by the gateway
    pub connection_type: u8,
    /// Individual address assigned to the tunnel client
    pub assigned_address: IndividualAddress,
}

impl ConnectionResponseData {
    /// Parse a CRD from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(KnxError::truncated());
        }

        let length = data[0] as usize;
        if length < 2 || data.len() < length {
            return Err(KnxError::length_mismatch());
        }

        // Tunnel CRDs carry the assigned IA; device-management CRDs do not.
        let assigned_address = if length >= 4 {
            IndividualAddress::decode(&data[2..4])?
        } else {
            IndividualAddress::UNSPECIFIED
        };

        Ok(Self {
            connection_type: data[1],
            assigned_address,
        })
    }
}

/// `CONNECT_REQUEST` service (0x0205).
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequest {
    /// Control endpoint (connection management)
    pub control_endpoint: Hpai,
    /// Data endpoint (tunneling data)
    pub data_endpoint: Hpai,
    /// Connection request information
    pub cri: ConnectionRequestInfo,
}

impl ConnectRequest {
    /// Create a CONNECT_REQUEST for a link-layer tunnel.
    pub const fn new(control_endpoint: Hpai, data_endpoint: Hpai) -> Self {
        Self {
            control_endpoint,
            data_endpoint,
            cri: ConnectionRequestInfo::tunnel_link_layer(),
        }
    }

    /// Build the complete frame, returning the number of bytes written.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 26 {
            return Err(KnxError::buffer_too_small());
        }

        let mut offset = 0;

        buf[0] = 0x06;
        buf[1] = 0x10;
        buf[2..4].copy_from_slice(&SERVICE_CONNECT_REQUEST.to_be_bytes());
        offset += 6;

        offset += self.control_endpoint.encode(&mut buf[offset..])?;
        offset += self.data_endpoint.encode(&mut buf[offset..])?;
        offset += self.cri.encode(&mut buf[offset..])?;

        buf[4..6].copy_from_slice(&(offset as u16).to_be_bytes());

        Ok(offset)
    }
}

/// `CONNECT_RESPONSE` service (0x0206).
#[derive(Debug, Clone, Copy)]
pub struct ConnectResponse {
    /// Communication channel id assigned by the gateway (1..255)
    pub channel_id: u8,
    /// Status code (0 = OK)
    pub status: u8,
    /// Gateway data endpoint
    pub data_endpoint: Hpai,
    /// Connection response data with the assigned individual address
    pub crd: ConnectionResponseData,
}

impl ConnectResponse {
    /// Parse from a frame body.
    ///
    /// A rejection (non-zero status) is a valid two-byte body; the endpoint
    /// and CRD are only present on success.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(KnxError::truncated());
        }

        let channel_id = data[0];
        let status = data[1];

        if status != 0 {
            return Ok(Self {
                channel_id,
                status,
                data_endpoint: Hpai::nat(),
                crd: ConnectionResponseData {
                    connection_type: 0,
                    assigned_address: IndividualAddress::UNSPECIFIED,
                },
            });
        }

        if data.len() < 14 {
            return Err(KnxError::truncated());
        }

        let data_endpoint = Hpai::parse(&data[2..10])?;
        let crd = ConnectionResponseData::parse(&data[10..])?;

        Ok(Self {
            channel_id,
            status,
            data_endpoint,
            crd,
        })
    }

    /// Whether the gateway accepted the connection.
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// `CONNECTIONSTATE_REQUEST` service (0x0207), the heartbeat.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionStateRequest {
    /// Communication channel id
    pub channel_id: u8,
    /// Control endpoint
    pub control_endpoint: Hpai,
}

impl ConnectionStateRequest {
    /// Create a heartbeat request.
    pub const fn new(channel_id: u8, control_endpoint: Hpai) -> Self {
        Self {
            channel_id,
            control_endpoint,
        }
    }

    /// Build the complete frame.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        build_channel_frame(
            SERVICE_CONNECTIONSTATE_REQUEST,
            self.channel_id,
            &self.control_endpoint,
            buf,
        )
    }
}

/// `CONNECTIONSTATE_RESPONSE` service (0x0208).
#[derive(Debug, Clone, Copy)]
pub struct ConnectionStateResponse {
    /// Communication channel id
    pub channel_id: u8,
    /// Status code (0 = connection alive)
    pub status: u8,
}

impl ConnectionStateResponse {
    /// Parse from a frame body.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(KnxError::truncated());
        }

        Ok(Self {
            channel_id: data[0],
            status: data[1],
        })
    }

    /// Whether the gateway still considers the channel alive.
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// `DISCONNECT_REQUEST` service (0x0209), sent or received.
#[derive(Debug, Clone, Copy)]
pub struct DisconnectRequest {
    /// Communication channel id
    pub channel_id: u8,
    /// Control endpoint
    pub control_endpoint: Hpai,
}

impl DisconnectRequest {
    /// Create a disconnect request.
    pub const fn new(channel_id: u8, control_endpoint: Hpai) -> Self {
        Self {
            channel_id,
            control_endpoint,
        }
    }

    /// Build the complete frame.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        build_channel_frame(
            SERVICE_DISCONNECT_REQUEST,
            self.channel_id,
            &self.control_endpoint,
            buf,
        )
    }

    /// Parse from a frame body (the gateway may tear the tunnel down too).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 + Hpai::SIZE {
            return Err(KnxError::truncated());
        }

        Ok(Self {
            channel_id: data[0],
            control_endpoint: Hpai::parse(&data[2..10])?,
        })
    }
}

/// `DISCONNECT_RESPONSE` service (0x020A), sent or received.
#[derive(Debug, Clone, Copy)]
pub struct DisconnectResponse {
    /// Communication channel id
    pub channel_id: u8,
    /// Status code (0 = OK)
    pub status: u8,
}

impl DisconnectResponse {
    /// Create a disconnect response.
    pub const fn new(channel_id: u8, status: u8) -> Self {
        Self { channel_id, status }
    }

    /// Build the complete frame.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 8 {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = 0x06;
        buf[1] = 0x10;
        buf[2..4].copy_from_slice(&SERVICE_DISCONNECT_RESPONSE.to_be_bytes());
        buf[4..6].copy_from_slice(&8u16.to_be_bytes());
        buf[6] = self.channel_id;
        buf[7] = self.status;

        Ok(8)
    }

    /// Parse from a frame body.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(KnxError::truncated());
        }

        Ok(Self {
            channel_id: data[0],
            status: data[1],
        })
    }

    /// Whether the disconnect was acknowledged cleanly.
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// Connection header prefixed to TUNNELING_REQUEST and TUNNELING_ACK bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHeader {
    /// Communication channel id
    pub channel_id: u8,
    /// Sequence counter (0..255, wraps)
    pub sequence_counter: u8,
}

impl ConnectionHeader {
    /// Size of the connection header in bytes
    pub const SIZE: usize = 4;

    /// Create a new connection header.
    pub const fn new(channel_id: u8, sequence_counter: u8) -> Self {
        Self {
            channel_id,
            sequence_counter,
        }
    }

    /// Encode to bytes.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = Self::SIZE as u8;
        buf[1] = self.channel_id;
        buf[2] = self.sequence_counter;
        buf[3] = 0x00; // reserved

        Ok(Self::SIZE)
    }

    /// Decode from bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(KnxError::truncated());
        }
        if data[0] != Self::SIZE as u8 {
            return Err(KnxError::length_mismatch());
        }

        Ok(Self {
            channel_id: data[1],
            sequence_counter: data[2],
        })
    }
}

/// `TUNNELING_REQUEST` service (0x0420): connection header + cEMI.
#[derive(Debug)]
pub struct TunnelingRequest<'a> {
    /// Connection header
    pub connection_header: ConnectionHeader,
    /// Raw cEMI frame
    pub cemi: &'a [u8],
}

impl<'a> TunnelingRequest<'a> {
    /// Create a new TUNNELING_REQUEST.
    pub const fn new(connection_header: ConnectionHeader, cemi: &'a [u8]) -> Self {
        Self {
            connection_header,
            cemi,
        }
    }

    /// Build the complete frame.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let total_len = 6 + ConnectionHeader::SIZE + self.cemi.len();
        if buf.len() < total_len {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = 0x06;
        buf[1] = 0x10;
        buf[2..4].copy_from_slice(&SERVICE_TUNNELING_REQUEST.to_be_bytes());
        buf[4..6].copy_from_slice(&(total_len as u16).to_be_bytes());

        let mut offset = 6;
        offset += self.connection_header.encode(&mut buf[offset..])?;
        buf[offset..offset + self.cemi.len()].copy_from_slice(self.cemi);
        offset += self.cemi.len();

        Ok(offset)
    }

    /// Parse from a frame body.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let connection_header = ConnectionHeader::decode(data)?;
        Ok(Self {
            connection_header,
            cemi: &data[ConnectionHeader::SIZE..],
        })
    }
}

/// `TUNNELING_ACK` service (0x0421).
#[derive(Debug, Clone, Copy)]
pub struct TunnelingAck {
    /// Connection header carrying the acknowledged sequence number
    pub connection_header: ConnectionHeader,
    /// Status code (0 = OK)
    pub status: u8,
}

impl TunnelingAck {
    /// Create a new TUNNELING_ACK.
    pub const fn new(connection_header: ConnectionHeader, status: u8) -> Self {
        Self {
            connection_header,
            status,
        }
    }

    /// Build the complete frame (fixed 11 bytes).
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 11 {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = 0x06;
        buf[1] = 0x10;
        buf[2..4].copy_from_slice(&SERVICE_TUNNELING_ACK.to_be_bytes());
        buf[4..6].copy_from_slice(&11u16.to_be_bytes());

        let mut offset = 6;
        offset += self.connection_header.encode(&mut buf[offset..])?;
        buf[offset] = self.status;
        offset += 1;

        Ok(offset)
    }

    /// Parse from a frame body.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ConnectionHeader::SIZE + 1 {
            return Err(KnxError::truncated());
        }

        Ok(Self {
            connection_header: ConnectionHeader::decode(data)?,
            status: data[ConnectionHeader::SIZE],
        })
    }

    /// Whether the telegram was accepted.
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// `ROUTING_INDICATION` service (0x0530): a bare cEMI frame on the
/// multicast group, no connection header and no acknowledgement.
#[derive(Debug)]
pub struct RoutingIndication<'a> {
    /// Raw cEMI frame
    pub cemi: &'a [u8],
}

impl<'a> RoutingIndication<'a> {
    /// Create a new ROUTING_INDICATION.
    pub const fn new(cemi: &'a [u8]) -> Self {
        Self { cemi }
    }

    /// Build the complete frame.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let total_len = 6 + self.cemi.len();
        if buf.len() < total_len {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = 0x06;
        buf[1] = 0x10;
        buf[2..4].copy_from_slice(&SERVICE_ROUTING_INDICATION.to_be_bytes());
        buf[4..6].copy_from_slice(&(total_len as u16).to_be_bytes());
        buf[6..total_len].copy_from_slice(self.cemi);

        Ok(total_len)
    }

    /// Parse from a frame body (the body *is* the cEMI frame).
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(KnxError::truncated());
        }
        Ok(Self { cemi: data })
    }
}

/// Shared layout of CONNECTIONSTATE_REQUEST and DISCONNECT_REQUEST:
/// header, channel id, reserved byte, control HPAI.
fn build_channel_frame(
    service: u16,
    channel_id: u8,
    control_endpoint: &Hpai,
    buf: &mut [u8],
) -> Result<usize> {
    if buf.len() < 16 {
        return Err(KnxError::buffer_too_small());
    }

    buf[0] = 0x06;
    buf[1] = 0x10;
    buf[2..4].copy_from_slice(&service.to_be_bytes());

    let mut offset = 6;
    buf[offset] = channel_id;
    buf[offset + 1] = 0x00;
    offset += 2;
    offset += control_endpoint.encode(&mut buf[offset..])?;

    buf[4..6].copy_from_slice(&(offset as u16).to_be_bytes());

    Ok(offset)
}
