//! KNXnet/IP protocol constants and service type identifiers.

/// KNXnet/IP protocol version 1.0
pub const KNXNETIP_VERSION_10: u8 = 0x10;

/// Standard KNXnet/IP header length (6 bytes)
pub const HEADER_SIZE_10: u8 = 0x06;

/// Standard UDP port for KNXnet/IP communication
pub const KNXNETIP_DEFAULT_PORT: u16 = 3671;

/// Maximum size of a KNXnet/IP frame this stack handles
pub const MAX_FRAME_SIZE: usize = 256;

/// Maximum size of a cEMI frame payload
pub const MAX_CEMI_SIZE: usize = 64;

// =============================================================================
// Service Type Identifiers
// =============================================================================

/// Service type constant for CONNECT_REQUEST (0x0205)
pub const SERVICE_CONNECT_REQUEST: u16 = 0x0205;
/// Service type constant for CONNECT_RESPONSE (0x0206)
pub const SERVICE_CONNECT_RESPONSE: u16 = 0x0206;
/// Service type constant for CONNECTIONSTATE_REQUEST (0x0207)
pub const SERVICE_CONNECTIONSTATE_REQUEST: u16 = 0x0207;
/// Service type constant for CONNECTIONSTATE_RESPONSE (0x0208)
pub const SERVICE_CONNECTIONSTATE_RESPONSE: u16 = 0x0208;
/// Service type constant for DISCONNECT_REQUEST (0x0209)
pub const SERVICE_DISCONNECT_REQUEST: u16 = 0x0209;
/// Service type constant for DISCONNECT_RESPONSE (0x020A)
pub const SERVICE_DISCONNECT_RESPONSE: u16 = 0x020A;
/// Service type constant for TUNNELING_REQUEST (0x0420)
pub const SERVICE_TUNNELING_REQUEST: u16 = 0x0420;
/// Service type constant for TUNNELING_ACK (0x0421)
pub const SERVICE_TUNNELING_ACK: u16 = 0x0421;
/// Service type constant for ROUTING_INDICATION (0x0530)
pub const SERVICE_ROUTING_INDICATION: u16 = 0x0530;

/// KNXnet/IP service type identifiers handled by this stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ServiceType {
    /// `CONNECT_REQUEST` - open a tunnel
    ConnectRequest = 0x0205,
    /// `CONNECT_RESPONSE` - channel id + assigned address
    ConnectResponse = 0x0206,
    /// `CONNECTIONSTATE_REQUEST` - heartbeat
    ConnectionstateRequest = 0x0207,
    /// `CONNECTIONSTATE_RESPONSE` - heartbeat answer
    ConnectionstateResponse = 0x0208,
    /// `DISCONNECT_REQUEST` - close a tunnel
    DisconnectRequest = 0x0209,
    /// `DISCONNECT_RESPONSE` - close acknowledged
    DisconnectResponse = 0x020A,
    /// `TUNNELING_REQUEST` - cEMI telegram through the tunnel
    TunnelingRequest = 0x0420,
    /// `TUNNELING_ACK` - telegram acknowledged
    TunnelingAck = 0x0421,
    /// `ROUTING_INDICATION` - cEMI telegram on the multicast group
    RoutingIndication = 0x0530,
}

impl ServiceType {
    /// Convert a raw u16 to a `ServiceType`.
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0205 => Some(Self::ConnectRequest),
            0x0206 => Some(Self::ConnectResponse),
            0x0207 => Some(Self::ConnectionstateRequest),
            0x0208 => Some(Self::ConnectionstateResponse),
            0x0209 => Some(Self::DisconnectRequest),
            0x020A => Some(Self::DisconnectResponse),
            0x0420 => Some(Self::TunnelingRequest),
            0x0421 => Some(Self::TunnelingAck),
            0x0530 => Some(Self::RoutingIndication),
            _ => None,
        }
    }

    /// Convert a `ServiceType` to its wire value.
    pub const fn to_u16(self) -> u16 {
        self as u16
    }
}

// =============================================================================
// Connection Type Codes
// =============================================================================

/// Connection type for `TUNNEL_CONNECTION`
pub const TUNNEL_CONNECTION: u8 = 0x04;

/// Connection type for `DEVICE_MGMT_CONNECTION`
pub const DEVICE_MGMT_CONNECTION: u8 = 0x03;

/// KNX layer code for `TUNNEL_LINKLAYER`
pub const TUNNEL_LINKLAYER: u8 = 0x02;

// =============================================================================
// Host Protocol Codes
// =============================================================================

/// IPv4 UDP protocol
pub const IPV4_UDP: u8 = 0x01;

// =============================================================================
// Error Codes
// =============================================================================

/// Error code for successful operation
pub const E_NO_ERROR: u8 = 0x00;

/// Error code for connection type not supported
pub const E_CONNECTION_TYPE: u8 = 0x22;

/// Error code for connection option not supported
pub const E_CONNECTION_OPTION: u8 = 0x23;

/// Error code for no more connections available
pub const E_NO_MORE_CONNECTIONS: u8 = 0x24;

/// Error code for data connection error
pub const E_DATA_CONNECTION: u8 = 0x26;

/// Error code for KNX connection error
pub const E_KNX_CONNECTION: u8 = 0x27;

/// Error code for tunnelling layer not supported
pub const E_TUNNELLING_LAYER: u8 = 0x29;

// =============================================================================
// cEMI Message Codes
// =============================================================================

/// cEMI message codes relevant to the data link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CemiMessageCode {
    /// `L_Data.req` - outbound data request
    LDataReq = 0x11,
    /// `L_Data.ind` - inbound bus indication
    LDataInd = 0x29,
    /// `L_Data.con` - local confirmation of a request
    LDataCon = 0x2E,
}

impl CemiMessageCode {
    /// Convert a raw u8 to a `CemiMessageCode`.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x11 => Some(Self::LDataReq),
            0x29 => Some(Self::LDataInd),
            0x2E => Some(Self::LDataCon),
            _ => None,
        }
    }

    /// Convert a `CemiMessageCode` to its wire value.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// KNX Priority
// =============================================================================

/// KNX message priority levels (control field 1, bits 3-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Priority {
    /// System priority
    System = 0b00,
    /// Normal priority
    Normal = 0b01,
    /// Urgent priority
    Urgent = 0b10,
    /// Low priority (default for group communication)
    #[default]
    Low = 0b11,
}

impl Priority {
    /// Convert the low two bits of a byte to a Priority.
    pub const fn from_u8(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::System,
            0b01 => Self::Normal,
            0b10 => Self::Urgent,
            _ => Self::Low,
        }
    }

    /// Convert a Priority to its two-bit value.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_round_trip() {
        for raw in [
            0x0205u16, 0x0206, 0x0207, 0x0208, 0x0209, 0x020A, 0x0420, 0x0421, 0x0530,
        ] {
            let svc = ServiceType::from_u16(raw).unwrap();
            assert_eq!(svc.to_u16(), raw);
        }
        assert!(ServiceType::from_u16(0x0201).is_none());
        assert!(ServiceType::from_u16(0xFFFF).is_none());
    }

    #[test]
    fn message_code_round_trip() {
        assert_eq!(CemiMessageCode::from_u8(0x11), Some(CemiMessageCode::LDataReq));
        assert_eq!(CemiMessageCode::from_u8(0x29), Some(CemiMessageCode::LDataInd));
        assert_eq!(CemiMessageCode::from_u8(0x2E), Some(CemiMessageCode::LDataCon));
        assert!(CemiMessageCode::from_u8(0x2B).is_none());
    }

    #[test]
    fn priority_bits() {
        assert_eq!(Priority::from_u8(0b11), Priority::Low);
        assert_eq!(Priority::default().to_u8(), 0b11);
    }
}
