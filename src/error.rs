//! Error types for the tunneling stack.
//!
//! All fallible operations return [`KnxError`], which groups failures by the
//! layer they originate from. Inbound codec errors are recoverable (the
//! datagram is dropped, the tunnel survives); connection errors downgrade the
//! tunnel; datapoint errors fail the single operation that caused them.

use core::fmt;

/// Result type alias for stack operations.
pub type Result<T> = core::result::Result<T, KnxError>;

/// Frame-level decode failures. The offending datagram is dropped and the
/// connection state is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Datagram shorter than the structure it claims to carry.
    Truncated,
    /// Header length byte is not 0x06.
    HeaderMismatch,
    /// Protocol version byte is not 0x10.
    UnsupportedVersion,
    /// Service type identifier not known to this stack.
    UnknownServiceType(u16),
    /// Total-length field disagrees with the datagram.
    LengthMismatch,
}

/// Violations of the KNXnet/IP exchange rules inside well-formed frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// A service arrived that the current state cannot accept.
    UnexpectedService(u16),
    /// A response carried a non-zero status byte.
    BadStatus(u8),
    /// Frame addressed to a different communication channel.
    ChannelMismatch,
    /// cEMI message code not known to this stack.
    InvalidMessageCode(u8),
}

/// Connection lifecycle failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionError {
    /// Gateway answered CONNECT_REQUEST with a non-zero status.
    ConnectFailed(u8),
    /// No CONNECT_RESPONSE within the retry budget.
    ConnectTimeout,
    /// Tunneling ACK or heartbeat lost past the retry budget.
    TunnelStalled,
    /// Operation requires an established tunnel.
    NotConnected,
    /// `connect()` while a tunnel is already up or being set up.
    AlreadyConnected,
}

/// Transport (socket) failures reported by the injected transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    SendFailed,
    ReceiveFailed,
    NotBound,
    BufferTooSmall,
}

/// Address parsing and range failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressError {
    InvalidGroupAddress,
    InvalidIndividualAddress,
    InvalidIpAddress,
    OutOfRange,
}

/// Datapoint type encode/decode failures. These reject the local operation
/// before anything reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DptError {
    /// Value outside the range the DPT can represent.
    ValueOutOfRange,
    /// Byte buffer length differs from the DPT's declared width.
    LengthMismatch,
    /// Datapoint type identifier not implemented by this stack.
    UnknownType,
    /// Value variant incompatible with the bound DPT.
    TypeMismatch,
}

/// Failures of a submitted group write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteError {
    /// Gateway confirmed the telegram with the error bit set.
    Rejected,
    /// Queued write released by `disconnect()`.
    Cancelled,
    /// Queued write exceeded the configured queue age.
    Expired,
    /// Transmit queue is full.
    QueueFull,
}

/// Top-level error of the tunneling stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KnxError {
    /// Malformed KNXnet/IP or cEMI frame (datagram dropped).
    Frame(FrameError),
    /// Rule violation inside a well-formed frame.
    Protocol(ProtocolError),
    /// Connection lifecycle failure.
    Connection(ConnectionError),
    /// Socket-level failure.
    Transport(TransportError),
    /// Address parsing or range failure.
    Addressing(AddressError),
    /// Datapoint encode/decode failure.
    Dpt(DptError),
    /// Group write failure.
    Write(WriteError),
}

// =============================================================================
// Convenience constructors
// =============================================================================

impl KnxError {
    // Frame errors
    #[inline]
    pub(crate) const fn truncated() -> Self {
        Self::Frame(FrameError::Truncated)
    }

    #[inline]
    pub(crate) const fn header_mismatch() -> Self {
        Self::Frame(FrameError::HeaderMismatch)
    }

    #[inline]
    pub(crate) const fn unsupported_version() -> Self {
        Self::Frame(FrameError::UnsupportedVersion)
    }

    #[inline]
    pub(crate) const fn unknown_service_type(raw: u16) -> Self {
        Self::Frame(FrameError::UnknownServiceType(raw))
    }

    #[inline]
    pub(crate) const fn length_mismatch() -> Self {
        Self::Frame(FrameError::LengthMismatch)
    }

    // Protocol errors
    #[inline]
    pub(crate) const fn unexpected_service(raw: u16) -> Self {
        Self::Protocol(ProtocolError::UnexpectedService(raw))
    }

    #[inline]
    pub(crate) const fn invalid_message_code(raw: u8) -> Self {
        Self::Protocol(ProtocolError::InvalidMessageCode(raw))
    }

    // Connection errors
    #[inline]
    pub(crate) const fn connect_failed(status: u8) -> Self {
        Self::Connection(ConnectionError::ConnectFailed(status))
    }

    #[inline]
    pub(crate) const fn connect_timeout() -> Self {
        Self::Connection(ConnectionError::ConnectTimeout)
    }

    #[inline]
    pub(crate) const fn tunnel_stalled() -> Self {
        Self::Connection(ConnectionError::TunnelStalled)
    }

    #[inline]
    pub(crate) const fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    #[inline]
    pub(crate) const fn already_connected() -> Self {
        Self::Connection(ConnectionError::AlreadyConnected)
    }

    // Transport errors
    #[inline]
    pub(crate) const fn buffer_too_small() -> Self {
        Self::Transport(TransportError::BufferTooSmall)
    }

    #[inline]
    pub(crate) const fn send_failed() -> Self {
        Self::Transport(TransportError::SendFailed)
    }

    #[inline]
    pub(crate) const fn receive_failed() -> Self {
        Self::Transport(TransportError::ReceiveFailed)
    }

    #[inline]
    pub(crate) const fn not_bound() -> Self {
        Self::Transport(TransportError::NotBound)
    }

    // Addressing errors
    #[inline]
    pub(crate) const fn invalid_group_address() -> Self {
        Self::Addressing(AddressError::InvalidGroupAddress)
    }

    #[inline]
    pub(crate) const fn invalid_individual_address() -> Self {
        Self::Addressing(AddressError::InvalidIndividualAddress)
    }

    #[inline]
    pub(crate) const fn invalid_ip_address() -> Self {
        Self::Addressing(AddressError::InvalidIpAddress)
    }

    #[inline]
    pub(crate) const fn address_out_of_range() -> Self {
        Self::Addressing(AddressError::OutOfRange)
    }

    // DPT errors
    #[inline]
    pub(crate) const fn dpt_value_out_of_range() -> Self {
        Self::Dpt(DptError::ValueOutOfRange)
    }

    #[inline]
    pub(crate) const fn dpt_length_mismatch() -> Self {
        Self::Dpt(DptError::LengthMismatch)
    }

    #[inline]
    pub(crate) const fn unknown_dpt() -> Self {
        Self::Dpt(DptError::UnknownType)
    }

    #[inline]
    pub(crate) const fn dpt_type_mismatch() -> Self {
        Self::Dpt(DptError::TypeMismatch)
    }

    // Write errors
    #[inline]
    pub(crate) const fn write_rejected() -> Self {
        Self::Write(WriteError::Rejected)
    }

    #[inline]
    pub(crate) const fn write_queue_full() -> Self {
        Self::Write(WriteError::QueueFull)
    }

    /// True for errors that only invalidate a single inbound datagram.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Frame(_) | Self::Dpt(_))
    }
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for KnxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnxError::Frame(e) => write!(f, "malformed frame: {:?}", e),
            KnxError::Protocol(e) => write!(f, "protocol error: {:?}", e),
            KnxError::Connection(e) => write!(f, "connection error: {:?}", e),
            KnxError::Transport(e) => write!(f, "transport error: {:?}", e),
            KnxError::Addressing(e) => write!(f, "addressing error: {:?}", e),
            KnxError::Dpt(e) => write!(f, "datapoint error: {:?}", e),
            KnxError::Write(e) => write!(f, "write error: {:?}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KnxError {}
