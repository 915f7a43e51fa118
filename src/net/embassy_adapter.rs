//! embassy-net UDP socket adapter for [`AsyncTransport`].
//!
//! Wraps an `embassy_net::udp::UdpSocket` so the connection layer can run
//! on embedded targets. Buffers follow the embassy convention of being
//! provided by the caller.
//!
//! ```rust,ignore
//! let mut transport = EmbassyUdpTransport::new(
//!     stack,
//!     &mut rx_meta, &mut rx_buffer,
//!     &mut tx_meta, &mut tx_buffer,
//! );
//! transport.bind(0)?;
//! ```

use crate::error::{KnxError, Result};
use crate::net::transport::AsyncTransport;
use crate::net::{IpEndpoint, Ipv4Addr};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpAddress, IpEndpoint as EmbassyEndpoint, Stack};

fn to_embassy(ep: IpEndpoint) -> EmbassyEndpoint {
    let [a, b, c, d] = ep.addr.octets();
    EmbassyEndpoint::new(IpAddress::v4(a, b, c, d), ep.port)
}

fn from_embassy(ep: EmbassyEndpoint) -> IpEndpoint {
    match ep.addr {
        IpAddress::Ipv4(v4) => IpEndpoint::new(Ipv4Addr::from(v4.octets()), ep.port),
        #[allow(unreachable_patterns)]
        _ => IpEndpoint::new(Ipv4Addr::UNSPECIFIED, ep.port),
    }
}

/// [`AsyncTransport`] implementation over an embassy-net UDP socket.
pub struct EmbassyUdpTransport<'a> {
    socket: UdpSocket<'a>,
    bound: bool,
}

impl<'a> EmbassyUdpTransport<'a> {
    /// Create a transport over the given network stack.
    ///
    /// Metadata slices need at least 4 entries; 2048-byte data buffers are
    /// plenty for KNXnet/IP frames.
    pub fn new(
        stack: Stack<'a>,
        rx_meta: &'a mut [PacketMetadata],
        rx_buffer: &'a mut [u8],
        tx_meta: &'a mut [PacketMetadata],
        tx_buffer: &'a mut [u8],
    ) -> Self {
        let socket = UdpSocket::new(stack, rx_meta, rx_buffer, tx_meta, tx_buffer);
        Self {
            socket,
            bound: false,
        }
    }
}

impl AsyncTransport for EmbassyUdpTransport<'_> {
    fn bind(&mut self, port: u16) -> Result<()> {
        self.socket.bind(port).map_err(|_| KnxError::not_bound())?;
        self.bound = true;
        Ok(())
    }

    async fn send_to(&mut self, data: &[u8], target: IpEndpoint) -> Result<()> {
        if !self.bound {
            return Err(KnxError::not_bound());
        }
        self.socket
            .send_to(data, to_embassy(target))
            .await
            .map_err(|_| KnxError::send_failed())
    }

    async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)> {
        if !self.bound {
            return Err(KnxError::not_bound());
        }
        let (len, meta) = self
            .socket
            .recv_from(buf)
            .await
            .map_err(|_| KnxError::receive_failed())?;
        Ok((len, from_embassy(meta.endpoint)))
    }

    fn is_ready(&self) -> bool {
        self.bound
    }

    fn close(&mut self) {
        self.socket.close();
        self.bound = false;
    }
}
