//! Network transport abstraction.
//!
//! The connection layer never touches a socket directly; it sends and
//! receives datagrams through [`AsyncTransport`]. Production code plugs in
//! the embassy-net adapter (feature `embassy`), tests plug in
//! [`MockTransport`](super::mock_transport::MockTransport), and anything
//! UDP-shaped can implement the trait itself.

use crate::error::Result;
use crate::net::IpEndpoint;

/// Asynchronous datagram transport.
///
/// Implementations carry complete KNXnet/IP frames; one `send_to` is one
/// datagram on the wire. Methods take `&mut self` because the connection
/// owns its transport exclusively.
#[allow(async_fn_in_trait)]
pub trait AsyncTransport {
    /// Bind to a local UDP port (0 = any).
    ///
    /// The default implementation is a no-op for transports that bind
    /// implicitly.
    fn bind(&mut self, _port: u16) -> Result<()> {
        Ok(())
    }

    /// Send one datagram to `target`.
    async fn send_to(&mut self, data: &[u8], target: IpEndpoint) -> Result<()>;

    /// Receive one datagram, returning its length and source endpoint.
    async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)>;

    /// Whether the transport is ready to carry datagrams.
    fn is_ready(&self) -> bool {
        true
    }

    /// Release the transport's resources.
    fn close(&mut self) {}
}
