//! Mock transport for tests.
//!
//! Pre-program the datagrams `recv_from` should deliver, then inspect what
//! `send_to` put on the wire. Combined with the sans-io machine and
//! synthetic instants this exercises the whole protocol stack without a
//! socket.
//!
//! ```rust,ignore
//! let mut mock = MockTransport::new();
//! mock.push_rx(&CONNECT_RESPONSE_FRAME);
//!
//! // ... drive the client ...
//!
//! assert_eq!(mock.sent().len(), 1);
//! ```

use crate::error::{KnxError, Result};
use crate::net::transport::AsyncTransport;
use crate::net::{IpEndpoint, Ipv4Addr};

#[cfg(feature = "std")]
use std::collections::VecDeque;
#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::collections::VecDeque;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Default peer the mock reports as datagram source (a gateway address).
fn default_peer() -> IpEndpoint {
    IpEndpoint::new(Ipv4Addr::new(10, 0, 0, 1), 3671)
}

/// Scriptable in-memory transport.
#[derive(Debug, Default)]
pub struct MockTransport {
    rx: VecDeque<(Vec<u8>, IpEndpoint)>,
    sent: Vec<(Vec<u8>, IpEndpoint)>,
    ready: bool,
}

impl MockTransport {
    /// Create an empty mock transport.
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            sent: Vec::new(),
            ready: true,
        }
    }

    /// Queue a datagram for the next `recv_from`, from the default peer.
    pub fn push_rx(&mut self, data: &[u8]) {
        self.push_rx_from(data, default_peer());
    }

    /// Queue a datagram for the next `recv_from` with an explicit source.
    pub fn push_rx_from(&mut self, data: &[u8], from: IpEndpoint) {
        self.rx.push_back((data.to_vec(), from));
    }

    /// Every datagram passed to `send_to`, in order.
    pub fn sent(&self) -> &[(Vec<u8>, IpEndpoint)] {
        &self.sent
    }

    /// The most recent datagram passed to `send_to`.
    pub fn last_sent(&self) -> Option<&(Vec<u8>, IpEndpoint)> {
        self.sent.last()
    }

    /// Forget recorded datagrams.
    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Whether undelivered inbound datagrams remain.
    pub fn has_rx(&self) -> bool {
        !self.rx.is_empty()
    }
}

impl AsyncTransport for MockTransport {
    async fn send_to(&mut self, data: &[u8], target: IpEndpoint) -> Result<()> {
        self.sent.push((data.to_vec(), target));
        Ok(())
    }

    async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)> {
        match self.rx.pop_front() {
            Some((data, from)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok((len, from))
            }
            // nothing scripted: report a receive failure instead of
            // suspending forever
            None => Err(KnxError::receive_failed()),
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn close(&mut self) {
        self.ready = false;
        self.rx.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sent_datagrams() {
        let mut mock = MockTransport::new();
        let target = default_peer();

        mock.send_to(&[0xAA, 0xBB], target).await.unwrap();
        assert_eq!(mock.sent().len(), 1);
        assert_eq!(mock.sent()[0].0, vec![0xAA, 0xBB]);
        assert_eq!(mock.sent()[0].1, target);
    }

    #[tokio::test]
    async fn delivers_rx_in_fifo_order() {
        let mut mock = MockTransport::new();
        mock.push_rx(&[0x01]);
        mock.push_rx(&[0x02]);

        let mut buf = [0u8; 8];
        let (n, _) = mock.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x01]);
        let (n, _) = mock.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x02]);
    }

    #[tokio::test]
    async fn empty_rx_errors() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 8];
        assert!(mock.recv_from(&mut buf).await.is_err());
    }

    #[test]
    fn close_clears_ready() {
        let mut mock = MockTransport::new();
        assert!(mock.is_ready());
        mock.close();
        assert!(!mock.is_ready());
    }
}
