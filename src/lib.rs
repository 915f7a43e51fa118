#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # knx-tunnel
//!
//! Client side of the KNXnet/IP tunneling protocol: talk to a KNX bus
//! through an IP gateway as if directly attached.
//!
//! The crate is split along the protocol's own seams:
//!
//! - [`addressing`] - group and individual addresses
//! - [`protocol`] - frame and cEMI codecs plus the sans-io connection
//!   state machine (handshake, heartbeat, windowed tunneling exchange,
//!   retransmission, reconnect)
//! - [`dpt`] - datapoint type codecs between typed values and APDU bytes
//! - [`client`] - async client binding datapoints to group addresses over
//!   an injected [`net::AsyncTransport`]
//!
//! ## Design
//!
//! The state machine owns no sockets and reads no clocks; the async
//! client feeds it datagrams and deadlines and drains frames and events.
//! Tests drive the same machine with synthetic instants, which keeps
//! every protocol transition deterministic.
//!
//! `no_std` by default (bounded `heapless` collections, `embassy-time`
//! instants); the `std` feature adds `std::error::Error` impls and the
//! mock transport, `embassy` adds an embassy-net UDP adapter, and
//! `defmt`/`log` select the logging backend.
//!
//! ## Example
//!
//! ```rust,ignore
//! use knx_tunnel::client::{ClientConfig, Datapoint, KnxClient};
//! use knx_tunnel::dpt::KnxValue;
//! use knx_tunnel::ga;
//!
//! let config = ClientConfig::builder()
//!     .gateway([192, 168, 1, 10], 3671)
//!     .build();
//!
//! let mut client = KnxClient::new(config, transport, handlers)?;
//! client.add_datapoint(Datapoint::new("1/2/3", "1.001", false)?)?;
//! client.connect().await?;
//!
//! client.write(ga!(1/2/3), KnxValue::Bool(true)).await?;
//! loop {
//!     client.poll().await?;
//! }
//! ```

pub mod addressing;
pub mod client;
pub mod dpt;
pub mod error;
pub mod net;
pub mod protocol;

// Macro modules (must be declared before use)
#[macro_use]
pub mod macros;
#[macro_use]
pub mod logging;

// Re-export the types most applications need
#[doc(inline)]
pub use addressing::{GroupAddress, IndividualAddress};
#[doc(inline)]
pub use client::{ClientConfig, Datapoint, EventHandler, GroupEvent, KnxClient};
#[doc(inline)]
pub use dpt::{Dpt, DptId, KnxValue};
#[doc(inline)]
pub use error::{KnxError, Result};
#[doc(inline)]
pub use protocol::machine::{ConnectionState, DisconnectReason};
