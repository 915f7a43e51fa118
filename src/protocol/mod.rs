//! KNXnet/IP protocol implementation.
//!
//! Layered bottom-up:
//! - [`constants`] - service identifiers, status codes, cEMI message codes
//! - [`frame`] - the 6-byte outer header, frame views, HPAI
//! - [`services`] - per-service body encode/decode
//! - [`cemi`] - the KNX telegram carried inside tunneling frames
//! - [`machine`] - the connection state machine driving the exchange

pub mod cemi;
pub mod constants;
pub mod frame;
pub mod machine;
pub mod services;
