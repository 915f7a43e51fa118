//! KNX bus addressing.
//!
//! Two address spaces share the same 16-bit wire format: [`GroupAddress`]
//! for logical datapoints and [`IndividualAddress`] for physical devices.
//! The destination-address-type bit in the cEMI control field decides which
//! interpretation applies.

pub mod group;
pub mod individual;

#[doc(inline)]
pub use group::GroupAddress;
#[doc(inline)]
pub use individual::IndividualAddress;
