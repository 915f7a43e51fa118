//! Unified logging macro for the tunneling stack.
//!
//! The stack never talks to a concrete logger directly; every log line goes
//! through [`knx_log!`], which compiles down to `defmt::` on embedded targets,
//! `log::` on hosted targets, or nothing when neither backend is enabled.
//!
//! # Usage
//!
//! ```rust,ignore
//! knx_log!(info, "tunnel established on channel {}", channel_id);
//! knx_log!(warn, "dropping malformed datagram ({} bytes)", len);
//! ```
//!
//! # Feature flags
//!
//! - `defmt` - routes to `defmt::` (deferred formatting, embedded)
//! - `log` - routes to the `log` facade (hosted applications)
//! - neither - log lines compile to nothing

/// Route a log line to the configured backend.
#[macro_export]
#[cfg(feature = "defmt")]
macro_rules! knx_log {
    (trace, $($arg:tt)*) => { defmt::trace!($($arg)*) };
    (debug, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (info, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (warn, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { defmt::error!($($arg)*) };
}

/// Route a log line to the configured backend.
#[macro_export]
#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! knx_log {
    (trace, $($arg:tt)*) => { log::trace!($($arg)*) };
    (debug, $($arg:tt)*) => { log::debug!($($arg)*) };
    (info, $($arg:tt)*) => { log::info!($($arg)*) };
    (warn, $($arg:tt)*) => { log::warn!($($arg)*) };
    (error, $($arg:tt)*) => { log::error!($($arg)*) };
}

/// Route a log line to the configured backend (no-op without a backend).
#[macro_export]
#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! knx_log {
    ($level:ident, $($arg:tt)*) => {{
        let _ = || ($($arg)*);
    }};
}
