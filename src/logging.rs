//! Logging facade used throughout the navigation engine.
//!
//! The engine never talks to a logging backend directly. Every diagnostic goes
//! through the macros below, which forward to [`log`](https://docs.rs/log) or
//! [`tracing`](https://docs.rs/tracing) depending on the enabled feature. Enable
//! at most one of them; with neither enabled the macros compile to nothing.
//!
//! | Feature    | Backend         | Default |
//! |------------|-----------------|---------|
//! | `log`      | `log` crate     | yes     |
//! | `tracing`  | `tracing` crate | no      |
//!
//! What gets logged where:
//!
//! - `trace_log!`: pipeline step transitions, recognizer cache hits.
//! - `debug_log!`: instruction resolution, per-viewport plan decisions,
//!   lifecycle refusals.
//! - `info_log!`: route registration, router configuration and activation.
//! - `warn_log!`: recoverable oddities (failed location restore, activation
//!   of a router that never got configured), failed navigation events.
//! - `error_log!`: failed navigations, runaway redirect chains.
//!
//! ```ignore
//! use navigator_pipeline::{debug_log, error_log};
//!
//! debug_log!("Viewport '{}' planned as {}", name, strategy);
//! error_log!("Route not found: {}", url);
//! ```

/// Forward a record to whichever backend is enabled.
///
/// Not part of the public API; use the level macros instead.
#[doc(hidden)]
#[macro_export]
macro_rules! __navigator_log {
    ($level:ident, $($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        ::tracing::$level!($($arg)*);
        #[cfg(feature = "log")]
        ::log::$level!($($arg)*);
    }};
}

/// Emit a **trace**-level record.
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => { $crate::__navigator_log!(trace, $($arg)*) };
}

/// Emit a **debug**-level record.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => { $crate::__navigator_log!(debug, $($arg)*) };
}

/// Emit an **info**-level record.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => { $crate::__navigator_log!(info, $($arg)*) };
}

/// Emit a **warn**-level record.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => { $crate::__navigator_log!(warn, $($arg)*) };
}

/// Emit an **error**-level record.
#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => { $crate::__navigator_log!(error, $($arg)*) };
}
