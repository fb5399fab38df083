#![forbid(unsafe_code)]

//! Logging facade.
//!
//! With the `tracing` feature the standard `tracing` macros are re-exported
//! here and at the crate root. Without it, the same macro names expand to
//! nothing, so call sites never need their own `cfg` guards.
//!
//! Subscriber setup belongs to the application. The `tracing-json` feature
//! adds [`init_json_logging`] for binaries that want the stock JSON output.

#[cfg(feature = "tracing")]
pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

/// Environment variable consulted by [`init_json_logging`] for the filter.
#[cfg(feature = "tracing-json")]
pub const LOG_FILTER_ENV: &str = "MODKEYS_LOG";

/// Install a global JSON subscriber filtered by `MODKEYS_LOG`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env(LOG_FILTER_ENV))
        .try_init()
}

/// Placeholder span returned by the no-op span macros.
#[cfg(not(feature = "tracing"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpan;

#[cfg(not(feature = "tracing"))]
impl NoopSpan {
    /// Mirrors `tracing::Span::entered`.
    #[must_use]
    pub fn entered(self) -> Self {
        self
    }
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! info {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! error {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! debug_span {
    ($($arg:tt)*) => {
        $crate::logging::NoopSpan
    };
}
