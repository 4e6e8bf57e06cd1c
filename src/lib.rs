// This is free and unencumbered software released into the public domain.

//! Double-buffered preview-frame handoff between a platform camera service
//! and a native consumer, plus the event forwarding around it.

#![forbid(unsafe_code)]

extern crate alloc;

// Logging shims. With `tracing` off they expand to nothing, arguments included.
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        asimov_module::tracing::debug!($($arg)*);
    }};
}

macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        asimov_module::tracing::trace!($($arg)*);
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        asimov_module::tracing::warn!($($arg)*);
    }};
}

#[allow(unused_imports)]
pub(crate) use {log_debug, log_trace, log_warn};

pub mod cli;
pub mod shared;
