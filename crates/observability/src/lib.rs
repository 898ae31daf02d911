//! Process-wide logging setup.

/// Initialize tracing for the process from `RUST_LOG` and `LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filter, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, LogFormatError};
