//! Tracing/logging setup shared by binaries and integration tests.

/// Tracing subscriber configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize process-wide logging from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    crate::tracing::init(LogFormat::from_env());
}
