//! Tracing/logging setup shared by binaries and tests.

/// Initialize process-wide logging with the format chosen by
/// `ASSETLOG_LOG_FORMAT` (JSON unless it says `pretty`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(LogFormat::from_env());
}

pub use tracing::{LogFormat, init_with};

/// Tracing configuration (filters, formats).
pub mod tracing;
