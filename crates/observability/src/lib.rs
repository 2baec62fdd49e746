//! Tracing and logging (shared setup).

/// Initialize process-wide logging from `config`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LoggingConfig) -> Result<(), ObservabilityError> {
    tracing::init(config)
}

/// Tracing configuration (filters, layers, sinks).
pub mod tracing;

pub use self::tracing::{LogDestination, LoggingConfig, ObservabilityError};
