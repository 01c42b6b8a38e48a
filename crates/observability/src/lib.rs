//! Process-wide logging setup for the stockledger binaries.

pub mod tracing;

/// Install the global subscriber, with the output format taken from `LOG_FORMAT`.
///
/// Calling it again is a no-op.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}
