//! Licprobe error types.

use thiserror::Error;

/// Errors surfaced by licensing queries.
#[derive(Debug, Error)]
pub enum LicprobeError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No available provider exports the requested operation.
    #[error("No licensing provider supports {operation}")]
    CapabilityNotPresent {
        /// The logical operation that could not be dispatched.
        operation: &'static str,
    },

    /// A provider executed the call and returned a failure code.
    #[error("{operation} failed with HRESULT 0x{code:08X}")]
    NativeCallFailed {
        /// The logical operation that failed.
        operation: &'static str,
        /// The HRESULT returned by the provider, preserved for diagnostics.
        code: u32,
    },

    /// Operation attempted on a null or already-closed session.
    #[error("Licensing session is closed or invalid")]
    InvalidSession,

    /// The open call produced no usable session token.
    #[error("Licensing session unavailable")]
    SessionUnavailable,
}
