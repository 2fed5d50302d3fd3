/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common result type for pipe device operations
pub type PipeResult<T> = Result<T, PipeError>;

/// Classic errno values reported through [`PipeError::errno`]
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const ENODEV: i32 = 19;
    pub const EBADF: i32 = 9;
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EFAULT: i32 = 14;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
    pub const ENOTTY: i32 = 25;
    pub const ETIMEDOUT: i32 = 110;
    /// Kernel-internal "restart the call" code returned on interruption
    pub const ERESTARTSYS: i32 = 512;
}

/// Pipe device errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum PipeError {
    #[error("Would block: {0}")]
    #[diagnostic(
        code(pipe::would_block),
        help("The operation was non-blocking and could not proceed. Retry later or open in blocking mode.")
    )]
    WouldBlock(String),

    #[error("Interrupted while waiting")]
    #[diagnostic(
        code(pipe::interrupted),
        help("The call was cancelled. Reset the cancellation token and retry if appropriate.")
    )]
    Interrupted,

    #[error("Operation timed out after {elapsed_ms}ms (timeout: {}ms)", timeout_ms.map(|t| t.to_string()).unwrap_or_else(|| "none".to_string()))]
    #[diagnostic(code(pipe::timeout), help("No data or space became available in time."))]
    Timeout {
        elapsed_ms: u64,
        timeout_ms: Option<u64>,
    },

    #[error("Bad address: {0}")]
    #[diagnostic(
        code(pipe::fault),
        help("Copying to or from the caller's buffer failed. The pipe was left unchanged.")
    )]
    Fault(String),

    #[error("Bad descriptor: {0}")]
    #[diagnostic(
        code(pipe::bad_descriptor),
        help("The handle was not opened for this direction.")
    )]
    BadDescriptor(String),

    #[error("No such device: {0}")]
    #[diagnostic(code(pipe::no_device), help("Check the major/minor numbers."))]
    NoDevice(String),

    #[error("Device busy: {0}")]
    #[diagnostic(
        code(pipe::busy),
        help("The requested major number is already registered.")
    )]
    Busy(String),

    #[error("Inappropriate command 0x{0:08x}")]
    #[diagnostic(
        code(pipe::not_tty),
        help("Unknown command magic or number for this device.")
    )]
    NotTty(u32),

    #[error("Permission denied: {0}")]
    #[diagnostic(
        code(pipe::permission_denied),
        help("Changing device parameters requires the admin capability.")
    )]
    PermissionDenied(String),

    #[error("Memory allocation failed: {0}")]
    #[diagnostic(
        code(pipe::allocation_failed),
        help("Reduce the buffer size or the number of devices.")
    )]
    AllocationFailed(String),

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(pipe::invalid_argument))]
    InvalidArgument(String),
}

impl PipeError {
    /// Negative errno equivalent of this error
    pub fn errno(&self) -> i32 {
        use errno::*;
        let code = match self {
            PipeError::WouldBlock(_) => EAGAIN,
            PipeError::Interrupted => ERESTARTSYS,
            PipeError::Timeout { .. } => ETIMEDOUT,
            PipeError::Fault(_) => EFAULT,
            PipeError::BadDescriptor(_) => EBADF,
            PipeError::NoDevice(_) => ENODEV,
            PipeError::Busy(_) => EBUSY,
            PipeError::NotTty(_) => ENOTTY,
            PipeError::PermissionDenied(_) => EPERM,
            PipeError::AllocationFailed(_) => ENOMEM,
            PipeError::InvalidArgument(_) => EINVAL,
        };
        -code
    }

    /// True for errors a caller may simply retry (`WouldBlock`, `Interrupted`)
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipeError::WouldBlock(_) | PipeError::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(PipeError::WouldBlock("full".into()).errno(), -11);
        assert_eq!(PipeError::Interrupted.errno(), -512);
        assert_eq!(PipeError::Fault("sink".into()).errno(), -14);
        assert_eq!(PipeError::NotTty(0).errno(), -25);
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_string(&PipeError::Interrupted).unwrap();
        assert_eq!(json, r#"{"error_type":"interrupted"}"#);

        let back: PipeError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PipeError::Interrupted);
    }

    #[test]
    fn test_retryable() {
        assert!(PipeError::Interrupted.is_retryable());
        assert!(PipeError::WouldBlock(String::new()).is_retryable());
        assert!(!PipeError::Fault(String::new()).is_retryable());
    }
}
