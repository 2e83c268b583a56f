//! Recoverable error handling for tensorforge
//!
//! Only conditions a caller can act on live here. Status failures reported by
//! the HIP runtime or the vendor math libraries are *not* part of this
//! channel: they terminate the process through the wrappers in
//! [`crate::backend::hip_backend::status`].

use crate::logging::LoggingError;
use crate::types::Backend;

/// Errors returned by kernel entry points and launch helpers
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// The requested backend was not compiled into this build
    #[error("backend '{0}' is not available in this build")]
    BackendUnavailable(Backend),

    /// Launch shape rejected by the block execution model
    #[error("invalid launch configuration: grid_dim={grid_dim}, block_dim={block_dim}: {reason}")]
    InvalidLaunch {
        grid_dim: usize,
        block_dim: usize,
        reason: &'static str,
    },

    /// A device code object or one of its kernels could not be found
    #[error("failed to load device kernel: {0}")]
    KernelLoadFailed(String),

    /// The reduction operator has no device implementation
    #[error("no device kernel for reduction '{0}'")]
    NoDeviceKernel(&'static str),

    /// Logging could not be initialized
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
}

impl KernelError {
    /// True when retrying with a different backend could succeed
    pub fn is_backend_selection(&self) -> bool {
        matches!(self, KernelError::BackendUnavailable(_))
    }
}

/// Result type for recoverable kernel errors
pub type KernelResult<T> = Result<T, KernelError>;
