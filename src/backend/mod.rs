//! Execution backends
//!
//! `cpu` holds the host-side setup shared by the sequential and multi-core
//! entries; `hip_backend` wraps the ROCm runtime and vendor libraries.

pub mod cpu;
pub mod hip_backend;

pub use hip_backend::{FatalBackendError, VendorStatus};
