//! tensorforge - dense tensor kernels for task-based runtimes
//!
//! Contraction and rank-k update bodies with sequential, multi-core and ROCm
//! accelerator variants, plus the block-cooperative reduction and cache-hinted
//! memory primitives that device-style kernels are written against.

#![allow(clippy::too_many_arguments)] // FFI signatures mirror the vendor libraries
#![allow(clippy::missing_safety_doc)] // FFI bindings documented at module level

pub mod backend;
pub mod config;
pub mod error;
pub mod kernels;
pub mod logging;
pub mod simt;
pub mod types;

pub use config::KernelConfig;
pub use error::{KernelError, KernelResult};
pub use kernels::{contract, contract_raw, syrk, syrk_raw, RawTensor};
pub use simt::reduce::{DeferredBool, DeferredReduction, ReductionOp};
pub use simt::kernels::{all_true_on, reduce_on};
pub use simt::LaunchConfig;
pub use types::{Backend, Complex32, Complex64, Element, ElementType, TensorMut, TensorRef};
