//! Dense kernels over host and device memory
//!
//! - `contract`: general tensor contraction, `lhs += rhs1 · rhs2` over named modes
//! - `syrk`: symmetric / Hermitian rank-k update of a lower triangle
//! - `dispatch`: per-backend entries and run-time backend / element-type selection

pub mod contract;
pub mod dispatch;
pub mod syrk;

pub use contract::ContractBody;
pub use dispatch::{
    contract, contract_raw, contract_sequential, syrk, syrk_raw, syrk_sequential, RawTensor,
};
#[cfg(feature = "multicore")]
pub use dispatch::{contract_multicore, syrk_multicore};
#[cfg(feature = "rocm")]
pub use dispatch::{contract_accelerator, syrk_accelerator};
pub use syrk::SyrkBody;
