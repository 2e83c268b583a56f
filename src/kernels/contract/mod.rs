//! Tensor contraction bodies
//!
//! `lhs += rhs1 · rhs2`, summed over every mode the two inputs share and the
//! output lacks. Mode labels decide which axes correspond; shapes, strides and
//! modes are taken as given.

pub mod cpu;
#[cfg(feature = "rocm")]
pub mod hip;

use faer::linalg::matmul::matmul;
use faer::mat::{MatMut, MatRef};
use faer::{Accum, Par};

use crate::types::{Complex32, Complex64, Element};

/// Per-type pieces of the contraction bodies
pub trait ContractBody: Element {
    /// Multiplicative identity
    fn one() -> Self;

    /// `dst := lhs · rhs` with the dense-algebra library
    fn gemm(dst: MatMut<'_, Self>, lhs: MatRef<'_, Self>, rhs: MatRef<'_, Self>, par: Par);

    /// hipDataType of the element
    #[cfg(feature = "rocm")]
    const HIP_DATA_TYPE: i32;

    /// hipTensor compute descriptor matching the element
    #[cfg(feature = "rocm")]
    const COMPUTE_DESC: u32;
}

macro_rules! impl_contract_body {
    ($t:ty, $one:expr, $data_type:ident, $compute:ident) => {
        impl ContractBody for $t {
            fn one() -> Self {
                $one
            }

            fn gemm(dst: MatMut<'_, Self>, lhs: MatRef<'_, Self>, rhs: MatRef<'_, Self>, par: Par) {
                let mut dst = dst;
                matmul(&mut dst, Accum::Replace, lhs, rhs, $one, par);
            }

            #[cfg(feature = "rocm")]
            const HIP_DATA_TYPE: i32 = crate::backend::hip_backend::ffi::$data_type;

            #[cfg(feature = "rocm")]
            const COMPUTE_DESC: u32 = crate::backend::hip_backend::ffi::$compute;
        }
    };
}

impl_contract_body!(f32, 1.0, HIP_R_32F, HIPTENSOR_COMPUTE_DESC_32F);
impl_contract_body!(f64, 1.0, HIP_R_64F, HIPTENSOR_COMPUTE_DESC_64F);
impl_contract_body!(Complex32, Complex32::new(1.0, 0.0), HIP_C_32F, HIPTENSOR_COMPUTE_DESC_C32F);
impl_contract_body!(Complex64, Complex64::new(1.0, 0.0), HIP_C_64F, HIPTENSOR_COMPUTE_DESC_C64F);
