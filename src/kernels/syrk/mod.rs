//! Symmetric / Hermitian rank-k update bodies
//!
//! `lhs := lhs - rhs · rhsᵀ` (real) or `lhs := lhs - rhs · rhsᴴ` (complex),
//! lower triangle only, column-major. `lhs` is `m x m`, `rhs` is `m x k`. The
//! scale factors are fixed: `-1` on the product and `+1` on the existing
//! contents. The strict upper triangle of `lhs` is never touched, and the
//! Hermitian update leaves the diagonal of `lhs` real.

pub mod cpu;
#[cfg(feature = "rocm")]
pub mod hip;

use faer::linalg::matmul::triangular::{matmul, BlockStructure};
use faer::mat::{MatMut, MatRef};
use faer::{Accum, Par};

use crate::types::{Complex32, Complex64, Element};

#[cfg(feature = "rocm")]
use crate::backend::hip_backend::ffi;

/// Per-type pieces of the rank-k update bodies
pub trait SyrkBody: Element {
    /// Lower triangle of `dst -= a · op(a)`; `op` is the transpose for real
    /// types and the conjugate transpose for complex ones
    fn rank_k_update(dst: MatMut<'_, Self>, a: MatRef<'_, Self>, par: Par);

    /// Normalize a diagonal entry after the update. `?herk` leaves the
    /// diagonal real, so the complex bodies clear the imaginary part.
    fn settle_diagonal(_value: &mut Self) {}

    /// Queue the hipBLAS `?syrk` / `?herk` call and return its status
    ///
    /// # Safety
    ///
    /// `a` and `c` must be device pointers covering `n x k` (leading
    /// dimension `lda`) and `n x n` (leading dimension `ldc`) elements.
    #[cfg(feature = "rocm")]
    unsafe fn hipblas_update(
        handle: ffi::hipblasHandle_t,
        n: i32,
        k: i32,
        a: *const Self,
        lda: i32,
        c: *mut Self,
        ldc: i32,
    ) -> i32;
}

macro_rules! impl_syrk_real {
    ($t:ty, $hipblas:ident) => {
        impl SyrkBody for $t {
            fn rank_k_update(dst: MatMut<'_, Self>, a: MatRef<'_, Self>, par: Par) {
                let mut dst = dst;
                matmul(
                    &mut dst,
                    BlockStructure::TriangularLower,
                    Accum::Add,
                    a,
                    BlockStructure::Rectangular,
                    a.transpose(),
                    BlockStructure::Rectangular,
                    -1.0,
                    par,
                );
            }

            #[cfg(feature = "rocm")]
            unsafe fn hipblas_update(
                handle: ffi::hipblasHandle_t,
                n: i32,
                k: i32,
                a: *const Self,
                lda: i32,
                c: *mut Self,
                ldc: i32,
            ) -> i32 {
                let alpha: $t = -1.0;
                let beta: $t = 1.0;
                ffi::$hipblas(
                    handle,
                    ffi::HIPBLAS_FILL_MODE_LOWER,
                    ffi::HIPBLAS_OP_N,
                    n,
                    k,
                    &alpha,
                    a,
                    lda,
                    &beta,
                    c,
                    ldc,
                )
            }
        }
    };
}

macro_rules! impl_syrk_complex {
    ($t:ty, $real:ty, $native:ident, $hipblas:ident) => {
        #[cfg(feature = "rocm")]
        const _: () = assert!(
            std::mem::size_of::<$t>() == std::mem::size_of::<ffi::$native>()
                && std::mem::align_of::<$t>() == std::mem::align_of::<ffi::$native>()
        );

        impl SyrkBody for $t {
            fn rank_k_update(dst: MatMut<'_, Self>, a: MatRef<'_, Self>, par: Par) {
                let mut dst = dst;
                matmul(
                    &mut dst,
                    BlockStructure::TriangularLower,
                    Accum::Add,
                    a,
                    BlockStructure::Rectangular,
                    a.adjoint(),
                    BlockStructure::Rectangular,
                    <$t>::new(-1.0, 0.0),
                    par,
                );
            }

            fn settle_diagonal(value: &mut Self) {
                value.im = 0.0;
            }

            #[cfg(feature = "rocm")]
            unsafe fn hipblas_update(
                handle: ffi::hipblasHandle_t,
                n: i32,
                k: i32,
                a: *const Self,
                lda: i32,
                c: *mut Self,
                ldc: i32,
            ) -> i32 {
                // herk scales are real
                let alpha: $real = -1.0;
                let beta: $real = 1.0;
                ffi::$hipblas(
                    handle,
                    ffi::HIPBLAS_FILL_MODE_LOWER,
                    ffi::HIPBLAS_OP_N,
                    n,
                    k,
                    &alpha,
                    a.cast::<ffi::$native>(),
                    lda,
                    &beta,
                    c.cast::<ffi::$native>(),
                    ldc,
                )
            }
        }
    };
}

impl_syrk_real!(f32, hipblasSsyrk);
impl_syrk_real!(f64, hipblasDsyrk);
impl_syrk_complex!(Complex32, f32, hipblasComplex, hipblasCherk);
impl_syrk_complex!(Complex64, f64, hipblasDoubleComplex, hipblasZherk);
