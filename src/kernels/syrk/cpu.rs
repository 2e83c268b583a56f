//! Host rank-k update over the caller's buffers

use faer::mat::{MatMut, MatRef};
use faer::Par;

use super::SyrkBody;
use crate::types::{TensorMut, TensorRef};

/// Lower triangle of `lhs -= rhs · op(rhs)` on host memory.
///
/// `lhs` is read as `m x m` and `rhs` as `m x k`, both through their own
/// strides; no data is copied.
pub fn syrk_host<T: SyrkBody>(lhs: &mut TensorMut<'_, T>, rhs: &TensorRef<'_, T>, par: Par) {
    let m = lhs.shape()[0].max(0) as usize;
    let k = rhs.shape()[1].max(0) as usize;
    tracing::trace!(dtype = %T::TYPE, m, k, "host rank-k update");

    let (lhs_rs, lhs_cs) = (lhs.strides()[0] as isize, lhs.strides()[1] as isize);
    let (rhs_rs, rhs_cs) = (rhs.strides()[0] as isize, rhs.strides()[1] as isize);
    // SAFETY: the descriptors address `m x m` and `m x k` elements through these strides
    let (dst, a) = unsafe {
        (
            MatMut::from_raw_parts_mut(lhs.as_mut_ptr(), m, m, lhs_rs, lhs_cs),
            MatRef::from_raw_parts(rhs.as_ptr(), m, k, rhs_rs, rhs_cs),
        )
    };
    T::rank_k_update(dst, a, par);
    // rank zero returns before the diagonal is touched, as `?herk` does
    if k == 0 {
        return;
    }

    let base = lhs.as_mut_ptr();
    for i in 0..m as isize {
        // SAFETY: (i, i) lies inside the `m x m` view
        unsafe { T::settle_diagonal(&mut *base.offset(i * (lhs_rs + lhs_cs))) };
    }
}
