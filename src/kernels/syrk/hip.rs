//! Accelerator rank-k update through hipBLAS

use super::SyrkBody;
use crate::backend::hip_backend::{check_hipblas, DeviceHandles};
use crate::types::{TensorMut, TensorRef};

/// Lower triangle of `lhs -= rhs · op(rhs)` on device memory, queued on the
/// device's cached stream. Both operands are column-major; the leading
/// dimensions are their column strides.
pub fn syrk_device<T: SyrkBody>(handles: &mut DeviceHandles, lhs: &mut TensorMut<'_, T>, rhs: &TensorRef<'_, T>) {
    let n = lhs.shape()[0] as i32;
    let k = rhs.shape()[1] as i32;
    let lda = rhs.strides()[1].max(1) as i32;
    let ldc = lhs.strides()[1].max(1) as i32;
    tracing::trace!(dtype = %T::TYPE, device = handles.device(), n, k, "hipBLAS rank-k update");

    let handle = handles.hipblas();
    check_hipblas(unsafe { T::hipblas_update(handle, n, k, rhs.as_ptr(), lda, lhs.as_mut_ptr(), ldc) });
}
