//! Accelerator contraction through hipTensor

use std::ffi::c_void;
use std::ptr;

use super::ContractBody;
use crate::backend::hip_backend::ffi;
use crate::backend::hip_backend::{check_hiptensor, DeviceBuffer, DeviceHandles};
use crate::types::{TensorMut, TensorRef};

fn tensor_descriptor<T: ContractBody>(
    handle: ffi::hiptensorHandle_t,
    shape: &[i64],
    strides: &[i64],
) -> ffi::hiptensorTensorDescriptor_t {
    let mut desc = ptr::null_mut();
    check_hiptensor(unsafe {
        ffi::hiptensorCreateTensorDescriptor(
            handle,
            &mut desc,
            shape.len() as u32,
            shape.as_ptr(),
            strides.as_ptr(),
            T::HIP_DATA_TYPE,
            ffi::HIPTENSOR_ALIGNMENT,
        )
    });
    desc
}

/// `lhs += rhs1 · rhs2` on device memory, on the device's cached stream
///
/// The three descriptors must point at memory of the device `handles` belongs
/// to. Returns after the stream has drained.
pub fn contract_device<T: ContractBody>(
    handles: &mut DeviceHandles,
    lhs: &mut TensorMut<'_, T>,
    rhs1: &TensorRef<'_, T>,
    rhs2: &TensorRef<'_, T>,
) {
    tracing::trace!(dtype = %T::TYPE, device = handles.device(), "hipTensor contraction");
    let handle = handles.hiptensor();

    let desc_a = tensor_descriptor::<T>(handle, rhs1.shape(), rhs1.strides());
    let desc_b = tensor_descriptor::<T>(handle, rhs2.shape(), rhs2.strides());
    let desc_c = tensor_descriptor::<T>(handle, lhs.shape(), lhs.strides());

    let mut operation = ptr::null_mut();
    check_hiptensor(unsafe {
        ffi::hiptensorCreateContraction(
            handle,
            &mut operation,
            desc_a,
            rhs1.modes().as_ptr(),
            ffi::HIPTENSOR_OP_IDENTITY,
            desc_b,
            rhs2.modes().as_ptr(),
            ffi::HIPTENSOR_OP_IDENTITY,
            desc_c,
            lhs.modes().as_ptr(),
            ffi::HIPTENSOR_OP_IDENTITY,
            desc_c,
            lhs.modes().as_ptr(),
            T::COMPUTE_DESC,
        )
    });

    let mut preference = ptr::null_mut();
    check_hiptensor(unsafe {
        ffi::hiptensorCreatePlanPreference(
            handle,
            &mut preference,
            ffi::HIPTENSOR_ALGO_DEFAULT,
            ffi::HIPTENSOR_JIT_MODE_NONE,
        )
    });

    let mut workspace_size = 0u64;
    check_hiptensor(unsafe {
        ffi::hiptensorEstimateWorkspaceSize(
            handle,
            operation,
            preference,
            ffi::HIPTENSOR_WORKSPACE_DEFAULT,
            &mut workspace_size,
        )
    });

    let mut plan = ptr::null_mut();
    check_hiptensor(unsafe { ffi::hiptensorCreatePlan(handle, &mut plan, operation, preference, workspace_size) });

    let mut workspace = DeviceBuffer::<u8>::new(workspace_size as usize);
    let alpha = T::one();
    let beta = T::one();
    let out = lhs.as_mut_ptr().cast::<c_void>();
    check_hiptensor(unsafe {
        ffi::hiptensorContract(
            handle,
            plan,
            (&alpha as *const T).cast(),
            rhs1.as_ptr().cast(),
            rhs2.as_ptr().cast(),
            (&beta as *const T).cast(),
            out,
            out,
            workspace.as_mut_ptr().cast(),
            workspace_size,
            handles.stream().as_ptr(),
        )
    });
    // The workspace is freed on return, so the contraction must be done with it
    handles.stream().synchronize();

    unsafe {
        ffi::hiptensorDestroyPlan(plan);
        ffi::hiptensorDestroyPlanPreference(preference);
        ffi::hiptensorDestroyOperationDescriptor(operation);
        ffi::hiptensorDestroyTensorDescriptor(desc_c);
        ffi::hiptensorDestroyTensorDescriptor(desc_b);
        ffi::hiptensorDestroyTensorDescriptor(desc_a);
    }
}
