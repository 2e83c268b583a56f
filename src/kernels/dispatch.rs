//! Kernel dispatch
//!
//! One entry function per (operation, backend). Each entry does its backend's
//! setup and then runs the element-type specialization of the body:
//!
//! - sequential: pin the dense-algebra library to one worker
//! - multi-core: hand it the configured or ambient thread count
//! - accelerator: fetch the cached handles and stream of the current device
//!
//! [`contract`] and [`syrk`] switch on a [`Backend`] tag at run time;
//! [`contract_raw`] and [`syrk_raw`] additionally switch on an
//! [`ElementType`] tag for callers holding type-erased buffers.
//!
//! Backend library failures do not come back through these functions: they
//! end the process (see [`crate::backend::hip_backend::status`]).

use std::ffi::c_void;

use super::contract::cpu::contract_host;
use super::contract::ContractBody;
use super::syrk::cpu::syrk_host;
use super::syrk::SyrkBody;
use crate::backend::cpu;
use crate::error::{KernelError, KernelResult};
use crate::type_dispatch;
use crate::types::{Backend, ElementType, TensorMut, TensorRef};

#[cfg(any(feature = "multicore", feature = "rocm"))]
use crate::config::KernelConfig;

/// `lhs += rhs1 · rhs2` on one host thread
pub fn contract_sequential<T: ContractBody>(mut lhs: TensorMut<'_, T>, rhs1: TensorRef<'_, T>, rhs2: TensorRef<'_, T>) {
    cpu::pin_single_thread();
    contract_host(&mut lhs, &rhs1, &rhs2, cpu::host_parallelism());
}

/// `lhs += rhs1 · rhs2` on the host thread pool
#[cfg(feature = "multicore")]
pub fn contract_multicore<T: ContractBody>(mut lhs: TensorMut<'_, T>, rhs1: TensorRef<'_, T>, rhs2: TensorRef<'_, T>) {
    cpu::propagate_thread_count(KernelConfig::global());
    contract_host(&mut lhs, &rhs1, &rhs2, cpu::host_parallelism());
}

/// `lhs += rhs1 · rhs2` on the current device; descriptors hold device pointers
#[cfg(feature = "rocm")]
pub fn contract_accelerator<T: ContractBody>(mut lhs: TensorMut<'_, T>, rhs1: TensorRef<'_, T>, rhs2: TensorRef<'_, T>) {
    use crate::backend::hip_backend::{current_device, with_device_handles};

    let device = current_device(KernelConfig::global());
    with_device_handles(device, |handles| {
        super::contract::hip::contract_device(handles, &mut lhs, &rhs1, &rhs2)
    });
}

/// Lower triangle of `lhs -= rhs · op(rhs)` on one host thread
pub fn syrk_sequential<T: SyrkBody>(mut lhs: TensorMut<'_, T>, rhs: TensorRef<'_, T>) {
    cpu::pin_single_thread();
    syrk_host(&mut lhs, &rhs, cpu::host_parallelism());
}

/// Lower triangle of `lhs -= rhs · op(rhs)` on the host thread pool
#[cfg(feature = "multicore")]
pub fn syrk_multicore<T: SyrkBody>(mut lhs: TensorMut<'_, T>, rhs: TensorRef<'_, T>) {
    cpu::propagate_thread_count(KernelConfig::global());
    syrk_host(&mut lhs, &rhs, cpu::host_parallelism());
}

/// Lower triangle of `lhs -= rhs · op(rhs)` on the current device
#[cfg(feature = "rocm")]
pub fn syrk_accelerator<T: SyrkBody>(mut lhs: TensorMut<'_, T>, rhs: TensorRef<'_, T>) {
    use crate::backend::hip_backend::{current_device, with_device_handles};

    let device = current_device(KernelConfig::global());
    with_device_handles(device, |handles| super::syrk::hip::syrk_device(handles, &mut lhs, &rhs));
}

/// Run the contraction on `backend`
pub fn contract<T: ContractBody>(
    backend: Backend,
    lhs: TensorMut<'_, T>,
    rhs1: TensorRef<'_, T>,
    rhs2: TensorRef<'_, T>,
) -> KernelResult<()> {
    match backend {
        Backend::Sequential => contract_sequential(lhs, rhs1, rhs2),
        #[cfg(feature = "multicore")]
        Backend::MultiCore => contract_multicore(lhs, rhs1, rhs2),
        #[cfg(feature = "rocm")]
        Backend::Accelerator => contract_accelerator(lhs, rhs1, rhs2),
        #[allow(unreachable_patterns)]
        unavailable => return Err(KernelError::BackendUnavailable(unavailable)),
    }
    Ok(())
}

/// Run the rank-k update on `backend`
pub fn syrk<T: SyrkBody>(backend: Backend, lhs: TensorMut<'_, T>, rhs: TensorRef<'_, T>) -> KernelResult<()> {
    match backend {
        Backend::Sequential => syrk_sequential(lhs, rhs),
        #[cfg(feature = "multicore")]
        Backend::MultiCore => syrk_multicore(lhs, rhs),
        #[cfg(feature = "rocm")]
        Backend::Accelerator => syrk_accelerator(lhs, rhs),
        #[allow(unreachable_patterns)]
        unavailable => return Err(KernelError::BackendUnavailable(unavailable)),
    }
    Ok(())
}

/// Type-erased tensor descriptor, as handed over by a task runtime
#[derive(Debug, Clone)]
pub struct RawTensor {
    pub ptr: *mut c_void,
    pub shape: Vec<i64>,
    pub strides: Vec<i64>,
    pub modes: Vec<i32>,
}

impl RawTensor {
    pub fn new(ptr: *mut c_void, shape: impl Into<Vec<i64>>, strides: impl Into<Vec<i64>>) -> Self {
        Self {
            ptr,
            shape: shape.into(),
            strides: strides.into(),
            modes: Vec::new(),
        }
    }

    pub fn with_modes(mut self, modes: impl Into<Vec<i32>>) -> Self {
        self.modes = modes.into();
        self
    }

    /// # Safety
    ///
    /// See [`TensorRef::from_raw_parts`]; the buffer must hold `T` elements.
    unsafe fn typed<T>(&self) -> TensorRef<'_, T> {
        let view = TensorRef::from_raw_parts(self.ptr.cast::<T>(), self.shape.clone(), self.strides.clone());
        if self.modes.is_empty() {
            view
        } else {
            view.with_modes(self.modes.clone())
        }
    }

    /// # Safety
    ///
    /// See [`TensorMut::from_raw_parts_mut`]; the buffer must hold `T` elements.
    unsafe fn typed_mut<T>(&self) -> TensorMut<'_, T> {
        let view = TensorMut::from_raw_parts_mut(self.ptr.cast::<T>(), self.shape.clone(), self.strides.clone());
        if self.modes.is_empty() {
            view
        } else {
            view.with_modes(self.modes.clone())
        }
    }
}

/// [`contract`] with the element type picked by `dtype`
///
/// # Safety
///
/// Every buffer must hold `dtype` elements addressable through its shape and
/// strides, in memory the chosen backend can reach, and `lhs` must not alias
/// the inputs.
pub unsafe fn contract_raw(
    backend: Backend,
    dtype: ElementType,
    lhs: &RawTensor,
    rhs1: &RawTensor,
    rhs2: &RawTensor,
) -> KernelResult<()> {
    type_dispatch!(dtype, T => contract::<T>(backend, lhs.typed_mut::<T>(), rhs1.typed::<T>(), rhs2.typed::<T>()))
}

/// [`syrk`] with the element type picked by `dtype`
///
/// # Safety
///
/// As for [`contract_raw`].
pub unsafe fn syrk_raw(backend: Backend, dtype: ElementType, lhs: &RawTensor, rhs: &RawTensor) -> KernelResult<()> {
    type_dispatch!(dtype, T => syrk::<T>(backend, lhs.typed_mut::<T>(), rhs.typed::<T>()))
}
