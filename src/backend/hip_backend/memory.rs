//! Device memory
//!
//! Kernels never allocate caller data. [`DeviceBuffer`] exists for the scratch
//! space a library call asks for (hipTensor workspace) and for staging data in
//! tests and benchmarks.

use std::marker::PhantomData;
use std::ptr;

use bytemuck::Pod;

use super::ffi;
use super::status::check_hip;

/// Typed device allocation, freed on drop
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<T>,
}

// SAFETY: the buffer owns its allocation exclusively
unsafe impl<T: Send> Send for DeviceBuffer<T> {}
unsafe impl<T: Sync> Sync for DeviceBuffer<T> {}

impl<T: Pod> DeviceBuffer<T> {
    /// Allocate room for `len` elements; contents are undefined
    pub fn new(len: usize) -> Self {
        let bytes = len * std::mem::size_of::<T>();
        let mut raw: *mut std::ffi::c_void = ptr::null_mut();
        if bytes > 0 {
            check_hip(unsafe { ffi::hipMalloc(&mut raw, bytes) });
        }
        tracing::trace!(bytes, ptr = ?raw, "device allocation");
        DeviceBuffer {
            ptr: raw.cast(),
            len,
            _marker: PhantomData,
        }
    }

    pub fn from_host(data: &[T]) -> Self {
        let mut buffer = Self::new(data.len());
        buffer.copy_from_host(data);
        buffer
    }

    pub fn copy_from_host(&mut self, data: &[T]) {
        debug_assert_eq!(data.len(), self.len);
        if self.len == 0 {
            return;
        }
        check_hip(unsafe {
            ffi::hipMemcpy(
                self.ptr.cast(),
                data.as_ptr().cast(),
                self.size_in_bytes(),
                ffi::HIP_MEMCPY_HOST_TO_DEVICE,
            )
        });
    }

    pub fn copy_to_host(&self, out: &mut [T]) {
        debug_assert_eq!(out.len(), self.len);
        if self.len == 0 {
            return;
        }
        check_hip(unsafe {
            ffi::hipMemcpy(
                out.as_mut_ptr().cast(),
                self.ptr.cast(),
                self.size_in_bytes(),
                ffi::HIP_MEMCPY_DEVICE_TO_HOST,
            )
        });
    }

    pub fn to_host(&self) -> Vec<T> {
        let mut out = vec![T::zeroed(); self.len];
        self.copy_to_host(&mut out);
        out
    }
}

impl<T> DeviceBuffer<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size_in_bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }
}

impl<T> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                ffi::hipFree(self.ptr.cast());
            }
        }
    }
}
