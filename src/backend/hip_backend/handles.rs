//! Per-device library handles
//!
//! Each device gets one stream and, on first request, one hipBLAS, hipSOLVER,
//! hipFFT and hipTensor handle bound to that stream. Handles live until
//! [`shutdown_handles`] tears the registry down; the process-wide registry is
//! a static and is not dropped at exit on its own.
//!
//! Accelerator work for a device is serialized by whoever drives this crate.
//! The registry still sits behind a `Mutex` because a `static` has to be
//! `Sync`; under that serialization the lock is never contended.

use std::collections::HashMap;
use std::ptr;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use super::device_context::ensure_device;
use super::ffi;
use super::status::{check_hipblas, check_hipfft, check_hipsolver, check_hiptensor};
use super::stream::HipStream;

static REGISTRY: Lazy<Mutex<HandleRegistry>> = Lazy::new(|| Mutex::new(HandleRegistry::new()));

/// Stream and library handles for one device
#[derive(Debug)]
pub struct DeviceHandles {
    device: i32,
    hipblas: ffi::hipblasHandle_t,
    hipsolver: ffi::hipsolverHandle_t,
    hipfft: ffi::hipfftHandle,
    hiptensor: ffi::hiptensorHandle_t,
    // Declared last: dropped after the library handles that were bound to it
    stream: HipStream,
}

// SAFETY: handles are only used by the thread currently holding the registry
// lock, and the ROCm libraries allow a handle to move between threads.
unsafe impl Send for DeviceHandles {}

impl DeviceHandles {
    fn new(device: i32) -> Self {
        ensure_device(device);
        let stream = HipStream::new();
        tracing::debug!(device, "created device stream");
        DeviceHandles {
            device,
            hipblas: ptr::null_mut(),
            hipsolver: ptr::null_mut(),
            hipfft: ptr::null_mut(),
            hiptensor: ptr::null_mut(),
            stream,
        }
    }

    pub fn device(&self) -> i32 {
        self.device
    }

    pub fn stream(&self) -> &HipStream {
        &self.stream
    }

    pub fn hipblas(&mut self) -> ffi::hipblasHandle_t {
        if self.hipblas.is_null() {
            let mut handle = ptr::null_mut();
            check_hipblas(unsafe { ffi::hipblasCreate(&mut handle) });
            check_hipblas(unsafe { ffi::hipblasSetStream(handle, self.stream.as_ptr()) });
            tracing::debug!(device = self.device, "created hipBLAS handle");
            self.hipblas = handle;
        }
        self.hipblas
    }

    pub fn hipsolver(&mut self) -> ffi::hipsolverHandle_t {
        if self.hipsolver.is_null() {
            let mut handle = ptr::null_mut();
            check_hipsolver(unsafe { ffi::hipsolverCreate(&mut handle) });
            check_hipsolver(unsafe { ffi::hipsolverSetStream(handle, self.stream.as_ptr()) });
            tracing::debug!(device = self.device, "created hipSOLVER handle");
            self.hipsolver = handle;
        }
        self.hipsolver
    }

    pub fn hipfft(&mut self) -> ffi::hipfftHandle {
        if self.hipfft.is_null() {
            let mut handle = ptr::null_mut();
            check_hipfft(unsafe { ffi::hipfftCreate(&mut handle) });
            check_hipfft(unsafe { ffi::hipfftSetStream(handle, self.stream.as_ptr()) });
            tracing::debug!(device = self.device, "created hipFFT handle");
            self.hipfft = handle;
        }
        self.hipfft
    }

    /// hipTensor takes the stream per call, so the handle is not bound to one
    pub fn hiptensor(&mut self) -> ffi::hiptensorHandle_t {
        if self.hiptensor.is_null() {
            let mut handle = ptr::null_mut();
            check_hiptensor(unsafe { ffi::hiptensorCreate(&mut handle) });
            tracing::debug!(device = self.device, "created hipTensor handle");
            self.hiptensor = handle;
        }
        self.hiptensor
    }
}

impl Drop for DeviceHandles {
    fn drop(&mut self) {
        tracing::debug!(device = self.device, "destroying device handles");
        unsafe {
            if !self.hipblas.is_null() {
                ffi::hipblasDestroy(self.hipblas);
            }
            if !self.hipsolver.is_null() {
                ffi::hipsolverDestroy(self.hipsolver);
            }
            if !self.hipfft.is_null() {
                ffi::hipfftDestroy(self.hipfft);
            }
            if !self.hiptensor.is_null() {
                ffi::hiptensorDestroy(self.hiptensor);
            }
        }
    }
}

/// Device id → handles
#[derive(Debug, Default)]
pub struct HandleRegistry {
    devices: HashMap<i32, DeviceHandles>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles for `device`, created on first use
    pub fn get_or_create(&mut self, device: i32) -> &mut DeviceHandles {
        self.devices
            .entry(device)
            .or_insert_with(|| DeviceHandles::new(device))
    }

    pub fn contains(&self, device: i32) -> bool {
        self.devices.contains_key(&device)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Destroy every cached handle and stream
    pub fn teardown(&mut self) {
        for (device, handles) in self.devices.drain() {
            ensure_device(device);
            handles.stream().synchronize();
            drop(handles);
        }
    }
}

/// Run `f` with the process-wide handles for `device`
pub fn with_device_handles<R>(device: i32, f: impl FnOnce(&mut DeviceHandles) -> R) -> R {
    let mut registry = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    f(registry.get_or_create(device))
}

/// Tear down the process-wide registry. Call once at shutdown.
pub fn shutdown_handles() {
    let mut registry = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    let count = registry.len();
    registry.teardown();
    tracing::debug!(devices = count, "device handles torn down");
}
