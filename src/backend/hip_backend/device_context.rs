//! Per-thread HIP device tracking
//!
//! **CRITICAL:** the HIP device is PER-THREAD state.
//! - hipSetDevice() only affects the calling thread
//! - hipGetDevice() returns the current device for the calling thread
//!
//! The device id is cached in a thread-local so repeated kernel entries do not
//! query the runtime.

use std::cell::Cell;
use std::thread_local;

use super::ffi;
use super::status::check_hip;
use crate::config::KernelConfig;

thread_local! {
    static THREAD_DEVICE_ID: Cell<i32> = const { Cell::new(-1) };
}

/// Current HIP device of this thread, queried once and then cached
pub fn get_thread_device() -> i32 {
    THREAD_DEVICE_ID.with(|cell| {
        let cached = cell.get();
        if cached >= 0 {
            return cached;
        }
        let mut device: i32 = -1;
        check_hip(unsafe { ffi::hipGetDevice(&mut device) });
        cell.set(device);
        device
    })
}

/// Make `expected_device` current for this thread
pub fn ensure_device(expected_device: i32) {
    let current = get_thread_device();
    if current != expected_device {
        tracing::debug!(current, expected_device, "switching HIP device");
        check_hip(unsafe { ffi::hipSetDevice(expected_device) });
        THREAD_DEVICE_ID.with(|cell| cell.set(expected_device));
    }
}

/// Device accelerator work from this thread should target.
///
/// `KernelConfig::device` wins over the thread's current device and is made
/// current before returning.
pub fn current_device(config: &KernelConfig) -> i32 {
    match config.device {
        Some(device) => {
            ensure_device(device);
            device
        }
        None => get_thread_device(),
    }
}

/// Number of visible HIP devices; 0 when the runtime reports none
pub fn device_count() -> i32 {
    let mut count = 0;
    // No device is a normal answer here, not a fatal one
    let status = unsafe { ffi::hipGetDeviceCount(&mut count) };
    if status != 0 {
        return 0;
    }
    count
}
