//! HIP stream wrapper

use std::ptr;

use super::ffi;
use super::status::check_hip;

// SAFETY: HipStream is Send+Sync because it only contains a raw pointer;
// work submitted to one stream is serialized by the runtime.
// NOTE: HipStream does NOT implement Clone: two owners would destroy the
// same stream twice.
unsafe impl Send for HipStream {}
unsafe impl Sync for HipStream {}

/// Owned HIP stream
#[derive(Debug)]
pub struct HipStream {
    stream: ffi::hipStream_t,
}

impl HipStream {
    pub fn new() -> Self {
        let mut stream: ffi::hipStream_t = ptr::null_mut();
        check_hip(unsafe { ffi::hipStreamCreate(&mut stream) });
        tracing::debug!(?stream, "created HIP stream");
        HipStream { stream }
    }

    /// Block until all work queued on the stream has finished
    pub fn synchronize(&self) {
        check_hip(unsafe { ffi::hipStreamSynchronize(self.stream) });
    }

    /// Raw stream pointer for library calls (hipblasSetStream, ...)
    pub fn as_ptr(&self) -> ffi::hipStream_t {
        self.stream
    }
}

impl Drop for HipStream {
    fn drop(&mut self) {
        if !self.stream.is_null() {
            unsafe {
                ffi::hipStreamDestroy(self.stream);
            }
        }
    }
}
