//! HIP code objects and kernel launch
//!
//! A [`HipModule`] owns one loaded HSACO; [`HipFunction`] is a kernel symbol
//! looked up in it. A missing code object or symbol is recoverable and comes
//! back as [`KernelError::KernelLoadFailed`]. Runtime failures while loading
//! or launching go through the fail-fast status checks.

use std::ffi::{c_void, CString};
use std::path::Path;
use std::ptr;

use super::ffi;
use super::status::check_hip;
use super::stream::HipStream;
use crate::error::{KernelError, KernelResult};
use crate::simt::LaunchConfig;

// SAFETY: a module handle may be used from any thread once loaded; unloading
// happens in Drop, which needs exclusive ownership.
unsafe impl Send for HipModule {}
unsafe impl Sync for HipModule {}

/// Loaded code object, unloaded on drop
#[derive(Debug)]
pub struct HipModule {
    module: ffi::hipModule_t,
}

impl HipModule {
    /// Load an HSACO file into the current device's context
    pub fn load_from_path(path: &Path) -> KernelResult<Self> {
        if !path.exists() {
            return Err(KernelError::KernelLoadFailed(format!(
                "code object not found at {}",
                path.display()
            )));
        }
        let path_cstr = CString::new(path.to_string_lossy().as_bytes())
            .map_err(|e| KernelError::KernelLoadFailed(format!("invalid path string: {}", e)))?;

        let mut module: ffi::hipModule_t = ptr::null_mut();
        check_hip(unsafe { ffi::hipModuleLoad(&mut module, path_cstr.as_ptr()) });
        tracing::debug!(path = %path.display(), "loaded HIP module");
        Ok(HipModule { module })
    }

    /// Look up a kernel by its unmangled name
    pub fn function(&self, name: &str) -> KernelResult<HipFunction> {
        let name_cstr = CString::new(name)
            .map_err(|e| KernelError::KernelLoadFailed(format!("invalid kernel name: {}", e)))?;

        let mut func: ffi::hipFunction_t = ptr::null_mut();
        let status = unsafe { ffi::hipModuleGetFunction(&mut func, self.module, name_cstr.as_ptr()) };
        if status != 0 {
            return Err(KernelError::KernelLoadFailed(format!(
                "kernel '{}' not found in module (status {})",
                name, status
            )));
        }
        Ok(HipFunction {
            func,
            name: name.to_string(),
        })
    }
}

impl Drop for HipModule {
    fn drop(&mut self) {
        if !self.module.is_null() {
            unsafe {
                ffi::hipModuleUnload(self.module);
            }
        }
    }
}

/// Kernel symbol inside a [`HipModule`]; valid while the module is loaded
#[derive(Debug)]
pub struct HipFunction {
    func: ffi::hipFunction_t,
    name: String,
}

impl HipFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue the kernel on `stream` with a one-dimensional launch shape.
    ///
    /// Every entry of `args` must point at a local holding the argument
    /// value, in the kernel's parameter order.
    ///
    /// # Safety
    ///
    /// `args` must match the kernel signature, and every device pointer
    /// passed through it must stay valid until the stream has drained.
    pub unsafe fn launch(&self, config: LaunchConfig, stream: &HipStream, args: &mut [*mut c_void]) {
        tracing::trace!(
            kernel = %self.name,
            grid_dim = config.grid_dim,
            block_dim = config.block_dim,
            "hipModuleLaunchKernel"
        );
        check_hip(ffi::hipModuleLaunchKernel(
            self.func,
            config.grid_dim as u32,
            1,
            1,
            config.block_dim as u32,
            1,
            1,
            0,
            stream.as_ptr(),
            args.as_mut_ptr(),
            ptr::null_mut(),
        ));
    }
}
