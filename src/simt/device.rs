//! Device launches of the block reductions
//!
//! The kernels live in `kernels/reduce.hip`; build.rs compiles them into one
//! code object and records its path in `REDUCE_HSACO`. Setting
//! `REDUCE_HSACO` at run time points at a different code object. Modules
//! are loaded once per device and kept until [`unload_modules`].

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::PathBuf;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use super::reduce::{DeferredBool, DeferredReduction, ReductionOp};
use super::LaunchConfig;
use crate::backend::hip_backend::{current_device, with_device_handles, DeviceBuffer, HipFunction, HipModule};
use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};

const REDUCE_HSACO_ENV: &str = "REDUCE_HSACO";
const ALL_TRUE_KERNEL: &str = "all_true_kernel";

static MODULES: Lazy<Mutex<HashMap<i32, HipModule>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn code_object_path() -> KernelResult<PathBuf> {
    std::env::var(REDUCE_HSACO_ENV)
        .ok()
        .or_else(|| option_env!("REDUCE_HSACO").map(String::from))
        .map(PathBuf::from)
        .ok_or_else(|| {
            KernelError::KernelLoadFailed("REDUCE_HSACO not set at compile time; is hipcc installed?".to_string())
        })
}

/// Look up `name` in the reduction module for `device`, loading it on first use
fn with_function<R>(device: i32, name: &str, f: impl FnOnce(&HipFunction) -> R) -> KernelResult<R> {
    let mut modules = MODULES.lock().unwrap_or_else(|e| e.into_inner());
    if !modules.contains_key(&device) {
        let module = HipModule::load_from_path(&code_object_path()?)?;
        modules.insert(device, module);
    }
    let module = modules
        .get(&device)
        .ok_or_else(|| KernelError::KernelLoadFailed(format!("no module for device {}", device)))?;
    let function = module.function(name)?;
    Ok(f(&function))
}

/// Fold every element of `data` into `result` on the current device
pub fn reduce_slice_device<Op: ReductionOp>(data: &[Op::Value], result: &DeferredReduction<Op>) -> KernelResult<()> {
    let name = Op::DEVICE_KERNEL.ok_or(KernelError::NoDeviceKernel(std::any::type_name::<Op>()))?;
    let config = KernelConfig::global();
    let device = current_device(config);
    let launch = LaunchConfig::for_elements(data.len(), config)?;
    tracing::debug!(device, kernel = name, elements = data.len(), grid_dim = launch.grid_dim, "device reduce_slice");

    let input = DeviceBuffer::from_host(data);
    let mut total = DeviceBuffer::from_host(&[Op::identity()]);
    with_device_handles(device, |handles| {
        with_function(device, name, |function| {
            let mut data_arg = input.as_ptr();
            let mut len_arg = data.len();
            let mut result_arg = total.as_mut_ptr();
            let mut args: [*mut c_void; 3] = [
                &mut data_arg as *mut _ as *mut c_void,
                &mut len_arg as *mut _ as *mut c_void,
                &mut result_arg as *mut _ as *mut c_void,
            ];
            // SAFETY: argument order matches REDUCE_KERNEL; buffers outlive the sync below
            unsafe { function.launch(launch, handles.stream(), &mut args) };
            handles.stream().synchronize();
        })
    })?;

    result.fold(total.to_host()[0]);
    Ok(())
}

/// Clear `result` if any flag is false, on the current device
pub fn all_true_device(flags: &[bool], result: &DeferredBool) -> KernelResult<()> {
    let config = KernelConfig::global();
    let device = current_device(config);
    let launch = LaunchConfig::for_elements(flags.len(), config)?;
    tracing::debug!(device, elements = flags.len(), grid_dim = launch.grid_dim, "device all_true");

    let bytes: Vec<u8> = flags.iter().map(|&f| u8::from(f)).collect();
    let input = DeviceBuffer::from_host(&bytes);
    let mut verdict = DeviceBuffer::from_host(&[1i32]);
    with_device_handles(device, |handles| {
        with_function(device, ALL_TRUE_KERNEL, |function| {
            let mut flags_arg = input.as_ptr();
            let mut len_arg = flags.len();
            let mut result_arg = verdict.as_mut_ptr();
            let mut args: [*mut c_void; 3] = [
                &mut flags_arg as *mut _ as *mut c_void,
                &mut len_arg as *mut _ as *mut c_void,
                &mut result_arg as *mut _ as *mut c_void,
            ];
            // SAFETY: argument order matches all_true_kernel; buffers outlive the sync below
            unsafe { function.launch(launch, handles.stream(), &mut args) };
            handles.stream().synchronize();
        })
    })?;

    if verdict.to_host()[0] == 0 {
        result.set_false();
    }
    Ok(())
}

/// Unload every cached reduction module. Call before [`crate::backend::hip_backend::shutdown_handles`].
pub fn unload_modules() {
    let mut modules = MODULES.lock().unwrap_or_else(|e| e.into_inner());
    let count = modules.len();
    modules.clear();
    tracing::debug!(devices = count, "reduction modules unloaded");
}
