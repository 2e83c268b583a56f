//! ROCm FFI bindings
//!
//! Only the entry points the kernels and the handle registry call are
//! declared. Every function returns its library's status code; callers
//! route it through the `check_*` wrappers in [`super::status`].

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_void, CStr};

pub type hipStream_t = *mut c_void;
pub type hipModule_t = *mut c_void;
pub type hipFunction_t = *mut c_void;
pub type hipblasHandle_t = *mut c_void;
pub type hipsolverHandle_t = *mut c_void;
pub type hipfftHandle = *mut c_void;
pub type hiptensorHandle_t = *mut c_void;
pub type hiptensorTensorDescriptor_t = *mut c_void;
pub type hiptensorOperationDescriptor_t = *mut c_void;
pub type hiptensorPlanPreference_t = *mut c_void;
pub type hiptensorPlan_t = *mut c_void;

/// hipblasComplex: interleaved (re, im) f32 pair
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct hipblasComplex {
    pub x: f32,
    pub y: f32,
}

/// hipblasDoubleComplex: interleaved (re, im) f64 pair
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct hipblasDoubleComplex {
    pub x: f64,
    pub y: f64,
}

#[link(name = "amdhip64")]
extern "C" {
    pub fn hipGetDevice(device: *mut i32) -> i32;
    pub fn hipSetDevice(device: i32) -> i32;
    pub fn hipGetDeviceCount(count: *mut i32) -> i32;
    pub fn hipMalloc(ptr: *mut *mut c_void, size: usize) -> i32;
    pub fn hipFree(ptr: *mut c_void) -> i32;
    pub fn hipMemcpy(dst: *mut c_void, src: *const c_void, count: usize, kind: i32) -> i32;
    pub fn hipStreamCreate(stream: *mut hipStream_t) -> i32;
    pub fn hipStreamDestroy(stream: hipStream_t) -> i32;
    pub fn hipStreamSynchronize(stream: hipStream_t) -> i32;
    pub fn hipGetErrorName(error: i32) -> *const c_char;
    pub fn hipModuleLoad(module: *mut hipModule_t, path: *const c_char) -> i32;
    pub fn hipModuleUnload(module: hipModule_t) -> i32;
    pub fn hipModuleGetFunction(func: *mut hipFunction_t, module: hipModule_t, name: *const c_char) -> i32;
    pub fn hipModuleLaunchKernel(
        func: hipFunction_t,
        grid_dim_x: u32,
        grid_dim_y: u32,
        grid_dim_z: u32,
        block_dim_x: u32,
        block_dim_y: u32,
        block_dim_z: u32,
        shared_mem_bytes: u32,
        stream: hipStream_t,
        kernel_params: *mut *mut c_void,
        extra: *mut *mut c_void,
    ) -> i32;
}

#[link(name = "hipblas")]
extern "C" {
    pub fn hipblasCreate(handle: *mut hipblasHandle_t) -> i32;
    pub fn hipblasDestroy(handle: hipblasHandle_t) -> i32;
    pub fn hipblasSetStream(handle: hipblasHandle_t, stream: hipStream_t) -> i32;
    pub fn hipblasSsyrk(
        handle: hipblasHandle_t,
        uplo: i32,
        trans: i32,
        n: i32,
        k: i32,
        alpha: *const f32,
        a: *const f32,
        lda: i32,
        beta: *const f32,
        c: *mut f32,
        ldc: i32,
    ) -> i32;
    pub fn hipblasDsyrk(
        handle: hipblasHandle_t,
        uplo: i32,
        trans: i32,
        n: i32,
        k: i32,
        alpha: *const f64,
        a: *const f64,
        lda: i32,
        beta: *const f64,
        c: *mut f64,
        ldc: i32,
    ) -> i32;
    pub fn hipblasCherk(
        handle: hipblasHandle_t,
        uplo: i32,
        trans: i32,
        n: i32,
        k: i32,
        alpha: *const f32,
        a: *const hipblasComplex,
        lda: i32,
        beta: *const f32,
        c: *mut hipblasComplex,
        ldc: i32,
    ) -> i32;
    pub fn hipblasZherk(
        handle: hipblasHandle_t,
        uplo: i32,
        trans: i32,
        n: i32,
        k: i32,
        alpha: *const f64,
        a: *const hipblasDoubleComplex,
        lda: i32,
        beta: *const f64,
        c: *mut hipblasDoubleComplex,
        ldc: i32,
    ) -> i32;
}

#[link(name = "hipsolver")]
extern "C" {
    pub fn hipsolverCreate(handle: *mut hipsolverHandle_t) -> i32;
    pub fn hipsolverDestroy(handle: hipsolverHandle_t) -> i32;
    pub fn hipsolverSetStream(handle: hipsolverHandle_t, stream: hipStream_t) -> i32;
}

#[link(name = "hipfft")]
extern "C" {
    pub fn hipfftCreate(plan: *mut hipfftHandle) -> i32;
    pub fn hipfftDestroy(plan: hipfftHandle) -> i32;
    pub fn hipfftSetStream(plan: hipfftHandle, stream: hipStream_t) -> i32;
}

#[link(name = "hiptensor")]
extern "C" {
    pub fn hiptensorCreate(handle: *mut hiptensorHandle_t) -> i32;
    pub fn hiptensorDestroy(handle: hiptensorHandle_t) -> i32;
    pub fn hiptensorGetErrorString(error: i32) -> *const c_char;
    pub fn hiptensorCreateTensorDescriptor(
        handle: hiptensorHandle_t,
        desc: *mut hiptensorTensorDescriptor_t,
        num_modes: u32,
        extent: *const i64,
        stride: *const i64,
        data_type: i32,
        alignment_requirement: u32,
    ) -> i32;
    pub fn hiptensorDestroyTensorDescriptor(desc: hiptensorTensorDescriptor_t) -> i32;
    pub fn hiptensorCreateContraction(
        handle: hiptensorHandle_t,
        desc: *mut hiptensorOperationDescriptor_t,
        desc_a: hiptensorTensorDescriptor_t,
        mode_a: *const i32,
        op_a: i32,
        desc_b: hiptensorTensorDescriptor_t,
        mode_b: *const i32,
        op_b: i32,
        desc_c: hiptensorTensorDescriptor_t,
        mode_c: *const i32,
        op_c: i32,
        desc_d: hiptensorTensorDescriptor_t,
        mode_d: *const i32,
        compute_desc: u32,
    ) -> i32;
    pub fn hiptensorDestroyOperationDescriptor(desc: hiptensorOperationDescriptor_t) -> i32;
    pub fn hiptensorCreatePlanPreference(
        handle: hiptensorHandle_t,
        pref: *mut hiptensorPlanPreference_t,
        algo: i32,
        jit_mode: i32,
    ) -> i32;
    pub fn hiptensorDestroyPlanPreference(pref: hiptensorPlanPreference_t) -> i32;
    pub fn hiptensorEstimateWorkspaceSize(
        handle: hiptensorHandle_t,
        desc: hiptensorOperationDescriptor_t,
        pref: hiptensorPlanPreference_t,
        workspace_pref: i32,
        workspace_size: *mut u64,
    ) -> i32;
    pub fn hiptensorCreatePlan(
        handle: hiptensorHandle_t,
        plan: *mut hiptensorPlan_t,
        desc: hiptensorOperationDescriptor_t,
        pref: hiptensorPlanPreference_t,
        workspace_size_limit: u64,
    ) -> i32;
    pub fn hiptensorDestroyPlan(plan: hiptensorPlan_t) -> i32;
    pub fn hiptensorContract(
        handle: hiptensorHandle_t,
        plan: hiptensorPlan_t,
        alpha: *const c_void,
        a: *const c_void,
        b: *const c_void,
        beta: *const c_void,
        c: *const c_void,
        d: *mut c_void,
        workspace: *mut c_void,
        workspace_size: u64,
        stream: hipStream_t,
    ) -> i32;
}

pub const HIP_MEMCPY_HOST_TO_DEVICE: i32 = 1;
pub const HIP_MEMCPY_DEVICE_TO_HOST: i32 = 2;

pub const HIPBLAS_OP_N: i32 = 111;
pub const HIPBLAS_FILL_MODE_LOWER: i32 = 122;

/// hipDataType
pub const HIP_R_32F: i32 = 0;
pub const HIP_R_64F: i32 = 1;
pub const HIP_C_32F: i32 = 4;
pub const HIP_C_64F: i32 = 5;

pub const HIPTENSOR_OP_IDENTITY: i32 = 1;
pub const HIPTENSOR_ALGO_DEFAULT: i32 = -1;
pub const HIPTENSOR_JIT_MODE_NONE: i32 = 0;
pub const HIPTENSOR_WORKSPACE_DEFAULT: i32 = 2;

pub const HIPTENSOR_COMPUTE_DESC_32F: u32 = 1 << 2;
pub const HIPTENSOR_COMPUTE_DESC_64F: u32 = 1 << 4;
pub const HIPTENSOR_COMPUTE_DESC_C32F: u32 = 1 << 11;
pub const HIPTENSOR_COMPUTE_DESC_C64F: u32 = 1 << 12;

/// Alignment promised to hipTensor for caller buffers, in bytes
pub const HIPTENSOR_ALIGNMENT: u32 = 16;

fn owned_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: the runtime returns static, NUL-terminated strings
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Symbolic name the HIP runtime gives `code`
pub fn hip_error_name(code: i32) -> Option<String> {
    owned_c_str(unsafe { hipGetErrorName(code) })
}

/// Name hipTensor gives `code`
pub fn hiptensor_error_name(code: i32) -> Option<String> {
    owned_c_str(unsafe { hiptensorGetErrorString(code) })
}
