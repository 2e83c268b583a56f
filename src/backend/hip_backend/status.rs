//! Fail-fast status checks for the ROCm libraries
//!
//! Every call into HIP, hipBLAS, hipSOLVER, hipFFT or hipTensor goes through
//! one of the `check_*` wrappers. A non-success status means the device,
//! driver or library is in a state nothing above this layer can repair, so
//! the wrapper prints a diagnostic naming the library, the status and the
//! call site, and exits the process with the status code.
//!
//! This channel is deliberately separate from [`crate::error::KernelError`]:
//! a [`FatalBackendError`] is never returned to a caller.

use std::panic::Location;

use thiserror::Error;

/// A status code returned by one of the ROCm libraries
pub trait VendorStatus: Copy {
    /// Library name used in diagnostics
    const LIBRARY: &'static str;

    fn code(&self) -> i32;

    fn is_success(&self) -> bool {
        self.code() == 0
    }

    /// Symbolic name of the status, when known
    fn name(&self) -> Option<String>;
}

macro_rules! vendor_status {
    ($(#[$doc:meta])* $ty:ident, $library:literal, $table:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $ty(pub i32);

        impl VendorStatus for $ty {
            const LIBRARY: &'static str = $library;

            fn code(&self) -> i32 {
                self.0
            }

            fn name(&self) -> Option<String> {
                $table(self.0).map(str::to_owned)
            }
        }
    };
}

vendor_status!(
    /// hipblasStatus_t
    HipblasStatus, "hipBLAS", hipblas_status_name
);
vendor_status!(
    /// hipsolverStatus_t
    HipsolverStatus, "hipSOLVER", hipsolver_status_name
);
vendor_status!(
    /// hipfftResult
    HipfftStatus, "hipFFT", hipfft_status_name
);

/// hipError_t
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HipStatus(pub i32);

impl VendorStatus for HipStatus {
    const LIBRARY: &'static str = "HIP";

    fn code(&self) -> i32 {
        self.0
    }

    fn name(&self) -> Option<String> {
        #[cfg(feature = "rocm")]
        if let Some(name) = super::ffi::hip_error_name(self.0) {
            return Some(name);
        }
        hip_status_name(self.0).map(str::to_owned)
    }
}

/// hiptensorStatus_t
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HiptensorStatus(pub i32);

impl VendorStatus for HiptensorStatus {
    const LIBRARY: &'static str = "hipTensor";

    fn code(&self) -> i32 {
        self.0
    }

    fn name(&self) -> Option<String> {
        #[cfg(feature = "rocm")]
        if let Some(name) = super::ffi::hiptensor_error_name(self.0) {
            return Some(name);
        }
        hiptensor_status_name(self.0).map(str::to_owned)
    }
}

fn hip_status_name(code: i32) -> Option<&'static str> {
    Some(match code {
        0 => "hipSuccess",
        1 => "hipErrorInvalidValue",
        2 => "hipErrorOutOfMemory",
        3 => "hipErrorNotInitialized",
        4 => "hipErrorDeinitialized",
        100 => "hipErrorNoDevice",
        101 => "hipErrorInvalidDevice",
        400 => "hipErrorInvalidHandle",
        500 => "hipErrorNotFound",
        600 => "hipErrorNotReady",
        700 => "hipErrorIllegalAddress",
        719 => "hipErrorLaunchFailure",
        _ => return None,
    })
}

fn hipblas_status_name(code: i32) -> Option<&'static str> {
    Some(match code {
        0 => "HIPBLAS_STATUS_SUCCESS",
        1 => "HIPBLAS_STATUS_NOT_INITIALIZED",
        2 => "HIPBLAS_STATUS_ALLOC_FAILED",
        3 => "HIPBLAS_STATUS_INVALID_VALUE",
        4 => "HIPBLAS_STATUS_MAPPING_ERROR",
        5 => "HIPBLAS_STATUS_EXECUTION_FAILED",
        6 => "HIPBLAS_STATUS_INTERNAL_ERROR",
        7 => "HIPBLAS_STATUS_NOT_SUPPORTED",
        8 => "HIPBLAS_STATUS_ARCH_MISMATCH",
        9 => "HIPBLAS_STATUS_HANDLE_IS_NULLPTR",
        10 => "HIPBLAS_STATUS_INVALID_ENUM",
        11 => "HIPBLAS_STATUS_UNKNOWN",
        _ => return None,
    })
}

fn hipsolver_status_name(code: i32) -> Option<&'static str> {
    Some(match code {
        0 => "HIPSOLVER_STATUS_SUCCESS",
        1 => "HIPSOLVER_STATUS_NOT_INITIALIZED",
        2 => "HIPSOLVER_STATUS_ALLOC_FAILED",
        3 => "HIPSOLVER_STATUS_INVALID_VALUE",
        4 => "HIPSOLVER_STATUS_MAPPING_ERROR",
        5 => "HIPSOLVER_STATUS_EXECUTION_FAILED",
        6 => "HIPSOLVER_STATUS_INTERNAL_ERROR",
        7 => "HIPSOLVER_STATUS_NOT_SUPPORTED",
        8 => "HIPSOLVER_STATUS_ARCH_MISMATCH",
        9 => "HIPSOLVER_STATUS_HANDLE_IS_NULLPTR",
        10 => "HIPSOLVER_STATUS_INVALID_ENUM",
        11 => "HIPSOLVER_STATUS_UNKNOWN",
        12 => "HIPSOLVER_STATUS_ZERO_PIVOT",
        _ => return None,
    })
}

fn hipfft_status_name(code: i32) -> Option<&'static str> {
    Some(match code {
        0 => "HIPFFT_SUCCESS",
        1 => "HIPFFT_INVALID_PLAN",
        2 => "HIPFFT_ALLOC_FAILED",
        3 => "HIPFFT_INVALID_TYPE",
        4 => "HIPFFT_INVALID_VALUE",
        5 => "HIPFFT_INTERNAL_ERROR",
        6 => "HIPFFT_EXEC_FAILED",
        7 => "HIPFFT_SETUP_FAILED",
        8 => "HIPFFT_INVALID_SIZE",
        9 => "HIPFFT_UNALIGNED_DATA",
        10 => "HIPFFT_INCOMPLETE_PARAMETER_LIST",
        11 => "HIPFFT_INVALID_DEVICE",
        12 => "HIPFFT_PARSE_ERROR",
        13 => "HIPFFT_NO_WORKSPACE",
        14 => "HIPFFT_NOT_IMPLEMENTED",
        16 => "HIPFFT_NOT_SUPPORTED",
        _ => return None,
    })
}

fn hiptensor_status_name(code: i32) -> Option<&'static str> {
    Some(match code {
        0 => "HIPTENSOR_STATUS_SUCCESS",
        1 => "HIPTENSOR_STATUS_NOT_INITIALIZED",
        3 => "HIPTENSOR_STATUS_ALLOC_FAILED",
        7 => "HIPTENSOR_STATUS_INVALID_VALUE",
        8 => "HIPTENSOR_STATUS_ARCH_MISMATCH",
        13 => "HIPTENSOR_STATUS_EXECUTION_FAILED",
        14 => "HIPTENSOR_STATUS_INTERNAL_ERROR",
        15 => "HIPTENSOR_STATUS_NOT_SUPPORTED",
        17 => "HIPTENSOR_STATUS_CK_ERROR",
        18 => "HIPTENSOR_STATUS_HIP_ERROR",
        19 => "HIPTENSOR_STATUS_INSUFFICIENT_WORKSPACE",
        20 => "HIPTENSOR_STATUS_INSUFFICIENT_DRIVER",
        21 => "HIPTENSOR_STATUS_IO_ERROR",
        _ => return None,
    })
}

/// Diagnostic for a failed library call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Internal {library} failure with error code {code}{} in file {file} at line {line}",
    .name.as_ref().map(|n| format!(" ({n})")).unwrap_or_default()
)]
pub struct FatalBackendError {
    pub library: &'static str,
    pub code: i32,
    pub name: Option<String>,
    pub file: &'static str,
    pub line: u32,
}

impl FatalBackendError {
    pub fn new<S: VendorStatus>(status: S, location: &'static Location<'static>) -> Self {
        Self {
            library: S::LIBRARY,
            code: status.code(),
            name: status.name(),
            file: location.file(),
            line: location.line(),
        }
    }

    /// Process exit status for this failure. A code whose low byte is zero
    /// would read as success to the parent, so it maps to 1.
    pub fn exit_code(&self) -> i32 {
        if self.code & 0xff == 0 {
            1
        } else {
            self.code
        }
    }
}

/// Describe `status` if it is a failure, attributed to the caller
#[track_caller]
pub fn diagnose<S: VendorStatus>(status: S) -> Option<FatalBackendError> {
    if status.is_success() {
        None
    } else {
        Some(FatalBackendError::new(status, Location::caller()))
    }
}

/// Return if `status` is success; otherwise report and exit
#[track_caller]
pub fn check<S: VendorStatus>(status: S) {
    if let Some(failure) = diagnose(status) {
        terminate(&failure);
    }
}

fn terminate(failure: &FatalBackendError) -> ! {
    tracing::error!(
        library = failure.library,
        code = failure.code,
        file = failure.file,
        line = failure.line,
        "fatal backend failure"
    );
    eprintln!("{failure}");
    std::process::exit(failure.exit_code())
}

#[track_caller]
pub fn check_hip(status: i32) {
    check(HipStatus(status))
}

#[track_caller]
pub fn check_hipblas(status: i32) {
    check(HipblasStatus(status))
}

#[track_caller]
pub fn check_hipsolver(status: i32) {
    check(HipsolverStatus(status))
}

#[track_caller]
pub fn check_hipfft(status: i32) {
    check(HipfftStatus(status))
}

#[track_caller]
pub fn check_hiptensor(status: i32) {
    check(HiptensorStatus(status))
}
