//! ROCm/HIP backend
//!
//! Status checks are always built so the fail-fast policy can be exercised
//! without a device. Everything that touches the runtime needs the `rocm`
//! feature.

pub mod status;

#[cfg(feature = "rocm")]
pub mod device_context;
#[cfg(feature = "rocm")]
pub mod ffi;
#[cfg(feature = "rocm")]
pub mod handles;
#[cfg(feature = "rocm")]
pub mod memory;
#[cfg(feature = "rocm")]
pub mod module;
#[cfg(feature = "rocm")]
pub mod stream;

pub use status::{
    check_hip, check_hipblas, check_hipfft, check_hipsolver, check_hiptensor, FatalBackendError,
    HipStatus, HipblasStatus, HipfftStatus, HipsolverStatus, HiptensorStatus, VendorStatus,
};

#[cfg(feature = "rocm")]
pub use device_context::{current_device, device_count, ensure_device, get_thread_device};
#[cfg(feature = "rocm")]
pub use handles::{shutdown_handles, with_device_handles, DeviceHandles, HandleRegistry};
#[cfg(feature = "rocm")]
pub use memory::DeviceBuffer;
#[cfg(feature = "rocm")]
pub use module::{HipFunction, HipModule};
#[cfg(feature = "rocm")]
pub use stream::HipStream;
