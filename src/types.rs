//! Element type tags, backend selectors and tensor descriptors
//!
//! Descriptors are views over caller-owned memory. The kernels never allocate
//! or free the data behind them and never validate shapes, strides or modes:
//! well-formedness is a precondition established by whoever builds the
//! descriptor.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Mul};
use std::ptr::NonNull;

use bytemuck::Pod;
pub use num_complex::{Complex32, Complex64};

/// Element type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// 64-bit complex (two interleaved f32)
    C64,
    /// 128-bit complex (two interleaved f64)
    C128,
}

impl ElementType {
    /// Size of one element in bytes
    pub fn size_in_bytes(&self) -> usize {
        match self {
            ElementType::F32 => 4,
            ElementType::F64 | ElementType::C64 => 8,
            ElementType::C128 => 16,
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, ElementType::C64 | ElementType::C128)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::F32 => write!(f, "f32"),
            ElementType::F64 => write!(f, "f64"),
            ElementType::C64 => write!(f, "complex64"),
            ElementType::C128 => write!(f, "complex128"),
        }
    }
}

/// Backend selector, chosen by the caller per invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Single host thread
    Sequential,
    /// Host thread pool (rayon)
    MultiCore,
    /// ROCm device
    Accelerator,
}

impl Backend {
    /// All backends, in selection order
    pub const ALL: [Backend; 3] = [Backend::Sequential, Backend::MultiCore, Backend::Accelerator];

    /// Whether this build contains an implementation for the backend
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Sequential => true,
            Backend::MultiCore => cfg!(feature = "multicore"),
            Backend::Accelerator => cfg!(feature = "rocm"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Sequential => write!(f, "sequential"),
            Backend::MultiCore => write!(f, "multicore"),
            Backend::Accelerator => write!(f, "accelerator"),
        }
    }
}

/// A scalar the kernels can be specialized for.
///
/// `Default` must be the additive identity.
pub trait Element:
    Pod + Default + Add<Output = Self> + Mul<Output = Self> + PartialEq + fmt::Debug + Send + Sync + 'static
{
    const TYPE: ElementType;
}

impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;
}

impl Element for f64 {
    const TYPE: ElementType = ElementType::F64;
}

impl Element for Complex32 {
    const TYPE: ElementType = ElementType::C64;
}

impl Element for Complex64 {
    const TYPE: ElementType = ElementType::C128;
}

/// Read-only tensor descriptor
#[derive(Debug, Clone)]
pub struct TensorRef<'a, T> {
    ptr: NonNull<T>,
    shape: Vec<i64>,
    strides: Vec<i64>,
    modes: Vec<i32>,
    _marker: PhantomData<&'a [T]>,
}

/// Writable tensor descriptor
#[derive(Debug)]
pub struct TensorMut<'a, T> {
    ptr: NonNull<T>,
    shape: Vec<i64>,
    strides: Vec<i64>,
    modes: Vec<i32>,
    _marker: PhantomData<&'a mut [T]>,
}

// Descriptors are plain views; the data they point at is owned by the caller
// and follows the caller's synchronization.
unsafe impl<T: Sync> Send for TensorRef<'_, T> {}
unsafe impl<T: Sync> Sync for TensorRef<'_, T> {}
unsafe impl<T: Send> Send for TensorMut<'_, T> {}
unsafe impl<T: Sync> Sync for TensorMut<'_, T> {}

/// Column-major strides for the given extents
pub fn column_major_strides(shape: &[i64]) -> Vec<i64> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut acc = 1i64;
    for &extent in shape {
        strides.push(acc);
        acc *= extent.max(1);
    }
    strides
}

/// Row-major strides for the given extents
pub fn row_major_strides(shape: &[i64]) -> Vec<i64> {
    let mut strides = vec![0i64; shape.len()];
    let mut acc = 1i64;
    for (stride, &extent) in strides.iter_mut().zip(shape).rev() {
        *stride = acc;
        acc *= extent.max(1);
    }
    strides
}

fn max_offset(shape: &[i64], strides: &[i64]) -> i64 {
    shape
        .iter()
        .zip(strides)
        .map(|(&extent, &stride)| (extent - 1).max(0) * stride)
        .sum()
}

macro_rules! descriptor_common {
    ($name:ident) => {
        impl<'a, T> $name<'a, T> {
            /// Attach mode labels, one per axis
            pub fn with_modes(mut self, modes: impl Into<Vec<i32>>) -> Self {
                self.modes = modes.into();
                debug_assert!(self.modes.len() == self.shape.len());
                self
            }

            pub fn shape(&self) -> &[i64] {
                &self.shape
            }

            pub fn strides(&self) -> &[i64] {
                &self.strides
            }

            pub fn modes(&self) -> &[i32] {
                &self.modes
            }

            pub fn ndim(&self) -> usize {
                self.shape.len()
            }

            /// Number of logical elements
            pub fn len(&self) -> usize {
                self.shape.iter().product::<i64>().max(0) as usize
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            pub fn as_ptr(&self) -> *const T {
                self.ptr.as_ptr()
            }
        }
    };
}

descriptor_common!(TensorRef);
descriptor_common!(TensorMut);

impl<'a, T> TensorRef<'a, T> {
    /// View a host slice with explicit extents and element strides
    pub fn from_slice(data: &'a [T], shape: impl Into<Vec<i64>>, strides: impl Into<Vec<i64>>) -> Self {
        let shape = shape.into();
        let strides = strides.into();
        debug_assert_eq!(shape.len(), strides.len());
        debug_assert!(
            shape.iter().any(|&e| e == 0) || (max_offset(&shape, &strides) as usize) < data.len()
        );
        Self {
            ptr: NonNull::from(data).cast(),
            shape,
            strides,
            modes: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Column-major `rows x cols` matrix over a host slice
    pub fn matrix(data: &'a [T], rows: i64, cols: i64) -> Self {
        Self::from_slice(data, vec![rows, cols], vec![1, rows])
    }

    /// Build a descriptor over memory the caller vouches for (host or device)
    ///
    /// # Safety
    ///
    /// `ptr` must address every element reachable through `shape`/`strides`
    /// for the lifetime `'a`, and nothing may write to it meanwhile.
    pub unsafe fn from_raw_parts(
        ptr: *const T,
        shape: impl Into<Vec<i64>>,
        strides: impl Into<Vec<i64>>,
    ) -> Self {
        Self {
            ptr: NonNull::new_unchecked(ptr as *mut T),
            shape: shape.into(),
            strides: strides.into(),
            modes: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<'a, T> TensorMut<'a, T> {
    /// View a mutable host slice with explicit extents and element strides
    pub fn from_slice_mut(
        data: &'a mut [T],
        shape: impl Into<Vec<i64>>,
        strides: impl Into<Vec<i64>>,
    ) -> Self {
        let shape = shape.into();
        let strides = strides.into();
        debug_assert_eq!(shape.len(), strides.len());
        debug_assert!(
            shape.iter().any(|&e| e == 0) || (max_offset(&shape, &strides) as usize) < data.len()
        );
        Self {
            ptr: NonNull::from(data).cast(),
            shape,
            strides,
            modes: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Column-major `rows x cols` matrix over a mutable host slice
    pub fn matrix(data: &'a mut [T], rows: i64, cols: i64) -> Self {
        Self::from_slice_mut(data, vec![rows, cols], vec![1, rows])
    }

    /// Build a writable descriptor over memory the caller vouches for
    ///
    /// # Safety
    ///
    /// `ptr` must address every element reachable through `shape`/`strides`
    /// for the lifetime `'a`, with no other reader or writer meanwhile.
    pub unsafe fn from_raw_parts_mut(
        ptr: *mut T,
        shape: impl Into<Vec<i64>>,
        strides: impl Into<Vec<i64>>,
    ) -> Self {
        Self {
            ptr: NonNull::new_unchecked(ptr),
            shape: shape.into(),
            strides: strides.into(),
            modes: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Reborrow as a read-only descriptor
    pub fn as_ref(&self) -> TensorRef<'_, T> {
        TensorRef {
            ptr: self.ptr,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            modes: self.modes.clone(),
            _marker: PhantomData,
        }
    }
}

/// Run `$body` with `$t` bound to the Rust type behind an [`ElementType`] tag.
///
/// ```ignore
/// type_dispatch!(dtype, T => size_of::<T>())
/// ```
#[macro_export]
macro_rules! type_dispatch {
    ($tag:expr, $t:ident => $body:expr) => {
        match $tag {
            $crate::types::ElementType::F32 => {
                type $t = f32;
                $body
            }
            $crate::types::ElementType::F64 => {
                type $t = f64;
                $body
            }
            $crate::types::ElementType::C64 => {
                type $t = $crate::types::Complex32;
                $body
            }
            $crate::types::ElementType::C128 => {
                type $t = $crate::types::Complex64;
                $body
            }
        }
    };
}
