//! Cache-policy loads and stores
//!
//! Each access carries a [`CacheHint`] naming the cache levels the line should
//! occupy. The hint never changes the value read or written: it only steers
//! where the line lives afterwards.
//!
//! On x86_64 a load issues the matching software prefetch (`T0`, `T1`, `NTA`)
//! before the read, and a streaming store of a 32- or 64-bit value goes out as
//! a non-temporal store followed by a store fence. Types without a dedicated
//! instruction, and other targets, use ordinary loads and stores.

use crate::types::{Complex32, Complex64};

/// Where a loaded or stored line should live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheHint {
    /// Cache at every level
    #[default]
    AllLevels,
    /// Bypass the innermost level, keep in the outer cache
    OuterLevel,
    /// Touch once; evict first
    Streaming,
}

/// A scalar that can be moved through the cache-policy primitives.
///
/// The provided methods are plain accesses; fixed-width integers and floats
/// override them with hinted versions.
pub trait CacheAccess: Copy {
    /// # Safety
    ///
    /// `ptr` must be valid for reads and properly aligned.
    #[inline(always)]
    unsafe fn load_hinted(ptr: *const Self, _hint: CacheHint) -> Self {
        ptr.read()
    }

    /// # Safety
    ///
    /// `ptr` must be valid for writes and properly aligned.
    #[inline(always)]
    unsafe fn store_hinted(ptr: *mut Self, value: Self, _hint: CacheHint) {
        ptr.write(value)
    }
}

#[cfg(target_arch = "x86_64")]
mod arch {
    use super::CacheHint;
    use std::arch::x86_64::{
        _mm_prefetch, _mm_sfence, _mm_stream_si32, _mm_stream_si64, _MM_HINT_NTA, _MM_HINT_T0,
        _MM_HINT_T1,
    };

    #[inline(always)]
    pub(super) unsafe fn prefetch<T>(ptr: *const T, hint: CacheHint) {
        let p = ptr as *const i8;
        match hint {
            CacheHint::AllLevels => _mm_prefetch::<_MM_HINT_T0>(p),
            CacheHint::OuterLevel => _mm_prefetch::<_MM_HINT_T1>(p),
            CacheHint::Streaming => _mm_prefetch::<_MM_HINT_NTA>(p),
        }
    }

    #[inline(always)]
    pub(super) unsafe fn stream_u32(ptr: *mut u32, bits: u32) {
        _mm_stream_si32(ptr as *mut i32, bits as i32);
        _mm_sfence();
    }

    #[inline(always)]
    pub(super) unsafe fn stream_u64(ptr: *mut u64, bits: u64) {
        _mm_stream_si64(ptr as *mut i64, bits as i64);
        _mm_sfence();
    }
}

#[cfg(not(target_arch = "x86_64"))]
mod arch {
    use super::CacheHint;

    #[inline(always)]
    pub(super) unsafe fn prefetch<T>(_ptr: *const T, _hint: CacheHint) {}

    #[inline(always)]
    pub(super) unsafe fn stream_u32(ptr: *mut u32, bits: u32) {
        ptr.write(bits)
    }

    #[inline(always)]
    pub(super) unsafe fn stream_u64(ptr: *mut u64, bits: u64) {
        ptr.write(bits)
    }
}

/// Prefetched loads; no non-temporal store exists at this width
macro_rules! impl_hinted_narrow {
    ($($t:ty),*) => {
        $(
            impl CacheAccess for $t {
                #[inline(always)]
                unsafe fn load_hinted(ptr: *const Self, hint: CacheHint) -> Self {
                    arch::prefetch(ptr, hint);
                    ptr.read()
                }
            }
        )*
    };
}

macro_rules! impl_hinted {
    ($bits:ty, $stream:ident: $($t:ty),*) => {
        $(
            impl CacheAccess for $t {
                #[inline(always)]
                unsafe fn load_hinted(ptr: *const Self, hint: CacheHint) -> Self {
                    arch::prefetch(ptr, hint);
                    ptr.read()
                }

                #[inline(always)]
                unsafe fn store_hinted(ptr: *mut Self, value: Self, hint: CacheHint) {
                    match hint {
                        CacheHint::Streaming => {
                            arch::$stream(ptr as *mut $bits, bytemuck::cast::<$t, $bits>(value))
                        }
                        _ => ptr.write(value),
                    }
                }
            }
        )*
    };
}

impl_hinted_narrow!(u16, i16);
impl_hinted!(u32, stream_u32: u32, i32, f32);
impl_hinted!(u64, stream_u64: u64, i64, f64);

impl CacheAccess for u8 {}
impl CacheAccess for i8 {}
impl CacheAccess for bool {}
impl CacheAccess for usize {}
impl CacheAccess for Complex32 {}
impl CacheAccess for Complex64 {}

/// Load through `ptr` with the given policy
///
/// # Safety
///
/// `ptr` must be valid for reads and properly aligned.
#[inline(always)]
pub unsafe fn load<T: CacheAccess>(ptr: *const T, hint: CacheHint) -> T {
    T::load_hinted(ptr, hint)
}

/// Store through `ptr` with the given policy
///
/// # Safety
///
/// `ptr` must be valid for writes and properly aligned.
#[inline(always)]
pub unsafe fn store<T: CacheAccess>(ptr: *mut T, value: T, hint: CacheHint) {
    T::store_hinted(ptr, value, hint)
}

/// Bounds-checked [`load`] of `data[idx]`
#[inline(always)]
pub fn load_at<T: CacheAccess>(data: &[T], idx: usize, hint: CacheHint) -> T {
    let slot = &data[idx];
    // SAFETY: a reference is valid and aligned
    unsafe { T::load_hinted(slot, hint) }
}

/// Bounds-checked [`store`] into `data[idx]`
#[inline(always)]
pub fn store_at<T: CacheAccess>(data: &mut [T], idx: usize, value: T, hint: CacheHint) {
    let slot = &mut data[idx];
    // SAFETY: a mutable reference is valid, aligned and exclusive
    unsafe { T::store_hinted(slot, value, hint) }
}

/// Load, caching at all levels
///
/// # Safety
///
/// See [`load`].
#[inline(always)]
pub unsafe fn load_cached<T: CacheAccess>(ptr: *const T) -> T {
    load(ptr, CacheHint::AllLevels)
}

/// Load, caching in the outer level only
///
/// # Safety
///
/// See [`load`].
#[inline(always)]
pub unsafe fn load_l2<T: CacheAccess>(ptr: *const T) -> T {
    load(ptr, CacheHint::OuterLevel)
}

/// Load with evict-first policy
///
/// # Safety
///
/// See [`load`].
#[inline(always)]
pub unsafe fn load_streaming<T: CacheAccess>(ptr: *const T) -> T {
    load(ptr, CacheHint::Streaming)
}

/// Store with evict-first policy
///
/// # Safety
///
/// See [`store`].
#[inline(always)]
pub unsafe fn store_streaming<T: CacheAccess>(ptr: *mut T, value: T) {
    store(ptr, value, CacheHint::Streaming)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HINTS: [CacheHint; 3] = [CacheHint::AllLevels, CacheHint::OuterLevel, CacheHint::Streaming];

    #[test]
    fn test_f32_specials_survive_every_hint() {
        let values = [f32::NAN, f32::INFINITY, f32::NEG_INFINITY, -0.0, f32::MIN_POSITIVE, f32::MAX];
        for hint in HINTS {
            let mut out = [0.0f32; 6];
            for i in 0..values.len() {
                let loaded = load_at(&values, i, hint);
                store_at(&mut out, i, loaded, hint);
            }
            for (a, b) in values.iter().zip(&out) {
                assert_eq!(a.to_bits(), b.to_bits(), "hint {hint:?}");
            }
        }
    }

    #[test]
    fn test_integer_extremes_streaming() {
        let mut slot = 0i64;
        unsafe {
            store_streaming(&mut slot, i64::MIN);
            assert_eq!(load_streaming(&slot), i64::MIN);
        }
        let mut slot = 0u16;
        unsafe {
            store_streaming(&mut slot, u16::MAX);
            assert_eq!(load_l2(&slot), u16::MAX);
            assert_eq!(load_cached(&slot), u16::MAX);
        }
    }

    #[test]
    fn test_fallback_types_round_trip() {
        let value = Complex64::new(f64::NEG_INFINITY, 2.5);
        let mut slot = Complex64::new(0.0, 0.0);
        unsafe {
            store(&mut slot, value, CacheHint::Streaming);
            assert_eq!(load(&slot, CacheHint::OuterLevel), value);
        }
        let mut flag = false;
        unsafe {
            store_streaming(&mut flag, true);
            assert!(load_cached(&flag));
        }
    }

    #[test]
    #[should_panic]
    fn test_load_at_bounds_checked() {
        let data = [1u32, 2, 3];
        let _ = load_at(&data, 3, CacheHint::AllLevels);
    }
}
