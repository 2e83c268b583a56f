//! Shared helpers for the integration tests
//!
//! - `Dense`: owned column-major host tensor with mode labels
//! - `reference_contract`: mode-summed product by direct enumeration
//! - `TestScalar`: random sampling and error measurement per element type
//! - `GPU_FIXTURE` (`rocm` only): skips device tests when no GPU is present
//!
//! # Usage
//!
//! ```ignore
//! #[test]
//! #[serial]
//! fn my_gpu_test() {
//!     let Some(fixture) = GPU_FIXTURE.as_ref() else { return };
//!     let device = fixture.device();
//!     // ... test code ...
//! }
//! ```

#![allow(dead_code)]

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tensorforge::kernels::{ContractBody, SyrkBody};
use tensorforge::types::column_major_strides;
use tensorforge::logging::{init_with_config, LoggingConfig};
use tensorforge::{Complex32, Complex64, Element, KernelResult, TensorMut, TensorRef};

pub use serial_test::serial;

/// Element types the integration tests run over
pub trait TestScalar: Element + ContractBody + SyrkBody {
    /// Relative tolerance for cross-backend comparisons
    const TOLERANCE: f64;

    fn sample(rng: &mut StdRng) -> Self;
    fn abs_diff(self, other: Self) -> f64;
    fn magnitude(self) -> f64;
    fn negate(self) -> Self;
    /// Complex conjugate; identity for real types
    fn conj(self) -> Self;
    /// Real part only; identity for real types
    fn real_part(self) -> Self;
}

impl TestScalar for f32 {
    const TOLERANCE: f64 = 1e-5;

    fn sample(rng: &mut StdRng) -> Self {
        rng.gen_range(-1.0..1.0)
    }

    fn abs_diff(self, other: Self) -> f64 {
        (self as f64 - other as f64).abs()
    }

    fn magnitude(self) -> f64 {
        (self as f64).abs()
    }

    fn negate(self) -> Self {
        -self
    }

    fn conj(self) -> Self {
        self
    }

    fn real_part(self) -> Self {
        self
    }
}

impl TestScalar for f64 {
    const TOLERANCE: f64 = 1e-12;

    fn sample(rng: &mut StdRng) -> Self {
        rng.gen_range(-1.0..1.0)
    }

    fn abs_diff(self, other: Self) -> f64 {
        (self - other).abs()
    }

    fn magnitude(self) -> f64 {
        self.abs()
    }

    fn negate(self) -> Self {
        -self
    }

    fn conj(self) -> Self {
        self
    }

    fn real_part(self) -> Self {
        self
    }
}

impl TestScalar for Complex32 {
    const TOLERANCE: f64 = 1e-5;

    fn sample(rng: &mut StdRng) -> Self {
        Complex32::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
    }

    fn abs_diff(self, other: Self) -> f64 {
        (self - other).norm() as f64
    }

    fn magnitude(self) -> f64 {
        self.norm() as f64
    }

    fn negate(self) -> Self {
        -self
    }

    fn conj(self) -> Self {
        Complex32::conj(&self)
    }

    fn real_part(self) -> Self {
        Complex32::new(self.re, 0.0)
    }
}

impl TestScalar for Complex64 {
    const TOLERANCE: f64 = 1e-12;

    fn sample(rng: &mut StdRng) -> Self {
        Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
    }

    fn abs_diff(self, other: Self) -> f64 {
        (self - other).norm()
    }

    fn magnitude(self) -> f64 {
        self.norm()
    }

    fn negate(self) -> Self {
        -self
    }

    fn conj(self) -> Self {
        Complex64::conj(&self)
    }

    fn real_part(self) -> Self {
        Complex64::new(self.re, 0.0)
    }
}

/// Install the crate's subscriber once per test binary; `RUST_LOG` and
/// `TENSORFORGE_LOG_LEVEL` apply
pub fn init_test_logging() -> KernelResult<()> {
    init_with_config(&LoggingConfig::from_env())?;
    Ok(())
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn random_vec<T: TestScalar>(rng: &mut StdRng, len: usize) -> Vec<T> {
    (0..len).map(|_| T::sample(rng)).collect()
}

/// Largest element error relative to the largest expected magnitude (at least 1)
pub fn relative_error<T: TestScalar>(actual: &[T], expected: &[T]) -> f64 {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    let scale = expected.iter().map(|v| v.magnitude()).fold(1.0, f64::max);
    let worst = actual
        .iter()
        .zip(expected)
        .map(|(&a, &e)| a.abs_diff(e))
        .fold(0.0, f64::max);
    worst / scale
}

pub fn assert_close<T: TestScalar>(actual: &[T], expected: &[T]) {
    let err = relative_error(actual, expected);
    assert!(
        err < T::TOLERANCE,
        "relative error {err:e} exceeds {:e} for {}",
        T::TOLERANCE,
        T::TYPE
    );
}

/// Owned column-major tensor with one mode label per axis
#[derive(Debug, Clone)]
pub struct Dense<T> {
    pub data: Vec<T>,
    pub shape: Vec<i64>,
    pub modes: Vec<i32>,
}

impl<T: TestScalar> Dense<T> {
    pub fn zeros(shape: &[i64], modes: &[i32]) -> Self {
        let len = shape.iter().product::<i64>().max(0) as usize;
        Self {
            data: vec![T::default(); len],
            shape: shape.to_vec(),
            modes: modes.to_vec(),
        }
    }

    pub fn random(rng: &mut StdRng, shape: &[i64], modes: &[i32]) -> Self {
        let mut tensor = Self::zeros(shape, modes);
        tensor.data = random_vec(rng, tensor.data.len());
        tensor
    }

    pub fn strides(&self) -> Vec<i64> {
        column_major_strides(&self.shape)
    }

    pub fn view(&self) -> TensorRef<'_, T> {
        TensorRef::from_slice(&self.data, self.shape.clone(), self.strides()).with_modes(self.modes.clone())
    }

    pub fn view_mut(&mut self) -> TensorMut<'_, T> {
        let strides = self.strides();
        let (shape, modes) = (self.shape.clone(), self.modes.clone());
        TensorMut::from_slice_mut(&mut self.data, shape, strides).with_modes(modes)
    }

    fn offset(&self, assignment: &BTreeMap<i32, i64>) -> usize {
        self.modes
            .iter()
            .zip(self.strides())
            .map(|(mode, stride)| assignment[mode] * stride)
            .sum::<i64>() as usize
    }
}

/// `lhs += rhs1 · rhs2` by walking every assignment of every mode label
pub fn reference_contract<T: TestScalar>(lhs: &mut Dense<T>, rhs1: &Dense<T>, rhs2: &Dense<T>) {
    let mut extents = BTreeMap::new();
    for tensor in [&*lhs, rhs1, rhs2] {
        for (&mode, &extent) in tensor.modes.iter().zip(&tensor.shape) {
            extents.insert(mode, extent);
        }
    }
    if extents.values().any(|&e| e == 0) {
        return;
    }

    let labels: Vec<i32> = extents.keys().copied().collect();
    let mut assignment: BTreeMap<i32, i64> = labels.iter().map(|&m| (m, 0)).collect();
    loop {
        let product = rhs1.data[rhs1.offset(&assignment)] * rhs2.data[rhs2.offset(&assignment)];
        let out = lhs.offset(&assignment);
        lhs.data[out] = lhs.data[out] + product;

        // odometer step
        let mut carried = true;
        for label in &labels {
            let slot = assignment.get_mut(label).unwrap();
            *slot += 1;
            if *slot < extents[label] {
                carried = false;
                break;
            }
            *slot = 0;
        }
        if carried {
            break;
        }
    }
}

#[cfg(feature = "rocm")]
pub use gpu::{GpuTestFixture, GPU_FIXTURE};

#[cfg(feature = "rocm")]
mod gpu {
    use once_cell::sync::Lazy;
    use tensorforge::backend::hip_backend::{device_count, ensure_device};

    /// Initialized once per test binary. `None` when no device is visible,
    /// in which case GPU tests return early.
    pub static GPU_FIXTURE: Lazy<Option<GpuTestFixture>> = Lazy::new(|| {
        if let Err(e) = super::init_test_logging() {
            eprintln!("WARNING: test logging not installed: {e}");
        }
        let count = device_count();
        if count <= 0 {
            eprintln!("WARNING: no HIP device available - skipping GPU tests");
            eprintln!("To enable GPU tests, ensure:");
            eprintln!("  1. AMD GPU is present");
            eprintln!("  2. ROCm is installed (check with rocm-smi)");
            eprintln!("  3. amdhip64 library is in LD_LIBRARY_PATH");
            return None;
        }
        eprintln!("GPU test fixture initialized ({count} device(s), using device 0)");
        Some(GpuTestFixture { device: 0, device_count: count })
    });

    pub struct GpuTestFixture {
        device: i32,
        device_count: i32,
    }

    impl GpuTestFixture {
        /// Make the fixture's device current on the calling thread
        pub fn device(&self) -> i32 {
            ensure_device(self.device);
            self.device
        }

        pub fn device_count(&self) -> i32 {
            self.device_count
        }
    }
}
