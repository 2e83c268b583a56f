//! Grid-stride reduction kernels built on the block primitives

use super::cache::{load_at, CacheAccess, CacheHint};
use super::reduce::{bool_staging, reduce_bool, reduce_output, staging_for, DeferredBool, DeferredReduction, ReductionOp};
use super::{launch, LaunchConfig};
use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::types::Backend;

/// Fold every element of `data` into `result` on `backend`.
///
/// Host backends run the block model with [`LaunchConfig::for_host_elements`];
/// the accelerator stages `data` on the current device and runs the HIP kernel.
pub fn reduce_on<Op>(backend: Backend, data: &[Op::Value], result: &DeferredReduction<Op>) -> KernelResult<()>
where
    Op: ReductionOp,
    Op::Value: CacheAccess,
{
    if !backend.is_available() {
        return Err(KernelError::BackendUnavailable(backend));
    }
    match backend {
        Backend::Sequential | Backend::MultiCore => {
            let config = LaunchConfig::for_host_elements(data.len(), KernelConfig::global())?;
            reduce_slice(config, data, result);
            Ok(())
        }
        #[cfg(feature = "rocm")]
        Backend::Accelerator => super::device::reduce_slice_device(data, result),
        #[cfg(not(feature = "rocm"))]
        Backend::Accelerator => Err(KernelError::BackendUnavailable(backend)),
    }
}

/// Clear `result` if any flag is false, on `backend`
pub fn all_true_on(backend: Backend, flags: &[bool], result: &DeferredBool) -> KernelResult<()> {
    if !backend.is_available() {
        return Err(KernelError::BackendUnavailable(backend));
    }
    match backend {
        Backend::Sequential | Backend::MultiCore => {
            let config = LaunchConfig::for_host_elements(flags.len(), KernelConfig::global())?;
            all_true(config, flags, result);
            Ok(())
        }
        #[cfg(feature = "rocm")]
        Backend::Accelerator => super::device::all_true_device(flags, result),
        #[cfg(not(feature = "rocm"))]
        Backend::Accelerator => Err(KernelError::BackendUnavailable(backend)),
    }
}

/// Fold every element of `data` into `result`
pub fn reduce_slice<Op>(config: LaunchConfig, data: &[Op::Value], result: &DeferredReduction<Op>)
where
    Op: ReductionOp,
    Op::Value: CacheAccess,
{
    tracing::debug!(elements = data.len(), grid_dim = config.grid_dim, "reduce_slice");
    launch(
        config,
        || staging_for::<Op>(config.block_dim),
        |ctx, staging| {
            let mut partial = Op::identity();
            let mut idx = ctx.global_idx();
            while idx < data.len() {
                Op::fold(&mut partial, load_at(data, idx, CacheHint::Streaming));
                idx += ctx.grid_stride();
            }
            reduce_output(ctx, staging, result, partial);
        },
    );
}

/// Clear `result` if any flag is false
pub fn all_true(config: LaunchConfig, flags: &[bool], result: &DeferredBool) {
    tracing::debug!(elements = flags.len(), grid_dim = config.grid_dim, "all_true");
    launch(
        config,
        || bool_staging(config.block_dim),
        |ctx, staging| {
            let mut value = true;
            let mut idx = ctx.global_idx();
            while idx < flags.len() && value {
                value = load_at(flags, idx, CacheHint::Streaming);
                idx += ctx.grid_stride();
            }
            reduce_bool(ctx, staging, result, value);
        },
    );
}

/// Clear `result` unless `lhs` and `rhs` match element for element.
/// Slices of different length never match.
pub fn all_equal<T>(config: LaunchConfig, lhs: &[T], rhs: &[T], result: &DeferredBool)
where
    T: CacheAccess + PartialEq + Sync,
{
    if lhs.len() != rhs.len() {
        result.set_false();
        return;
    }
    tracing::debug!(elements = lhs.len(), grid_dim = config.grid_dim, "all_equal");
    launch(
        config,
        || bool_staging(config.block_dim),
        |ctx, staging| {
            let mut value = true;
            let mut idx = ctx.global_idx();
            while idx < lhs.len() && value {
                value = load_at(lhs, idx, CacheHint::Streaming) == load_at(rhs, idx, CacheHint::Streaming);
                idx += ctx.grid_stride();
            }
            reduce_bool(ctx, staging, result, value);
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simt::reduce::{MaxReduction, SumReduction};

    fn small_grid(elements: usize) -> LaunchConfig {
        let config = KernelConfig::new().with_threads_per_block(64).with_max_reduction_blocks(3);
        LaunchConfig::for_elements(elements, &config).unwrap()
    }

    #[test]
    fn test_reduce_slice_grid_stride_covers_everything() {
        let data: Vec<u64> = (1..=1000).collect();
        let result = DeferredReduction::<SumReduction<u64>>::new();
        reduce_slice(small_grid(data.len()), &data, &result);
        assert_eq!(result.value(), 500_500);
    }

    #[test]
    fn test_reduce_slice_empty_is_identity() {
        let result = DeferredReduction::<MaxReduction<f32>>::new();
        reduce_slice(small_grid(0), &[], &result);
        assert_eq!(result.value(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_all_true() {
        let mut flags = vec![true; 777];
        let result = DeferredBool::new();
        all_true(small_grid(flags.len()), &flags, &result);
        assert!(result.get());

        flags[500] = false;
        let result = DeferredBool::new();
        all_true(small_grid(flags.len()), &flags, &result);
        assert!(!result.get());
    }

    #[test]
    fn test_all_equal() {
        let lhs: Vec<i32> = (0..300).collect();
        let mut rhs = lhs.clone();
        let result = DeferredBool::new();
        all_equal(small_grid(lhs.len()), &lhs, &rhs, &result);
        assert!(result.get());

        rhs[299] = -1;
        let result = DeferredBool::new();
        all_equal(small_grid(lhs.len()), &lhs, &rhs, &result);
        assert!(!result.get());

        let result = DeferredBool::new();
        all_equal(small_grid(lhs.len()), &lhs, &rhs[..10], &result);
        assert!(!result.get());
    }

    #[test]
    fn test_reduce_on_host_backend() {
        let data: Vec<i64> = (0..100_000).collect();
        let result = DeferredReduction::<SumReduction<i64>>::with_value(5);
        reduce_on(Backend::Sequential, &data, &result).unwrap();
        assert_eq!(result.value(), 5 + 99_999 * 100_000 / 2);
    }

    #[test]
    fn test_all_true_on_host_backend() {
        let mut flags = vec![true; 4096];
        let result = DeferredBool::new();
        all_true_on(Backend::Sequential, &flags, &result).unwrap();
        assert!(result.get());

        flags[4095] = false;
        all_true_on(Backend::Sequential, &flags, &result).unwrap();
        assert!(!result.get());
    }

    #[cfg(not(feature = "rocm"))]
    #[test]
    fn test_accelerator_unavailable_without_rocm() {
        let result = DeferredReduction::<SumReduction<f32>>::new();
        let err = reduce_on(Backend::Accelerator, &[1.0f32], &result).unwrap_err();
        assert!(err.is_backend_selection());
        let err = all_true_on(Backend::Accelerator, &[true], &DeferredBool::new()).unwrap_err();
        assert!(err.is_backend_selection());
    }
}
