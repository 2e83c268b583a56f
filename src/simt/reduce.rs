//! Cooperative block reduction
//!
//! [`reduce_output`] folds one value per thread into a block total and folds
//! the total into a [`DeferredReduction`] shared by every block of the grid:
//!
//! 1. butterfly exchange inside each warp with lane masks 16, 8, 4, 2, 1
//! 2. lane 0 of every warp except warp 0 parks its partial in block-shared
//!    staging
//! 3. block barrier
//! 4. thread 0 folds the staged partials in warp order into its own, then
//!    folds the block total into the accumulator and issues a system fence
//!
//! The fold order inside a block is fixed, so an operator that is not
//! commutative still gives the same block total every run. Across blocks the
//! order follows scheduling.

use std::marker::PhantomData;
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::sync::Mutex;

use bytemuck::Pod;

use super::shuffle::shuffle_xor;
use super::{BlockShared, ThreadCtx, WARP_SIZE};
use crate::types::{Complex32, Complex64};

/// A reduction operator with an identity element
pub trait ReductionOp: Send + Sync + 'static {
    type Value: Pod + Send + Sync;

    /// Symbol of the matching kernel in `kernels/reduce.hip`, if there is one
    const DEVICE_KERNEL: Option<&'static str> = None;

    fn identity() -> Self::Value;

    /// `lhs <- lhs (op) rhs`
    fn fold(lhs: &mut Self::Value, rhs: Self::Value);
}

/// Grid-wide accumulator the blocks fold into
#[derive(Debug)]
pub struct DeferredReduction<Op: ReductionOp> {
    value: Mutex<Op::Value>,
}

impl<Op: ReductionOp> DeferredReduction<Op> {
    /// Accumulator holding the operator's identity
    pub fn new() -> Self {
        Self::with_value(Op::identity())
    }

    pub fn with_value(value: Op::Value) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Atomically fold `value` into the accumulator
    pub fn fold(&self, value: Op::Value) {
        let mut current = self.value.lock().unwrap_or_else(|e| e.into_inner());
        Op::fold(&mut current, value);
    }

    pub fn value(&self) -> Op::Value {
        *self.value.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn into_value(self) -> Op::Value {
        self.value.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<Op: ReductionOp> Default for DeferredReduction<Op> {
    fn default() -> Self {
        Self::new()
    }
}

/// Grid-wide boolean AND accumulator; starts true and only ever goes false
#[derive(Debug)]
pub struct DeferredBool {
    value: AtomicBool,
}

impl DeferredBool {
    pub fn new() -> Self {
        Self {
            value: AtomicBool::new(true),
        }
    }

    pub fn set_false(&self) {
        self.value.store(false, Ordering::Release);
    }

    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }
}

impl Default for DeferredBool {
    fn default() -> Self {
        Self::new()
    }
}

/// Block staging sized for [`reduce_output`]
pub fn staging_for<Op: ReductionOp>(block_dim: usize) -> BlockShared<Op::Value> {
    BlockShared::new(block_dim / WARP_SIZE, Op::identity())
}

/// Block staging sized for [`reduce_bool`]
pub fn bool_staging(block_dim: usize) -> BlockShared<bool> {
    BlockShared::new(block_dim / WARP_SIZE, true)
}

/// Fold every thread's `value` into `result`. Every thread of the block must
/// call this exactly once with the same `staging`.
pub fn reduce_output<Op: ReductionOp>(
    ctx: &ThreadCtx<'_>,
    staging: &BlockShared<Op::Value>,
    result: &DeferredReduction<Op>,
    mut value: Op::Value,
) {
    let mut offset = WARP_SIZE / 2;
    while offset > 0 {
        let partner = shuffle_xor(ctx, value, offset);
        Op::fold(&mut value, partner);
        offset /= 2;
    }

    if ctx.lane_id() == 0 && ctx.warp_id() > 0 {
        staging.write(ctx.warp_id(), value);
    }
    ctx.sync_threads();

    if ctx.thread_idx() == 0 {
        for warp in 1..ctx.warps_per_block() {
            Op::fold(&mut value, staging.read(warp));
        }
        result.fold(value);
        fence(Ordering::SeqCst);
    }
}

/// AND every thread's `value` into `result`. Same participation rules as
/// [`reduce_output`]; `result` is only written when some thread saw false.
pub fn reduce_bool(ctx: &ThreadCtx<'_>, staging: &BlockShared<bool>, result: &DeferredBool, mut value: bool) {
    let mut offset = WARP_SIZE / 2;
    while offset > 0 {
        let partner = ctx.shfl_xor_word(u32::from(value), offset);
        if partner == 0 {
            value = false;
        }
        offset /= 2;
    }

    if ctx.lane_id() == 0 && ctx.warp_id() > 0 {
        staging.write(ctx.warp_id(), value);
    }
    ctx.sync_threads();

    if ctx.thread_idx() == 0 {
        for warp in 1..ctx.warps_per_block() {
            if !staging.read(warp) {
                value = false;
                break;
            }
        }
        if !value {
            result.set_false();
            fence(Ordering::SeqCst);
        }
    }
}

/// Addition
pub struct SumReduction<T>(PhantomData<T>);

/// Multiplication
pub struct ProdReduction<T>(PhantomData<T>);

/// Maximum; floats ignore NaN operands
pub struct MaxReduction<T>(PhantomData<T>);

/// Minimum; floats ignore NaN operands
pub struct MinReduction<T>(PhantomData<T>);

macro_rules! impl_float_ops {
    ($($t:ty => $sfx:literal),*) => {
        $(
            impl ReductionOp for SumReduction<$t> {
                type Value = $t;
                const DEVICE_KERNEL: Option<&'static str> = Some(concat!("reduce_sum_", $sfx));
                fn identity() -> $t { 0.0 }
                fn fold(lhs: &mut $t, rhs: $t) { *lhs += rhs; }
            }

            impl ReductionOp for ProdReduction<$t> {
                type Value = $t;
                fn identity() -> $t { 1.0 }
                fn fold(lhs: &mut $t, rhs: $t) { *lhs *= rhs; }
            }

            impl ReductionOp for MaxReduction<$t> {
                type Value = $t;
                const DEVICE_KERNEL: Option<&'static str> = Some(concat!("reduce_max_", $sfx));
                fn identity() -> $t { <$t>::NEG_INFINITY }
                fn fold(lhs: &mut $t, rhs: $t) { *lhs = lhs.max(rhs); }
            }

            impl ReductionOp for MinReduction<$t> {
                type Value = $t;
                const DEVICE_KERNEL: Option<&'static str> = Some(concat!("reduce_min_", $sfx));
                fn identity() -> $t { <$t>::INFINITY }
                fn fold(lhs: &mut $t, rhs: $t) { *lhs = lhs.min(rhs); }
            }
        )*
    };
}

macro_rules! impl_int_ops {
    ($($t:ty => $sfx:literal),*) => {
        $(
            impl ReductionOp for SumReduction<$t> {
                type Value = $t;
                const DEVICE_KERNEL: Option<&'static str> = Some(concat!("reduce_sum_", $sfx));
                fn identity() -> $t { 0 }
                fn fold(lhs: &mut $t, rhs: $t) { *lhs = lhs.wrapping_add(rhs); }
            }

            impl ReductionOp for ProdReduction<$t> {
                type Value = $t;
                fn identity() -> $t { 1 }
                fn fold(lhs: &mut $t, rhs: $t) { *lhs = lhs.wrapping_mul(rhs); }
            }

            impl ReductionOp for MaxReduction<$t> {
                type Value = $t;
                const DEVICE_KERNEL: Option<&'static str> = Some(concat!("reduce_max_", $sfx));
                fn identity() -> $t { <$t>::MIN }
                fn fold(lhs: &mut $t, rhs: $t) { *lhs = (*lhs).max(rhs); }
            }

            impl ReductionOp for MinReduction<$t> {
                type Value = $t;
                const DEVICE_KERNEL: Option<&'static str> = Some(concat!("reduce_min_", $sfx));
                fn identity() -> $t { <$t>::MAX }
                fn fold(lhs: &mut $t, rhs: $t) { *lhs = (*lhs).min(rhs); }
            }
        )*
    };
}

macro_rules! impl_complex_ops {
    ($($t:ty),*) => {
        $(
            impl ReductionOp for SumReduction<$t> {
                type Value = $t;
                fn identity() -> $t { <$t>::new(0.0, 0.0) }
                fn fold(lhs: &mut $t, rhs: $t) { *lhs = *lhs + rhs; }
            }

            impl ReductionOp for ProdReduction<$t> {
                type Value = $t;
                fn identity() -> $t { <$t>::new(1.0, 0.0) }
                fn fold(lhs: &mut $t, rhs: $t) { *lhs = *lhs * rhs; }
            }
        )*
    };
}

impl_float_ops!(f32 => "f32", f64 => "f64");
impl_int_ops!(i32 => "i32", i64 => "i64", u32 => "u32", u64 => "u64");
impl_complex_ops!(Complex32, Complex64);
