//! Block execution model for accelerator-side primitives
//!
//! The cooperative reduction and the cache-policy primitives are written
//! against the SIMT vocabulary of a ROCm/CUDA device: a grid of blocks, each
//! block a fixed number of lock-step warps. [`launch`] runs that model on host
//! threads so the protocols execute with real barriers and real concurrency:
//!
//! - blocks of a grid run in parallel on the rayon pool
//! - every thread of a block is its own scoped OS thread
//! - [`ThreadCtx::sync_threads`] is a full-block barrier
//! - [`ThreadCtx::shfl_xor_word`] exchanges one 32-bit word between lanes of
//!   a warp; every lane of the warp must take part
//!
//! A kernel thread that panics leaves the rest of its block waiting at the
//! next barrier, exactly like a faulting lane on a device.
//!
//! With the `rocm` feature, [`device`] runs the same reductions as HIP
//! kernels; [`kernels::reduce_on`] and [`kernels::all_true_on`] pick between
//! the two by backend.

pub mod cache;
#[cfg(feature = "rocm")]
pub mod device;
pub mod kernels;
pub mod reduce;
pub mod shuffle;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Barrier, Mutex};

use rayon::prelude::*;

use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};

/// Lanes per warp
pub const WARP_SIZE: usize = 32;

/// Default threads per block for reduction kernels
pub const THREADS_PER_BLOCK: usize = 128;

/// Default upper bound on blocks launched by reduction kernels
pub const MAX_REDUCTION_BLOCKS: usize = 1024;

/// Hardware limit on threads per block
pub const MAX_THREADS_PER_BLOCK: usize = 1024;

/// Grid and block shape of a launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub grid_dim: usize,
    pub block_dim: usize,
}

impl LaunchConfig {
    /// Validate a launch shape: at least one block, and whole warps only
    pub fn new(grid_dim: usize, block_dim: usize) -> KernelResult<Self> {
        let reject = |reason| KernelError::InvalidLaunch {
            grid_dim,
            block_dim,
            reason,
        };
        if grid_dim == 0 {
            return Err(reject("grid must contain at least one block"));
        }
        if block_dim == 0 || block_dim % WARP_SIZE != 0 {
            return Err(reject("block size must be a non-zero multiple of the warp size"));
        }
        if block_dim > MAX_THREADS_PER_BLOCK {
            return Err(reject("block size exceeds the per-block thread limit"));
        }
        Ok(Self {
            grid_dim,
            block_dim,
        })
    }

    /// One thread per element, capped at `config.max_reduction_blocks` blocks;
    /// threads past the cap pick up the remainder through grid-stride loops.
    pub fn for_elements(elements: usize, config: &KernelConfig) -> KernelResult<Self> {
        let block_dim = config.threads_per_block;
        if block_dim == 0 {
            return Self::new(1, 0);
        }
        let blocks = elements
            .div_ceil(block_dim)
            .clamp(1, config.max_reduction_blocks.max(1));
        Self::new(blocks, block_dim)
    }

    /// [`LaunchConfig::for_elements`] for the host model: the grid is further
    /// capped at one block per rayon worker, since every simulated lane is an
    /// OS thread. Grid-stride loops pick up the rest.
    pub fn for_host_elements(elements: usize, config: &KernelConfig) -> KernelResult<Self> {
        let launch = Self::for_elements(elements, config)?;
        let workers = rayon::current_num_threads().max(1);
        Self::new(launch.grid_dim.min(workers), launch.block_dim)
    }

    pub fn warps_per_block(&self) -> usize {
        self.block_dim / WARP_SIZE
    }

    pub fn total_threads(&self) -> usize {
        self.grid_dim * self.block_dim
    }
}

/// Per-block synchronization state
struct BlockState {
    barrier: Barrier,
    warp_barriers: Vec<Barrier>,
    mailbox: Vec<AtomicU32>,
}

impl BlockState {
    fn new(block_dim: usize) -> Self {
        let warps = block_dim / WARP_SIZE;
        Self {
            barrier: Barrier::new(block_dim),
            warp_barriers: (0..warps).map(|_| Barrier::new(WARP_SIZE)).collect(),
            mailbox: (0..block_dim).map(|_| AtomicU32::new(0)).collect(),
        }
    }
}

/// The view one kernel thread has of its position in the launch
pub struct ThreadCtx<'b> {
    thread_idx: usize,
    block_idx: usize,
    block_dim: usize,
    grid_dim: usize,
    block: &'b BlockState,
}

impl ThreadCtx<'_> {
    pub fn thread_idx(&self) -> usize {
        self.thread_idx
    }

    pub fn block_idx(&self) -> usize {
        self.block_idx
    }

    pub fn block_dim(&self) -> usize {
        self.block_dim
    }

    pub fn grid_dim(&self) -> usize {
        self.grid_dim
    }

    pub fn lane_id(&self) -> usize {
        self.thread_idx & (WARP_SIZE - 1)
    }

    pub fn warp_id(&self) -> usize {
        self.thread_idx / WARP_SIZE
    }

    pub fn warps_per_block(&self) -> usize {
        self.block_dim / WARP_SIZE
    }

    /// Index of this thread across the whole grid
    pub fn global_idx(&self) -> usize {
        self.block_idx * self.block_dim + self.thread_idx
    }

    /// Total threads in the grid
    pub fn grid_stride(&self) -> usize {
        self.grid_dim * self.block_dim
    }

    /// Full-block barrier; every thread of the block must reach it
    pub fn sync_threads(&self) {
        self.block.barrier.wait();
    }

    /// Exchange one word with the lane at XOR-distance `lane_mask` inside the
    /// warp. Every lane of the warp must call this with the same mask.
    pub fn shfl_xor_word(&self, word: u32, lane_mask: usize) -> u32 {
        debug_assert!(lane_mask < WARP_SIZE);
        let warp = self.warp_id();
        let base = warp * WARP_SIZE;
        let barrier = &self.block.warp_barriers[warp];

        self.block.mailbox[self.thread_idx].store(word, Ordering::Relaxed);
        barrier.wait();
        let value = self.block.mailbox[base + (self.lane_id() ^ lane_mask)].load(Ordering::Relaxed);
        // Nobody may overwrite its slot until the whole warp has read
        barrier.wait();
        value
    }
}

/// Block-shared staging array (`__shared__` memory).
///
/// Slots written before a [`ThreadCtx::sync_threads`] are visible to every
/// thread of the block after it.
#[derive(Debug)]
pub struct BlockShared<T> {
    slots: Vec<Mutex<T>>,
}

impl<T: Copy> BlockShared<T> {
    pub fn new(len: usize, init: T) -> Self {
        Self {
            slots: (0..len).map(|_| Mutex::new(init)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn write(&self, idx: usize, value: T) {
        *self.slots[idx].lock().unwrap_or_else(|e| e.into_inner()) = value;
    }

    pub fn read(&self, idx: usize) -> T {
        *self.slots[idx].lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Launch `kernel` over the grid described by `config`.
///
/// `shared` is called once per block to create that block's shared memory;
/// every thread of the block receives the same instance. Returns once every
/// block has finished.
pub fn launch<S, I, F>(config: LaunchConfig, shared: I, kernel: F)
where
    S: Sync,
    I: Fn() -> S + Sync,
    F: Fn(&ThreadCtx<'_>, &S) + Sync,
{
    tracing::trace!(
        grid_dim = config.grid_dim,
        block_dim = config.block_dim,
        "launching block kernel"
    );
    (0..config.grid_dim).into_par_iter().for_each(|block_idx| {
        let state = BlockState::new(config.block_dim);
        let block_shared = shared();
        std::thread::scope(|scope| {
            for thread_idx in 0..config.block_dim {
                let ctx = ThreadCtx {
                    thread_idx,
                    block_idx,
                    block_dim: config.block_dim,
                    grid_dim: config.grid_dim,
                    block: &state,
                };
                let kernel = &kernel;
                let block_shared = &block_shared;
                scope.spawn(move || kernel(&ctx, block_shared));
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_launch_config_validation() {
        assert!(LaunchConfig::new(1, 128).is_ok());
        assert!(LaunchConfig::new(0, 128).is_err());
        assert!(LaunchConfig::new(1, 0).is_err());
        assert!(LaunchConfig::new(1, 48).is_err());
        assert!(LaunchConfig::new(1, 2048).is_err());
    }

    #[test]
    fn test_for_elements_caps_blocks() {
        let config = KernelConfig::new().with_max_reduction_blocks(4);
        let launch = LaunchConfig::for_elements(10_000, &config).unwrap();
        assert_eq!(launch.grid_dim, 4);
        assert_eq!(launch.block_dim, 128);

        let launch = LaunchConfig::for_elements(0, &config).unwrap();
        assert_eq!(launch.grid_dim, 1);

        let launch = LaunchConfig::for_elements(200, &config).unwrap();
        assert_eq!(launch.grid_dim, 2);
        assert_eq!(launch.warps_per_block(), 4);
    }

    #[test]
    fn test_for_host_elements_caps_at_worker_count() {
        let config = KernelConfig::new();
        let launch = LaunchConfig::for_host_elements(1 << 20, &config).unwrap();
        assert!(launch.grid_dim <= rayon::current_num_threads().max(1));
        assert_eq!(launch.block_dim, THREADS_PER_BLOCK);

        let launch = LaunchConfig::for_host_elements(1, &config).unwrap();
        assert_eq!(launch.grid_dim, 1);
    }

    #[test]
    fn test_every_thread_runs_once() {
        let config = LaunchConfig::new(3, 64).unwrap();
        let hits: Vec<AtomicUsize> = (0..config.total_threads()).map(|_| AtomicUsize::new(0)).collect();
        launch(config, || (), |ctx, _| {
            hits[ctx.global_idx()].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_shfl_xor_word_swaps_partner_lanes() {
        let config = LaunchConfig::new(1, 64).unwrap();
        let out: Vec<AtomicU32> = (0..64).map(|_| AtomicU32::new(u32::MAX)).collect();
        launch(config, || (), |ctx, _| {
            let got = ctx.shfl_xor_word(ctx.thread_idx() as u32, 1);
            out[ctx.thread_idx()].store(got, Ordering::Relaxed);
        });
        for (tid, slot) in out.iter().enumerate() {
            assert_eq!(slot.load(Ordering::Relaxed), (tid ^ 1) as u32);
        }
    }

    #[test]
    fn test_block_shared_visible_after_barrier() {
        let config = LaunchConfig::new(2, 128).unwrap();
        let seen: Vec<AtomicUsize> = (0..2).map(|_| AtomicUsize::new(0)).collect();
        launch(
            config,
            || BlockShared::new(config.warps_per_block(), 0usize),
            |ctx, staging| {
                if ctx.lane_id() == 0 {
                    staging.write(ctx.warp_id(), ctx.warp_id() + 1);
                }
                ctx.sync_threads();
                if ctx.thread_idx() == 0 {
                    let total: usize = (0..staging.len()).map(|w| staging.read(w)).sum();
                    seen[ctx.block_idx()].store(total, Ordering::Relaxed);
                }
            },
        );
        // 1 + 2 + 3 + 4 in each block
        assert!(seen.iter().all(|s| s.load(Ordering::Relaxed) == 10));
    }
}
