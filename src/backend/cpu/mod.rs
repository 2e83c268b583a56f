//! Host backend setup
//!
//! The host bodies hand their arithmetic to `faer`, whose worker count is a
//! process-wide setting. The sequential entry pins it to one thread so a task
//! runtime that already runs one task per core is not oversubscribed; the
//! multi-core entry sizes it from the configuration or the ambient rayon pool.
//! Neither entry restores the previous setting.

use faer::Par;

#[cfg(feature = "multicore")]
use crate::config::KernelConfig;

/// Pin the dense-algebra library to a single worker
pub fn pin_single_thread() {
    #[cfg(feature = "multicore")]
    {
        if faer::get_global_parallelism().degree() != 1 {
            tracing::debug!("pinning faer to one thread");
        }
        faer::set_global_parallelism(Par::Seq);
    }
}

/// Hand the multi-core thread count to the dense-algebra library.
///
/// `config.num_threads` wins over the ambient rayon pool size. Returns the
/// count that was applied.
#[cfg(feature = "multicore")]
pub fn propagate_thread_count(config: &KernelConfig) -> usize {
    let threads = config
        .num_threads
        .unwrap_or_else(rayon::current_num_threads)
        .max(1);
    let par = if threads == 1 { Par::Seq } else { Par::rayon(threads) };
    faer::set_global_parallelism(par);
    tracing::debug!(threads, "faer parallelism set");
    threads
}

/// Parallelism the host bodies run with
#[cfg(feature = "multicore")]
pub fn host_parallelism() -> Par {
    let par = faer::get_global_parallelism();
    if par.degree() == 1 {
        Par::Seq
    } else {
        par
    }
}

/// Parallelism the host bodies run with
#[cfg(not(feature = "multicore"))]
pub fn host_parallelism() -> Par {
    Par::Seq
}
