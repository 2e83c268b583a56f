//! Kernel configuration
//!
//! [`KernelConfig`] collects the few knobs the kernels honor: a thread-count
//! override for the multi-core path, a device override for the accelerator
//! path, and the default launch shape for block-level kernels.

use once_cell::sync::Lazy;
use std::str::FromStr;

use crate::simt::{MAX_REDUCTION_BLOCKS, THREADS_PER_BLOCK};

const NUM_THREADS_ENV: &str = "TENSORFORGE_NUM_THREADS";
const DEVICE_ENV: &str = "TENSORFORGE_DEVICE";
const THREADS_PER_BLOCK_ENV: &str = "TENSORFORGE_THREADS_PER_BLOCK";
const MAX_REDUCTION_BLOCKS_ENV: &str = "TENSORFORGE_MAX_REDUCTION_BLOCKS";

static GLOBAL_CONFIG: Lazy<KernelConfig> = Lazy::new(KernelConfig::from_env);

/// Configuration for kernel entry points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Worker count handed to the dense-algebra library on the multi-core
    /// path; `None` uses the ambient rayon pool size
    pub num_threads: Option<usize>,

    /// Accelerator device to use instead of the calling thread's current one
    pub device: Option<i32>,

    /// Threads per block for block-level kernels
    pub threads_per_block: usize,

    /// Upper bound on blocks launched by a reduction kernel
    pub max_reduction_blocks: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            num_threads: None,
            device: None,
            threads_per_block: THREADS_PER_BLOCK,
            max_reduction_blocks: MAX_REDUCTION_BLOCKS,
        }
    }
}

impl KernelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_device(mut self, device: i32) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_threads_per_block(mut self, threads_per_block: usize) -> Self {
        self.threads_per_block = threads_per_block;
        self
    }

    pub fn with_max_reduction_blocks(mut self, max_reduction_blocks: usize) -> Self {
        self.max_reduction_blocks = max_reduction_blocks;
        self
    }

    /// Build from `TENSORFORGE_*` environment variables.
    ///
    /// Values that do not parse are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`KernelConfig::from_env`] over an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(n) = parse_var::<usize>(&lookup, NUM_THREADS_ENV).filter(|&n| n > 0) {
            config.num_threads = Some(n);
        }
        if let Some(device) = parse_var::<i32>(&lookup, DEVICE_ENV).filter(|&d| d >= 0) {
            config.device = Some(device);
        }
        if let Some(tpb) = parse_var::<usize>(&lookup, THREADS_PER_BLOCK_ENV) {
            config.threads_per_block = tpb;
        }
        if let Some(blocks) = parse_var::<usize>(&lookup, MAX_REDUCTION_BLOCKS_ENV).filter(|&b| b > 0) {
            config.max_reduction_blocks = blocks;
        }
        config
    }

    /// Process-wide configuration, read from the environment on first use
    pub fn global() -> &'static KernelConfig {
        &GLOBAL_CONFIG
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.num_threads, None);
        assert_eq!(config.device, None);
        assert_eq!(config.threads_per_block, 128);
        assert_eq!(config.max_reduction_blocks, 1024);
    }

    #[test]
    fn test_builder() {
        let config = KernelConfig::new()
            .with_num_threads(6)
            .with_device(1)
            .with_threads_per_block(256)
            .with_max_reduction_blocks(8);
        assert_eq!(config.num_threads, Some(6));
        assert_eq!(config.device, Some(1));
        assert_eq!(config.threads_per_block, 256);
        assert_eq!(config.max_reduction_blocks, 8);
    }

    #[test]
    fn test_from_lookup_reads_all_keys() {
        let config = KernelConfig::from_lookup(lookup_from(&[
            ("TENSORFORGE_NUM_THREADS", "4"),
            ("TENSORFORGE_DEVICE", "2"),
            ("TENSORFORGE_THREADS_PER_BLOCK", "64"),
            ("TENSORFORGE_MAX_REDUCTION_BLOCKS", "16"),
        ]));
        assert_eq!(config.num_threads, Some(4));
        assert_eq!(config.device, Some(2));
        assert_eq!(config.threads_per_block, 64);
        assert_eq!(config.max_reduction_blocks, 16);
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let config = KernelConfig::from_lookup(lookup_from(&[
            ("TENSORFORGE_NUM_THREADS", "lots"),
            ("TENSORFORGE_DEVICE", "-3"),
            ("TENSORFORGE_MAX_REDUCTION_BLOCKS", "0"),
        ]));
        assert_eq!(config, KernelConfig::default());
    }
}
