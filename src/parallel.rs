//! Worker pool sizing and construction
//!
//! Every aggregation run gets its own bounded rayon pool instead of the global one,
//! so different products can run with different core counts in one process.

use crate::config::AggregationConfig;
use crate::errors::{Result, RuZonalError};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Configuration for parallel processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: usize,
}

impl ParallelConfig {
    /// Resolve the worker count for one run
    ///
    /// A caller-supplied preferred core count wins over the configured pool size,
    /// which wins over "all cores". The result is clamped to `[1, max_workers]`.
    pub fn resolve(config: &AggregationConfig, preferred_cores: Option<usize>) -> Self {
        let requested = preferred_cores
            .or(config.workers)
            .unwrap_or_else(num_cpus::get);
        let ceiling = config.max_workers.max(1);

        Self {
            num_threads: requested.clamp(1, ceiling),
        }
    }

    /// Create a configuration that uses a specific number of threads
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    /// Build a dedicated pool with this configuration
    ///
    /// # Errors
    ///
    /// Returns a `ThreadPoolError` if the operating system refuses to spawn the workers.
    pub fn build_pool(&self) -> Result<ThreadPool> {
        ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(|index| format!("ru-zonal-worker-{}", index))
            .build()
            .map_err(|e| {
                RuZonalError::ThreadPoolError(format!(
                    "Failed to initialize thread pool with {} threads: {}",
                    self.num_threads, e
                ))
            })
    }
}

/// Get information about the current parallel configuration
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1),
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

impl ParallelInfo {
    /// Print parallel processing information
    pub fn print_info(&self) {
        println!("📊 Parallel Processing Information:");
        println!("   Current threads: {}", self.current_threads);
        println!("   Available CPU cores: {}", self.available_cores);
        println!("   Available parallelism: {}", self.available_parallelism);
    }
}
