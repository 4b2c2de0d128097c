//! Run configuration for the aggregation engine

use crate::errors::{Result, RuZonalError};

/// Window edge used when a raster has no native storage blocks
pub const DEFAULT_BLOCK_EDGE: usize = 256;

/// Tunables shared by every aggregation run of one coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationConfig {
    /// Window edge for untiled rasters (`D`)
    pub default_block_edge: usize,
    /// Multiplier applied to the native or default block edge (`K`)
    pub scale_factor: usize,
    /// Configured worker pool size; `None` uses every available core
    pub workers: Option<usize>,
    /// Upper bound for any requested worker count
    pub max_workers: usize,
}

impl AggregationConfig {
    pub fn new() -> Self {
        Self {
            default_block_edge: DEFAULT_BLOCK_EDGE,
            scale_factor: 1,
            workers: None,
            max_workers: num_cpus::get(),
        }
    }

    pub fn with_default_block_edge(mut self, edge: usize) -> Self {
        self.default_block_edge = edge;
        self
    }

    pub fn with_scale_factor(mut self, scale: usize) -> Self {
        self.scale_factor = scale;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Check that every tunable is usable
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the default edge, scale factor, or worker
    /// limits are zero.
    pub fn validate(&self) -> Result<()> {
        if self.default_block_edge == 0 {
            return Err(RuZonalError::config("default block edge must be positive"));
        }
        if self.scale_factor == 0 {
            return Err(RuZonalError::config("window scale factor must be positive"));
        }
        if self.max_workers == 0 {
            return Err(RuZonalError::config("maximum worker count must be positive"));
        }
        if self.workers == Some(0) {
            return Err(RuZonalError::config("worker count must be positive"));
        }
        Ok(())
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self::new()
    }
}
