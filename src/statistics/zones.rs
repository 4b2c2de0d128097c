//! Distinct zone codes of a zone raster
//!
//! Windows the zone raster alone, collects the valid codes of each window and
//! unions the sets. Union is associative and commutative, so windows reduce in
//! whatever order the pool finishes them.

use super::operations::ZoneCode;
use crate::config::AggregationConfig;
use crate::errors::Result;
use crate::parallel::ParallelConfig;
use crate::raster::{RasterHandle, RasterSource};
use crate::window::{Window, WindowPlanner};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Distinct valid zone codes inside one window
///
/// # Errors
///
/// Returns an error if the window cannot be read.
pub fn window_zone_codes(zones: &RasterHandle<'_>, window: &Window) -> Result<BTreeSet<ZoneCode>> {
    let pixels = zones.read(window)?;
    Ok(pixels
        .iter()
        .filter(|&&z| zones.is_valid(z))
        .map(|&z| z as ZoneCode)
        .collect())
}

/// Sorted distinct zone codes of the whole raster
///
/// # Errors
///
/// Returns a configuration error for unusable window settings, or the first read
/// error hit by any worker.
pub fn enumerate_zones(
    zones: &dyn RasterSource,
    config: &AggregationConfig,
    parallel: &ParallelConfig,
) -> Result<Vec<ZoneCode>> {
    config.validate()?;
    let metadata = zones.metadata()?;
    let handle = RasterHandle::from_metadata(zones, &metadata);
    let planner = WindowPlanner::for_metadata(&metadata, config)?;
    let windows = planner.windows();

    info!(
        raster = %zones.id(),
        windows = windows.len(),
        edge = planner.edge(),
        workers = parallel.num_threads,
        "enumerating zone codes"
    );

    let pool = parallel.build_pool()?;
    let codes = pool.install(|| {
        windows
            .par_iter()
            .map(|window| window_zone_codes(&handle, window))
            .try_reduce(BTreeSet::new, |mut acc, codes| {
                acc.extend(codes);
                Ok(acc)
            })
    })?;

    debug!(raster = %zones.id(), zones = codes.len(), "zone enumeration finished");
    Ok(codes.into_iter().collect())
}
