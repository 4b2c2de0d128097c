//! Orchestration of one aggregation run
//!
//! A run validates that the product, mask, and zone rasters share one pixel grid,
//! plans windows once, fans the windows out to a bounded worker pool, and folds the
//! partials into a single [`StatsMerger`] in whatever order the workers finish. A read
//! failure in any worker cancels the remaining windows and fails the whole run; nothing
//! reaches the sink unless every window succeeded.

use crate::config::AggregationConfig;
use crate::errors::{Result, RuZonalError};
use crate::observation::{Observation, ObservationContext};
use crate::parallel::ParallelConfig;
use crate::raster::{RasterHandle, RasterMetadata, RasterSource};
use crate::sink::{RecordSink, SubmitReport};
use crate::statistics::{
    compute_window_stats, enumerate_zones, MaskKind, PartialZoneStat, StatsMerger, ZoneCode,
    ZoneStat,
};
use crate::window::{Window, WindowPlanner};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything one run needs to know about its inputs
pub struct AggregationRequest<'a> {
    pub product: &'a dyn RasterSource,
    pub mask: Option<&'a dyn RasterSource>,
    pub zones: &'a dyn RasterSource,
    pub mask_kind: MaskKind,
    pub context: ObservationContext,
    /// Per-product core count, clamped to the configured maximum
    pub preferred_cores: Option<usize>,
}

impl<'a> AggregationRequest<'a> {
    pub fn new(
        product: &'a dyn RasterSource,
        zones: &'a dyn RasterSource,
        context: ObservationContext,
    ) -> Self {
        Self {
            product,
            mask: None,
            zones,
            mask_kind: MaskKind::None,
            context,
            preferred_cores: None,
        }
    }

    pub fn with_mask(mut self, mask: &'a dyn RasterSource, mask_kind: MaskKind) -> Self {
        self.mask = Some(mask);
        self.mask_kind = mask_kind;
        self
    }

    pub fn with_preferred_cores(mut self, cores: usize) -> Self {
        self.preferred_cores = Some(cores);
        self
    }
}

/// Result of a successful aggregation
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    /// One record per zone with at least one arable pixel, ordered by zone code
    pub observations: Vec<Observation>,
    /// Merged statistics of every zone seen, including zero-arable ones
    pub zone_stats: Vec<ZoneStat>,
    pub windows: usize,
    pub workers: usize,
}

impl AggregationOutcome {
    /// Zones present in the zone raster that produced no record
    pub fn omitted_zones(&self) -> usize {
        self.zone_stats.len() - self.observations.len()
    }
}

/// Summary of a run handed to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub windows: usize,
    pub workers: usize,
    pub zones: usize,
    pub observations: usize,
    pub submitted: SubmitReport,
}

/// Drives window planning, the worker pool, and the merge
#[derive(Debug, Clone, Default)]
pub struct AggregationCoordinator {
    config: AggregationConfig,
}

impl AggregationCoordinator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Compute the observations of one run without submitting them
    ///
    /// # Errors
    ///
    /// Configuration errors (mismatched grids, mask without a mask kind, unusable
    /// window settings) are raised before any window is read. Any window read failure
    /// fails the run and discards everything merged so far.
    pub fn aggregate(&self, request: &AggregationRequest<'_>) -> Result<AggregationOutcome> {
        let started = Instant::now();
        self.config.validate()?;
        let mask_kind = effective_mask_kind(request)?;

        let zone_meta = request.zones.metadata()?;
        let product_meta = request.product.metadata()?;
        let mask_meta = match request.mask {
            Some(mask) if mask_kind != MaskKind::None => Some((mask, mask.metadata()?)),
            _ => None,
        };

        let expected = zone_meta.dimensions();
        check_dimensions(request.product, &product_meta, expected)?;
        if let Some((mask, meta)) = &mask_meta {
            check_dimensions(*mask, meta, expected)?;
        }

        let zones = RasterHandle::from_metadata(request.zones, &zone_meta);
        let product = RasterHandle::from_metadata(request.product, &product_meta);
        let mask = mask_meta
            .as_ref()
            .map(|(source, meta)| RasterHandle::from_metadata(*source, meta));

        let planner = WindowPlanner::for_metadata(&product_meta, &self.config)?;
        let windows = planner.windows();
        let parallel = ParallelConfig::resolve(&self.config, request.preferred_cores);

        info!(
            product = %request.context.product_id,
            zone_layer = %request.context.zone_layer_id,
            date = %request.context.date,
            mask_kind = %mask_kind,
            width = expected.0,
            height = expected.1,
            windows = windows.len(),
            edge = planner.edge(),
            workers = parallel.num_threads,
            "starting aggregation"
        );

        let merger = fan_out(&windows, &parallel, zones, mask, product, mask_kind)?;
        let partials = merger.partials_merged();
        let zone_stats = merger.into_sorted();
        let observations: Vec<Observation> = zone_stats
            .iter()
            .filter(|stat| stat.arable_pixel_count > 0)
            .map(|stat| request.context.observation(stat))
            .collect();

        info!(
            product = %request.context.product_id,
            partials,
            zones = zone_stats.len(),
            observations = observations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregation finished"
        );

        Ok(AggregationOutcome {
            observations,
            zone_stats,
            windows: windows.len(),
            workers: parallel.num_threads,
        })
    }

    /// Aggregate and hand the whole batch to `sink` in one call
    ///
    /// The aggregation runs on the worker pool inside `block_in_place`, so the
    /// runtime moves its other tasks off this thread while the scan blocks. This
    /// needs the multi-threaded runtime. The sink is never called when aggregation
    /// fails.
    pub async fn run(
        &self,
        request: &AggregationRequest<'_>,
        sink: &dyn RecordSink,
    ) -> Result<RunReport> {
        let outcome = tokio::task::block_in_place(|| self.aggregate(request))?;
        let observations = outcome.observations.len();
        let submitted = sink.submit(outcome.observations).await?;

        if submitted.duplicates > 0 {
            warn!(
                product = %request.context.product_id,
                date = %request.context.date,
                duplicates = submitted.duplicates,
                "sink ignored duplicate observations"
            );
        }

        Ok(RunReport {
            windows: outcome.windows,
            workers: outcome.workers,
            zones: outcome.zone_stats.len(),
            observations,
            submitted,
        })
    }

    /// Sorted distinct zone codes of `zones`, using this coordinator's settings
    pub fn enumerate_zones(
        &self,
        zones: &dyn RasterSource,
        preferred_cores: Option<usize>,
    ) -> Result<Vec<ZoneCode>> {
        let parallel = ParallelConfig::resolve(&self.config, preferred_cores);
        enumerate_zones(zones, &self.config, &parallel)
    }
}

fn effective_mask_kind(request: &AggregationRequest<'_>) -> Result<MaskKind> {
    match (request.mask, request.mask_kind) {
        (Some(mask), MaskKind::None) => Err(RuZonalError::config(format!(
            "mask raster '{}' supplied without a mask kind",
            mask.id()
        ))),
        (None, MaskKind::Binary | MaskKind::Percent) => {
            debug!(
                mask_kind = %request.mask_kind,
                "no mask raster supplied, every zone pixel gets weight 1"
            );
            Ok(MaskKind::None)
        }
        (_, kind) => Ok(kind),
    }
}

fn check_dimensions(
    source: &dyn RasterSource,
    metadata: &RasterMetadata,
    expected: (usize, usize),
) -> Result<()> {
    if metadata.dimensions() == expected {
        Ok(())
    } else {
        Err(RuZonalError::DimensionMismatch {
            raster: source.id(),
            expected,
            found: metadata.dimensions(),
        })
    }
}

type WindowResult = Result<(Window, HashMap<ZoneCode, PartialZoneStat>)>;

/// Run every window on the pool and merge results as they arrive
fn fan_out(
    windows: &[Window],
    parallel: &ParallelConfig,
    zones: RasterHandle<'_>,
    mask: Option<RasterHandle<'_>>,
    product: RasterHandle<'_>,
    mask_kind: MaskKind,
) -> Result<StatsMerger> {
    let pool = parallel.build_pool()?;
    let cancelled = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<WindowResult>();

    let mut merger = StatsMerger::new();
    let mut failure: Option<RuZonalError> = None;

    std::thread::scope(|scope| {
        let pool = &pool;
        let cancelled = &cancelled;
        scope.spawn(move || {
            pool.install(|| {
                windows.par_iter().for_each_with(tx, |tx, window| {
                    if cancelled.load(Ordering::Relaxed) {
                        return;
                    }
                    let result =
                        compute_window_stats(window, &zones, mask.as_ref(), &product, mask_kind);
                    if result.is_err() {
                        cancelled.store(true, Ordering::Relaxed);
                    }
                    // receiver outlives every sender
                    let _ = tx.send(result.map(|partials| (*window, partials)));
                });
            });
        });

        for message in rx {
            match message {
                Ok((window, partials)) => {
                    if failure.is_some() {
                        continue;
                    }
                    debug!(
                        col_off = window.col_off,
                        row_off = window.row_off,
                        width = window.width,
                        height = window.height,
                        zones = partials.len(),
                        "window merged"
                    );
                    merger.extend(partials.into_values());
                }
                Err(e) => {
                    cancelled.store(true, Ordering::Relaxed);
                    if failure.is_none() {
                        warn!(error = %e, "window failed, aborting run");
                        failure = Some(e);
                    }
                }
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(merger),
    }
}
