//! RuZonal: windowed zonal statistics over large rasters
//!
//! RuZonal computes, for every zone of a zone-identifier raster, the mean of a
//! product raster (optionally masked by a boolean or fractional coverage raster) and
//! turns the results into dated observation records. Large rasters are tiled into
//! windows which are processed in parallel and merged in any order.
//!
//! ## Key Features
//!
//! - **Windowed I/O**: windows follow the native block size of the raster
//! - **Parallel Processing**: a bounded Rayon pool per run
//! - **Order-independent merge**: partial statistics combine associatively
//! - **Masking**: none, binary (`> 0` arable, `== 1` contributes) or percent (weighted)
//! - **NetCDF rasters**: local files or OPeNDAP URLs
//!
//! ## Module Organization
//!
//! - [`window`]: window planning
//! - [`raster`]: raster sources (NetCDF, in-memory)
//! - [`statistics`]: per-window worker, merger, zone enumeration
//! - [`coordinator`]: orchestration of a full run
//! - [`observation`]: output records
//! - [`sink`]: record persistence collaborators
//! - [`catalog`]: refreshable lookup of known rasters
//! - [`config`] and [`parallel`]: run configuration and worker pools
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ru_zonal::prelude::*;
//! use chrono::NaiveDate;
//!
//! let product = NetCDFRaster::open_path("ndvi.nc", "ndvi").unwrap();
//! let zones = NetCDFRaster::open_path("admin1.nc", "zone").unwrap();
//! let mask = NetCDFRaster::open_path("cropland.nc", "mask").unwrap();
//!
//! let context = ObservationContext::new(
//!     "ndvi",
//!     Some("cropland".to_string()),
//!     "admin1",
//!     NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
//! );
//! let request = AggregationRequest::new(&product, &zones, context)
//!     .with_mask(&mask, MaskKind::Binary);
//!
//! let coordinator = AggregationCoordinator::new(AggregationConfig::default());
//! let outcome = coordinator.aggregate(&request).unwrap();
//! for observation in &outcome.observations {
//!     println!("{} -> {:.3}", observation.zone_code, observation.mean_value);
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod observation;
pub mod parallel;
pub mod raster;
pub mod sink;
pub mod statistics;
pub mod window;

pub use catalog::{
    resolve_mask, CatalogEntry, CatalogSource, EntryKind, JsonCatalogSource, RasterCatalog,
    ResolvedMask,
};
pub use config::AggregationConfig;
pub use coordinator::{AggregationCoordinator, AggregationOutcome, AggregationRequest, RunReport};
pub use errors::{Result, RuZonalError};
pub use observation::{Observation, ObservationContext, ObservationKey};
pub use parallel::{get_parallel_info, ParallelConfig, ParallelInfo};
pub use raster::{MemoryRaster, NetCDFRaster, RasterLocator, RasterMetadata, RasterSource};
pub use sink::{JsonLinesSink, MemorySink, RecordSink, SubmitReport};
pub use statistics::{MaskKind, PartialZoneStat, StatsMerger, ZoneCode, ZoneStat};
pub use window::{Window, WindowPlanner};

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::AggregationConfig;
    pub use crate::coordinator::{AggregationCoordinator, AggregationRequest};
    pub use crate::errors::{Result, RuZonalError};
    pub use crate::observation::{Observation, ObservationContext};
    pub use crate::raster::{MemoryRaster, NetCDFRaster, RasterSource};
    pub use crate::sink::{JsonLinesSink, MemorySink, RecordSink};
    pub use crate::statistics::{MaskKind, StatsMerger, ZoneStat};
    pub use crate::window::Window;
}
