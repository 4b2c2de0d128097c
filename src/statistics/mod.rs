//! Zonal statistics: per-window computation, merging, and zone enumeration
//!
//! # Organization
//!
//! - [`operations`]: mask kinds and the per-zone statistic type
//! - [`worker`]: partial statistics for one window
//! - [`merger`]: order-independent reduction of partials
//! - [`zones`]: distinct zone codes of a zone raster

pub mod merger;
pub mod operations;
pub mod worker;
pub mod zones;

pub use merger::{merge_zone_stats, StatsMerger};
pub use operations::{MaskKind, PartialZoneStat, ZoneCode, ZoneStat};
pub use worker::compute_window_stats;
pub use zones::{enumerate_zones, window_zone_codes};
