//! Defines command-line interface options using `clap` for the RuZonal application.

use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use ru_zonal::statistics::MaskKind;
use std::path::PathBuf;

/// Windowed zonal statistics over product, mask and zone rasters
#[derive(Parser, Debug)]
#[command(
    author = "Sam Green",
    version,
    name = "RuZonal",
    about = "Per-zone aggregate statistics from large NetCDF rasters"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose (debug) logging. `RUST_LOG` takes precedence when set.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    pub json_logs: bool,

    /// Number of worker threads. Defaults to number of CPU cores.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    /// Upper bound for any worker count, including per-product preferences
    #[arg(long, global = true)]
    pub max_workers: Option<usize>,

    /// Window edge for rasters without native chunking
    #[arg(long, global = true)]
    pub block_edge: Option<usize>,

    /// Multiplier applied to the native or default window edge
    #[arg(long, global = true)]
    pub scale: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute per-zone observations for one product, mask and zone layer
    Aggregate(AggregateArgs),

    /// Print the sorted distinct zone codes of a zone raster
    Zones {
        /// Zone raster, formatted as <path-or-url>:<variable>
        #[arg(long, value_parser = parse_raster_arg)]
        zones: RasterArg,
    },

    /// Describe a raster and the parallel environment
    Info {
        /// Raster, formatted as <path-or-url>:<variable>
        #[arg(long, value_parser = parse_raster_arg)]
        raster: RasterArg,
    },
}

#[derive(ClapArgs, Debug)]
pub struct AggregateArgs {
    /// Product raster, formatted as <path-or-url>:<variable>
    #[arg(long, value_parser = parse_raster_arg)]
    pub product: Option<RasterArg>,

    /// Zone raster, formatted as <path-or-url>:<variable>
    #[arg(long, value_parser = parse_raster_arg)]
    pub zones: Option<RasterArg>,

    /// Mask raster, formatted as <path-or-url>:<variable>
    #[arg(long, value_parser = parse_raster_arg)]
    pub mask: Option<RasterArg>,

    /// How mask pixels are interpreted: none, binary or percent
    #[arg(long, value_parser = parse_mask_kind)]
    pub mask_kind: Option<MaskKind>,

    /// Date the observation represents (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub date: NaiveDate,

    /// Product identifier recorded in every observation
    #[arg(long)]
    pub product_id: String,

    /// Mask identifier recorded in every observation
    #[arg(long)]
    pub mask_id: Option<String>,

    /// Zone layer identifier recorded in every observation
    #[arg(long)]
    pub zone_layer_id: String,

    /// Catalog used to resolve rasters from their identifiers
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Core count for this product, clamped to --max-workers
    #[arg(long)]
    pub preferred_cores: Option<usize>,

    /// Append observations to this JSON-lines file. If not set, prints to terminal.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterArg {
    pub locator: String,
    pub variable: String,
}

fn parse_raster_arg(s: &str) -> Result<RasterArg, String> {
    match s.rsplit_once(':') {
        Some((locator, variable))
            if !locator.is_empty() && !variable.is_empty() && !variable.contains('/') =>
        {
            Ok(RasterArg {
                locator: locator.to_string(),
                variable: variable.to_string(),
            })
        }
        _ => Err("Invalid format: Expected '<path-or-url>:<variable>'.".to_string()),
    }
}

fn parse_mask_kind(s: &str) -> Result<MaskKind, String> {
    s.parse::<MaskKind>().map_err(|e| e.to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}': {} (expected YYYY-MM-DD)", s, e))
}
