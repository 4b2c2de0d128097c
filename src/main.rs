//! Entry point for the RuZonal application.
//! Handles CLI parsing, logging setup, and dispatches aggregation, zone listing and raster info.

use clap::Parser;
use ru_zonal::catalog::{resolve_mask, JsonCatalogSource, RasterCatalog};
use ru_zonal::prelude::*;
use ru_zonal::{get_parallel_info, ParallelConfig, RasterLocator};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{AggregateArgs, Args, Command, RasterArg};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs);

    // stdout carries observation records, everything else goes to stderr
    eprintln!(
        r#"
------------------------------------------------------------------
            ______      ______                 _
            | ___ \    |___  /                | |
            | |_/ /   _   / /  ___  _ __   __ _| |
            |    / | | | / /  / _ \| '_ \ / _` | |
            | |\ \ |_| |./ /__| (_) | | | | (_| | |
            \_| \_\__,_|\_____/\___/|_| |_|\__,_|_|
                 Rust-based zonal statistics tool
------------------------------------------------------------------
                        "#
    );

    let config = build_config(&args);
    config.validate()?;
    let coordinator = AggregationCoordinator::new(config);

    match args.command {
        Command::Aggregate(aggregate) => run_aggregate(&coordinator, aggregate).await?,
        Command::Zones { zones } => {
            let raster = open_raster(&zones)?;
            let codes = coordinator.enumerate_zones(&raster, None)?;
            eprintln!("✅ {} distinct zone codes in {}", codes.len(), raster.id());
            for code in codes {
                println!("{}", code);
            }
        }
        Command::Info { raster } => {
            let raster = open_raster(&raster)?;
            raster.metadata()?.print(&raster.id());
            get_parallel_info().print_info();
            let workers = ParallelConfig::resolve(coordinator.config(), None);
            println!("   Workers per run: {}", workers.num_threads);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_config(args: &Args) -> AggregationConfig {
    let mut config = AggregationConfig::default();
    if let Some(threads) = args.threads {
        config = config.with_workers(threads);
    }
    if let Some(max_workers) = args.max_workers {
        config = config.with_max_workers(max_workers);
    }
    if let Some(edge) = args.block_edge {
        config = config.with_default_block_edge(edge);
    }
    if let Some(scale) = args.scale {
        config = config.with_scale_factor(scale);
    }
    config
}

fn open_raster(arg: &RasterArg) -> ru_zonal::Result<NetCDFRaster> {
    Ok(NetCDFRaster::new(
        RasterLocator::parse(&arg.locator)?,
        arg.variable.clone(),
    ))
}

async fn run_aggregate(
    coordinator: &AggregationCoordinator,
    args: AggregateArgs,
) -> ru_zonal::Result<()> {
    let catalog = args
        .catalog
        .as_ref()
        .map(|path| RasterCatalog::new(JsonCatalogSource::new(path)));

    // explicit rasters win over catalog entries
    let product = match (&args.product, &catalog) {
        (Some(arg), _) => open_raster(arg)?,
        (None, Some(catalog)) => catalog.product(&args.product_id)?.raster(),
        (None, None) => return Err(RuZonalError::config("--product or --catalog is required")),
    };
    let zones = match (&args.zones, &catalog) {
        (Some(arg), _) => open_raster(arg)?,
        (None, Some(catalog)) => catalog.zone_layer(&args.zone_layer_id)?.raster(),
        (None, None) => return Err(RuZonalError::config("--zones or --catalog is required")),
    };

    let explicit_mask = args.mask.as_ref().map(open_raster).transpose()?;
    let mask = resolve_mask(explicit_mask, args.mask_id.as_deref(), catalog.as_ref())?;

    let preferred_cores = match (args.preferred_cores, &catalog) {
        (Some(cores), _) => Some(cores),
        (None, Some(catalog)) => catalog
            .product(&args.product_id)
            .ok()
            .and_then(|entry| entry.preferred_cores),
        (None, None) => None,
    };

    let context = ObservationContext::new(
        args.product_id.clone(),
        mask.as_ref().map(|m| m.id.clone()),
        args.zone_layer_id.clone(),
        args.date,
    );
    let mut request = AggregationRequest::new(&product, &zones, context);
    if let Some(mask) = &mask {
        let kind = args.mask_kind.or(mask.mask_kind).unwrap_or(MaskKind::None);
        request = request.with_mask(&mask.raster, kind);
    }
    if let Some(cores) = preferred_cores {
        request = request.with_preferred_cores(cores);
    }

    match &args.output {
        Some(path) => {
            let sink = JsonLinesSink::new(path);
            let report = coordinator.run(&request, &sink).await?;
            info!(?report, "run complete");
            println!(
                "✅ {} observations from {} windows on {} workers: {} inserted, {} duplicates skipped",
                report.observations,
                report.windows,
                report.workers,
                report.submitted.inserted,
                report.submitted.duplicates
            );
            println!("✅ Saved observations to {}", path.display());
        }
        None => {
            let outcome = coordinator.aggregate(&request)?;
            for observation in &outcome.observations {
                println!("{}", serde_json::to_string(observation)?);
            }
            eprintln!(
                "✅ {} observations from {} windows ({} zones without arable pixels omitted)",
                outcome.observations.len(),
                outcome.windows,
                outcome.omitted_zones()
            );
        }
    }

    Ok(())
}
