use chrono::NaiveDate;
use ndarray::{Array2, Array3};
use netcdf::create;
use ru_zonal::prelude::*;
use ru_zonal::raster::write_netcdf_raster;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

const WIDTH: usize = 6;
const HEIGHT: usize = 5;

fn zone_grid() -> Array2<f64> {
    Array2::from_shape_vec(
        (HEIGHT, WIDTH),
        vec![
            1.0, 1.0, 1.0, 2.0, 2.0, 2.0, //
            1.0, 1.0, 1.0, 2.0, 2.0, 2.0, //
            3.0, 3.0, 0.0, 0.0, 2.0, 2.0, //
            3.0, 3.0, 4.0, 4.0, 4.0, 4.0, //
            3.0, 3.0, 4.0, 4.0, 4.0, 4.0,
        ],
    )
    .expect("zone grid shape")
}

fn product_grid() -> Array2<f64> {
    Array2::from_shape_fn((HEIGHT, WIDTH), |(row, col)| {
        if row == 4 && col == 5 {
            -9999.0
        } else {
            (row * WIDTH + col) as f64 * 0.5
        }
    })
}

fn mask_grid() -> Array2<f64> {
    Array2::from_shape_vec(
        (HEIGHT, WIDTH),
        vec![
            1.0, 1.0, 0.0, 1.0, 2.0, 1.0, //
            1.0, 255.0, 1.0, 1.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, 1.0, 1.0, 1.0, //
            0.0, 255.0, 1.0, 2.0, 1.0, 1.0, //
            0.0, 0.0, 1.0, 1.0, 1.0, 1.0,
        ],
    )
    .expect("mask grid shape")
}

fn context() -> ObservationContext {
    ObservationContext::new(
        "ndvi",
        Some("cropland".to_string()),
        "admin1",
        NaiveDate::from_ymd_opt(2024, 7, 15).expect("valid date"),
    )
}

#[test]
fn test_netcdf_raster_metadata_and_windows() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("product.nc");

    write_netcdf_raster(&path, "ndvi", &product_grid(), Some(-9999.0), Some(2))
        .expect("Failed to write product raster");

    let raster = NetCDFRaster::open_path(path.to_str().expect("utf-8 path"), "ndvi")
        .expect("Failed to build raster");
    let metadata = raster.metadata().expect("Failed to read metadata");

    assert_eq!(metadata.dimensions(), (WIDTH, HEIGHT));
    assert_eq!(metadata.nodata, Some(-9999.0));
    // chunked storage reports its chunk edge as the native block edge
    assert_eq!(metadata.block_edge, Some(2));

    let window = Window::new(3, 1, 3, 2);
    let pixels = raster.read_window(&window).expect("Failed to read window");
    assert_eq!(pixels.dim(), (2, 3));
    assert_eq!(pixels[[0, 0]], product_grid()[[1, 3]]);
    assert_eq!(pixels[[1, 2]], product_grid()[[2, 5]]);

    // windows outside the grid are read errors, not panics
    let err = raster
        .read_window(&Window::new(4, 4, 3, 3))
        .expect_err("window outside grid must fail");
    assert!(!err.is_configuration_error());

    println!("✅ NetCDF raster metadata and window reads work");
}

#[test]
fn test_netcdf_band_selection() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("banded.nc");

    let data: Vec<f64> = (0..2 * 3 * 4).map(|v| v as f64).collect();
    {
        let mut file = create(&path).expect("Failed to create NetCDF file");
        file.add_dimension("band", 2).expect("Failed to add dimension band");
        file.add_dimension("y", 3).expect("Failed to add dimension y");
        file.add_dimension("x", 4).expect("Failed to add dimension x");

        let mut var = file
            .add_variable::<f64>("zone", &["band", "y", "x"])
            .expect("Failed to add variable");
        let array = Array3::from_shape_vec((2, 3, 4), data).expect("Failed to shape data");
        var.put(array.view(), ..).expect("Failed to write data");
    }

    let locator = path.to_str().expect("utf-8 path");
    let second = NetCDFRaster::open_path(locator, "zone")
        .expect("Failed to build raster")
        .with_band(1);
    assert_eq!(second.metadata().expect("metadata").dimensions(), (4, 3));

    let pixels = second
        .read_window(&Window::full(4, 3))
        .expect("Failed to read band");
    assert_eq!(pixels[[0, 0]], 12.0);
    assert_eq!(pixels[[2, 3]], 23.0);

    // a multi-band variable needs an explicit band
    let unbanded = NetCDFRaster::open_path(locator, "zone").expect("Failed to build raster");
    assert!(unbanded.metadata().is_err());

    let out_of_range = NetCDFRaster::open_path(locator, "zone")
        .expect("Failed to build raster")
        .with_band(2);
    assert!(out_of_range.metadata().is_err());

    println!("✅ Banded NetCDF variables select a single band");
}

#[test]
fn test_missing_inputs_are_read_errors() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("zones.nc");
    write_netcdf_raster(&path, "zone", &zone_grid(), Some(0.0), None)
        .expect("Failed to write zone raster");
    let locator = path.to_str().expect("utf-8 path");

    let missing_var = NetCDFRaster::open_path(locator, "nope").expect("Failed to build raster");
    assert!(matches!(
        missing_var.metadata(),
        Err(RuZonalError::VariableNotFound { .. })
    ));

    let missing_file = NetCDFRaster::open_path(
        temp_dir.path().join("absent.nc").to_str().expect("utf-8 path"),
        "zone",
    )
    .expect("Failed to build raster");
    assert!(matches!(
        missing_file.metadata(),
        Err(RuZonalError::RasterRead { .. })
    ));
}

#[test]
fn test_netcdf_aggregation_matches_in_memory() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let product_path = temp_dir.path().join("ndvi.nc");
    let mask_path = temp_dir.path().join("cropland.nc");
    let zones_path = temp_dir.path().join("admin1.nc");

    write_netcdf_raster(&product_path, "ndvi", &product_grid(), Some(-9999.0), Some(2))
        .expect("Failed to write product raster");
    write_netcdf_raster(&mask_path, "mask", &mask_grid(), Some(255.0), Some(4))
        .expect("Failed to write mask raster");
    write_netcdf_raster(&zones_path, "zone", &zone_grid(), Some(0.0), Some(3))
        .expect("Failed to write zone raster");

    let product = NetCDFRaster::open_path(product_path.to_str().unwrap(), "ndvi").unwrap();
    let mask = NetCDFRaster::open_path(mask_path.to_str().unwrap(), "mask").unwrap();
    let zones = NetCDFRaster::open_path(zones_path.to_str().unwrap(), "zone").unwrap();

    let coordinator = AggregationCoordinator::new(AggregationConfig::default().with_workers(3));
    let request = AggregationRequest::new(&product, &zones, context())
        .with_mask(&mask, MaskKind::Binary);
    let from_files = coordinator.aggregate(&request).expect("NetCDF aggregation failed");

    // 2x2 product chunks over a 6x5 grid
    assert_eq!(from_files.windows, 9);

    let memory_product = MemoryRaster::new("ndvi", product_grid()).with_nodata(-9999.0);
    let memory_mask = MemoryRaster::new("mask", mask_grid()).with_nodata(255.0);
    let memory_zones = MemoryRaster::new("zones", zone_grid()).with_nodata(0.0);
    let request = AggregationRequest::new(&memory_product, &memory_zones, context())
        .with_mask(&memory_mask, MaskKind::Binary);
    let in_memory = coordinator.aggregate(&request).expect("in-memory aggregation failed");
    assert_eq!(in_memory.windows, 1);

    let codes: Vec<i64> = from_files.observations.iter().map(|o| o.zone_code).collect();
    // zone 3 only covers mask 0 or nodata
    assert_eq!(codes, vec![1, 2, 4]);
    assert_eq!(from_files.observations.len(), in_memory.observations.len());
    for (file_obs, mem_obs) in from_files.observations.iter().zip(&in_memory.observations) {
        assert_eq!(file_obs.key(), mem_obs.key());
        assert_eq!(file_obs.arable_pixel_count, mem_obs.arable_pixel_count);
        assert!((file_obs.mean_value - mem_obs.mean_value).abs() < 1e-9);
        assert!((file_obs.percent_arable - mem_obs.percent_arable).abs() < 1e-9);
    }

    assert_eq!(from_files.omitted_zones(), 1);
    assert!(from_files.zone_stats.iter().any(|s| s.zone_code == 3 && s.arable_pixel_count == 0));

    println!("✅ NetCDF aggregation matches the in-memory run");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_appends_json_lines_once() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let product_path = temp_dir.path().join("ndvi.nc");
    let zones_path = temp_dir.path().join("admin1.nc");
    let output = temp_dir.path().join("observations.jsonl");

    write_netcdf_raster(&product_path, "ndvi", &product_grid(), Some(-9999.0), Some(2))
        .expect("Failed to write product raster");
    write_netcdf_raster(&zones_path, "zone", &zone_grid(), Some(0.0), Some(2))
        .expect("Failed to write zone raster");

    let product = NetCDFRaster::open_path(product_path.to_str().unwrap(), "ndvi").unwrap();
    let zones = NetCDFRaster::open_path(zones_path.to_str().unwrap(), "zone").unwrap();
    let unmasked = ObservationContext {
        mask_id: None,
        ..context()
    };
    let request = AggregationRequest::new(&product, &zones, unmasked);
    let coordinator = AggregationCoordinator::default();
    let sink = JsonLinesSink::new(&output);

    let report = coordinator.run(&request, &sink).await.expect("run failed");
    assert_eq!(report.zones, 4);
    assert_eq!(report.observations, 4);
    assert_eq!(report.submitted.inserted, 4);

    // the same date again adds nothing
    let report = coordinator.run(&request, &sink).await.expect("rerun failed");
    assert_eq!(report.submitted.inserted, 0);
    assert_eq!(report.submitted.duplicates, 4);

    let content = std::fs::read_to_string(&output).expect("Failed to read output");
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid JSON line"))
        .collect();
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|line| line["mask_id"].is_null()));

    // without a mask every zone pixel is arable; zone 4 has one product nodata pixel
    let zone_four = lines
        .iter()
        .find(|line| line["zone_code"] == 4)
        .expect("zone 4 present");
    assert_eq!(zone_four["arable_pixel_count"], 8);
    let percent = zone_four["percent_arable"].as_f64().expect("percent");
    assert!((percent - 87.5).abs() < 1e-9);

    println!("✅ Observations appended once to {}", output.display());
}

fn run_cli(dir: &Path, extra: &[&str]) -> Output {
    let product = format!("{}:ndvi", dir.join("ndvi.nc").display());
    let zones = format!("{}:zone", dir.join("admin1.nc").display());
    Command::new(env!("CARGO_BIN_EXE_ru_zonal"))
        .args(["aggregate", "--product", &product, "--zones", &zones])
        .args(["--date", "2024-07-15", "--product-id", "ndvi", "--zone-layer-id", "admin1"])
        .args(extra)
        .output()
        .expect("Failed to launch ru_zonal")
}

fn write_cli_inputs(dir: &Path) {
    write_netcdf_raster(&dir.join("ndvi.nc"), "ndvi", &product_grid(), Some(-9999.0), Some(2))
        .expect("Failed to write product raster");
    write_netcdf_raster(&dir.join("cropland.nc"), "mask", &mask_grid(), Some(255.0), None)
        .expect("Failed to write mask raster");
    write_netcdf_raster(&dir.join("admin1.nc"), "zone", &zone_grid(), Some(0.0), None)
        .expect("Failed to write zone raster");
}

#[test]
fn test_cli_stdout_is_json_lines_only() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_cli_inputs(temp_dir.path());

    let mask = format!("{}:mask", temp_dir.path().join("cropland.nc").display());
    let output = run_cli(
        temp_dir.path(),
        &["--mask", &mask, "--mask-id", "cropland", "--mask-kind", "binary"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).expect("utf-8 stdout");
    let records: Vec<Observation> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("every stdout line is a record"))
        .collect();
    let codes: Vec<i64> = records.iter().map(|o| o.zone_code).collect();
    assert_eq!(codes, vec![1, 2, 4]);
    assert!(records.iter().all(|o| o.mask_id.as_deref() == Some("cropland")));

    // the banner and the summary still reach the user
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("zonal statistics tool"));

    println!("✅ CLI stdout carries only observation records");
}

#[test]
fn test_cli_rejects_unpaired_mask_id_and_raster() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_cli_inputs(temp_dir.path());

    // an id with nothing to resolve it would label unmasked means as masked
    let output = run_cli(temp_dir.path(), &["--mask-id", "cropland", "--mask-kind", "binary"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());

    // a mask raster with no id would file masked means under the unmasked key
    let mask = format!("{}:mask", temp_dir.path().join("cropland.nc").display());
    let output = run_cli(temp_dir.path(), &["--mask", &mask, "--mask-kind", "binary"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());

    println!("✅ CLI refuses a mask id without its raster and vice versa");
}
