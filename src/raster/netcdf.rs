//! NetCDF-backed rasters
//!
//! A raster is one variable of a NetCDF file: either 2-D `(y, x)` or 3-D
//! `(band, y, x)` with a selected band. Nodata comes from `_FillValue`, falling back
//! to `missing_value`. The native block edge is the row chunk length of a chunked
//! variable.

use super::{check_window, RasterLocator, RasterMetadata, RasterSource};
use crate::errors::{Result, RuZonalError};
use crate::window::Window;
use ndarray::Array2;
use netcdf::{AttributeValue, Variable};
use std::{fs, path::Path};

/// A single-band view of a NetCDF variable
#[derive(Debug, Clone)]
pub struct NetCDFRaster {
    locator: RasterLocator,
    variable: String,
    band: Option<usize>,
}

impl NetCDFRaster {
    pub fn new(locator: RasterLocator, variable: impl Into<String>) -> Self {
        Self {
            locator,
            variable: variable.into(),
            band: None,
        }
    }

    /// Parse `locator` and point at `variable`
    pub fn open_path(locator: &str, variable: impl Into<String>) -> Result<Self> {
        Ok(Self::new(RasterLocator::parse(locator)?, variable))
    }

    /// Select a band of a 3-D `(band, y, x)` variable
    pub fn with_band(mut self, band: usize) -> Self {
        self.band = Some(band);
        self
    }

    pub fn locator(&self) -> &RasterLocator {
        &self.locator
    }

    pub fn variable_name(&self) -> &str {
        &self.variable
    }

    fn open(&self) -> Result<netcdf::File> {
        netcdf::open(self.locator.as_open_target())
            .map_err(|e| RuZonalError::read(self.id(), format!("cannot open: {}", e)))
    }

    fn variable<'f>(&self, file: &'f netcdf::File) -> Result<Variable<'f>> {
        file.variable(&self.variable)
            .ok_or_else(|| RuZonalError::VariableNotFound {
                var: format!("{} in {}", self.variable, self.locator),
            })
    }

    /// `(height, width)` of the grid, checking the band selection
    fn grid_shape(&self, var: &Variable) -> Result<(usize, usize)> {
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        match (shape.as_slice(), self.band) {
            ([height, width], None) => Ok((*height, *width)),
            ([bands, height, width], Some(band)) if band < *bands => Ok((*height, *width)),
            ([1, height, width], None) => Ok((*height, *width)),
            ([bands, _, _], Some(band)) => Err(RuZonalError::read(
                self.id(),
                format!("band {} out of range ({} bands)", band, bands),
            )),
            ([bands, _, _], None) => Err(RuZonalError::read(
                self.id(),
                format!("variable has {} bands; select one", bands),
            )),
            _ => Err(RuZonalError::read(
                self.id(),
                format!("expected a 2-D or 3-D variable, found shape {:?}", shape),
            )),
        }
    }
}

impl RasterSource for NetCDFRaster {
    fn id(&self) -> String {
        match self.band {
            Some(band) => format!("{}:{}[{}]", self.locator, self.variable, band),
            None => format!("{}:{}", self.locator, self.variable),
        }
    }

    fn metadata(&self) -> Result<RasterMetadata> {
        let file = self.open()?;
        let var = self.variable(&file)?;
        let (height, width) = self.grid_shape(&var)?;

        let block_edge = var
            .chunking()?
            .and_then(|chunks| chunks.get(chunks.len().saturating_sub(2)).copied())
            .filter(|&edge| edge > 0);

        Ok(RasterMetadata {
            width,
            height,
            dtype: format!("{:?}", var.vartype()).to_lowercase(),
            nodata: nodata_value(&var),
            block_edge,
        })
    }

    fn read_window(&self, window: &Window) -> Result<Array2<f64>> {
        let file = self.open()?;
        let var = self.variable(&file)?;
        let (height, width) = self.grid_shape(&var)?;
        check_window(&self.id(), window, width, height)?;

        let rows = window.row_off..window.row_end();
        let cols = window.col_off..window.col_end();
        let values = if var.dimensions().len() == 3 {
            let band = self.band.unwrap_or(0);
            var.get_values::<f64, _>((band..band + 1, rows, cols))
        } else {
            var.get_values::<f64, _>((rows, cols))
        }
        .map_err(|e| RuZonalError::read(self.id(), format!("window {:?}: {}", window, e)))?;

        Ok(Array2::from_shape_vec((window.height, window.width), values)?)
    }
}

fn nodata_value(var: &Variable) -> Option<f64> {
    ["_FillValue", "missing_value"].iter().find_map(|name| {
        var.attribute(name)
            .and_then(|attr| attr.value().ok())
            .and_then(|value| match value {
                AttributeValue::Double(v) => Some(v),
                AttributeValue::Float(v) => Some(f64::from(v)),
                AttributeValue::Int(v) => Some(f64::from(v)),
                AttributeValue::Uint(v) => Some(f64::from(v)),
                AttributeValue::Short(v) => Some(f64::from(v)),
                AttributeValue::Ushort(v) => Some(f64::from(v)),
                AttributeValue::Schar(v) => Some(f64::from(v)),
                AttributeValue::Uchar(v) => Some(f64::from(v)),
                AttributeValue::Longlong(v) => Some(v as f64),
                AttributeValue::Ulonglong(v) => Some(v as f64),
                _ => None,
            })
    })
}

/// Write a `height x width` grid as a 2-D `(y, x)` NetCDF variable
///
/// Any existing file at `output_path` is replaced. With `chunk_edge` the variable is
/// stored in square chunks, which readers report as the native block edge.
pub fn write_netcdf_raster(
    output_path: &Path,
    variable: &str,
    data: &Array2<f64>,
    fill_value: Option<f64>,
    chunk_edge: Option<usize>,
) -> Result<()> {
    if output_path.exists() {
        fs::remove_file(output_path)?;
    }

    let (height, width) = data.dim();
    let mut file = netcdf::create(output_path)?;
    file.add_dimension("y", height)?;
    file.add_dimension("x", width)?;

    let mut var = file.add_variable::<f64>(variable, &["y", "x"])?;
    if let Some(edge) = chunk_edge {
        var.set_chunking(&[edge.min(height.max(1)), edge.min(width.max(1))])?;
    }
    if let Some(fv) = fill_value {
        var.put_attribute("_FillValue", fv)?;
    }
    var.put(data.view(), ..)?;

    file.add_attribute(
        "history",
        format!("Created by RuZonal on {}", chrono::Utc::now().to_rfc3339()),
    )?;

    Ok(())
}
