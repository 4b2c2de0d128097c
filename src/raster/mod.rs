//! Read-only access to single-band raster grids
//!
//! Workers never share raster state: a [`RasterSource`] is a description of where the
//! pixels live, and every [`RasterSource::read_window`] call opens and releases its own
//! handle. This keeps resource use bounded no matter how many windows a run has.
//!
//! - [`memory`]: in-memory grids for synthetic data and tests
//! - [`netcdf`]: 2-D (or banded 3-D) NetCDF variables, local or over OPeNDAP

pub mod memory;
pub mod netcdf;

pub use memory::MemoryRaster;
pub use self::netcdf::{write_netcdf_raster, NetCDFRaster};

use crate::errors::{Result, RuZonalError};
use crate::window::Window;
use ndarray::Array2;
use std::fmt;
use std::path::PathBuf;

/// Where a raster lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterLocator {
    /// A file on the local filesystem
    Local(PathBuf),
    /// A remote dataset reachable through netCDF-C (OPeNDAP over http/https)
    Remote(String),
}

impl RasterLocator {
    /// Parse a path or URL
    ///
    /// # Errors
    ///
    /// Object-store schemes (`s3://`, `gs://`, `az://`) are rejected with a
    /// configuration error; staging those files is up to the caller.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RuZonalError::config("raster locator is empty"));
        }

        if let Some(path) = trimmed.strip_prefix("file://") {
            return Ok(RasterLocator::Local(PathBuf::from(path)));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(RasterLocator::Remote(trimmed.to_string()));
        }
        if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(RuZonalError::config(format!(
                "unsupported raster locator scheme '{}://' (stage object-store rasters locally first)",
                scheme
            )));
        }

        Ok(RasterLocator::Local(PathBuf::from(trimmed)))
    }

    /// The string handed to netCDF-C when opening
    pub fn as_open_target(&self) -> String {
        match self {
            RasterLocator::Local(path) => path.display().to_string(),
            RasterLocator::Remote(url) => url.clone(),
        }
    }
}

impl fmt::Display for RasterLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_open_target())
    }
}

/// Grid description of a raster
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub dtype: String,
    pub nodata: Option<f64>,
    /// Native storage block edge, `None` for untiled/contiguous storage
    pub block_edge: Option<usize>,
}

impl RasterMetadata {
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn print(&self, name: &str) {
        println!("Raster: {}", name);
        println!("  Size: {} x {} ({} pixels)", self.width, self.height, self.pixel_count());
        println!("  Data type: {}", self.dtype);
        match self.nodata {
            Some(nodata) => println!("  Nodata: {}", nodata),
            None => println!("  Nodata: (none)"),
        }
        match self.block_edge {
            Some(edge) => println!("  Block edge: {}", edge),
            None => println!("  Block edge: (untiled)"),
        }
    }
}

/// A single-band raster that can be read one window at a time
pub trait RasterSource: Send + Sync {
    /// Identity used in logs and error messages
    fn id(&self) -> String;

    /// Read the grid description
    fn metadata(&self) -> Result<RasterMetadata>;

    /// Read one window as a `height x width` array
    fn read_window(&self, window: &Window) -> Result<Array2<f64>>;
}

/// A pixel is valid when it is a number and differs from the nodata sentinel
#[inline]
pub fn is_valid(value: f64, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return false;
    }
    match nodata {
        Some(sentinel) => value != sentinel,
        None => true,
    }
}

pub(crate) fn check_window(raster: &str, window: &Window, width: usize, height: usize) -> Result<()> {
    if window.fits(width, height) {
        Ok(())
    } else {
        Err(RuZonalError::read(
            raster,
            format!(
                "window {:?} exceeds the {}x{} grid",
                window, width, height
            ),
        ))
    }
}

/// A raster opened for one run: its source plus the metadata read once up front
#[derive(Clone, Copy)]
pub struct RasterHandle<'a> {
    pub source: &'a dyn RasterSource,
    pub nodata: Option<f64>,
    pub width: usize,
    pub height: usize,
}

impl<'a> RasterHandle<'a> {
    /// Read the metadata of `source` and bind it
    pub fn open(source: &'a dyn RasterSource) -> Result<Self> {
        let metadata = source.metadata()?;
        Ok(Self::from_metadata(source, &metadata))
    }

    pub fn from_metadata(source: &'a dyn RasterSource, metadata: &RasterMetadata) -> Self {
        Self {
            source,
            nodata: metadata.nodata,
            width: metadata.width,
            height: metadata.height,
        }
    }

    /// Read a window, checking the backend returned the requested shape
    pub fn read(&self, window: &Window) -> Result<Array2<f64>> {
        let pixels = self.source.read_window(window)?;
        if pixels.dim() != (window.height, window.width) {
            return Err(RuZonalError::read(
                self.source.id(),
                format!(
                    "window {:?} returned {:?} pixels",
                    window,
                    pixels.dim()
                ),
            ));
        }
        Ok(pixels)
    }

    #[inline]
    pub fn is_valid(&self, value: f64) -> bool {
        is_valid(value, self.nodata)
    }
}

impl fmt::Debug for RasterHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterHandle")
            .field("source", &self.source.id())
            .field("nodata", &self.nodata)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
