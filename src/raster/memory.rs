//! In-memory rasters

use super::{check_window, RasterMetadata, RasterSource};
use crate::errors::{Result, RuZonalError};
use crate::window::Window;
use ndarray::{s, Array2};
use std::sync::Arc;

/// A raster held in memory, cheap to clone and share across workers
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    name: String,
    data: Arc<Array2<f64>>,
    nodata: Option<f64>,
    block_edge: Option<usize>,
}

impl MemoryRaster {
    /// Wrap a `height x width` array
    pub fn new(name: impl Into<String>, data: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(data),
            nodata: None,
            block_edge: None,
        }
    }

    /// Build from row-major values
    ///
    /// # Errors
    ///
    /// Returns an `ArrayError` if `values.len() != width * height`.
    pub fn from_vec(
        name: impl Into<String>,
        width: usize,
        height: usize,
        values: Vec<f64>,
    ) -> Result<Self> {
        let data = Array2::from_shape_vec((height, width), values)?;
        Ok(Self::new(name, data))
    }

    /// A `width x height` raster filled with one value
    pub fn filled(name: impl Into<String>, width: usize, height: usize, value: f64) -> Self {
        Self::new(name, Array2::from_elem((height, width), value))
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_block_edge(mut self, edge: usize) -> Self {
        self.block_edge = Some(edge);
        self
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }
}

impl RasterSource for MemoryRaster {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn metadata(&self) -> Result<RasterMetadata> {
        if self.block_edge == Some(0) {
            return Err(RuZonalError::read(&self.name, "block edge must be positive"));
        }
        let (height, width) = self.data.dim();
        Ok(RasterMetadata {
            width,
            height,
            dtype: "f64".to_string(),
            nodata: self.nodata,
            block_edge: self.block_edge,
        })
    }

    fn read_window(&self, window: &Window) -> Result<Array2<f64>> {
        let (height, width) = self.data.dim();
        check_window(&self.name, window, width, height)?;
        Ok(self
            .data
            .slice(s![window.row_off..window.row_end(), window.col_off..window.col_end()])
            .to_owned())
    }
}
