//! Tiling of a raster pixel grid into processing windows
//!
//! The planner walks columns in outer strides and rows in inner strides of the
//! effective edge. Trailing windows are clipped to the remainder, so the windows
//! partition the grid exactly. Downstream stages must not depend on window order.

use crate::config::AggregationConfig;
use crate::errors::{Result, RuZonalError};
use crate::raster::RasterMetadata;

/// A rectangle of pixels, `[col_off, col_off + width) x [row_off, row_off + height)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub const fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    /// Window covering a whole `width x height` grid
    pub const fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn area(&self) -> usize {
        self.width * self.height
    }

    pub const fn col_end(&self) -> usize {
        self.col_off + self.width
    }

    pub const fn row_end(&self) -> usize {
        self.row_off + self.height
    }

    pub const fn contains(&self, col: usize, row: usize) -> bool {
        col >= self.col_off && col < self.col_end() && row >= self.row_off && row < self.row_end()
    }

    /// True if the window lies inside a `width x height` grid
    pub const fn fits(&self, width: usize, height: usize) -> bool {
        self.col_end() <= width && self.row_end() <= height
    }
}

/// Produces the window partition for a raster grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlanner {
    width: usize,
    height: usize,
    edge: usize,
}

impl WindowPlanner {
    /// Planner for a grid with an explicit effective edge
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `edge` is zero.
    pub fn new(width: usize, height: usize, edge: usize) -> Result<Self> {
        if edge == 0 {
            return Err(RuZonalError::config("window edge must be positive"));
        }
        Ok(Self {
            width,
            height,
            edge,
        })
    }

    /// Planner sized from the raster's native blocks, or the configured default edge
    /// for untiled rasters, scaled by the configured factor.
    pub fn for_metadata(metadata: &RasterMetadata, config: &AggregationConfig) -> Result<Self> {
        let edge = effective_edge(
            metadata.block_edge,
            config.default_block_edge,
            config.scale_factor,
        )?;
        Self::new(metadata.width, metadata.height, edge)
    }

    pub const fn edge(&self) -> usize {
        self.edge
    }

    pub fn window_count(&self) -> usize {
        self.width.div_ceil(self.edge) * self.height.div_ceil(self.edge)
    }

    pub fn windows(&self) -> Vec<Window> {
        let mut windows = Vec::with_capacity(self.window_count());
        for col_off in (0..self.width).step_by(self.edge) {
            let width = self.edge.min(self.width - col_off);
            for row_off in (0..self.height).step_by(self.edge) {
                let height = self.edge.min(self.height - row_off);
                windows.push(Window::new(col_off, row_off, width, height));
            }
        }
        windows
    }
}

/// `B * K` for tiled rasters, `D * K` for untiled ones
///
/// # Errors
///
/// Returns a configuration error if the result is zero or overflows.
pub fn effective_edge(block_edge: Option<usize>, default_edge: usize, scale: usize) -> Result<usize> {
    let base = block_edge.filter(|&b| b > 0).unwrap_or(default_edge);
    match base.checked_mul(scale) {
        Some(edge) if edge > 0 => Ok(edge),
        Some(_) => Err(RuZonalError::config(format!(
            "effective window edge is zero (block edge {}, scale {})",
            base, scale
        ))),
        None => Err(RuZonalError::config(format!(
            "effective window edge overflows (block edge {}, scale {})",
            base, scale
        ))),
    }
}

/// Plan the windows for a `width x height` grid
pub fn plan_windows(
    width: usize,
    height: usize,
    block_edge: Option<usize>,
    default_edge: usize,
    scale: usize,
) -> Result<Vec<Window>> {
    let edge = effective_edge(block_edge, default_edge, scale)?;
    Ok(WindowPlanner::new(width, height, edge)?.windows())
}
