//! Centralized error handling for RuZonal
//!
//! Configuration problems are reported before any window is read. Read failures
//! abort the whole aggregation run. Empty pixel sets are never errors: they resolve
//! to zero-valued statistics inside the worker.

use std::fmt;

/// Main error type for RuZonal operations
#[derive(Debug)]
pub enum RuZonalError {
    /// Invalid run configuration (unknown mask kind, zero window edge, bad locator, ...)
    Configuration { message: String },

    /// Rasters taking part in one run do not share a pixel grid
    DimensionMismatch {
        raster: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// A raster could not be opened or a window could not be read
    RasterRead { raster: String, message: String },

    /// NetCDF library errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Variable not found in NetCDF file
    VariableNotFound { var: String },

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Worker pool construction error
    ThreadPoolError(String),

    /// Catalog lookup or parse failure
    CatalogError(String),

    /// The record sink refused the batch
    SinkError(String),

    /// Generic error
    Generic(String),
}

impl RuZonalError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        RuZonalError::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a raster read error
    pub fn read(raster: impl Into<String>, message: impl Into<String>) -> Self {
        RuZonalError::RasterRead {
            raster: raster.into(),
            message: message.into(),
        }
    }

    /// True for errors raised while validating a run, before any window is processed
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            RuZonalError::Configuration { .. } | RuZonalError::DimensionMismatch { .. }
        )
    }
}

impl fmt::Display for RuZonalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuZonalError::Configuration { message } => {
                write!(f, "Configuration error: {}", message)
            }
            RuZonalError::DimensionMismatch {
                raster,
                expected,
                found,
            } => write!(
                f,
                "Configuration error: raster '{}' is {}x{} but the run expects {}x{}",
                raster, found.0, found.1, expected.0, expected.1
            ),
            RuZonalError::RasterRead { raster, message } => {
                write!(f, "Failed to read raster '{}': {}", raster, message)
            }
            RuZonalError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            RuZonalError::IoError(e) => write!(f, "I/O error: {}", e),
            RuZonalError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in file", var)
            }
            RuZonalError::ArrayError(e) => write!(f, "Array error: {}", e),
            RuZonalError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            RuZonalError::CatalogError(msg) => write!(f, "Catalog error: {}", msg),
            RuZonalError::SinkError(msg) => write!(f, "Record sink error: {}", msg),
            RuZonalError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RuZonalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuZonalError::NetCDFError(e) => Some(e),
            RuZonalError::IoError(e) => Some(e),
            RuZonalError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for RuZonalError {
    fn from(error: netcdf::Error) -> Self {
        RuZonalError::NetCDFError(error)
    }
}

impl From<std::io::Error> for RuZonalError {
    fn from(error: std::io::Error) -> Self {
        RuZonalError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for RuZonalError {
    fn from(error: ndarray::ShapeError) -> Self {
        RuZonalError::ArrayError(error)
    }
}

impl From<serde_json::Error> for RuZonalError {
    fn from(error: serde_json::Error) -> Self {
        RuZonalError::Generic(format!("JSON error: {}", error))
    }
}

impl From<String> for RuZonalError {
    fn from(error: String) -> Self {
        RuZonalError::Generic(error)
    }
}

impl From<&str> for RuZonalError {
    fn from(error: &str) -> Self {
        RuZonalError::Generic(error.to_string())
    }
}

/// Result type alias for RuZonal operations
pub type Result<T> = std::result::Result<T, RuZonalError>;
