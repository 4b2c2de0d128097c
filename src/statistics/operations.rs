//! Core statistical types: mask semantics and per-zone statistics

use crate::errors::{Result, RuZonalError};
use std::fmt;
use std::str::FromStr;

/// Integer zone identifier read from the zone raster
pub type ZoneCode = i64;

/// How mask pixels take part in the statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaskKind {
    /// No mask: every zone-valid pixel has weight 1
    #[default]
    None,
    /// Boolean coverage: `> 0` counts as arable, exactly `1` contributes to the value
    Binary,
    /// Fractional coverage: the mask value is the pixel weight
    Percent,
}

impl MaskKind {
    /// Get the string representation of the mask kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Binary => "binary",
            Self::Percent => "percent",
        }
    }
}

impl fmt::Display for MaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaskKind {
    type Err = RuZonalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "binary" => Ok(Self::Binary),
            "percent" => Ok(Self::Percent),
            other => Err(RuZonalError::config(format!(
                "invalid mask kind '{}' (expected none, binary or percent)",
                other
            ))),
        }
    }
}

/// Statistic for one zone code, either for one window or merged over many
///
/// `arable_pixel_count * percent_arable / 100` is the number of pixels that
/// contributed to `value`; the merger weights by it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneStat {
    pub zone_code: ZoneCode,
    pub value: f64,
    pub arable_pixel_count: u64,
    pub percent_arable: f64,
}

/// A statistic produced from a single window
pub type PartialZoneStat = ZoneStat;

impl ZoneStat {
    pub const fn new(
        zone_code: ZoneCode,
        value: f64,
        arable_pixel_count: u64,
        percent_arable: f64,
    ) -> Self {
        Self {
            zone_code,
            value,
            arable_pixel_count,
            percent_arable,
        }
    }

    /// A zone seen in a window but with nothing to measure
    pub const fn empty(zone_code: ZoneCode) -> Self {
        Self::new(zone_code, 0.0, 0, 0.0)
    }

    /// Pixels that contributed to `value`
    pub fn visible_pixels(&self) -> f64 {
        self.arable_pixel_count as f64 * self.percent_arable / 100.0
    }

    /// Check two statistics agree within `tolerance` on every float field
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.zone_code == other.zone_code
            && self.arable_pixel_count == other.arable_pixel_count
            && (self.value - other.value).abs() <= tolerance
            && (self.percent_arable - other.percent_arable).abs() <= tolerance
    }
}
