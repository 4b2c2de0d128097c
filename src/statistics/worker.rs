//! Per-window zonal statistics
//!
//! [`compute_window_stats`] is a pure function of one window and the three
//! co-registered rasters. It keeps no state between calls, so any number of windows
//! can run on any worker in any order.

use super::operations::{MaskKind, PartialZoneStat, ZoneCode};
use crate::errors::Result;
use crate::raster::RasterHandle;
use crate::window::Window;
use ndarray::{Array2, Zip};
use std::collections::HashMap;

/// Running sums for one zone inside one window
#[derive(Debug, Default, Clone, Copy)]
struct ZoneAccumulator {
    /// Mask valid and `> 0`
    arable: u64,
    /// Pixels that entered the value computation
    contributing: u64,
    weighted_sum: f64,
    weight: f64,
}

impl ZoneAccumulator {
    #[inline]
    fn add(&mut self, value: f64, weight: f64) {
        self.contributing += 1;
        self.weighted_sum += value * weight;
        self.weight += weight;
    }

    fn finish(self, zone_code: ZoneCode) -> PartialZoneStat {
        let value = if self.weight > 0.0 {
            self.weighted_sum / self.weight
        } else {
            0.0
        };
        let percent_arable = if self.arable > 0 {
            self.contributing as f64 / self.arable as f64 * 100.0
        } else {
            0.0
        };
        PartialZoneStat::new(zone_code, value, self.arable, percent_arable)
    }
}

/// Compute the partial statistic of every zone code present in `window`
///
/// With no mask raster every zone-valid pixel is arable with weight 1. `Binary`
/// counts mask values `> 0` as arable but averages only pixels whose mask is exactly
/// `1`. `Percent` counts mask values `> 0` as arable and uses the mask value as the
/// weight of a weighted mean. Empty pixel sets give zero-valued fields.
///
/// # Errors
///
/// Returns an error if any of the window reads fails.
pub fn compute_window_stats(
    window: &Window,
    zones: &RasterHandle<'_>,
    mask: Option<&RasterHandle<'_>>,
    product: &RasterHandle<'_>,
    mask_kind: MaskKind,
) -> Result<HashMap<ZoneCode, PartialZoneStat>> {
    let zone_px = zones.read(window)?;
    let mask_px = match (mask, mask_kind) {
        (Some(mask), MaskKind::Binary | MaskKind::Percent) => Some((mask, mask.read(window)?)),
        _ => None,
    };
    let product_px = product.read(window)?;

    let accumulators = match mask_px {
        None => accumulate_unmasked(&zone_px, zones, &product_px, product),
        Some((mask, mask_px)) if mask_kind == MaskKind::Binary => {
            accumulate_binary(&zone_px, zones, &mask_px, mask, &product_px, product)
        }
        Some((mask, mask_px)) => {
            accumulate_percent(&zone_px, zones, &mask_px, mask, &product_px, product)
        }
    };

    Ok(accumulators
        .into_iter()
        .map(|(code, acc)| (code, acc.finish(code)))
        .collect())
}

#[inline]
fn zone_code(value: f64) -> ZoneCode {
    value as ZoneCode
}

fn accumulate_unmasked(
    zone_px: &Array2<f64>,
    zones: &RasterHandle<'_>,
    product_px: &Array2<f64>,
    product: &RasterHandle<'_>,
) -> HashMap<ZoneCode, ZoneAccumulator> {
    let mut acc: HashMap<ZoneCode, ZoneAccumulator> = HashMap::new();
    Zip::from(zone_px).and(product_px).for_each(|&z, &p| {
        if !zones.is_valid(z) {
            return;
        }
        let entry = acc.entry(zone_code(z)).or_default();
        entry.arable += 1;
        if product.is_valid(p) {
            entry.add(p, 1.0);
        }
    });
    acc
}

fn accumulate_binary(
    zone_px: &Array2<f64>,
    zones: &RasterHandle<'_>,
    mask_px: &Array2<f64>,
    mask: &RasterHandle<'_>,
    product_px: &Array2<f64>,
    product: &RasterHandle<'_>,
) -> HashMap<ZoneCode, ZoneAccumulator> {
    let mut acc: HashMap<ZoneCode, ZoneAccumulator> = HashMap::new();
    Zip::from(zone_px)
        .and(mask_px)
        .and(product_px)
        .for_each(|&z, &m, &p| {
            if !zones.is_valid(z) {
                return;
            }
            let entry = acc.entry(zone_code(z)).or_default();
            if !mask.is_valid(m) || m <= 0.0 {
                return;
            }
            entry.arable += 1;
            // inclusion is `> 0`, contribution needs exactly 1
            if m == 1.0 && product.is_valid(p) {
                entry.add(p, 1.0);
            }
        });
    acc
}

fn accumulate_percent(
    zone_px: &Array2<f64>,
    zones: &RasterHandle<'_>,
    mask_px: &Array2<f64>,
    mask: &RasterHandle<'_>,
    product_px: &Array2<f64>,
    product: &RasterHandle<'_>,
) -> HashMap<ZoneCode, ZoneAccumulator> {
    let mut acc: HashMap<ZoneCode, ZoneAccumulator> = HashMap::new();
    Zip::from(zone_px)
        .and(mask_px)
        .and(product_px)
        .for_each(|&z, &m, &p| {
            if !zones.is_valid(z) {
                return;
            }
            let entry = acc.entry(zone_code(z)).or_default();
            if !mask.is_valid(m) || m <= 0.0 {
                return;
            }
            entry.arable += 1;
            if product.is_valid(p) {
                entry.add(p, m);
            }
        });
    acc
}
