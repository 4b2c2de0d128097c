//! Order-independent reduction of partial zone statistics
//!
//! Each statistic carries `visible = arable_pixel_count * percent_arable / 100`, the
//! number of pixels behind its value. Merging takes the visible-weighted mean of the
//! values and adds the counts, so the combined state is the same whatever order the
//! partials arrive in and however the raster was windowed.

use super::operations::{PartialZoneStat, ZoneCode, ZoneStat};
use std::collections::HashMap;

/// Combine two statistics of the same zone
///
/// ```text
/// value'          = (s.value * visible_s + p.value * visible_p) / (visible_s + visible_p)
/// arable'         = s.arable + p.arable
/// percent_arable' = (visible_s + visible_p) / arable' * 100
/// ```
/// with both ratios defined as 0 when their denominator is 0.
pub fn merge_zone_stats(s: &ZoneStat, p: &PartialZoneStat) -> ZoneStat {
    let visible_s = s.visible_pixels();
    let visible_p = p.visible_pixels();
    let total_visible = visible_s + visible_p;

    let value = if total_visible > 0.0 {
        (s.value * visible_s + p.value * visible_p) / total_visible
    } else {
        0.0
    };
    let arable_pixel_count = s.arable_pixel_count + p.arable_pixel_count;
    let percent_arable = if arable_pixel_count > 0 {
        total_visible / arable_pixel_count as f64 * 100.0
    } else {
        0.0
    };

    ZoneStat::new(s.zone_code, value, arable_pixel_count, percent_arable)
}

/// Running `zone_code -> ZoneStat` map fed one partial at a time
#[derive(Debug, Default, Clone)]
pub struct StatsMerger {
    stats: HashMap<ZoneCode, ZoneStat>,
    partials: usize,
}

impl StatsMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one partial into the running result
    pub fn push(&mut self, partial: PartialZoneStat) {
        self.partials += 1;
        self.stats
            .entry(partial.zone_code)
            .and_modify(|stored| *stored = merge_zone_stats(stored, &partial))
            .or_insert(partial);
    }

    /// Fold another merger's results into this one
    pub fn merge(&mut self, other: StatsMerger) {
        let partials = self.partials + other.partials;
        self.extend(other.stats.into_values());
        self.partials = partials;
    }

    pub fn get(&self, zone_code: ZoneCode) -> Option<&ZoneStat> {
        self.stats.get(&zone_code)
    }

    /// Number of distinct zone codes seen
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Number of partials folded so far
    pub fn partials_merged(&self) -> usize {
        self.partials
    }

    pub fn into_map(self) -> HashMap<ZoneCode, ZoneStat> {
        self.stats
    }

    /// Final statistics ordered by zone code
    pub fn into_sorted(self) -> Vec<ZoneStat> {
        let mut stats: Vec<ZoneStat> = self.stats.into_values().collect();
        stats.sort_by_key(|s| s.zone_code);
        stats
    }
}

impl Extend<PartialZoneStat> for StatsMerger {
    fn extend<I: IntoIterator<Item = PartialZoneStat>>(&mut self, iter: I) {
        for partial in iter {
            self.push(partial);
        }
    }
}

impl FromIterator<PartialZoneStat> for StatsMerger {
    fn from_iter<I: IntoIterator<Item = PartialZoneStat>>(iter: I) -> Self {
        let mut merger = StatsMerger::new();
        merger.extend(iter);
        merger
    }
}
