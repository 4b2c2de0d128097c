//! Observation records emitted by an aggregation run

use crate::statistics::{ZoneCode, ZoneStat};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identities and date shared by every record of one run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObservationContext {
    pub product_id: String,
    pub mask_id: Option<String>,
    pub zone_layer_id: String,
    pub date: NaiveDate,
}

impl ObservationContext {
    pub fn new(
        product_id: impl Into<String>,
        mask_id: Option<String>,
        zone_layer_id: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            mask_id,
            zone_layer_id: zone_layer_id.into(),
            date,
        }
    }

    /// Build the record for one merged zone statistic
    pub fn observation(&self, stat: &ZoneStat) -> Observation {
        Observation {
            product_id: self.product_id.clone(),
            mask_id: self.mask_id.clone(),
            zone_layer_id: self.zone_layer_id.clone(),
            zone_code: stat.zone_code,
            date: self.date,
            mean_value: stat.value,
            arable_pixel_count: stat.arable_pixel_count,
            percent_arable: stat.percent_arable,
        }
    }
}

/// Uniqueness key of an observation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationKey {
    pub product_id: String,
    pub mask_id: Option<String>,
    pub zone_layer_id: String,
    pub zone_code: ZoneCode,
    pub date: NaiveDate,
}

/// One time-stamped aggregate for one zone
///
/// Serializes as a flat JSON object with the date as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub product_id: String,
    pub mask_id: Option<String>,
    pub zone_layer_id: String,
    pub zone_code: ZoneCode,
    pub date: NaiveDate,
    pub mean_value: f64,
    pub arable_pixel_count: u64,
    pub percent_arable: f64,
}

impl Observation {
    pub fn key(&self) -> ObservationKey {
        ObservationKey {
            product_id: self.product_id.clone(),
            mask_id: self.mask_id.clone(),
            zone_layer_id: self.zone_layer_id.clone(),
            zone_code: self.zone_code,
            date: self.date,
        }
    }
}
