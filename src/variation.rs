//! # Coordinate and Seasonal Variation
//!
//! Two pure calculators that turn a request's location and date into
//! multiplicative amplitude factors (and, for location, a phase shift).
//!
//! ## Coordinate variation
//! Amplitudes scale linearly with the distance, in degrees, from a calibrated
//! reference point:
//! ```text
//! latitude_factor  = 1 + (lat - lat_ref) * lat_coef
//! longitude_factor = 1 + (lon - lon_ref) * lon_coef
//! ```
//! The phase of each constituent shifts with longitude in proportion to its
//! species (cycles per day), as the equilibrium tide does.
//!
//! ## Seasonal variation
//! The seasonal angle runs once around the circle per year, starting at the
//! spring equinox. Each constituent gets its own trigonometric curve so their
//! seasonal peaks fall at different times of year, scaled by how far from the
//! equator the request is:
//! ```text
//! angle  = (day_of_year - equinox_day) / 365 * 360
//! factor = 1 + weight * cos(angle + offset) * |lat| / 90
//! ```
//! with offsets M2 0°, S2 +45°, K1 -90°, O1 -45°.

use crate::config::{CoordinateVariationConfig, SeasonalVariationConfig};
use crate::constituents::Constituent;
use crate::coordinate::Coordinate;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

const M2_SEASONAL_OFFSET_DEG: f64 = 0.0;
const S2_SEASONAL_OFFSET_DEG: f64 = 45.0;
const K1_SEASONAL_OFFSET_DEG: f64 = -90.0;
const O1_SEASONAL_OFFSET_DEG: f64 = -45.0;

/// Where in the seasonal cycle each constituent's curve peaks.
pub fn seasonal_offset_deg(constituent: Constituent) -> f64 {
    match constituent {
        Constituent::M2 => M2_SEASONAL_OFFSET_DEG,
        Constituent::S2 => S2_SEASONAL_OFFSET_DEG,
        Constituent::K1 => K1_SEASONAL_OFFSET_DEG,
        Constituent::O1 => O1_SEASONAL_OFFSET_DEG,
    }
}

/// Location-derived amplitude scalars.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateVariation {
    pub latitude_factor: f64,
    pub longitude_factor: f64,
    /// Longitude minus the reference longitude, in degrees
    pub longitude_delta_deg: f64,
    phase_degrees_per_longitude: f64,
}

impl CoordinateVariation {
    /// Combined amplitude multiplier. May be negative far from the reference
    /// point; the synthesizer clamps it.
    pub fn amplitude_factor(&self) -> f64 {
        self.latitude_factor * self.longitude_factor
    }

    pub fn phase_offset_deg(&self, constituent: Constituent) -> f64 {
        self.longitude_delta_deg * self.phase_degrees_per_longitude * f64::from(constituent.species())
    }

    /// Largest deviation of either factor from 1.0.
    pub fn magnitude(&self) -> f64 {
        (self.latitude_factor - 1.0)
            .abs()
            .max((self.longitude_factor - 1.0).abs())
    }
}

pub struct CoordinateVariationCalculator {
    config: CoordinateVariationConfig,
}

impl CoordinateVariationCalculator {
    pub fn new(config: CoordinateVariationConfig) -> Self {
        Self { config }
    }

    pub fn calculate(&self, coordinate: &Coordinate) -> CoordinateVariation {
        let c = &self.config;
        let lat_delta = coordinate.latitude() - c.latitude_reference;
        let lon_delta = coordinate.longitude() - c.longitude_reference;
        CoordinateVariation {
            latitude_factor: 1.0 + lat_delta * c.latitude_coefficient,
            longitude_factor: 1.0 + lon_delta * c.longitude_coefficient,
            longitude_delta_deg: lon_delta,
            phase_degrees_per_longitude: c.phase_degrees_per_longitude,
        }
    }
}

/// Date- and latitude-derived amplitude scalars.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeasonalVariation {
    pub m2_factor: f64,
    pub s2_factor: f64,
    pub k1_factor: f64,
    pub o1_factor: f64,
    pub seasonal_angle_deg: f64,
    pub day_of_year: u32,
    pub latitude_effect: f64,
}

impl SeasonalVariation {
    pub fn factor(&self, constituent: Constituent) -> f64 {
        match constituent {
            Constituent::M2 => self.m2_factor,
            Constituent::S2 => self.s2_factor,
            Constituent::K1 => self.k1_factor,
            Constituent::O1 => self.o1_factor,
        }
    }

    /// Largest deviation of any constituent factor from 1.0.
    pub fn magnitude(&self) -> f64 {
        Constituent::ALL
            .iter()
            .map(|&c| (self.factor(c) - 1.0).abs())
            .fold(0.0, f64::max)
    }
}

pub struct SeasonalVariationCalculator {
    config: SeasonalVariationConfig,
}

impl SeasonalVariationCalculator {
    pub fn new(config: SeasonalVariationConfig) -> Self {
        Self { config }
    }

    /// Day of year is taken from the UTC calendar date of `date`.
    pub fn calculate(&self, coordinate: &Coordinate, date: DateTime<Utc>) -> SeasonalVariation {
        let c = &self.config;
        let day_of_year = date.ordinal();
        let seasonal_angle_deg =
            (f64::from(day_of_year) - f64::from(c.spring_equinox_day_of_year)) / 365.0 * 360.0;
        let latitude_effect = coordinate.latitude().abs() / 90.0;

        let factor = |constituent: Constituent, weight: f64| {
            let curve = (seasonal_angle_deg + seasonal_offset_deg(constituent)).to_radians().cos();
            1.0 + weight * curve * latitude_effect
        };

        SeasonalVariation {
            m2_factor: factor(Constituent::M2, c.m2_weight),
            s2_factor: factor(Constituent::S2, c.s2_weight),
            k1_factor: factor(Constituent::K1, c.k1_weight),
            o1_factor: factor(Constituent::O1, c.o1_weight),
            seasonal_angle_deg,
            day_of_year,
            latitude_effect,
        }
    }
}
