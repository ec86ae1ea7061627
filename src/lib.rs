//! # Tide Prediction Engine
//!
//! This library synthesizes tide-height time series and high/low water events
//! for an arbitrary coordinate and date. It is a stylized harmonic model, not
//! an oceanographic-grade predictor: four astronomical constituents are summed,
//! each corrected for location, season and the nearest calibrated station.
//!
//! ## Pipeline
//!
//! 1. **Coordinate variation**: scale amplitudes by the distance from a
//!    reference point, shift phases with longitude
//! 2. **Seasonal variation**: modulate amplitudes by day of year and latitude
//! 3. **Regional correction**: apply the nearest catalogued station's factors
//! 4. **Synthesis**: evaluate `baseline + Σ A·cos(ω·t + φ)` on a sampling grid,
//!    then locate and refine high/low water
//! 5. **Caching**: results are memoized in a bounded LRU that runs at most one
//!    computation per distinct request
//!
//! ## Entry point
//!
//! [`service::TideCalculationService`] wires the stages together:
//! ```no_run
//! use chrono::{TimeZone, Utc};
//! use tide_engine::config::EngineConfig;
//! use tide_engine::constituents::HarmonicConstituentTable;
//! use tide_engine::service::TideCalculationService;
//! use tide_engine::stations::RegionalStationCatalog;
//!
//! # async fn run() -> Result<(), tide_engine::error::TideError> {
//! let service = TideCalculationService::new(
//!     EngineConfig::default(),
//!     HarmonicConstituentTable::standard(),
//!     RegionalStationCatalog::embedded()?,
//! );
//! service.initialize()?;
//!
//! let date = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
//! let info = service.calculate_tide_info(35.6762, 139.6503, date).await?;
//! println!("{} extrema, accuracy {:?}", info.extrema.len(), info.accuracy);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Types
//!
//! The public result shape is [`TideInfo`]; chart rendering and persistence
//! collaborators consume only this type and its parts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod cache;
pub mod config;
pub mod constituents;
pub mod coordinate;
pub mod error;
pub mod lunar;
pub mod persist;
pub mod regional;
pub mod service;
pub mod stations;
pub mod synthesis;
pub mod variation;

#[cfg(test)]
mod tests;

use crate::lunar::TideStrength;
use crate::regional::StationMatch;
use crate::stations::DataQuality;
use crate::synthesis::SynthesisWarning;

/// Predicted water level at one instant.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use tide_engine::TideSample;
///
/// let sample = TideSample {
///     timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
///     level_cm: 132.5,
/// };
/// assert!(sample.level_cm > 100.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideSample {
    pub timestamp: DateTime<Utc>,
    /// Height above chart datum in centimetres
    pub level_cm: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremumKind {
    High,
    Low,
}

/// A high or low water event, refined between sampling grid points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideExtremum {
    #[serde(rename = "type")]
    pub kind: ExtremumKind,
    pub timestamp: DateTime<Utc>,
    pub level_cm: f64,
}

/// How far a prediction can be trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    High,
    Medium,
    Low,
}

impl Accuracy {
    /// One tier worse, bottoming out at `Low`.
    pub fn degraded(self) -> Self {
        match self {
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }
}

impl From<DataQuality> for Accuracy {
    fn from(quality: DataQuality) -> Self {
        match quality {
            DataQuality::High => Self::High,
            DataQuality::Medium => Self::Medium,
            DataQuality::Low => Self::Low,
        }
    }
}

/// Complete prediction for one (coordinate, date) request.
///
/// Samples cover `[start, start + window)` on a fixed grid; extrema are in
/// chronological order. Everything here is plain data so it can be stored and
/// reloaded without the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideInfo {
    pub samples: Vec<TideSample>,
    pub extrema: Vec<TideExtremum>,
    pub accuracy: Accuracy,
    /// 0–100
    pub confidence_score: u8,
    pub algorithm_version: String,
    /// Station whose corrections were applied, if any was in range
    #[serde(default)]
    pub station: Option<StationMatch>,
    pub strength: TideStrength,
    pub moon_age_days: f64,
    pub tidal_range_cm: f64,
    #[serde(default)]
    pub warnings: Vec<SynthesisWarning>,
}

impl TideInfo {
    pub fn highs(&self) -> impl Iterator<Item = &TideExtremum> {
        self.extrema.iter().filter(|e| e.kind == ExtremumKind::High)
    }

    pub fn lows(&self) -> impl Iterator<Item = &TideExtremum> {
        self.extrema.iter().filter(|e| e.kind == ExtremumKind::Low)
    }
}
