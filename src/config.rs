//! # Engine Configuration
//!
//! Every tunable of the tide engine lives here and is passed explicitly into
//! the constructors that need it. The configuration can be loaded from a TOML
//! file; each section falls back to its defaults when omitted, so a file only
//! needs to list the values it changes.
//!
//! ```toml
//! [regional]
//! max_station_distance_km = 150.0
//!
//! [cache]
//! capacity = 64
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while reading or writing a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode config: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub coordinate: CoordinateVariationConfig,
    pub seasonal: SeasonalVariationConfig,
    pub regional: RegionalConfig,
    pub synthesis: SynthesisConfig,
    pub confidence: ConfidenceConfig,
    pub strength: StrengthConfig,
    pub cache: CacheConfig,
    pub health: HealthConfig,
}

/// Location adjustment relative to a calibrated reference point.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CoordinateVariationConfig {
    pub latitude_reference: f64,
    pub longitude_reference: f64,
    /// Amplitude change per degree of latitude away from the reference
    pub latitude_coefficient: f64,
    /// Amplitude change per degree of longitude away from the reference
    pub longitude_coefficient: f64,
    /// Phase shift per degree of longitude, multiplied by the constituent species
    pub phase_degrees_per_longitude: f64,
}

impl Default for CoordinateVariationConfig {
    fn default() -> Self {
        Self {
            latitude_reference: 35.0,
            longitude_reference: 135.0,
            latitude_coefficient: 0.02,
            longitude_coefficient: 0.01,
            phase_degrees_per_longitude: 1.0,
        }
    }
}

/// Day-of-year amplitude modulation.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SeasonalVariationConfig {
    pub spring_equinox_day_of_year: u32,
    pub m2_weight: f64,
    pub s2_weight: f64,
    pub k1_weight: f64,
    pub o1_weight: f64,
}

impl Default for SeasonalVariationConfig {
    fn default() -> Self {
        Self {
            spring_equinox_day_of_year: 80,
            m2_weight: 0.15,
            s2_weight: 0.20,
            k1_weight: 0.25,
            o1_weight: 0.18,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegionalConfig {
    /// Stations further away than this are ignored
    pub max_station_distance_km: f64,
}

impl Default for RegionalConfig {
    fn default() -> Self {
        Self {
            max_station_distance_km: 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Mean sea level above chart datum, in centimetres
    pub baseline_cm: f64,
    pub window_hours: u32,
    pub sample_interval_minutes: u32,
    /// Deviation from 1.0 of a coordinate or seasonal factor that counts as extrapolation
    pub large_adjustment_threshold: f64,
    pub algorithm_version: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            baseline_cm: 100.0,
            window_hours: 24,
            sample_interval_minutes: 15,
            large_adjustment_threshold: 0.3,
            algorithm_version: "hybrid-astronomical-v1".to_string(),
        }
    }
}

/// Inputs to the 0–100 confidence score.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub high_score: f64,
    pub medium_score: f64,
    pub low_score: f64,
    pub distance_penalty_per_km: f64,
    pub max_distance_penalty: f64,
    /// Low-accuracy results always score strictly below this
    pub low_confidence_ceiling: u8,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            high_score: 95.0,
            medium_score: 75.0,
            low_score: 35.0,
            distance_penalty_per_km: 0.1,
            max_distance_penalty: 30.0,
            low_confidence_ceiling: 40,
        }
    }
}

/// Spring/neap classification windows, in days around the lunar phases.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StrengthConfig {
    /// Days either side of new or full moon classified as spring tide
    pub spring_window_days: f64,
    /// Days either side of a quarter moon classified as neap tide
    pub neap_window_days: f64,
}

impl Default for StrengthConfig {
    fn default() -> Self {
        Self {
            spring_window_days: 2.0,
            neap_window_days: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    /// Bump whenever variation settings change so stale entries stop matching
    pub variation_options_version: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            variation_options_version: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Fewer catalogued stations than this reports a degraded service
    pub min_station_coverage: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            min_station_coverage: 1,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the specified path.
    /// Falls back to the default configuration if the file doesn't exist or is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load_from_path(&path) {
            Ok(config) => {
                info!(path = %path.as_ref().display(), "loaded engine configuration");
                config
            }
            Err(ConfigError::Io(_)) => {
                info!(path = %path.as_ref().display(), "no config file found, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "invalid config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn try_load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
