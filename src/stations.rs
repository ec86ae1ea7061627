//! # Regional Station Catalog
//!
//! Named coastal reference stations, each carrying per-constituent corrections
//! to apply when a request falls close enough to it. The catalog is plain
//! configuration data: the engine ships a one-station illustrative sample
//! (`data/stations.toml`) but any TOML file with the same shape can replace it.
//!
//! ```toml
//! [[station]]
//! id = "jp-tokyo-bay"
//! name = "Tokyo Bay"
//! coordinate = { latitude = 35.65, longitude = 139.77 }
//! data_quality = "high"
//! amplitude_factors = { M2 = 1.05, S2 = 1.04 }
//! phase_offsets_deg = { M2 = 4.0 }
//! ```

use crate::constituents::Constituent;
use crate::coordinate::Coordinate;
use crate::error::TideError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

const EMBEDDED_CATALOG: &str = include_str!("../data/stations.toml");

/// How well a station's corrections are calibrated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    High,
    Medium,
    Low,
}

impl DataQuality {
    /// Higher is better; used to break distance ties.
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 2,
            Self::Medium => 1,
            Self::Low => 0,
        }
    }
}

/// A calibrated reference station.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionalStation {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    pub data_quality: DataQuality,
    #[serde(default)]
    pub amplitude_factors: BTreeMap<Constituent, f64>,
    #[serde(default)]
    pub phase_offsets_deg: BTreeMap<Constituent, f64>,
}

impl RegionalStation {
    /// Amplitude multiplier for `constituent`, 1.0 when the station does not list it.
    pub fn amplitude_factor(&self, constituent: Constituent) -> f64 {
        self.amplitude_factors.get(&constituent).copied().unwrap_or(1.0)
    }

    /// Phase offset in degrees for `constituent`, 0 when the station does not list it.
    pub fn phase_offset_deg(&self, constituent: Constituent) -> f64 {
        self.phase_offsets_deg.get(&constituent).copied().unwrap_or(0.0)
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "station")]
    stations: Vec<RegionalStation>,
}

/// Read-only collection of stations, looked up by nearest distance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionalStationCatalog {
    stations: Vec<RegionalStation>,
}

impl RegionalStationCatalog {
    pub fn new(stations: Vec<RegionalStation>) -> Self {
        Self { stations }
    }

    /// The sample catalog compiled into the crate.
    pub fn embedded() -> Result<Self, TideError> {
        Self::from_toml_str(EMBEDDED_CATALOG)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, TideError> {
        let file: CatalogFile = toml::from_str(contents)
            .map_err(|e| TideError::initialization(format!("station catalog: {e}")))?;
        Ok(Self::new(file.stations))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TideError> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            TideError::initialization(format!(
                "cannot read station catalog {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn stations(&self) -> &[RegionalStation] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Check ids are unique and non-empty and every correction is finite,
    /// with non-negative amplitude factors. An empty catalog is valid.
    pub fn validate(&self) -> Result<(), TideError> {
        let mut ids = HashSet::new();
        for station in &self.stations {
            if station.id.trim().is_empty() {
                return Err(TideError::initialization(format!(
                    "station '{}' has an empty id",
                    station.name
                )));
            }
            if !ids.insert(station.id.as_str()) {
                return Err(TideError::initialization(format!(
                    "duplicate station id {}",
                    station.id
                )));
            }
            for (constituent, factor) in &station.amplitude_factors {
                if !factor.is_finite() || *factor < 0.0 {
                    return Err(TideError::initialization(format!(
                        "station {} has invalid {constituent} amplitude factor {factor}",
                        station.id
                    )));
                }
            }
            for (constituent, offset) in &station.phase_offsets_deg {
                if !offset.is_finite() {
                    return Err(TideError::initialization(format!(
                        "station {} has non-finite {constituent} phase offset",
                        station.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_loads_and_validates() {
        let catalog = RegionalStationCatalog::embedded().unwrap();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.len(), 1);

        let tokyo = catalog
            .stations()
            .iter()
            .find(|s| s.id == "jp-tokyo-bay")
            .expect("Tokyo Bay should be catalogued");
        assert_eq!(tokyo.data_quality, DataQuality::High);
        assert_eq!(tokyo.amplitude_factor(Constituent::M2), 1.05);
    }

    #[test]
    fn missing_corrections_are_neutral() {
        let catalog = RegionalStationCatalog::from_toml_str(
            r#"
            [[station]]
            id = "bare"
            name = "Bare"
            coordinate = { latitude = 10.0, longitude = 20.0 }
            data_quality = "low"
            "#,
        )
        .unwrap();
        let station = &catalog.stations()[0];
        assert_eq!(station.amplitude_factor(Constituent::K1), 1.0);
        assert_eq!(station.phase_offset_deg(Constituent::O1), 0.0);
    }

    #[test]
    fn malformed_catalogs_are_initialization_errors() {
        // Out-of-range coordinate fails at parse time.
        let bad_coord = RegionalStationCatalog::from_toml_str(
            r#"
            [[station]]
            id = "x"
            name = "X"
            coordinate = { latitude = 95.0, longitude = 0.0 }
            data_quality = "high"
            "#,
        );
        assert!(matches!(bad_coord, Err(TideError::Initialization(_))));

        let duplicate = RegionalStationCatalog::from_toml_str(
            r#"
            [[station]]
            id = "x"
            name = "X"
            coordinate = { latitude = 1.0, longitude = 1.0 }
            data_quality = "high"

            [[station]]
            id = "x"
            name = "Y"
            coordinate = { latitude = 2.0, longitude = 2.0 }
            data_quality = "low"
            "#,
        )
        .unwrap();
        assert!(duplicate.validate().is_err());

        let negative = RegionalStationCatalog::from_toml_str(
            r#"
            [[station]]
            id = "neg"
            name = "Negative"
            coordinate = { latitude = 1.0, longitude = 1.0 }
            data_quality = "medium"
            amplitude_factors = { M2 = -0.5 }
            "#,
        )
        .unwrap();
        assert!(negative.validate().is_err());
    }

    #[test]
    fn empty_catalog_is_valid() {
        let catalog = RegionalStationCatalog::from_toml_str("").unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RegionalStationCatalog::from_path("/nonexistent/stations.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/stations.toml"));
    }
}
