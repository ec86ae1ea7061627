//! Nearest-station lookup for regional corrections.

use crate::config::RegionalConfig;
use crate::constituents::Constituent;
use crate::coordinate::Coordinate;
use crate::stations::{DataQuality, RegionalStation, RegionalStationCatalog};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Distances closer than this are treated as equal when picking a station.
const DISTANCE_TIE_KM: f64 = 1e-9;

/// Identity of the station whose corrections were applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StationMatch {
    pub id: String,
    pub name: String,
    pub data_quality: DataQuality,
    pub distance_km: f64,
}

/// Corrections for one request: either a matched station or neutral values.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionalCorrection<'a> {
    station: Option<&'a RegionalStation>,
    /// Distance to the nearest catalogued station, matched or not
    pub nearest_distance_km: Option<f64>,
}

impl<'a> RegionalCorrection<'a> {
    pub fn neutral(nearest_distance_km: Option<f64>) -> Self {
        Self {
            station: None,
            nearest_distance_km,
        }
    }

    pub fn station(&self) -> Option<&'a RegionalStation> {
        self.station
    }

    pub fn station_match(&self) -> Option<StationMatch> {
        self.station.map(|s| StationMatch {
            id: s.id.clone(),
            name: s.name.clone(),
            data_quality: s.data_quality,
            distance_km: self.nearest_distance_km.unwrap_or(0.0),
        })
    }

    pub fn amplitude_factor(&self, constituent: Constituent) -> f64 {
        self.station.map_or(1.0, |s| s.amplitude_factor(constituent))
    }

    pub fn phase_offset_deg(&self, constituent: Constituent) -> f64 {
        self.station.map_or(0.0, |s| s.phase_offset_deg(constituent))
    }

    /// `None` means no station was close enough.
    pub fn data_quality(&self) -> Option<DataQuality> {
        self.station.map(|s| s.data_quality)
    }
}

pub struct RegionalCorrectionResolver<'a> {
    catalog: &'a RegionalStationCatalog,
    config: RegionalConfig,
}

impl<'a> RegionalCorrectionResolver<'a> {
    pub fn new(catalog: &'a RegionalStationCatalog, config: RegionalConfig) -> Self {
        Self { catalog, config }
    }

    /// Pick the nearest station. Equidistant stations are ordered by higher
    /// data quality, then by smaller id.
    pub fn resolve(&self, coordinate: &Coordinate) -> RegionalCorrection<'a> {
        let nearest = self
            .catalog
            .stations()
            .iter()
            .map(|s| (s, coordinate.distance_km(&s.coordinate)))
            .min_by(|a, b| compare_candidates(*a, *b));

        match nearest {
            Some((station, distance)) if distance <= self.config.max_station_distance_km => {
                debug!(station = %station.id, distance_km = distance, "regional station matched");
                RegionalCorrection {
                    station: Some(station),
                    nearest_distance_km: Some(distance),
                }
            }
            Some((station, distance)) => {
                debug!(
                    nearest = %station.id,
                    distance_km = distance,
                    "no station within range, using neutral correction"
                );
                RegionalCorrection::neutral(Some(distance))
            }
            None => RegionalCorrection::neutral(None),
        }
    }
}

fn compare_candidates(a: (&RegionalStation, f64), b: (&RegionalStation, f64)) -> Ordering {
    let (sa, da) = a;
    let (sb, db) = b;
    if (da - db).abs() > DISTANCE_TIE_KM {
        return da.total_cmp(&db);
    }
    sb.data_quality
        .rank()
        .cmp(&sa.data_quality.rank())
        .then_with(|| sa.id.cmp(&sb.id))
}
