//! # Harmonic Constituents
//!
//! Static reference data for the four principal tidal constituents. Each one
//! contributes a single cosine term to the height model; the table holds the
//! uncorrected amplitude and phase every request starts from.
//!
//! | Constituent | Species      | Speed (°/h) | Period   |
//! |-------------|--------------|-------------|----------|
//! | M2          | semi-diurnal | 28.984      | 12.42 h  |
//! | S2          | semi-diurnal | 30.000      | 12.00 h  |
//! | K1          | diurnal      | 15.041      | 23.93 h  |
//! | O1          | diurnal      | 13.943      | 25.82 h  |

use crate::error::TideError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The constituents the engine models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Constituent {
    /// Principal lunar semi-diurnal
    M2,
    /// Principal solar semi-diurnal
    S2,
    /// Luni-solar diurnal
    K1,
    /// Principal lunar diurnal
    O1,
}

impl Constituent {
    pub const ALL: [Constituent; 4] = [Self::M2, Self::S2, Self::K1, Self::O1];

    /// Astronomical angular speed in degrees per hour.
    pub fn speed_deg_per_hour(self) -> f64 {
        match self {
            Self::M2 => 28.984_104_2,
            Self::S2 => 30.0,
            Self::K1 => 15.041_068_6,
            Self::O1 => 13.943_035_6,
        }
    }

    /// Cycles per day: 2 for semi-diurnal, 1 for diurnal constituents.
    pub fn species(self) -> u8 {
        match self {
            Self::M2 | Self::S2 => 2,
            Self::K1 | Self::O1 => 1,
        }
    }
}

impl fmt::Display for Constituent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::M2 => "M2",
            Self::S2 => "S2",
            Self::K1 => "K1",
            Self::O1 => "O1",
        };
        f.write_str(name)
    }
}

/// Uncorrected reference values for one constituent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarmonicConstituent {
    pub name: Constituent,
    /// Amplitude in centimetres, never negative
    pub base_amplitude_cm: f64,
    pub base_phase_deg: f64,
    pub frequency_deg_per_hour: f64,
}

impl HarmonicConstituent {
    fn standard(name: Constituent, base_amplitude_cm: f64, base_phase_deg: f64) -> Self {
        Self {
            name,
            base_amplitude_cm,
            base_phase_deg,
            frequency_deg_per_hour: name.speed_deg_per_hour(),
        }
    }
}

/// The set of constituents summed by the synthesizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarmonicConstituentTable {
    constituents: Vec<HarmonicConstituent>,
}

impl HarmonicConstituentTable {
    /// Wrap a list of constituents. Nothing is checked until [`validate`](Self::validate).
    pub fn new(constituents: Vec<HarmonicConstituent>) -> Self {
        Self { constituents }
    }

    /// Reference values calibrated for the Pacific coast of central Japan.
    pub fn standard() -> Self {
        Self::new(vec![
            HarmonicConstituent::standard(Constituent::M2, 48.0, 152.0),
            HarmonicConstituent::standard(Constituent::S2, 23.0, 178.0),
            HarmonicConstituent::standard(Constituent::K1, 24.0, 168.0),
            HarmonicConstituent::standard(Constituent::O1, 19.0, 149.0),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &HarmonicConstituent> {
        self.constituents.iter()
    }

    pub fn get(&self, name: Constituent) -> Option<&HarmonicConstituent> {
        self.constituents.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.constituents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constituents.is_empty()
    }

    /// Reject empty tables, duplicates, negative or non-finite amplitudes and
    /// non-positive frequencies.
    pub fn validate(&self) -> Result<(), TideError> {
        if self.constituents.is_empty() {
            return Err(TideError::initialization("harmonic constituent table is empty"));
        }

        let mut seen = HashSet::new();
        for c in &self.constituents {
            if !seen.insert(c.name) {
                return Err(TideError::initialization(format!(
                    "constituent {} listed more than once",
                    c.name
                )));
            }
            if !c.base_amplitude_cm.is_finite() || c.base_amplitude_cm < 0.0 {
                return Err(TideError::initialization(format!(
                    "constituent {} has invalid amplitude {}",
                    c.name, c.base_amplitude_cm
                )));
            }
            if !c.base_phase_deg.is_finite() {
                return Err(TideError::initialization(format!(
                    "constituent {} has non-finite phase",
                    c.name
                )));
            }
            if !c.frequency_deg_per_hour.is_finite() || c.frequency_deg_per_hour <= 0.0 {
                return Err(TideError::initialization(format!(
                    "constituent {} has invalid frequency {}",
                    c.name, c.frequency_deg_per_hour
                )));
            }
        }
        Ok(())
    }
}
