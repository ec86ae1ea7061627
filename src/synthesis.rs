//! # Tide Synthesis
//!
//! Combines the reference constituents with coordinate, seasonal and regional
//! corrections, then evaluates the height model and finds high/low water.
//!
//! ## Height model
//! ```text
//! level(t) = baseline + Σ amplitude_i * cos(speed_i * hours_since_J2000(t) + phase_i)
//! ```
//! with, per constituent,
//! ```text
//! amplitude = base * coordinate * seasonal * regional      (clamped at 0)
//! phase     = base + coordinate + regional                  (degrees)
//! ```
//! The seasonal stage only scales amplitudes; it contributes no phase offset.
//!
//! ## Extrema
//! Interior samples where the first difference changes sign (flat steps keep
//! the previous direction) are high or low water. The time of each event is
//! refined by fitting a parabola through the sample and its two neighbours and
//! taking the vertex; the level is the model evaluated at that refined time.
//! A window too short to bracket a turn yields no extrema, which is not an
//! error.
//!
//! ## Accuracy and confidence
//! Accuracy starts from the matched station's data quality (`low` without a
//! match) and drops one tier when either the coordinate or the seasonal
//! adjustment exceeds the configured "large adjustment" threshold. The
//! confidence score is the tier's base score minus a penalty proportional to
//! the distance to the nearest station.
//!
//! Any NaN or infinite intermediate value aborts synthesis with
//! [`TideError::Synthesis`]; no partial result is ever produced.

use crate::config::EngineConfig;
use crate::constituents::{Constituent, HarmonicConstituentTable};
use crate::error::TideError;
use crate::lunar::{classify_strength, moon_age_days};
use crate::regional::RegionalCorrection;
use crate::variation::{CoordinateVariation, SeasonalVariation};
use crate::{Accuracy, ExtremumKind, TideExtremum, TideInfo, TideSample};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 2000-01-01T12:00:00Z as a Unix timestamp.
const J2000_UNIX_SECONDS: i64 = 946_728_000;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Hours elapsed since the J2000 epoch (negative before it).
pub fn hours_from_epoch(t: DateTime<Utc>) -> f64 {
    (t.timestamp_millis() - J2000_UNIX_SECONDS * 1000) as f64 / MILLIS_PER_HOUR
}

/// Non-fatal conditions noticed while building the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthesisWarning {
    /// The corrected amplitude came out negative and was replaced by zero.
    AmplitudeClamped {
        constituent: Constituent,
        raw_amplitude_cm: f64,
    },
}

/// A constituent with every correction applied, valid for one request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectiveConstituent {
    pub name: Constituent,
    pub amplitude_cm: f64,
    pub phase_deg: f64,
    pub speed_deg_per_hour: f64,
}

/// The sum-of-cosines model for one request.
#[derive(Clone, Debug, PartialEq)]
pub struct TideModel {
    constituents: Vec<EffectiveConstituent>,
    baseline_cm: f64,
}

impl TideModel {
    pub fn new(constituents: Vec<EffectiveConstituent>, baseline_cm: f64) -> Self {
        Self {
            constituents,
            baseline_cm,
        }
    }

    pub fn constituents(&self) -> &[EffectiveConstituent] {
        &self.constituents
    }

    pub fn amplitude(&self, name: Constituent) -> Option<f64> {
        self.constituents
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.amplitude_cm)
    }

    /// Water level at `t`, failing on a non-finite result.
    pub fn level_at(&self, t: DateTime<Utc>) -> Result<f64, TideError> {
        let hours = hours_from_epoch(t);
        let level = self.baseline_cm
            + self
                .constituents
                .iter()
                .map(|c| c.amplitude_cm * (c.speed_deg_per_hour * hours + c.phase_deg).to_radians().cos())
                .sum::<f64>();

        if level.is_finite() {
            Ok(level)
        } else {
            Err(TideError::synthesis(format!("non-finite level at {t}")))
        }
    }
}

/// Inputs for one synthesis run.
pub struct SynthesisRequest<'r, 'c> {
    pub start: DateTime<Utc>,
    pub coordinate_variation: &'r CoordinateVariation,
    pub seasonal_variation: &'r SeasonalVariation,
    pub correction: &'r RegionalCorrection<'c>,
}

pub struct TideSynthesizer<'a> {
    table: &'a HarmonicConstituentTable,
    config: &'a EngineConfig,
}

impl<'a> TideSynthesizer<'a> {
    pub fn new(table: &'a HarmonicConstituentTable, config: &'a EngineConfig) -> Self {
        Self { table, config }
    }

    /// Apply all corrections to the reference table.
    pub fn build_model(
        &self,
        coordinate: &CoordinateVariation,
        seasonal: &SeasonalVariation,
        correction: &RegionalCorrection<'_>,
    ) -> Result<(TideModel, Vec<SynthesisWarning>), TideError> {
        let mut constituents = Vec::with_capacity(self.table.len());
        let mut warnings = Vec::new();

        for base in self.table.iter() {
            let name = base.name;
            let raw_amplitude = base.base_amplitude_cm
                * coordinate.amplitude_factor()
                * seasonal.factor(name)
                * correction.amplitude_factor(name);
            let phase = base.base_phase_deg + coordinate.phase_offset_deg(name) + correction.phase_offset_deg(name);

            if !raw_amplitude.is_finite() {
                return Err(TideError::synthesis(format!("{name} amplitude is {raw_amplitude}")));
            }
            if !phase.is_finite() {
                return Err(TideError::synthesis(format!("{name} phase is {phase}")));
            }

            let amplitude_cm = if raw_amplitude < 0.0 {
                warn!(constituent = %name, raw_amplitude_cm = raw_amplitude, "negative amplitude clamped to zero");
                warnings.push(SynthesisWarning::AmplitudeClamped {
                    constituent: name,
                    raw_amplitude_cm: raw_amplitude,
                });
                0.0
            } else {
                raw_amplitude
            };

            constituents.push(EffectiveConstituent {
                name,
                amplitude_cm,
                phase_deg: phase,
                speed_deg_per_hour: base.frequency_deg_per_hour,
            });
        }

        Ok((TideModel::new(constituents, self.config.synthesis.baseline_cm), warnings))
    }

    /// Evaluate the model on `[start, end)` every `interval`, starting at `start`.
    pub fn sample_series(
        model: &TideModel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Duration,
    ) -> Result<Vec<TideSample>, TideError> {
        if interval <= Duration::zero() {
            return Err(TideError::synthesis("sampling interval must be positive"));
        }

        let expected = ((end - start).num_milliseconds().max(0) / interval.num_milliseconds().max(1)) as usize + 1;
        let mut samples = Vec::with_capacity(expected);
        let mut t = start;
        while t < end {
            samples.push(TideSample {
                timestamp: t,
                level_cm: model.level_at(t)?,
            });
            t = t
                .checked_add_signed(interval)
                .ok_or_else(|| TideError::synthesis(format!("sample time after {t} is out of range")))?;
        }
        Ok(samples)
    }

    /// Locate turning points in a uniformly spaced series.
    ///
    /// Flat steps carry the previous direction, so a run of equal samples is
    /// only a turning point when the series reverses after it. Such a run
    /// turns at its middle sample.
    pub fn find_extrema(model: &TideModel, samples: &[TideSample]) -> Result<Vec<TideExtremum>, TideError> {
        let mut extrema = Vec::new();
        // Last non-zero step and the index of the sample it arrived at.
        let mut last: Option<(f64, usize)> = None;

        for i in 1..samples.len() {
            let step = samples[i].level_cm - samples[i - 1].level_cm;
            if step == 0.0 {
                continue;
            }

            if let Some((prev_step, arrived)) = last {
                if (prev_step > 0.0) != (step > 0.0) {
                    let kind = if prev_step > 0.0 {
                        ExtremumKind::High
                    } else {
                        ExtremumKind::Low
                    };
                    let turn = (arrived + i - 1) / 2;
                    let (timestamp, level_cm) =
                        refine_extremum(model, &samples[turn - 1], &samples[turn], &samples[turn + 1])?;
                    extrema.push(TideExtremum {
                        kind,
                        timestamp,
                        level_cm,
                    });
                }
            }
            last = Some((step, i));
        }
        Ok(extrema)
    }

    /// Accuracy tier and 0–100 confidence score for a request.
    pub fn assess(
        &self,
        coordinate: &CoordinateVariation,
        seasonal: &SeasonalVariation,
        correction: &RegionalCorrection<'_>,
    ) -> (Accuracy, u8) {
        let threshold = self.config.synthesis.large_adjustment_threshold;
        let mut accuracy = correction.data_quality().map_or(Accuracy::Low, Accuracy::from);
        if coordinate.magnitude() > threshold || seasonal.magnitude() > threshold {
            accuracy = accuracy.degraded();
        }

        let c = &self.config.confidence;
        let base = match accuracy {
            Accuracy::High => c.high_score,
            Accuracy::Medium => c.medium_score,
            Accuracy::Low => c.low_score,
        };
        let penalty = correction
            .nearest_distance_km
            .map_or(c.max_distance_penalty, |d| (d * c.distance_penalty_per_km).min(c.max_distance_penalty));

        let mut score = (base - penalty).clamp(0.0, 100.0);
        if accuracy == Accuracy::Low {
            score = score.min(f64::from(c.low_confidence_ceiling.saturating_sub(1)));
        }
        (accuracy, score.round() as u8)
    }

    /// Full synthesis: model, samples, extrema and metadata.
    pub fn synthesize(&self, request: &SynthesisRequest<'_, '_>) -> Result<TideInfo, TideError> {
        let (model, warnings) =
            self.build_model(request.coordinate_variation, request.seasonal_variation, request.correction)?;

        let synthesis = &self.config.synthesis;
        let end = request
            .start
            .checked_add_signed(Duration::hours(i64::from(synthesis.window_hours)))
            .ok_or_else(|| TideError::synthesis(format!("window starting {} is out of range", request.start)))?;
        let interval = Duration::minutes(i64::from(synthesis.sample_interval_minutes));
        let samples = Self::sample_series(&model, request.start, end, interval)?;
        let extrema = Self::find_extrema(&model, &samples)?;

        let (accuracy, confidence_score) =
            self.assess(request.coordinate_variation, request.seasonal_variation, request.correction);

        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), s| {
                (min.min(s.level_cm), max.max(s.level_cm))
            });
        let tidal_range_cm = if samples.is_empty() { 0.0 } else { max - min };

        let moon_age = moon_age_days(request.start);

        debug!(
            samples = samples.len(),
            extrema = extrema.len(),
            ?accuracy,
            confidence_score,
            "synthesis complete"
        );

        Ok(TideInfo {
            samples,
            extrema,
            accuracy,
            confidence_score,
            algorithm_version: synthesis.algorithm_version.clone(),
            station: request.correction.station_match(),
            strength: classify_strength(moon_age, &self.config.strength),
            moon_age_days: moon_age,
            tidal_range_cm,
            warnings,
        })
    }
}

/// Parabolic vertex through three equally spaced samples.
fn refine_extremum(
    model: &TideModel,
    prev: &TideSample,
    mid: &TideSample,
    next: &TideSample,
) -> Result<(DateTime<Utc>, f64), TideError> {
    let curvature = prev.level_cm - 2.0 * mid.level_cm + next.level_cm;
    let offset = if curvature.abs() > f64::EPSILON {
        (0.5 * (prev.level_cm - next.level_cm) / curvature).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    let step_ms = (next.timestamp - mid.timestamp).num_milliseconds() as f64;
    let timestamp = mid
        .timestamp
        .checked_add_signed(Duration::milliseconds((offset * step_ms).round() as i64))
        .ok_or_else(|| TideError::synthesis(format!("refined extremum near {} is out of range", mid.timestamp)))?;
    Ok((timestamp, model.level_at(timestamp)?))
}
