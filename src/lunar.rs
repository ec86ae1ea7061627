//! Moon age and spring/neap classification (Schaefer 1985 low-precision phase)
//!
//! Accuracy is about ±1 day for the moon's age, which is plenty for labelling
//! a day as spring, neap or in between.

use crate::config::StrengthConfig;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Mean synodic month in days.
pub const SYNODIC_MONTH_DAYS: f64 = 29.530_588_2;

/// Relative strength of the tidal range on a given day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TideStrength {
    /// Near new or full moon: sun and moon aligned, largest range
    Spring,
    Moderate,
    /// Near a quarter moon: smallest range
    Neap,
}

/// Days since the last new moon at `when`, in `[0, SYNODIC_MONTH_DAYS)`.
pub fn moon_age_days(when: DateTime<Utc>) -> f64 {
    // Jan/Feb count as months 13/14 of the previous year.
    let (mut y, mut m) = (when.year(), when.month() as i32);
    if m < 3 {
        y -= 1;
        m += 12;
    }
    m += 1;

    let day = f64::from(when.day())
        + (f64::from(when.hour()) + f64::from(when.minute()) / 60.0 + f64::from(when.second()) / 3600.0)
            / 24.0;

    // 694 039.09 days separate JD 0 from the 1900-01-00 12 UT new moon epoch.
    let days = (365.25 * f64::from(y)).floor() + (30.6 * f64::from(m)).floor() + day - 694_039.09;
    let cycles = days / SYNODIC_MONTH_DAYS;
    (cycles - cycles.floor()) * SYNODIC_MONTH_DAYS
}

/// Classify a moon age against the configured spring and neap windows.
pub fn classify_strength(age_days: f64, config: &StrengthConfig) -> TideStrength {
    let half = SYNODIC_MONTH_DAYS / 2.0;
    let quarter = SYNODIC_MONTH_DAYS / 4.0;

    // Distance to the nearest new or full moon, and to the nearest quarter.
    let from_syzygy = {
        let d = age_days.rem_euclid(half);
        d.min(half - d)
    };
    let from_quadrature = (age_days.rem_euclid(half) - quarter).abs();

    if from_syzygy <= config.spring_window_days {
        TideStrength::Spring
    } else if from_quadrature <= config.neap_window_days {
        TideStrength::Neap
    } else {
        TideStrength::Moderate
    }
}
