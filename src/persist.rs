//! # Persisted Cache Records
//!
//! The flat record shape handed to an external storage layer, and a small
//! JSON-file store for it.
//!
//! A record carries everything needed to rebuild a cache entry without the
//! engine: the key string, the rounded coordinate, the target date, the
//! serialized [`TideInfo`] and the summary fields a storage index might want
//! (accuracy, confidence, algorithm version, timings).
//!
//! ## Validation
//! Loading never trusts a record. Each one is checked for:
//! - a well-formed key that agrees with the stored coordinate and date
//! - a `TideInfo` payload that parses and agrees with the summary fields
//! - finite, chronologically ordered samples and extrema
//! - a confidence score within 0–100
//!
//! A record that fails any check is a [`TideError::CacheCorruption`]. File
//! loading logs and skips such records so one bad entry only costs a
//! recomputation.

use crate::cache::{CacheEntry, CacheKey};
use crate::coordinate::Coordinate;
use crate::error::TideError;
use crate::{Accuracy, TideInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from reading or writing a record file.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("cache IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache encoding: {0}")]
    Json(#[from] serde_json::Error),
}

/// One cache entry as stored outside the process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedCacheRecord {
    pub key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub target_date: DateTime<Utc>,
    /// `TideInfo` encoded as JSON
    pub tide_info: String,
    pub algorithm_version: String,
    pub accuracy: Accuracy,
    pub calculation_time_ms: u64,
    pub confidence_score: u8,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl PersistedCacheRecord {
    pub fn from_entry(entry: &CacheEntry) -> Result<Self, TideError> {
        let target_date = DateTime::parse_from_rfc3339(&entry.key.date_hash)
            .map_err(|e| TideError::corruption(format!("entry {} has bad date: {e}", entry.key)))?
            .with_timezone(&Utc);
        let (latitude, longitude) = parse_coordinate_hash(&entry.key.coordinate_hash)?;
        let tide_info = serde_json::to_string(&entry.data)
            .map_err(|e| TideError::corruption(format!("entry {} cannot be encoded: {e}", entry.key)))?;

        Ok(Self {
            key: entry.key.to_string(),
            latitude,
            longitude,
            target_date,
            tide_info,
            algorithm_version: entry.data.algorithm_version.clone(),
            accuracy: entry.data.accuracy,
            calculation_time_ms: entry.calculation_time_ms,
            confidence_score: entry.data.confidence_score,
            created_at: entry.created_at,
            last_accessed_at: entry.last_accessed_at,
        })
    }

    /// Validate and rebuild the cache entry.
    pub fn into_entry(self) -> Result<CacheEntry, TideError> {
        let key = CacheKey::parse(&self.key)?;

        let coordinate = Coordinate::new(self.latitude, self.longitude)
            .map_err(|e| TideError::corruption(format!("record {}: {e}", self.key)))?;
        let expected = CacheKey::derive(&coordinate, self.target_date, key.variation_options_version);
        if expected != key {
            return Err(TideError::corruption(format!(
                "record {} does not match its coordinate/date ({expected})",
                self.key
            )));
        }

        let data: TideInfo = serde_json::from_str(&self.tide_info)
            .map_err(|e| TideError::corruption(format!("record {}: {e}", self.key)))?;
        if data.algorithm_version != self.algorithm_version
            || data.accuracy != self.accuracy
            || data.confidence_score != self.confidence_score
        {
            return Err(TideError::corruption(format!(
                "record {} summary fields disagree with payload",
                self.key
            )));
        }
        validate_tide_info(&data).map_err(|msg| TideError::corruption(format!("record {}: {msg}", self.key)))?;

        Ok(CacheEntry::restored(
            key,
            data,
            self.created_at,
            self.last_accessed_at,
            self.calculation_time_ms,
        ))
    }
}

fn parse_coordinate_hash(hash: &str) -> Result<(f64, f64), TideError> {
    let parsed = hash
        .split_once(',')
        .and_then(|(lat, lon)| Some((lat.parse().ok()?, lon.parse().ok()?)));
    parsed.ok_or_else(|| TideError::corruption(format!("bad coordinate hash '{hash}'")))
}

fn validate_tide_info(info: &TideInfo) -> Result<(), String> {
    if info.confidence_score > 100 {
        return Err(format!("confidence {} out of range", info.confidence_score));
    }
    if !info.tidal_range_cm.is_finite() || !info.moon_age_days.is_finite() {
        return Err("non-finite summary value".to_string());
    }
    if info.samples.iter().any(|s| !s.level_cm.is_finite()) {
        return Err("non-finite sample level".to_string());
    }
    if info.samples.windows(2).any(|w| w[0].timestamp >= w[1].timestamp) {
        return Err("samples out of order".to_string());
    }
    if info.extrema.iter().any(|e| !e.level_cm.is_finite()) {
        return Err("non-finite extremum level".to_string());
    }
    if info.extrema.windows(2).any(|w| w[0].timestamp > w[1].timestamp) {
        return Err("extrema out of order".to_string());
    }
    Ok(())
}

/// Write records as a JSON array.
pub fn save_records<P: AsRef<Path>>(path: P, records: &[PersistedCacheRecord]) -> Result<(), PersistError> {
    let data = serde_json::to_vec(records)?;
    fs::write(path, data)?;
    Ok(())
}

/// Read a JSON array of records, skipping (and logging) any that are
/// malformed. Only an unreadable file or a non-array document is an error.
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<CacheEntry>, PersistError> {
    let data = fs::read(&path)?;
    let raw: Vec<serde_json::Value> = serde_json::from_slice(&data)?;

    let total = raw.len();
    let entries: Vec<CacheEntry> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let entry = serde_json::from_value::<PersistedCacheRecord>(value)
                .map_err(|e| TideError::corruption(format!("record #{index}: {e}")))
                .and_then(PersistedCacheRecord::into_entry);
            match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping corrupted cache record");
                    None
                }
            }
        })
        .collect();

    info!(
        path = %path.as_ref().display(),
        loaded = entries.len(),
        skipped = total - entries.len(),
        "restored persisted tide cache"
    );
    Ok(entries)
}
