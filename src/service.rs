//! # Tide Calculation Service
//!
//! The public face of the engine. It owns the reference data, validates it
//! once on [`initialize`](TideCalculationService::initialize), reports health,
//! and answers [`calculate_tide_info`](TideCalculationService::calculate_tide_info)
//! requests through the deduplicating cache.
//!
//! On a cache miss the compute closure runs the stages in order:
//! coordinate variation → seasonal variation → regional correction →
//! synthesis.

use crate::cache::{CacheKey, CacheStats, TideCache};
use crate::config::EngineConfig;
use crate::constituents::HarmonicConstituentTable;
use crate::coordinate::Coordinate;
use crate::error::TideError;
use crate::persist::{self, PersistError, PersistedCacheRecord};
use crate::regional::RegionalCorrectionResolver;
use crate::stations::RegionalStationCatalog;
use crate::synthesis::{SynthesisRequest, TideSynthesizer};
use crate::variation::{CoordinateVariationCalculator, SeasonalVariationCalculator};
use crate::TideInfo;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of [`TideCalculationService::health_check`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
}

/// Validated reference data shared read-only by every computation.
struct ReferenceData {
    config: EngineConfig,
    constituents: HarmonicConstituentTable,
    catalog: RegionalStationCatalog,
}

enum ServiceState {
    Uninitialized,
    Ready(Arc<ReferenceData>),
    Failed(TideError),
}

pub struct TideCalculationService {
    config: EngineConfig,
    constituents: HarmonicConstituentTable,
    catalog: RegionalStationCatalog,
    state: RwLock<ServiceState>,
    cache: TideCache,
    synthesis_runs: Arc<AtomicU64>,
}

impl TideCalculationService {
    pub fn new(config: EngineConfig, constituents: HarmonicConstituentTable, catalog: RegionalStationCatalog) -> Self {
        let cache = TideCache::new(config.cache.capacity);
        Self {
            config,
            constituents,
            catalog,
            state: RwLock::new(ServiceState::Uninitialized),
            cache,
            synthesis_runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Validate the reference data. A no-op once it has succeeded.
    pub fn initialize(&self) -> Result<(), TideError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, ServiceState::Ready(_)) {
            return Ok(());
        }

        let validated = self
            .constituents
            .validate()
            .and_then(|()| self.catalog.validate());

        match validated {
            Ok(()) => {
                info!(
                    constituents = self.constituents.len(),
                    stations = self.catalog.len(),
                    "tide engine initialized"
                );
                *state = ServiceState::Ready(Arc::new(ReferenceData {
                    config: self.config.clone(),
                    constituents: self.constituents.clone(),
                    catalog: self.catalog.clone(),
                }));
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "tide engine initialization failed");
                *state = ServiceState::Failed(e.clone());
                Err(e)
            }
        }
    }

    pub fn health_check(&self) -> HealthReport {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            ServiceState::Uninitialized => HealthReport {
                status: HealthStatus::Unhealthy,
                message: "tide engine has not been initialized".to_string(),
            },
            ServiceState::Failed(e) => HealthReport {
                status: HealthStatus::Unhealthy,
                message: e.to_string(),
            },
            ServiceState::Ready(data) => {
                let stations = data.catalog.len();
                let required = data.config.health.min_station_coverage;
                if stations == 0 || stations < required {
                    HealthReport {
                        status: HealthStatus::Degraded,
                        message: format!(
                            "{stations} regional stations available (want {required}); predictions use neutral corrections"
                        ),
                    }
                } else {
                    HealthReport {
                        status: HealthStatus::Healthy,
                        message: format!("{stations} regional stations available"),
                    }
                }
            }
        }
    }

    /// Validate a raw coordinate, then calculate.
    pub async fn calculate_tide_info(
        &self,
        latitude: f64,
        longitude: f64,
        date: DateTime<Utc>,
    ) -> Result<TideInfo, TideError> {
        let coordinate = Coordinate::new(latitude, longitude)?;
        self.calculate(coordinate, date).await
    }

    /// Predict tides for the window starting at `date`.
    ///
    /// The coordinate is snapped to 4 decimals and the date truncated to whole
    /// seconds before anything else, so every request that maps to a cache key
    /// computes from exactly the inputs the key describes.
    pub async fn calculate(&self, coordinate: Coordinate, date: DateTime<Utc>) -> Result<TideInfo, TideError> {
        let data = self.reference_data()?;
        let coordinate = coordinate.normalized();
        let date = date.trunc_subsecs(0);
        let key = CacheKey::derive(&coordinate, date, data.config.cache.variation_options_version);
        let runs = Arc::clone(&self.synthesis_runs);
        self.cache
            .get_or_compute(key, move || {
                runs.fetch_add(1, Ordering::Relaxed);
                compute(&data, coordinate, date)
            })
            .await
    }

    pub fn cache(&self) -> &TideCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of synthesis runs started since construction.
    pub fn synthesis_runs(&self) -> u64 {
        self.synthesis_runs.load(Ordering::Relaxed)
    }

    /// Write every cached entry to `path` as persisted records.
    pub fn persist_cache<P: AsRef<Path>>(&self, path: P) -> Result<usize, PersistError> {
        let records: Vec<PersistedCacheRecord> = self
            .cache
            .entries()
            .iter()
            .filter_map(|entry| match PersistedCacheRecord::from_entry(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(key = %entry.key, error = %e, "not persisting cache entry");
                    None
                }
            })
            .collect();
        persist::save_records(path, &records)?;
        Ok(records.len())
    }

    /// Load persisted records into the cache, skipping corrupted ones.
    pub fn restore_cache<P: AsRef<Path>>(&self, path: P) -> Result<usize, PersistError> {
        let entries = persist::load_records(path)?;
        let count = entries.len();
        for entry in entries {
            self.cache.insert(entry);
        }
        Ok(count)
    }

    fn reference_data(&self) -> Result<Arc<ReferenceData>, TideError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            ServiceState::Ready(data) => Ok(Arc::clone(data)),
            ServiceState::Uninitialized | ServiceState::Failed(_) => Err(TideError::NotInitialized),
        }
    }
}

fn compute(data: &ReferenceData, coordinate: Coordinate, date: DateTime<Utc>) -> Result<TideInfo, TideError> {
    let config = &data.config;
    let coordinate_variation = CoordinateVariationCalculator::new(config.coordinate).calculate(&coordinate);
    let seasonal_variation = SeasonalVariationCalculator::new(config.seasonal).calculate(&coordinate, date);
    let correction = RegionalCorrectionResolver::new(&data.catalog, config.regional).resolve(&coordinate);

    TideSynthesizer::new(&data.constituents, config).synthesize(&SynthesisRequest {
        start: date,
        coordinate_variation: &coordinate_variation,
        seasonal_variation: &seasonal_variation,
        correction: &correction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constituents::HarmonicConstituent;
    use chrono::TimeZone;

    fn service_with(catalog: RegionalStationCatalog) -> TideCalculationService {
        TideCalculationService::new(EngineConfig::default(), HarmonicConstituentTable::standard(), catalog)
    }

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn unhealthy_until_initialized() {
        let service = service_with(RegionalStationCatalog::embedded().unwrap());
        assert_eq!(service.health_check().status, HealthStatus::Unhealthy);

        service.initialize().unwrap();
        assert_eq!(service.health_check().status, HealthStatus::Healthy);

        // Second call is a no-op.
        service.initialize().unwrap();
        assert_eq!(service.health_check().status, HealthStatus::Healthy);
    }

    #[test]
    fn empty_catalog_is_degraded() {
        let service = service_with(RegionalStationCatalog::default());
        service.initialize().unwrap();
        let report = service.health_check();
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.message.contains("0 regional stations"));
    }

    #[test]
    fn coverage_threshold_is_configurable() {
        let mut config = EngineConfig::default();
        config.health.min_station_coverage = 50;
        let service = TideCalculationService::new(
            config,
            HarmonicConstituentTable::standard(),
            RegionalStationCatalog::embedded().unwrap(),
        );
        service.initialize().unwrap();
        assert_eq!(service.health_check().status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn malformed_reference_data_is_fatal() {
        let table = HarmonicConstituentTable::new(vec![HarmonicConstituent {
            name: crate::constituents::Constituent::M2,
            base_amplitude_cm: f64::NAN,
            base_phase_deg: 0.0,
            frequency_deg_per_hour: 28.98,
        }]);
        let service = TideCalculationService::new(EngineConfig::default(), table, RegionalStationCatalog::default());

        assert!(matches!(service.initialize(), Err(TideError::Initialization(_))));
        let report = service.health_check();
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.message.contains("initialization failed"));

        let result = service.calculate_tide_info(35.0, 139.0, date()).await;
        assert_eq!(result, Err(TideError::NotInitialized));
    }

    #[tokio::test]
    async fn calculate_before_initialize_is_rejected() {
        let service = service_with(RegionalStationCatalog::embedded().unwrap());
        let result = service.calculate_tide_info(35.0, 139.0, date()).await;
        assert_eq!(result, Err(TideError::NotInitialized));
    }

    #[tokio::test]
    async fn invalid_coordinate_is_rejected_first() {
        let service = service_with(RegionalStationCatalog::embedded().unwrap());
        let result = service.calculate_tide_info(91.0, 0.0, date()).await;
        assert!(matches!(result, Err(TideError::InvalidCoordinate { .. })));
    }

    #[tokio::test]
    async fn degraded_service_still_calculates() {
        let service = service_with(RegionalStationCatalog::default());
        service.initialize().unwrap();
        let info = service.calculate_tide_info(35.6762, 139.6503, date()).await.unwrap();
        assert_eq!(info.samples.len(), 96);
        assert!(info.station.is_none());
    }

    #[tokio::test]
    async fn cache_persists_and_restores() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let service = service_with(RegionalStationCatalog::embedded().unwrap());
        service.initialize().unwrap();
        let original = service.calculate_tide_info(35.6762, 139.6503, date()).await.unwrap();
        assert_eq!(service.persist_cache(file.path()).unwrap(), 1);

        let fresh = service_with(RegionalStationCatalog::embedded().unwrap());
        fresh.initialize().unwrap();
        assert_eq!(fresh.restore_cache(file.path()).unwrap(), 1);

        let restored = fresh.calculate_tide_info(35.6762, 139.6503, date()).await.unwrap();
        assert_eq!(fresh.cache_stats().hits, 1);
        assert_eq!(fresh.cache_stats().misses, 0);
        assert_eq!(restored.extrema.len(), original.extrema.len());
    }
}
