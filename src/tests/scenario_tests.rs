//! # End-to-End Tide Scenarios
//!
//! These tests drive the full service (initialize → cache → synthesis) with
//! the embedded station catalog and check the properties callers rely on:
//! determinism, range validation, cache bounds and deduplication, and the
//! expected behaviour at a calibrated bay versus the open ocean.

use crate::cache::CacheKey;
use crate::config::EngineConfig;
use crate::constituents::HarmonicConstituentTable;
use crate::coordinate::Coordinate;
use crate::error::TideError;
use crate::persist::PersistedCacheRecord;
use crate::service::{HealthStatus, TideCalculationService};
use crate::stations::RegionalStationCatalog;
use crate::{Accuracy, ExtremumKind};
use approx::assert_abs_diff_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};

const TOKYO: (f64, f64) = (35.6762, 139.6503);

fn tokyo_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn ready_service(config: EngineConfig) -> TideCalculationService {
    let service = TideCalculationService::new(
        config,
        HarmonicConstituentTable::standard(),
        RegionalStationCatalog::embedded().expect("embedded catalog should parse"),
    );
    service.initialize().expect("reference data should validate");
    assert_eq!(service.health_check().status, HealthStatus::Healthy);
    service
}

/// Tokyo Bay sits next to a high-quality station: semi-diurnal extrema,
/// high accuracy and a strong confidence score.
#[tokio::test]
async fn tokyo_bay_scenario() {
    let service = ready_service(EngineConfig::default());
    let info = service
        .calculate_tide_info(TOKYO.0, TOKYO.1, tokyo_date())
        .await
        .unwrap();

    assert_eq!(info.samples.len(), 96, "24 h at 15-minute spacing");
    assert_eq!(info.samples[0].timestamp, tokyo_date());
    assert!(info.samples.last().unwrap().timestamp < tokyo_date() + Duration::hours(24));

    assert!(
        (2..=4).contains(&info.extrema.len()),
        "expected 2-4 extrema, got {}",
        info.extrema.len()
    );
    for pair in info.extrema.windows(2) {
        assert_ne!(pair[0].kind, pair[1].kind, "highs and lows should alternate");
    }

    assert_eq!(info.accuracy, Accuracy::High);
    assert!(info.confidence_score > 70, "confidence {}", info.confidence_score);
    assert_eq!(info.algorithm_version, "hybrid-astronomical-v1");
    assert_eq!(info.station.as_ref().unwrap().id, "jp-tokyo-bay");
    assert!(info.warnings.is_empty());
    assert!(info.tidal_range_cm > 50.0);
}

/// Each high is above every neighbouring low.
#[tokio::test]
async fn highs_sit_above_lows() {
    let service = ready_service(EngineConfig::default());
    let info = service
        .calculate_tide_info(TOKYO.0, TOKYO.1, tokyo_date())
        .await
        .unwrap();

    for pair in info.extrema.windows(2) {
        let (high, low) = if pair[0].kind == ExtremumKind::High {
            (pair[0], pair[1])
        } else {
            (pair[1], pair[0])
        };
        assert!(high.level_cm > low.level_cm);
    }
    assert_eq!(info.highs().count() + info.lows().count(), info.extrema.len());
    for high in info.highs() {
        let nearest = info
            .samples
            .iter()
            .min_by_key(|s| (s.timestamp - high.timestamp).num_milliseconds().abs())
            .unwrap();
        assert!(high.level_cm >= nearest.level_cm - 1e-6, "refined high undershoots the grid");
    }
}

/// Far from any station the prediction still succeeds, at low confidence.
#[tokio::test]
async fn open_ocean_scenario() {
    let service = ready_service(EngineConfig::default());
    for date in [tokyo_date(), Utc.with_ymd_and_hms(2023, 11, 20, 6, 30, 0).unwrap()] {
        let info = service.calculate_tide_info(0.0, 0.0, date).await.unwrap();
        assert_eq!(info.accuracy, Accuracy::Low);
        assert!(info.confidence_score < 40, "confidence {}", info.confidence_score);
        assert!(info.station.is_none());
        assert_eq!(info.samples.len(), 96);
    }
}

#[tokio::test]
async fn repeated_calls_are_identical() {
    let first = ready_service(EngineConfig::default());
    let second = ready_service(EngineConfig::default());

    let a = first.calculate_tide_info(TOKYO.0, TOKYO.1, tokyo_date()).await.unwrap();
    let b = first.calculate_tide_info(TOKYO.0, TOKYO.1, tokyo_date()).await.unwrap();
    // A separate service computes from scratch, not from the same cache.
    let c = second.calculate_tide_info(TOKYO.0, TOKYO.1, tokyo_date()).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a, c);
    for (x, y) in a.samples.iter().zip(&c.samples) {
        assert_eq!(x.level_cm.to_bits(), y.level_cm.to_bits());
    }
}

#[tokio::test]
async fn boundary_coordinates() {
    let service = ready_service(EngineConfig::default());
    for (lat, lon) in [(-90.0, -180.0), (90.0, 180.0), (90.0, -180.0), (-90.0, 180.0)] {
        assert!(
            service.calculate_tide_info(lat, lon, tokyo_date()).await.is_ok(),
            "({lat}, {lon}) should be accepted"
        );
    }
    for (lat, lon) in [(90.0001, 0.0), (0.0, -180.0001), (-90.0001, 10.0), (0.0, 180.0001)] {
        let result = service.calculate_tide_info(lat, lon, tokyo_date()).await;
        assert!(
            matches!(result, Err(TideError::InvalidCoordinate { .. })),
            "({lat}, {lon}) should be rejected"
        );
    }
}

/// Reloading through the persisted record shape reproduces the prediction.
#[tokio::test]
async fn persisted_record_roundtrip() {
    let service = ready_service(EngineConfig::default());
    let info = service.calculate_tide_info(TOKYO.0, TOKYO.1, tokyo_date()).await.unwrap();

    let entry = service.cache().entries().pop().unwrap();
    let record = PersistedCacheRecord::from_entry(&entry).unwrap();
    let json = serde_json::to_string(&record).unwrap();
    let reloaded: PersistedCacheRecord = serde_json::from_str(&json).unwrap();
    let restored = reloaded.into_entry().unwrap().data;

    assert_eq!(restored.samples.len(), info.samples.len());
    for (a, b) in restored.samples.iter().zip(&info.samples) {
        assert_eq!(a.timestamp, b.timestamp);
        assert_abs_diff_eq!(a.level_cm, b.level_cm, epsilon = 1e-9);
    }
    assert_eq!(restored.extrema.len(), info.extrema.len());
    for (a, b) in restored.extrema.iter().zip(&info.extrema) {
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.timestamp, b.timestamp);
        assert_abs_diff_eq!(a.level_cm, b.level_cm, epsilon = 1e-9);
    }
    assert_eq!(restored.accuracy, info.accuracy);
    assert_eq!(restored.confidence_score, info.confidence_score);
}

/// N + 1 distinct requests into a cache of capacity N evict the oldest one.
#[tokio::test]
async fn cache_stays_bounded() {
    let mut config = EngineConfig::default();
    config.cache.capacity = 3;
    let service = ready_service(config);

    let dates: Vec<DateTime<Utc>> = (0..4).map(|d| tokyo_date() + Duration::days(d)).collect();
    for date in &dates {
        service.calculate_tide_info(TOKYO.0, TOKYO.1, *date).await.unwrap();
    }

    assert_eq!(service.cache().len(), 3);
    let coordinate = Coordinate::new(TOKYO.0, TOKYO.1).unwrap();
    let key = |date: DateTime<Utc>| CacheKey::derive(&coordinate, date, 1);
    assert!(!service.cache().contains(&key(dates[0])));
    for date in &dates[1..] {
        assert!(service.cache().contains(&key(*date)));
    }
}

/// Two simultaneous identical requests run the synthesis once.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_identical_requests_compute_once() {
    let service = ready_service(EngineConfig::default());
    let (a, b) = tokio::join!(
        service.calculate_tide_info(TOKYO.0, TOKYO.1, tokyo_date()),
        service.calculate_tide_info(TOKYO.0, TOKYO.1, tokyo_date()),
    );
    assert_eq!(a.unwrap(), b.unwrap());

    assert_eq!(service.synthesis_runs(), 1, "exactly one synthesis should run");
    let stats = service.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.joined + stats.hits, 1);
}

/// Coordinates that round to the same key get the same answer whether a
/// neighbouring request warmed the cache or not.
#[tokio::test]
async fn near_identical_coordinates_agree_fresh_and_warm() {
    let request = (35.67621, 139.65034);
    let neighbour = (35.67624, 139.65031);

    let fresh = ready_service(EngineConfig::default());
    let cold = fresh.calculate_tide_info(request.0, request.1, tokyo_date()).await.unwrap();

    let warm = ready_service(EngineConfig::default());
    warm.calculate_tide_info(neighbour.0, neighbour.1, tokyo_date()).await.unwrap();
    let cached = warm.calculate_tide_info(request.0, request.1, tokyo_date()).await.unwrap();

    assert_eq!(warm.cache_stats().hits, 1);
    assert_eq!(warm.synthesis_runs(), 1);
    assert_eq!(cold, cached);
}

/// A start with milliseconds computes from the whole second its key names.
#[tokio::test]
async fn sub_second_start_agrees_fresh_and_warm() {
    let late = tokyo_date() + Duration::milliseconds(400);

    let fresh = ready_service(EngineConfig::default());
    let cold = fresh.calculate_tide_info(TOKYO.0, TOKYO.1, late).await.unwrap();
    assert_eq!(cold.samples[0].timestamp, tokyo_date());

    let warm = ready_service(EngineConfig::default());
    warm.calculate_tide_info(TOKYO.0, TOKYO.1, tokyo_date()).await.unwrap();
    let cached = warm.calculate_tide_info(TOKYO.0, TOKYO.1, late).await.unwrap();

    assert_eq!(warm.synthesis_runs(), 1);
    assert_eq!(cold, cached);
}

/// Six months apart, the same place gets a different tidal signal.
#[tokio::test]
async fn seasons_change_the_prediction() {
    let service = ready_service(EngineConfig::default());
    let january = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let july = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
    let a = service.calculate_tide_info(TOKYO.0, TOKYO.1, january).await.unwrap();
    let b = service.calculate_tide_info(TOKYO.0, TOKYO.1, july).await.unwrap();
    assert!((a.tidal_range_cm - b.tidal_range_cm).abs() > 1e-6);
}

/// Changing the variation version produces a separate cache entry.
#[tokio::test]
async fn variation_version_partitions_cache() {
    let service = ready_service(EngineConfig::default());
    service.calculate_tide_info(TOKYO.0, TOKYO.1, tokyo_date()).await.unwrap();

    let coordinate = Coordinate::new(TOKYO.0, TOKYO.1).unwrap();
    assert!(service.cache().contains(&CacheKey::derive(&coordinate, tokyo_date(), 1)));
    assert!(!service.cache().contains(&CacheKey::derive(&coordinate, tokyo_date(), 2)));
}
