//! # Tide Engine Command Line
//!
//! Predicts tides for one coordinate and prints the high/low water table, or
//! the full result as JSON. Intended for checking the engine by hand.
//!
//! ```text
//! tide-engine --lat 35.6762 --lon 139.6503 [--date 2024-06-01T00:00:00Z]
//!             [--config tide-engine.toml] [--stations stations.toml]
//!             [--cache /tmp/tide_cache.json] [--json]
//! ```

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use std::env;
use tide_engine::config::EngineConfig;
use tide_engine::constituents::HarmonicConstituentTable;
use tide_engine::service::{HealthStatus, TideCalculationService};
use tide_engine::stations::RegionalStationCatalog;
use tide_engine::{ExtremumKind, TideInfo};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    latitude: Option<f64>,
    longitude: Option<f64>,
    date: Option<DateTime<Utc>>,
    config: Option<String>,
    stations: Option<String>,
    cache: Option<String>,
    json: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);
    while let Some(flag) = iter.next() {
        let mut value = || iter.next().ok_or_else(|| anyhow!("{flag} needs a value"));
        match flag.as_str() {
            "--lat" => args.latitude = Some(value()?.parse().context("--lat must be a number")?),
            "--lon" => args.longitude = Some(value()?.parse().context("--lon must be a number")?),
            "--date" => {
                let raw = value()?;
                let date = DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("--date '{raw}' is not RFC 3339"))?;
                args.date = Some(date.with_timezone(&Utc));
            }
            "--config" => args.config = Some(value()?),
            "--stations" => args.stations = Some(value()?),
            "--cache" => args.cache = Some(value()?),
            "--json" => args.json = true,
            other => bail!("unknown argument {other}"),
        }
    }
    Ok(args)
}

fn print_table(info: &TideInfo) {
    match &info.station {
        Some(station) => println!(
            "Station: {} ({:.1} km, {:?} quality)",
            station.name, station.distance_km, station.data_quality
        ),
        None => println!("Station: none in range (neutral corrections)"),
    }
    println!(
        "Accuracy: {:?}  Confidence: {}/100  Strength: {:?}  Range: {:.1} cm",
        info.accuracy, info.confidence_score, info.strength, info.tidal_range_cm
    );
    for warning in &info.warnings {
        println!("Warning: {warning:?}");
    }
    println!();

    if info.extrema.is_empty() {
        println!("No high or low water inside the window.");
    }
    for extremum in &info.extrema {
        let label = match extremum.kind {
            ExtremumKind::High => "HIGH",
            ExtremumKind::Low => "LOW ",
        };
        println!(
            "{label}  {}  {:7.1} cm",
            extremum.timestamp.format("%Y-%m-%d %H:%M UTC"),
            extremum.level_cm
        );
    }
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let latitude = args.latitude.ok_or_else(|| anyhow!("--lat is required"))?;
    let longitude = args.longitude.ok_or_else(|| anyhow!("--lon is required"))?;
    let date = args.date.unwrap_or_else(Utc::now);

    let config = match &args.config {
        Some(path) => EngineConfig::load_from_path(path),
        None => EngineConfig::default(),
    };
    let catalog = match &args.stations {
        Some(path) => RegionalStationCatalog::from_path(path)?,
        None => RegionalStationCatalog::embedded()?,
    };

    let service = TideCalculationService::new(config, HarmonicConstituentTable::standard(), catalog);
    service.initialize()?;

    let health = service.health_check();
    match health.status {
        HealthStatus::Healthy => info!(message = %health.message, "engine healthy"),
        HealthStatus::Degraded => warn!(message = %health.message, "engine degraded"),
        HealthStatus::Unhealthy => bail!("engine unhealthy: {}", health.message),
    }

    if let Some(path) = &args.cache {
        // A missing cache file just means a cold start.
        if let Err(e) = service.restore_cache(path) {
            info!(path = %path, error = %e, "no usable cache file");
        }
    }

    let rt = tokio::runtime::Runtime::new()?;
    let tide_info = rt.block_on(service.calculate_tide_info(latitude, longitude, date))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tide_info)?);
    } else {
        print_table(&tide_info);
    }

    if let Some(path) = &args.cache {
        let written = service.persist_cache(path)?;
        info!(path = %path, entries = written, "tide cache saved");
    }

    Ok(())
}
