//! # Engine Error Taxonomy
//!
//! Every failure the tide engine can report to its caller. Errors are plain
//! values: nothing in the engine retries, and nothing is replaced by a
//! synthetic default. The enum is `Clone` because a single failed computation
//! has to be delivered to every request that attached to it while it was in
//! flight.

use thiserror::Error;

/// Errors produced by the tide calculation pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TideError {
    /// Latitude outside [-90, 90] or longitude outside [-180, 180].
    #[error("invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// A calculation was requested before `initialize()` succeeded.
    #[error("tide engine is not initialized")]
    NotInitialized,

    /// Harmonic or station reference data is missing or malformed.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// A NaN or infinite value appeared while synthesizing.
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// A persisted cache record failed shape validation.
    #[error("cache entry corrupted: {0}")]
    CacheCorruption(String),

    /// The computation owning a cache key finished without publishing an outcome.
    #[error("computation for {0} ended without a result")]
    ComputationLost(String),
}

impl TideError {
    pub(crate) fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub(crate) fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        Self::CacheCorruption(msg.into())
    }
}
