//! Error taxonomy for the detection pipeline.
//!
//! The coordinator distinguishes fatal input errors from recoverable
//! detection failures. Per-detector faults are isolated: they remove one
//! candidate from the selection round without aborting siblings.

use crate::DetectionMethod;
use thiserror::Error;

/// Top-level error type returned by the coordinator and harness.
#[derive(Debug, Error)]
pub enum RoiError {
    /// The input image is missing, empty, or not a fully decoded RGBA8 plane.
    /// Fatal: no detector is invoked and no fallback is attempted.
    #[error("invalid input image: {0}")]
    InvalidInput(String),

    /// The global detection budget elapsed before any detector finished.
    /// Recovered via the deterministic fallback when enabled.
    #[error("detection timed out after {timeout_ms} ms")]
    Timeout {
        /// The budget that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// Every launched detector failed or returned no candidate above its
    /// score threshold. Treated identically to total failure.
    #[error("no detector produced a candidate")]
    EmptyResultSet,

    /// The coordinator was constructed or invoked with an inconsistent
    /// detector set (e.g. an enabled method with no registered detector).
    #[error("coordinator configuration error: {0}")]
    Config(String),

    /// The benchmark dataset could not be loaded or decoded.
    #[error("dataset error: {0}")]
    Dataset(String),
}

/// Failure inside a single detector, isolated by the coordinator.
#[derive(Debug, Clone, Error)]
#[error("{method} detector failed: {message}")]
pub struct DetectorFailure {
    /// The detector that failed.
    pub method: DetectionMethod,
    /// Human-readable failure description.
    pub message: String,
}

impl DetectorFailure {
    /// Create a failure record for `method`.
    pub fn new(method: DetectionMethod, message: impl Into<String>) -> Self {
        Self {
            method,
            message: message.into(),
        }
    }
}
