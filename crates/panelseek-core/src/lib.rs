//! Core detection logic for the panelseek library.
//!
//! Panelseek locates the rectangular "build area" panel inside a game
//! screenshot and returns its bounding box with a confidence score. No
//! server round-trip, no trained model: four hand-tuned detectors run as an
//! ensemble and a coordinator arbitrates between them.
//!
//! # Architecture Overview
//!
//! 1. **Shared preprocessing**: RGBA8 to luminance conversion
//!    (`Y = 0.299R + 0.587G + 0.114B`), Sobel gradients, separable Gaussian
//!    smoothing.
//!
//! 2. **Detectors** (each `detect(image) -> Option<DetectionResult>`):
//!    - [`corner::CornerDetector`]: Harris responses, greedy non-maximum
//!      suppression, combinatorial rectangle hypotheses, heuristic scoring.
//!    - [`edge::EdgeContourDetector`]: Canny pipeline, 8-connected contour
//!      components, bounding-rect scoring.
//!    - [`template::TemplateMatchDetector`]: synthetic UI-motif templates,
//!      normalized cross-correlation, proximity clustering.
//!    - Color-based detectors are supplied by collaborators through the
//!      [`RoiDetector`] trait with [`DetectionMethod::Color`].
//!
//! 3. **Coordination**: [`coordinator::RoiCoordinator`] launches the enabled
//!    subset on worker threads, races them against a global timeout,
//!    isolates per-detector failures, selects by confidence with a fixed
//!    priority tie-break, and synthesizes a deterministic fallback when
//!    everything fails.
//!
//! 4. **Offline evaluation**: [`benchmark::BenchmarkHarness`] ranks the
//!    detectors against a labeled dataset; [`validator::CompletionValidator`]
//!    gates production readiness.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use panelseek_core::config::{CoordinatorConfig, DetectOptions};
//! use panelseek_core::coordinator::RoiCoordinator;
//! use panelseek_core::edge::EdgeContourDetector;
//! use panelseek_core::template::TemplateMatchDetector;
//! use panelseek_core::test_utils::ScreenshotBuilder;
//! use panelseek_core::DetectionMethod;
//!
//! let config = CoordinatorConfig::builder()
//!     .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Template])
//!     .build();
//! let coordinator = RoiCoordinator::builder()
//!     .config(config)
//!     .detector(Arc::new(EdgeContourDetector::default()))
//!     .detector(Arc::new(TemplateMatchDetector::default()))
//!     .build()
//!     .expect("enabled methods all registered");
//!
//! let (image, _panel) = ScreenshotBuilder::new(640, 420)
//!     .with_panel(70, 60, 500, 300)
//!     .build();
//! let result = coordinator
//!     .detect_roi(image, &DetectOptions::default())
//!     .expect("fallback enabled, so detection always yields a result");
//! assert!((0.0..=1.0).contains(&result.confidence));
//! ```

/// Offline benchmarking against labeled datasets.
pub mod benchmark;
/// Configuration types for detectors and the coordinator.
pub mod config;
/// Ensemble orchestration: timeouts, selection, fallback, statistics.
pub mod coordinator;
/// Harris-corner based detection.
pub mod corner;
/// Canny edge / contour based detection.
pub mod edge;
/// Error taxonomy.
pub mod error;
/// Gaussian smoothing.
pub mod filter;
/// Rectangle primitives and scoring helpers.
pub mod geometry;
/// Sobel gradient computation.
pub mod gradient;
/// Image buffers and grayscale conversion.
pub mod image;
/// Template-matching based detection.
pub mod template;
/// Synthetic screenshot generation for tests and benches.
pub mod test_utils;
/// Production-readiness gate over benchmark reports.
pub mod validator;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use crate::coordinator::RoiCoordinator;
pub use crate::error::{DetectorFailure, RoiError};
pub use crate::geometry::Rect;
pub use crate::image::{GrayImage, RgbaImage};

use serde::{Deserialize, Serialize};

/// Free-form key/value metadata attached to a [`DetectionResult`].
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Identifies which algorithm produced a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// Harris-corner hypothesis search.
    Corner,
    /// Canny edge / contour analysis.
    Edge,
    /// Synthetic template matching.
    Template,
    /// Externally supplied color heuristics.
    Color,
    /// Deterministic centered rectangle emitted when detection fails.
    Fallback,
}

impl DetectionMethod {
    /// Stable lowercase name, matching the wire format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DetectionMethod::Corner => "corner",
            DetectionMethod::Edge => "edge",
            DetectionMethod::Template => "template",
            DetectionMethod::Color => "color",
            DetectionMethod::Fallback => "fallback",
        }
    }

    /// The four real detectors, in tie-break priority order (highest first).
    #[must_use]
    pub const fn all_detectable() -> &'static [DetectionMethod] {
        &[
            DetectionMethod::Template,
            DetectionMethod::Color,
            DetectionMethod::Edge,
            DetectionMethod::Corner,
        ]
    }

    /// Fixed selection priority: template > color > edge > corner.
    pub(crate) const fn priority(self) -> u8 {
        match self {
            DetectionMethod::Template => 4,
            DetectionMethod::Color => 3,
            DetectionMethod::Edge => 2,
            DetectionMethod::Corner => 1,
            DetectionMethod::Fallback => 0,
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one detector invocation (or of the ensemble).
#[derive(Clone, Debug, Serialize)]
pub struct DetectionResult {
    /// Detected build-area bounds, fully inside the source image.
    pub bounds: Rect,
    /// Confidence in `[0, 1]`; clamped at creation.
    pub confidence: f64,
    /// Which algorithm produced this result.
    pub method: DetectionMethod,
    /// Free-form diagnostics (candidate counts, timings, alternatives).
    pub metadata: Metadata,
}

impl DetectionResult {
    /// Create a result, clamping confidence into `[0, 1]`.
    #[must_use]
    pub fn new(bounds: Rect, confidence: f64, method: DetectionMethod) -> Self {
        Self {
            bounds,
            confidence: confidence.clamp(0.0, 1.0),
            method,
            metadata: Metadata::new(),
        }
    }

    /// Attach one metadata entry, builder-style.
    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Cooperative cancellation flag shared between the coordinator and the
/// detectors it launches.
///
/// Detectors poll this inside their most expensive loops and bail out once
/// the global timeout fired; the coordinator discards whatever a cancelled
/// detector returns anyway.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Per-invocation context handed to every detector.
#[derive(Clone, Debug, Default)]
pub struct DetectContext {
    /// Cooperative cancellation flag.
    pub cancel: CancelToken,
}

impl DetectContext {
    /// Context carrying the given cancellation token.
    #[must_use]
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self { cancel }
    }
}

/// Contract every detector in the ensemble implements.
///
/// A detector either produces a scored candidate, finds nothing
/// (`Ok(None)`), or fails; failures are isolated by the coordinator and
/// never abort sibling detectors. Implementations must be thread-safe:
/// the coordinator invokes them from worker threads.
pub trait RoiDetector: Send + Sync {
    /// The method tag this detector stamps on its results.
    fn method(&self) -> DetectionMethod;

    /// Analyze the image and return the best build-area candidate, if any.
    fn detect(
        &self,
        image: &RgbaImage,
        ctx: &DetectContext,
    ) -> Result<Option<DetectionResult>, DetectorFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_clamped() {
        let r = DetectionResult::new(Rect::new(0, 0, 10, 10), 1.7, DetectionMethod::Edge);
        assert_eq!(r.confidence, 1.0);
        let r = DetectionResult::new(Rect::new(0, 0, 10, 10), -0.2, DetectionMethod::Edge);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn test_method_priority_order() {
        assert!(DetectionMethod::Template.priority() > DetectionMethod::Color.priority());
        assert!(DetectionMethod::Color.priority() > DetectionMethod::Edge.priority());
        assert!(DetectionMethod::Edge.priority() > DetectionMethod::Corner.priority());
        assert!(DetectionMethod::Corner.priority() > DetectionMethod::Fallback.priority());
    }

    #[test]
    fn test_method_serializes_lowercase() {
        let s = serde_json::to_string(&DetectionMethod::Template).unwrap();
        assert_eq!(s, "\"template\"");
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
