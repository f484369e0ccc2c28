//! Configuration types for the detectors and the coordinator.
//!
//! Each detector carries its own config struct with tuned defaults; the
//! coordinator gets a builder because it is the type callers construct by
//! hand. Per-call knobs live in [`DetectOptions`].

use crate::DetectionMethod;
use serde::{Deserialize, Serialize};

// ============================================================================
// Per-detector configuration
// ============================================================================

/// Tuning for the Harris-corner detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerConfig {
    /// Harris sensitivity constant `k` in `R = det(S) - k * trace(S)^2`.
    pub harris_k: f64,
    /// Minimum Harris response (on normalized luminance) for a corner to exist.
    pub response_threshold: f64,
    /// Greedy non-maximum suppression radius in pixels.
    pub nms_radius: f64,
    /// Keep at most this many corners after suppression.
    pub max_corners: usize,
    /// Stop hypothesis generation once this many valid rectangles are found.
    pub max_rectangles: usize,
    /// Minimum rectangle side length in pixels.
    pub min_side: u32,
    /// Accepted width/height aspect ratio range.
    pub aspect_range: (f64, f64),
    /// Accepted rectangle-to-image area ratio range.
    pub area_ratio_range: (f64, f64),
    /// Candidates scoring at or below this are dropped.
    pub min_score: f64,
}

impl Default for CornerConfig {
    fn default() -> Self {
        Self {
            harris_k: 0.04,
            response_threshold: 0.01,
            nms_radius: 10.0,
            max_corners: 50,
            max_rectangles: 10,
            min_side: 300,
            aspect_range: (1.2, 2.5),
            area_ratio_range: (0.1, 0.8),
            min_score: 0.3,
        }
    }
}

/// Tuning for the edge/contour detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Gaussian pre-blur sigma.
    pub blur_sigma: f32,
    /// Canny double-threshold low bound on gradient magnitude.
    pub low_threshold: f32,
    /// Canny double-threshold high bound on gradient magnitude.
    pub high_threshold: f32,
    /// Contours shorter than this many points are discarded.
    pub min_contour_len: usize,
    /// Accepted bounding-rect area range in px².
    pub area_range: (f64, f64),
    /// Accepted width/height aspect ratio range.
    pub aspect_range: (f64, f64),
    /// Accepted rectangle-to-image area ratio range.
    pub relative_area_range: (f64, f64),
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            low_threshold: 50.0,
            high_threshold: 150.0,
            min_contour_len: 10,
            area_range: (50_000.0, 2_000_000.0),
            aspect_range: (1.2, 2.5),
            relative_area_range: (0.1, 0.8),
        }
    }
}

/// Tuning for the template-matching detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Minimum normalized cross-correlation for a match to be kept.
    pub match_threshold: f64,
    /// Cap on matches collected in one run (strongest kept).
    pub max_matches: usize,
    /// Matches within this distance of a cluster seed are absorbed.
    pub cluster_radius: f64,
    /// Clusters with fewer matches than this are discarded.
    pub min_cluster_size: usize,
    /// Margin added around the cluster bounding box, in pixels.
    pub bounds_margin: u32,
    /// Accepted estimated-bounds area range in px².
    pub area_range: (f64, f64),
    /// Accepted width/height aspect ratio range for estimated bounds.
    pub aspect_range: (f64, f64),
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.6,
            max_matches: 200,
            cluster_radius: 50.0,
            min_cluster_size: 2,
            bounds_margin: 50,
            area_range: (50_000.0, 2_000_000.0),
            aspect_range: (0.8, 3.0),
        }
    }
}

// ============================================================================
// Coordinator configuration
// ============================================================================

/// Coordinator-level configuration (immutable after construction, except
/// through [`crate::coordinator::RoiCoordinator::configure_for_production`]).
///
/// # Example
/// ```
/// use panelseek_core::config::CoordinatorConfig;
/// use panelseek_core::DetectionMethod;
///
/// let config = CoordinatorConfig::builder()
///     .timeout_ms(2500)
///     .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Template])
///     .build();
/// assert_eq!(config.timeout_ms, 2500);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Global detection budget in milliseconds.
    pub timeout_ms: u64,
    /// Whether the deterministic fallback is produced on total failure.
    pub fallback_enabled: bool,
    /// Detectors launched by default. Every entry must have a registered
    /// detector at construction time.
    pub enabled_methods: Vec<DetectionMethod>,
    /// When two candidates' confidences differ by at most this, the fixed
    /// method priority breaks the tie.
    pub tie_margin: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 4000,
            fallback_enabled: true,
            enabled_methods: vec![
                DetectionMethod::Edge,
                DetectionMethod::Color,
                DetectionMethod::Template,
            ],
            tie_margin: 0.1,
        }
    }
}

impl CoordinatorConfig {
    /// Create a new builder for `CoordinatorConfig`.
    #[must_use]
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }
}

/// Builder for [`CoordinatorConfig`].
#[derive(Default)]
pub struct CoordinatorConfigBuilder {
    timeout_ms: Option<u64>,
    fallback_enabled: Option<bool>,
    enabled_methods: Option<Vec<DetectionMethod>>,
    tie_margin: Option<f64>,
}

impl CoordinatorConfigBuilder {
    /// Set the global detection budget in milliseconds.
    #[must_use]
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Enable or disable the deterministic fallback.
    #[must_use]
    pub fn fallback_enabled(mut self, enabled: bool) -> Self {
        self.fallback_enabled = Some(enabled);
        self
    }

    /// Set the default detector subset.
    #[must_use]
    pub fn enabled_methods(mut self, methods: &[DetectionMethod]) -> Self {
        self.enabled_methods = Some(methods.to_vec());
        self
    }

    /// Set the confidence margin for priority tie-breaking.
    #[must_use]
    pub fn tie_margin(mut self, margin: f64) -> Self {
        self.tie_margin = Some(margin);
        self
    }

    /// Build the configuration, using defaults for unset fields.
    #[must_use]
    pub fn build(self) -> CoordinatorConfig {
        let d = CoordinatorConfig::default();
        CoordinatorConfig {
            timeout_ms: self.timeout_ms.unwrap_or(d.timeout_ms),
            fallback_enabled: self.fallback_enabled.unwrap_or(d.fallback_enabled),
            enabled_methods: self.enabled_methods.unwrap_or(d.enabled_methods),
            tie_margin: self.tie_margin.unwrap_or(d.tie_margin),
        }
    }
}

// ============================================================================
// Per-call options
// ============================================================================

/// Per-call detection options.
///
/// An empty method list means "use the coordinator's configured subset".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectOptions {
    /// Detectors to launch for this call. Empty means use coordinator defaults.
    pub methods: Vec<DetectionMethod>,
    /// Override for the global timeout, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl DetectOptions {
    /// Options restricted to the given methods.
    #[must_use]
    pub fn with_methods(methods: &[DetectionMethod]) -> Self {
        Self {
            methods: methods.to_vec(),
            timeout_ms: None,
        }
    }
}
