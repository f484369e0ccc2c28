//! Offline benchmarking of the detectors and the ensemble against a
//! labeled dataset.
//!
//! For every dataset item the harness times each enabled detector
//! individually plus the full ensemble ("consensus"), each under a
//! per-test budget. One failing test never aborts the run; it is recorded
//! and the sweep continues. The report ranks algorithms by a weighted
//! accuracy/speed/memory/reliability score and is JSON-serializable.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::DetectOptions;
use crate::coordinator::RoiCoordinator;
use crate::error::RoiError;
use crate::geometry::Rect;
use crate::image::RgbaImage;
use crate::{CancelToken, DetectContext, DetectionMethod, Metadata, RoiDetector};

// ============================================================================
// Dataset format
// ============================================================================

/// Ground-truth build-area box in the annotation wire format.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GroundTruthBox {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
    /// Redundant width, kept for compatibility with exported annotations.
    pub width: u32,
    /// Redundant height, kept for compatibility with exported annotations.
    pub height: u32,
}

impl GroundTruthBox {
    /// Build the wire box from a rectangle.
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            left: rect.x,
            top: rect.y,
            right: rect.right(),
            bottom: rect.bottom(),
            width: rect.width,
            height: rect.height,
        }
    }

    /// Convert to a [`Rect`], if the box is non-degenerate.
    #[must_use]
    pub fn to_rect(&self) -> Option<Rect> {
        if self.right > self.left && self.bottom > self.top {
            Some(Rect::new(
                self.left,
                self.top,
                (self.right - self.left) as u32,
                (self.bottom - self.top) as u32,
            ))
        } else {
            None
        }
    }
}

/// Optional ground truth attached to an annotation.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Labeled build-area bounds, when the item was annotated.
    #[serde(rename = "buildArea", skip_serializing_if = "Option::is_none")]
    pub build_area: Option<GroundTruthBox>,
}

/// Where an annotation's pixels come from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageSource {
    /// A file on disk, decoded with the `image` crate.
    Path {
        /// Path to the screenshot, absolute or relative to the dataset root.
        path: PathBuf,
    },
    /// Raw RGBA8 pixels embedded in the dataset itself.
    Embedded {
        /// Image width in pixels.
        width: usize,
        /// Image height in pixels.
        height: usize,
        /// Packed RGBA8 bytes.
        rgba: Vec<u8>,
    },
}

/// One labeled dataset item.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Annotation {
    /// Display name, unique within the dataset.
    pub filename: String,
    /// Pixel source.
    #[serde(flatten)]
    pub source: ImageSource,
    /// Optional labeled bounds.
    #[serde(rename = "groundTruth", default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<GroundTruth>,
    /// Free-form annotation metadata.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Annotation {
    /// Labeled bounds as a [`Rect`], if present and non-degenerate.
    #[must_use]
    pub fn ground_truth_rect(&self) -> Option<Rect> {
        self.ground_truth
            .as_ref()
            .and_then(|gt| gt.build_area.as_ref())
            .and_then(GroundTruthBox::to_rect)
    }

    /// Decode this annotation's pixels.
    pub fn load_image(&self, base_dir: Option<&Path>) -> Result<RgbaImage, RoiError> {
        match &self.source {
            ImageSource::Embedded {
                width,
                height,
                rgba,
            } => RgbaImage::new(rgba.clone(), *width, *height),
            ImageSource::Path { path } => {
                let full = match base_dir {
                    Some(dir) if path.is_relative() => dir.join(path),
                    _ => path.clone(),
                };
                let decoded = image::open(&full)
                    .map_err(|e| RoiError::Dataset(format!("{}: {e}", full.display())))?
                    .to_rgba8();
                let (w, h) = decoded.dimensions();
                RgbaImage::new(decoded.into_raw(), w as usize, h as usize)
            }
        }
    }
}

/// A labeled benchmark dataset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// The annotated items.
    pub annotations: Vec<Annotation>,
    /// Free-form dataset metadata.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Dataset {
    /// Parse a dataset from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, RoiError> {
        serde_json::from_str(json).map_err(|e| RoiError::Dataset(e.to_string()))
    }

    /// Load a dataset from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, RoiError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RoiError::Dataset(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Number of items carrying a usable ground-truth box.
    #[must_use]
    pub fn annotated_count(&self) -> usize {
        self.annotations
            .iter()
            .filter(|a| a.ground_truth_rect().is_some())
            .count()
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Harness tuning and pass/fail thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Budget for one (item, algorithm) test, in milliseconds.
    pub per_test_timeout_ms: u64,
    /// Accuracy an algorithm must reach to pass.
    pub accuracy_threshold: f64,
    /// Mean-latency budget used for both pass/fail and speed normalization.
    pub time_budget_ms: f64,
    /// Mean-memory budget used for both pass/fail and memory normalization.
    pub memory_budget_mb: f64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            per_test_timeout_ms: 10_000,
            accuracy_threshold: 0.70,
            time_budget_ms: 4000.0,
            memory_budget_mb: 150.0,
        }
    }
}

/// One recorded (item, algorithm) measurement.
#[derive(Clone, Debug, Serialize)]
pub struct TestResult {
    /// Dataset item name.
    pub test: String,
    /// Algorithm identifier: a method name or `"consensus"`.
    pub algorithm: String,
    /// Whether a candidate was produced.
    pub success: bool,
    /// Wall-clock time, in milliseconds.
    pub elapsed_ms: f64,
    /// Best-effort resident-memory growth during the test, in MB (0 when
    /// unmeasurable).
    pub memory_delta_mb: f64,
    /// IoU against ground truth; 0 when either side is missing or disjoint.
    pub accuracy: f64,
    /// Detected bounds, when any.
    pub detected: Option<Rect>,
    /// Failure description, when the test errored or timed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated per-algorithm metrics plus the ranking score.
#[derive(Clone, Debug, Serialize)]
pub struct AlgorithmSummary {
    /// Algorithm identifier.
    pub algorithm: String,
    /// Number of recorded tests.
    pub runs: usize,
    /// Fraction of tests that produced a candidate.
    pub success_rate: f64,
    /// Mean IoU across all recorded tests.
    pub mean_accuracy: f64,
    /// Mean wall-clock time in milliseconds.
    pub mean_time_ms: f64,
    /// Mean memory delta in MB.
    pub mean_memory_mb: f64,
    /// Weighted ranking score.
    pub score: f64,
    /// Mean accuracy meets the threshold.
    pub meets_accuracy: bool,
    /// Mean latency fits the time budget.
    pub meets_time: bool,
    /// Mean memory fits the memory budget.
    pub meets_memory: bool,
}

/// Full benchmark output: rankings, raw results, failures, advice.
#[derive(Clone, Debug, Serialize)]
pub struct BenchmarkReport {
    /// Items in the dataset that was swept.
    pub dataset_size: usize,
    /// One-line human summary.
    pub summary: String,
    /// Algorithms ordered by descending score.
    pub rankings: Vec<AlgorithmSummary>,
    /// Every recorded (item, algorithm) measurement.
    pub results: Vec<TestResult>,
    /// Accumulated failure descriptions; never aborts the run.
    pub failures: Vec<String>,
    /// Textual recommendations derived from the rankings.
    pub recommendations: Vec<String>,
}

impl BenchmarkReport {
    /// Serialize the report for export.
    pub fn to_json(&self) -> Result<String, RoiError> {
        serde_json::to_string_pretty(self).map_err(|e| RoiError::Dataset(e.to_string()))
    }
}

/// Offline benchmark runner.
pub struct BenchmarkHarness {
    config: BenchmarkConfig,
}

impl BenchmarkHarness {
    /// Create a harness with custom thresholds.
    #[must_use]
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    /// Sweep the dataset: every enabled detector plus the consensus run,
    /// per item. `base_dir` resolves relative dataset image paths.
    pub fn run(
        &self,
        coordinator: &RoiCoordinator,
        dataset: &Dataset,
        base_dir: Option<&Path>,
    ) -> BenchmarkReport {
        let _span = tracing::info_span!("benchmark_run").entered();
        let methods = coordinator.config().enabled_methods.clone();
        let mut results: Vec<TestResult> = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        for annotation in &dataset.annotations {
            let ground_truth = annotation.ground_truth_rect();
            let image = match annotation.load_image(base_dir) {
                Ok(img) => img,
                Err(e) => {
                    // The item cannot run at all; record a failed entry per
                    // algorithm so the result count stays predictable.
                    let msg = format!("{}: {e}", annotation.filename);
                    tracing::warn!(test = %annotation.filename, error = %e, "dataset item unusable");
                    failures.push(msg.clone());
                    for algorithm in methods
                        .iter()
                        .map(|m| m.as_str().to_string())
                        .chain(std::iter::once("consensus".to_string()))
                    {
                        results.push(TestResult {
                            test: annotation.filename.clone(),
                            algorithm,
                            success: false,
                            elapsed_ms: 0.0,
                            memory_delta_mb: 0.0,
                            accuracy: 0.0,
                            detected: None,
                            error: Some(msg.clone()),
                        });
                    }
                    continue;
                }
            };

            for &method in &methods {
                let Some(detector) = coordinator.detector_for(method) else {
                    continue;
                };
                let result = self.run_single(
                    &annotation.filename,
                    method.as_str(),
                    &detector,
                    &image,
                    ground_truth,
                );
                if let Some(err) = &result.error {
                    failures.push(format!("{}/{}: {err}", annotation.filename, method));
                }
                results.push(result);
            }

            let result = self.run_consensus(&annotation.filename, coordinator, &image, ground_truth);
            if let Some(err) = &result.error {
                failures.push(format!("{}/consensus: {err}", annotation.filename));
            }
            results.push(result);
        }

        let rankings = self.rank(&results, &methods);
        let recommendations = self.recommend(&rankings);
        let summary = match rankings.first() {
            Some(best) => format!(
                "{} tests over {} items; best algorithm: {} (score {:.3}, accuracy {:.3})",
                results.len(),
                dataset.annotations.len(),
                best.algorithm,
                best.score,
                best.mean_accuracy
            ),
            None => "no tests were executed".to_string(),
        };

        BenchmarkReport {
            dataset_size: dataset.annotations.len(),
            summary,
            rankings,
            results,
            failures,
            recommendations,
        }
    }

    /// Time one detector on one image under the per-test budget.
    fn run_single(
        &self,
        test: &str,
        algorithm: &str,
        detector: &Arc<dyn RoiDetector>,
        image: &RgbaImage,
        ground_truth: Option<Rect>,
    ) -> TestResult {
        let rss_before = resident_memory_mb();
        let cancel = CancelToken::new();
        let ctx = DetectContext::with_cancel(cancel.clone());
        let (tx, rx) = mpsc::channel();
        let det = Arc::clone(detector);
        let img = image.clone();

        let start = Instant::now();
        let spawned = thread::Builder::new()
            .name(format!("bench-{algorithm}"))
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| det.detect(&img, &ctx)));
                let _ = tx.send(outcome);
            });
        if spawned.is_err() {
            return TestResult {
                test: test.to_string(),
                algorithm: algorithm.to_string(),
                success: false,
                elapsed_ms: 0.0,
                memory_delta_mb: 0.0,
                accuracy: 0.0,
                detected: None,
                error: Some("failed to spawn benchmark worker".to_string()),
            };
        }

        let outcome = rx.recv_timeout(Duration::from_millis(self.config.per_test_timeout_ms));
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let memory_delta_mb = (resident_memory_mb() - rss_before).max(0.0);

        let (success, detected, error) = match outcome {
            Ok(Ok(Ok(Some(result)))) => (true, Some(result.bounds), None),
            Ok(Ok(Ok(None))) => (false, None, None),
            Ok(Ok(Err(failure))) => (false, None, Some(failure.to_string())),
            Ok(Err(_panic)) => (false, None, Some("detector panicked".to_string())),
            Err(_) => {
                cancel.cancel();
                (
                    false,
                    None,
                    Some(format!(
                        "timed out after {} ms",
                        self.config.per_test_timeout_ms
                    )),
                )
            }
        };

        TestResult {
            test: test.to_string(),
            algorithm: algorithm.to_string(),
            success,
            elapsed_ms,
            memory_delta_mb,
            accuracy: accuracy_iou(detected, ground_truth),
            detected,
            error,
        }
    }

    /// Time the full ensemble on one image.
    fn run_consensus(
        &self,
        test: &str,
        coordinator: &RoiCoordinator,
        image: &RgbaImage,
        ground_truth: Option<Rect>,
    ) -> TestResult {
        let rss_before = resident_memory_mb();
        let options = DetectOptions {
            methods: Vec::new(),
            timeout_ms: Some(
                coordinator
                    .config()
                    .timeout_ms
                    .min(self.config.per_test_timeout_ms),
            ),
        };
        let start = Instant::now();
        let outcome = coordinator.detect_roi(image.clone(), &options);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let memory_delta_mb = (resident_memory_mb() - rss_before).max(0.0);

        let (success, detected, error) = match outcome {
            // A fallback output means the ensemble itself found nothing.
            Ok(result) if result.method != DetectionMethod::Fallback => {
                (true, Some(result.bounds), None)
            }
            Ok(result) => (false, Some(result.bounds), None),
            Err(e) => (false, None, Some(e.to_string())),
        };

        TestResult {
            test: test.to_string(),
            algorithm: "consensus".to_string(),
            success,
            elapsed_ms,
            memory_delta_mb,
            accuracy: accuracy_iou(detected, ground_truth),
            detected,
            error,
        }
    }

    /// Aggregate per algorithm and order by the weighted score:
    /// `0.5 accuracy + 0.2 speed + 0.15 memory + 0.15 success rate`.
    fn rank(&self, results: &[TestResult], methods: &[DetectionMethod]) -> Vec<AlgorithmSummary> {
        let algorithms: Vec<String> = methods
            .iter()
            .map(|m| m.as_str().to_string())
            .chain(std::iter::once("consensus".to_string()))
            .collect();

        let mut summaries: Vec<AlgorithmSummary> = algorithms
            .into_iter()
            .filter_map(|algorithm| {
                let entries: Vec<&TestResult> =
                    results.iter().filter(|r| r.algorithm == algorithm).collect();
                if entries.is_empty() {
                    return None;
                }
                let runs = entries.len();
                let success_rate =
                    entries.iter().filter(|r| r.success).count() as f64 / runs as f64;
                let mean_accuracy =
                    entries.iter().map(|r| r.accuracy).sum::<f64>() / runs as f64;
                let mean_time_ms =
                    entries.iter().map(|r| r.elapsed_ms).sum::<f64>() / runs as f64;
                let mean_memory_mb =
                    entries.iter().map(|r| r.memory_delta_mb).sum::<f64>() / runs as f64;

                let speed_score =
                    ((self.config.time_budget_ms - mean_time_ms) / self.config.time_budget_ms)
                        .max(0.0);
                let memory_score = ((self.config.memory_budget_mb - mean_memory_mb)
                    / self.config.memory_budget_mb)
                    .max(0.0);
                let score = 0.5 * mean_accuracy
                    + 0.2 * speed_score
                    + 0.15 * memory_score
                    + 0.15 * success_rate;

                Some(AlgorithmSummary {
                    algorithm,
                    runs,
                    success_rate,
                    mean_accuracy,
                    mean_time_ms,
                    mean_memory_mb,
                    score,
                    meets_accuracy: mean_accuracy >= self.config.accuracy_threshold,
                    meets_time: mean_time_ms <= self.config.time_budget_ms,
                    meets_memory: mean_memory_mb <= self.config.memory_budget_mb,
                })
            })
            .collect();

        summaries.sort_by(|a, b| b.score.total_cmp(&a.score));
        summaries
    }

    fn recommend(&self, rankings: &[AlgorithmSummary]) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(best) = rankings.first() {
            out.push(format!(
                "adopt '{}' as the primary algorithm (score {:.3})",
                best.algorithm, best.score
            ));
        }
        for summary in rankings {
            if !summary.meets_accuracy {
                out.push(format!(
                    "'{}' accuracy {:.3} is below the {:.2} threshold",
                    summary.algorithm, summary.mean_accuracy, self.config.accuracy_threshold
                ));
            }
            if !summary.meets_time {
                out.push(format!(
                    "'{}' mean time {:.0} ms exceeds the {:.0} ms budget",
                    summary.algorithm, summary.mean_time_ms, self.config.time_budget_ms
                ));
            }
            if !summary.meets_memory {
                out.push(format!(
                    "'{}' mean memory {:.1} MB exceeds the {:.0} MB budget",
                    summary.algorithm, summary.mean_memory_mb, self.config.memory_budget_mb
                ));
            }
        }
        out
    }
}

impl Default for BenchmarkHarness {
    fn default() -> Self {
        Self::new(BenchmarkConfig::default())
    }
}

/// IoU accuracy; 0 when either rectangle is missing.
fn accuracy_iou(detected: Option<Rect>, ground_truth: Option<Rect>) -> f64 {
    match (detected, ground_truth) {
        (Some(d), Some(g)) => d.iou(&g),
        _ => 0.0,
    }
}

/// Best-effort resident set size in MB; 0 when unmeasurable.
fn resident_memory_mb() -> f64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(statm) = std::fs::read_to_string("/proc/self/statm") {
            if let Some(rss_pages) = statm.split_whitespace().nth(1) {
                if let Ok(pages) = rss_pages.parse::<f64>() {
                    return pages * 4096.0 / (1024.0 * 1024.0);
                }
            }
        }
    }
    0.0
}
