//! Ensemble orchestration: concurrent detectors, global timeout, isolated
//! failure handling, selection, deterministic fallback, and running
//! performance statistics.
//!
//! Detectors run on worker threads and report through a channel; the
//! receive loop enforces the global deadline. A timed-out detector is not
//! joined: the cancel token asks it to stop at its next check, and whatever
//! it eventually returns is discarded.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::{CoordinatorConfig, DetectOptions};
use crate::error::{DetectorFailure, RoiError};
use crate::geometry::Rect;
use crate::image::RgbaImage;
use crate::{CancelToken, DetectContext, DetectionMethod, DetectionResult, RoiDetector};

/// Reference budget used to normalize detector latency into a speed score.
const TIME_BUDGET_MS: f64 = 4000.0;
/// Fallback rectangle covers this fraction of each image dimension.
const FALLBACK_COVERAGE: f64 = 0.8;
/// Fallback results always carry this confidence.
const FALLBACK_CONFIDENCE: f64 = 0.1;

/// Accumulating per-algorithm statistics, owned by one coordinator.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct PerformanceRecord {
    /// Completed invocations (success or not).
    pub runs: u64,
    /// Invocations that produced a candidate.
    pub successes: u64,
    /// Total wall-clock time across completed invocations, in ms.
    pub total_time_ms: f64,
    /// Sum of confidences over successful invocations.
    pub total_confidence: f64,
}

impl PerformanceRecord {
    /// Mean wall-clock time per completed invocation.
    #[must_use]
    pub fn avg_time_ms(&self) -> f64 {
        if self.runs > 0 {
            self.total_time_ms / self.runs as f64
        } else {
            0.0
        }
    }

    /// Fraction of invocations that produced a candidate.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.runs > 0 {
            self.successes as f64 / self.runs as f64
        } else {
            0.0
        }
    }

    /// Mean confidence over successful invocations.
    #[must_use]
    pub fn avg_confidence(&self) -> f64 {
        if self.successes > 0 {
            self.total_confidence / self.successes as f64
        } else {
            0.0
        }
    }
}

/// Coordinates the detector ensemble.
///
/// Detectors are injected at construction; an enabled method with no
/// registered detector is a construction-time configuration error, never a
/// silent runtime skip.
pub struct RoiCoordinator {
    detectors: BTreeMap<DetectionMethod, Arc<dyn RoiDetector>>,
    config: CoordinatorConfig,
    stats: Mutex<BTreeMap<DetectionMethod, PerformanceRecord>>,
}

/// Builder for [`RoiCoordinator`].
#[derive(Default)]
pub struct RoiCoordinatorBuilder {
    config: Option<CoordinatorConfig>,
    detectors: Vec<Arc<dyn RoiDetector>>,
}

impl RoiCoordinatorBuilder {
    /// Set the coordinator configuration.
    #[must_use]
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a detector instance.
    #[must_use]
    pub fn detector(mut self, detector: Arc<dyn RoiDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Build the coordinator, verifying the detector set is consistent.
    pub fn build(self) -> Result<RoiCoordinator, RoiError> {
        let config = self.config.unwrap_or_default();
        let mut detectors: BTreeMap<DetectionMethod, Arc<dyn RoiDetector>> = BTreeMap::new();
        for det in self.detectors {
            let method = det.method();
            if method == DetectionMethod::Fallback {
                return Err(RoiError::Config(
                    "fallback is synthesized by the coordinator, not a detector".into(),
                ));
            }
            if detectors.insert(method, det).is_some() {
                return Err(RoiError::Config(format!(
                    "duplicate detector registered for method '{method}'"
                )));
            }
        }
        for method in &config.enabled_methods {
            if !detectors.contains_key(method) {
                return Err(RoiError::Config(format!(
                    "enabled method '{method}' has no registered detector"
                )));
            }
        }
        Ok(RoiCoordinator {
            detectors,
            config,
            stats: Mutex::new(BTreeMap::new()),
        })
    }
}

impl RoiCoordinator {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> RoiCoordinatorBuilder {
        RoiCoordinatorBuilder::default()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Methods with a registered detector.
    #[must_use]
    pub fn registered_methods(&self) -> Vec<DetectionMethod> {
        self.detectors.keys().copied().collect()
    }

    /// Hand out the detector registered for `method`, if any.
    ///
    /// The benchmark harness uses this to time detectors individually,
    /// outside the ensemble's selection and fallback machinery.
    #[must_use]
    pub fn detector_for(&self, method: DetectionMethod) -> Option<Arc<dyn RoiDetector>> {
        self.detectors.get(&method).map(Arc::clone)
    }

    /// Run the enabled detectors and select the best build-area candidate.
    ///
    /// The image is consumed: it is shared read-only with the worker
    /// threads and dropped when the last of them finishes.
    pub fn detect_roi(
        &self,
        image: RgbaImage,
        options: &DetectOptions,
    ) -> Result<DetectionResult, RoiError> {
        let _span = tracing::info_span!("detect_roi").entered();
        image.validate()?;

        let methods: Vec<DetectionMethod> = if options.methods.is_empty() {
            self.config.enabled_methods.clone()
        } else {
            options.methods.clone()
        };
        if methods.is_empty() {
            return Err(RoiError::Config("no detectors enabled".into()));
        }
        for method in &methods {
            if !self.detectors.contains_key(method) {
                return Err(RoiError::Config(format!(
                    "requested method '{method}' has no registered detector"
                )));
            }
        }

        let timeout_ms = options.timeout_ms.unwrap_or(self.config.timeout_ms);
        let (width, height) = (image.width, image.height);
        let image = Arc::new(image);
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel();

        for &method in &methods {
            let detector = Arc::clone(&self.detectors[&method]);
            let img = Arc::clone(&image);
            let ctx = DetectContext::with_cancel(cancel.clone());
            let tx = tx.clone();
            thread::Builder::new()
                .name(format!("roi-{method}"))
                .spawn(move || {
                    let start = Instant::now();
                    let outcome = match catch_unwind(AssertUnwindSafe(|| detector.detect(&img, &ctx)))
                    {
                        Ok(res) => res,
                        Err(payload) => Err(DetectorFailure::new(method, panic_message(&payload))),
                    };
                    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                    // The receiver may be gone after a timeout; that is fine,
                    // the late result is discarded either way.
                    let _ = tx.send((method, outcome, elapsed_ms));
                })
                .map_err(|e| RoiError::Config(format!("failed to spawn detector worker: {e}")))?;
        }
        drop(tx);

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut candidates: Vec<DetectionResult> = Vec::new();
        let mut timed_out = false;
        let mut received = 0usize;
        while received < methods.len() {
            match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok((method, outcome, elapsed_ms)) => {
                    received += 1;
                    self.record(method, &outcome, elapsed_ms);
                    match outcome {
                        Ok(Some(result)) => candidates.push(result),
                        Ok(None) => {
                            tracing::debug!(%method, elapsed_ms, "detector found no candidate");
                        }
                        Err(failure) => {
                            tracing::warn!(%method, error = %failure, "detector failed");
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    cancel.cancel();
                    timed_out = true;
                    tracing::warn!(timeout_ms, "global detection budget elapsed");
                    break;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        if let Some(winner) = select_result(candidates, self.config.tie_margin) {
            return Ok(winner);
        }

        let error = if timed_out {
            RoiError::Timeout { timeout_ms }
        } else {
            RoiError::EmptyResultSet
        };
        if self.config.fallback_enabled {
            tracing::info!(error = %error, "falling back to centered rectangle");
            Ok(fallback_result(width, height, &error))
        } else {
            Err(error)
        }
    }

    /// One stats update per detector completion; a single critical section.
    fn record(
        &self,
        method: DetectionMethod,
        outcome: &Result<Option<DetectionResult>, DetectorFailure>,
        elapsed_ms: f64,
    ) {
        let mut stats = self.stats.lock().expect("stats lock poisoned");
        let record = stats.entry(method).or_default();
        record.runs += 1;
        record.total_time_ms += elapsed_ms;
        if let Ok(Some(result)) = outcome {
            record.successes += 1;
            record.total_confidence += result.confidence;
        }
    }

    /// Snapshot of the accumulated per-algorithm statistics.
    #[must_use]
    pub fn performance_records(&self) -> BTreeMap<DetectionMethod, PerformanceRecord> {
        self.stats.lock().expect("stats lock poisoned").clone()
    }

    /// Best observed algorithm:
    /// `argmax(0.7 * avg confidence + 0.2 * success rate + 0.1 * speed)`.
    #[must_use]
    pub fn recommend_algorithm(&self) -> Option<DetectionMethod> {
        let stats = self.stats.lock().expect("stats lock poisoned");
        stats
            .iter()
            .filter(|(_, r)| r.runs > 0)
            .map(|(m, r)| {
                let speed = ((TIME_BUDGET_MS - r.avg_time_ms()) / TIME_BUDGET_MS).max(0.0);
                let score = 0.7 * r.avg_confidence() + 0.2 * r.success_rate() + 0.1 * speed;
                (*m, score)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(m, _)| m)
    }

    /// Narrow the ensemble to a single algorithm for production use.
    ///
    /// The new timeout is `max(2000 ms, 3 x observed average latency)`.
    pub fn configure_for_production(&mut self, method: DetectionMethod) -> Result<(), RoiError> {
        if !self.detectors.contains_key(&method) {
            return Err(RoiError::Config(format!(
                "cannot configure for '{method}': no registered detector"
            )));
        }
        let avg_ms = self
            .stats
            .lock()
            .expect("stats lock poisoned")
            .get(&method)
            .map_or(0.0, PerformanceRecord::avg_time_ms);
        self.config.enabled_methods = vec![method];
        self.config.timeout_ms = 2000u64.max((3.0 * avg_ms).round() as u64);
        tracing::info!(%method, timeout_ms = self.config.timeout_ms, "configured for production");
        Ok(())
    }
}

/// Pick the winner from successful candidates.
///
/// Candidates are ordered by confidence; every candidate within the tie
/// margin of the best one competes on fixed method priority
/// (template > color > edge > corner). The two runners-up are kept in the
/// winner's metadata.
fn select_result(mut candidates: Vec<DetectionResult>, tie_margin: f64) -> Option<DetectionResult> {
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let top_confidence = candidates[0].confidence;

    let winner_idx = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| top_confidence - c.confidence <= tie_margin)
        .max_by_key(|(_, c)| c.method.priority())
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut winner = candidates.remove(winner_idx);

    let alternatives: Vec<serde_json::Value> = candidates
        .iter()
        .take(2)
        .map(|c| {
            serde_json::json!({
                "bounds": c.bounds,
                "confidence": c.confidence,
                "method": c.method,
            })
        })
        .collect();
    if !alternatives.is_empty() {
        winner
            .metadata
            .insert("alternatives".into(), serde_json::Value::Array(alternatives));
    }
    Some(winner)
}

/// Deterministic fallback: a centered rectangle covering 80% of the image,
/// confidence fixed at 0.1, annotated with the triggering error.
fn fallback_result(width: usize, height: usize, error: &RoiError) -> DetectionResult {
    let fw = ((width as f64 * FALLBACK_COVERAGE).round() as u32).max(1);
    let fh = ((height as f64 * FALLBACK_COVERAGE).round() as u32).max(1);
    let x = (width as i32 - fw as i32) / 2;
    let y = (height as i32 - fh as i32) / 2;
    DetectionResult::new(
        Rect::new(x, y, fw, fh),
        FALLBACK_CONFIDENCE,
        DetectionMethod::Fallback,
    )
    .with_meta("fallback_reason", error.to_string())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted detector for coordinator behavior tests.
    struct StubDetector {
        method: DetectionMethod,
        result: Option<(Rect, f64)>,
        delay: Duration,
        panics: bool,
        invocations: Arc<AtomicUsize>,
    }

    impl StubDetector {
        fn new(method: DetectionMethod, result: Option<(Rect, f64)>) -> Self {
            Self {
                method,
                result,
                delay: Duration::ZERO,
                panics: false,
                invocations: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn panicking(mut self) -> Self {
            self.panics = true;
            self
        }

        fn counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.invocations)
        }
    }

    impl RoiDetector for StubDetector {
        fn method(&self) -> DetectionMethod {
            self.method
        }

        fn detect(
            &self,
            _image: &RgbaImage,
            _ctx: &DetectContext,
        ) -> Result<Option<DetectionResult>, DetectorFailure> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            if self.panics {
                panic!("scripted failure");
            }
            Ok(self
                .result
                .map(|(rect, conf)| DetectionResult::new(rect, conf, self.method)))
        }
    }

    fn test_image() -> RgbaImage {
        RgbaImage::new(vec![40u8; 100 * 80 * 4], 100, 80).unwrap()
    }

    fn coordinator_with(stubs: Vec<StubDetector>, config: CoordinatorConfig) -> RoiCoordinator {
        let mut builder = RoiCoordinator::builder().config(config);
        for stub in stubs {
            builder = builder.detector(Arc::new(stub));
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_builder_rejects_missing_detector() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Color])
            .build();
        let result = RoiCoordinator::builder()
            .config(config)
            .detector(Arc::new(StubDetector::new(
                DetectionMethod::Edge,
                Some((Rect::new(0, 0, 10, 10), 0.5)),
            )))
            .build();
        assert!(matches!(result, Err(RoiError::Config(_))));
    }

    #[test]
    fn test_tie_break_prefers_template_within_margin() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Template])
            .build();
        // Edge has the higher raw confidence but sits within the 0.1 margin.
        let coordinator = coordinator_with(
            vec![
                StubDetector::new(DetectionMethod::Edge, Some((Rect::new(0, 0, 40, 30), 0.82))),
                StubDetector::new(
                    DetectionMethod::Template,
                    Some((Rect::new(5, 5, 40, 30), 0.80)),
                ),
            ],
            config,
        );
        let result = coordinator
            .detect_roi(test_image(), &DetectOptions::default())
            .unwrap();
        assert_eq!(result.method, DetectionMethod::Template);
        // The runner-up is preserved as an alternative.
        assert!(result.metadata.contains_key("alternatives"));
    }

    #[test]
    fn test_clear_winner_ignores_priority() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Template])
            .build();
        let coordinator = coordinator_with(
            vec![
                StubDetector::new(DetectionMethod::Edge, Some((Rect::new(0, 0, 40, 30), 0.95))),
                StubDetector::new(
                    DetectionMethod::Template,
                    Some((Rect::new(5, 5, 40, 30), 0.60)),
                ),
            ],
            config,
        );
        let result = coordinator
            .detect_roi(test_image(), &DetectOptions::default())
            .unwrap();
        assert_eq!(result.method, DetectionMethod::Edge);
    }

    #[test]
    fn test_panicking_detector_is_isolated() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Corner])
            .build();
        let coordinator = coordinator_with(
            vec![
                StubDetector::new(DetectionMethod::Corner, None).panicking(),
                StubDetector::new(DetectionMethod::Edge, Some((Rect::new(0, 0, 40, 30), 0.7))),
            ],
            config,
        );
        let result = coordinator
            .detect_roi(test_image(), &DetectOptions::default())
            .unwrap();
        assert_eq!(result.method, DetectionMethod::Edge);
        // The failure is still a completed run in the stats.
        let stats = coordinator.performance_records();
        assert_eq!(stats[&DetectionMethod::Corner].runs, 1);
        assert_eq!(stats[&DetectionMethod::Corner].successes, 0);
    }

    #[test]
    fn test_timeout_of_sole_detector_falls_back() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge])
            .timeout_ms(50)
            .build();
        let coordinator = coordinator_with(
            vec![
                StubDetector::new(DetectionMethod::Edge, Some((Rect::new(0, 0, 40, 30), 0.9)))
                    .with_delay(Duration::from_millis(400)),
            ],
            config,
        );
        let result = coordinator
            .detect_roi(test_image(), &DetectOptions::default())
            .unwrap();
        assert_eq!(result.method, DetectionMethod::Fallback);
        assert_eq!(result.confidence, 0.1);
        // Centered 80% rectangle on the 100x80 test image.
        assert_eq!(result.bounds, Rect::new(10, 8, 80, 64));
        assert!(result.metadata.contains_key("fallback_reason"));
    }

    #[test]
    fn test_timed_out_detector_never_selected() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Corner])
            .timeout_ms(80)
            .build();
        let coordinator = coordinator_with(
            vec![
                StubDetector::new(DetectionMethod::Edge, Some((Rect::new(0, 0, 40, 30), 0.99)))
                    .with_delay(Duration::from_millis(500)),
                StubDetector::new(DetectionMethod::Corner, Some((Rect::new(1, 1, 40, 30), 0.4))),
            ],
            config,
        );
        let result = coordinator
            .detect_roi(test_image(), &DetectOptions::default())
            .unwrap();
        assert_eq!(result.method, DetectionMethod::Corner);
    }

    #[test]
    fn test_timeout_without_fallback_propagates() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge])
            .timeout_ms(50)
            .fallback_enabled(false)
            .build();
        let coordinator = coordinator_with(
            vec![
                StubDetector::new(DetectionMethod::Edge, Some((Rect::new(0, 0, 40, 30), 0.9)))
                    .with_delay(Duration::from_millis(400)),
            ],
            config,
        );
        let err = coordinator
            .detect_roi(test_image(), &DetectOptions::default())
            .unwrap_err();
        assert!(matches!(err, RoiError::Timeout { timeout_ms: 50 }));
    }

    #[test]
    fn test_empty_results_fall_back() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge])
            .build();
        let coordinator =
            coordinator_with(vec![StubDetector::new(DetectionMethod::Edge, None)], config);
        let result = coordinator
            .detect_roi(test_image(), &DetectOptions::default())
            .unwrap();
        assert_eq!(result.method, DetectionMethod::Fallback);
        assert_eq!(result.confidence, 0.1);
    }

    #[test]
    fn test_invalid_input_runs_no_detectors() {
        let stub = StubDetector::new(DetectionMethod::Edge, Some((Rect::new(0, 0, 40, 30), 0.9)));
        let counter = stub.counter();
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge])
            .build();
        let coordinator = coordinator_with(vec![stub], config);
        // Struct-literal construction bypasses the validating constructor,
        // standing in for an undecoded upload.
        let bogus = RgbaImage {
            width: 100,
            height: 80,
            data: vec![0u8; 17],
        };
        let err = coordinator
            .detect_roi(bogus, &DetectOptions::default())
            .unwrap_err();
        assert!(matches!(err, RoiError::InvalidInput(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stats_accumulate_across_calls() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge])
            .build();
        let coordinator = coordinator_with(
            vec![StubDetector::new(
                DetectionMethod::Edge,
                Some((Rect::new(0, 0, 40, 30), 0.8)),
            )],
            config,
        );
        for _ in 0..3 {
            coordinator
                .detect_roi(test_image(), &DetectOptions::default())
                .unwrap();
        }
        let stats = coordinator.performance_records();
        let record = &stats[&DetectionMethod::Edge];
        assert_eq!(record.runs, 3);
        assert_eq!(record.successes, 3);
        assert!((record.avg_confidence() - 0.8).abs() < 1e-9);
        assert!(record.success_rate() > 0.999);
    }

    #[test]
    fn test_recommendation_prefers_confident_detector() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Corner])
            .build();
        let coordinator = coordinator_with(
            vec![
                StubDetector::new(DetectionMethod::Edge, Some((Rect::new(0, 0, 40, 30), 0.9))),
                StubDetector::new(DetectionMethod::Corner, Some((Rect::new(0, 0, 40, 30), 0.3))),
            ],
            config,
        );
        coordinator
            .detect_roi(test_image(), &DetectOptions::default())
            .unwrap();
        assert_eq!(
            coordinator.recommend_algorithm(),
            Some(DetectionMethod::Edge)
        );
    }

    #[test]
    fn test_configure_for_production_narrows_and_rescales_timeout() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Corner])
            .build();
        let mut coordinator = coordinator_with(
            vec![
                StubDetector::new(DetectionMethod::Edge, Some((Rect::new(0, 0, 40, 30), 0.9))),
                StubDetector::new(DetectionMethod::Corner, Some((Rect::new(0, 0, 40, 30), 0.3))),
            ],
            config,
        );
        coordinator
            .detect_roi(test_image(), &DetectOptions::default())
            .unwrap();
        coordinator
            .configure_for_production(DetectionMethod::Edge)
            .unwrap();
        assert_eq!(
            coordinator.config().enabled_methods,
            vec![DetectionMethod::Edge]
        );
        // Observed latency is tiny, so the floor applies.
        assert_eq!(coordinator.config().timeout_ms, 2000);

        assert!(
            coordinator
                .configure_for_production(DetectionMethod::Color)
                .is_err()
        );
    }

    #[test]
    fn test_per_call_method_subset() {
        let config = CoordinatorConfig::builder()
            .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Corner])
            .build();
        let corner = StubDetector::new(DetectionMethod::Corner, Some((Rect::new(0, 0, 40, 30), 0.9)));
        let corner_counter = corner.counter();
        let coordinator = coordinator_with(
            vec![
                StubDetector::new(DetectionMethod::Edge, Some((Rect::new(0, 0, 40, 30), 0.5))),
                corner,
            ],
            config,
        );
        let options = DetectOptions::with_methods(&[DetectionMethod::Edge]);
        let result = coordinator.detect_roi(test_image(), &options).unwrap();
        assert_eq!(result.method, DetectionMethod::Edge);
        assert_eq!(corner_counter.load(Ordering::SeqCst), 0);
    }
}
