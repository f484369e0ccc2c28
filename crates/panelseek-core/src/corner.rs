//! Harris-corner detection and combinatorial rectangle hypothesis search.
//!
//! The structure tensor is accumulated over a 3x3 window on normalized
//! luminance, so the Harris response threshold is intensity-scale free.
//! Rectangle hypotheses come from two generators: axis-aligned extremes of
//! 4-corner combinations, and corner pairs interpreted as diagonals. Both
//! stop early once enough valid rectangles exist; the exhaustive 4-corner
//! search is O(n^4) in the corner count, which the suppression cap keeps
//! at 50.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use std::time::Instant;

use crate::config::CornerConfig;
use crate::geometry::{Rect, plateau_score, triangular_score};
use crate::gradient::compute_sobel_normalized;
use crate::image::{GrayImage, RgbaImage, is_dark_background, is_saturated_accent};
use crate::{DetectContext, DetectionMethod, DetectionResult, DetectorFailure, RoiDetector};

/// A corner candidate with its Harris response.
#[derive(Clone, Copy, Debug)]
pub struct Corner {
    /// Pixel x coordinate.
    pub x: usize,
    /// Pixel y coordinate.
    pub y: usize,
    /// Harris response at this pixel.
    pub strength: f64,
}

/// Harris-corner based build-area detector.
pub struct CornerDetector {
    config: CornerConfig,
}

impl CornerDetector {
    /// Create a detector with custom tuning.
    #[must_use]
    pub fn new(config: CornerConfig) -> Self {
        Self { config }
    }
}

impl Default for CornerDetector {
    fn default() -> Self {
        Self::new(CornerConfig::default())
    }
}

impl RoiDetector for CornerDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Corner
    }

    fn detect(
        &self,
        image: &RgbaImage,
        ctx: &DetectContext,
    ) -> Result<Option<DetectionResult>, DetectorFailure> {
        let _span = tracing::info_span!("corner_detect").entered();
        let start = Instant::now();

        let gray = image.to_gray();
        let mut corners = harris_corners(&gray, &self.config);
        corners = suppress_non_maxima(corners, self.config.nms_radius, self.config.max_corners);
        tracing::debug!(corners = corners.len(), "harris corners after suppression");

        if corners.len() < 2 || ctx.cancel.is_cancelled() {
            return Ok(None);
        }

        let hypotheses = build_hypotheses(&corners, image, &self.config, ctx);

        let mut best: Option<(f64, Rect)> = None;
        for rect in &hypotheses {
            let score = score_rectangle(image, &gray, rect);
            if score > self.config.min_score && best.is_none_or(|(s, _)| score > s) {
                best = Some((score, *rect));
            }
        }

        Ok(best.map(|(score, rect)| {
            DetectionResult::new(rect, score, DetectionMethod::Corner)
                .with_meta("corners", corners.len())
                .with_meta("hypotheses", hypotheses.len())
                .with_meta("elapsed_ms", start.elapsed().as_secs_f64() * 1000.0)
        }))
    }
}

/// Compute Harris responses over the whole image and keep pixels above the
/// response threshold.
#[must_use]
pub fn harris_corners(gray: &GrayImage, config: &CornerConfig) -> Vec<Corner> {
    let w = gray.width;
    let h = gray.height;
    if w < 4 || h < 4 {
        return Vec::new();
    }

    let lum = gray.to_normalized();
    let (gx, gy) = compute_sobel_normalized(&lum, w, h);

    let mut corners = Vec::new();
    for y in 2..h - 2 {
        for x in 2..w - 2 {
            // Structure tensor over a 3x3 window.
            let mut sxx = 0.0f64;
            let mut syy = 0.0f64;
            let mut sxy = 0.0f64;
            for dy in 0..3 {
                let row = (y + dy - 1) * w;
                for dx in 0..3 {
                    let i = row + x + dx - 1;
                    let fx = f64::from(gx[i]);
                    let fy = f64::from(gy[i]);
                    sxx += fx * fx;
                    syy += fy * fy;
                    sxy += fx * fy;
                }
            }
            let det = sxx * syy - sxy * sxy;
            let trace = sxx + syy;
            let response = det - config.harris_k * trace * trace;
            if response > config.response_threshold {
                corners.push(Corner {
                    x,
                    y,
                    strength: response,
                });
            }
        }
    }
    corners
}

/// Greedy non-maximum suppression: strongest corner first, anything within
/// `radius` of a kept corner is dropped, capped at `max_corners`.
#[must_use]
pub fn suppress_non_maxima(mut corners: Vec<Corner>, radius: f64, max_corners: usize) -> Vec<Corner> {
    corners.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    let radius_sq = radius * radius;

    let mut kept: Vec<Corner> = Vec::new();
    for c in corners {
        if kept.len() >= max_corners {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            let dx = k.x as f64 - c.x as f64;
            let dy = k.y as f64 - c.y as f64;
            dx * dx + dy * dy < radius_sq
        });
        if !suppressed {
            kept.push(c);
        }
    }
    kept
}

/// Generate validated rectangle hypotheses from the corner set.
///
/// Stops as soon as `max_rectangles` distinct valid rectangles are found.
fn build_hypotheses(
    corners: &[Corner],
    image: &RgbaImage,
    config: &CornerConfig,
    ctx: &DetectContext,
) -> Vec<Rect> {
    let mut rects: Vec<Rect> = Vec::new();
    let n = corners.len();
    let min_side = f64::from(config.min_side);

    // All 4-corner combinations, taken as axis-aligned extremes. A cheap
    // span pre-check prunes combinations that cannot reach the minimum
    // side length before the full validation runs.
    'quads: for i in 0..n {
        if ctx.cancel.is_cancelled() {
            return rects;
        }
        for j in i + 1..n {
            for k in j + 1..n {
                for l in k + 1..n {
                    let quad = [corners[i], corners[j], corners[k], corners[l]];
                    let min_x = quad.iter().map(|c| c.x).min().unwrap_or(0);
                    let max_x = quad.iter().map(|c| c.x).max().unwrap_or(0);
                    let min_y = quad.iter().map(|c| c.y).min().unwrap_or(0);
                    let max_y = quad.iter().map(|c| c.y).max().unwrap_or(0);
                    // Span pre-check before the full validation.
                    if ((max_x - min_x) as f64) < min_side || ((max_y - min_y) as f64) < min_side {
                        continue;
                    }
                    let rect = Rect::new(
                        min_x as i32,
                        min_y as i32,
                        (max_x - min_x) as u32,
                        (max_y - min_y) as u32,
                    );
                    if validate_rectangle(&rect, image, config) && !rects.contains(&rect) {
                        rects.push(rect);
                        if rects.len() >= config.max_rectangles {
                            break 'quads;
                        }
                    }
                }
            }
        }
    }

    if rects.len() >= config.max_rectangles {
        return rects;
    }

    // Corner pairs as rectangle diagonals.
    'pairs: for i in 0..n {
        if ctx.cancel.is_cancelled() {
            return rects;
        }
        for j in i + 1..n {
            let (a, b) = (corners[i], corners[j]);
            let w = (a.x as i64 - b.x as i64).unsigned_abs() as u32;
            let h = (a.y as i64 - b.y as i64).unsigned_abs() as u32;
            if w == 0 || h == 0 {
                continue;
            }
            let rect = Rect::new(a.x.min(b.x) as i32, a.y.min(b.y) as i32, w, h);
            if validate_rectangle(&rect, image, config) && !rects.contains(&rect) {
                rects.push(rect);
                if rects.len() >= config.max_rectangles {
                    break 'pairs;
                }
            }
        }
    }

    rects
}

/// Geometric validation against the build-area priors.
fn validate_rectangle(rect: &Rect, image: &RgbaImage, config: &CornerConfig) -> bool {
    if rect.width < config.min_side || rect.height < config.min_side {
        return false;
    }
    if !rect.contained_in(image.width, image.height) {
        return false;
    }
    let aspect = rect.aspect_ratio();
    if aspect < config.aspect_range.0 || aspect > config.aspect_range.1 {
        return false;
    }
    let area_ratio = rect.area() as f64 / (image.width * image.height) as f64;
    area_ratio >= config.area_ratio_range.0 && area_ratio <= config.area_ratio_range.1
}

/// Heuristic score: 0.4 color + 0.4 structure + 0.2 geometry.
fn score_rectangle(image: &RgbaImage, gray: &GrayImage, rect: &Rect) -> f64 {
    let step = ((rect.width.min(rect.height) / 20) as usize).max(1);

    // Color: a build area is mostly dark background with a moderate amount
    // of saturated accent elements.
    let mut sampled = 0usize;
    let mut dark = 0usize;
    let mut accent = 0usize;
    let mut y = rect.y as usize;
    while y < rect.bottom() as usize {
        let mut x = rect.x as usize;
        while x < rect.right() as usize {
            let px = image.pixel(x, y);
            sampled += 1;
            if is_dark_background(px) {
                dark += 1;
            }
            if is_saturated_accent(px) {
                accent += 1;
            }
            x += step;
        }
        y += step;
    }
    let color_score = if sampled == 0 {
        0.0
    } else {
        let dark_ratio = dark as f64 / sampled as f64;
        let accent_ratio = accent as f64 / sampled as f64;
        0.6 * plateau_score(dark_ratio, 0.2, 0.4, 0.8, 0.95)
            + 0.4 * plateau_score(accent_ratio, 0.02, 0.1, 0.4, 0.6)
    };

    // Structure: moderate density of 4-neighbor gradient edges. Too few
    // means a blank region, too many means text or noise.
    let mut edge_sampled = 0usize;
    let mut edges = 0usize;
    let mut y = (rect.y as usize).max(1);
    while y < (rect.bottom() as usize).min(image.height - 1) {
        let mut x = (rect.x as usize).max(1);
        while x < (rect.right() as usize).min(image.width - 1) {
            let dx =
                i32::from(gray.get(x + 1, y)).abs_diff(i32::from(gray.get(x - 1, y)));
            let dy =
                i32::from(gray.get(x, y + 1)).abs_diff(i32::from(gray.get(x, y - 1)));
            edge_sampled += 1;
            if dx + dy > 30 {
                edges += 1;
            }
            x += step;
        }
        y += step;
    }
    let structure_score = if edge_sampled == 0 {
        0.0
    } else {
        let density = edges as f64 / edge_sampled as f64;
        plateau_score(density, 0.0, 0.05, 0.30, 0.60)
    };

    // Geometry: aspect close to the typical panel shape, area neither
    // sliver nor full-screen.
    let aspect_score = plateau_score(rect.aspect_ratio(), 1.2, 1.3, 2.2, 2.5);
    let rel_area = rect.area() as f64 / (image.width * image.height) as f64;
    let area_score = triangular_score(rel_area, 0.1, 0.35, 0.8);
    let geometry_score = (aspect_score + area_score) / 2.0;

    0.4 * color_score + 0.4 * structure_score + 0.2 * geometry_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScreenshotBuilder;

    #[test]
    fn test_nms_keeps_stronger_of_two_close_corners() {
        let corners = vec![
            Corner {
                x: 100,
                y: 100,
                strength: 0.5,
            },
            Corner {
                x: 104,
                y: 103,
                strength: 0.9,
            },
        ];
        let kept = suppress_non_maxima(corners, 10.0, 50);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].x, 104);
        assert!((kept[0].strength - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_nms_keeps_both_distant_corners() {
        let corners = vec![
            Corner {
                x: 100,
                y: 100,
                strength: 0.5,
            },
            Corner {
                x: 200,
                y: 100,
                strength: 0.9,
            },
        ];
        let kept = suppress_non_maxima(corners, 10.0, 50);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_nms_cap() {
        let corners: Vec<Corner> = (0..100)
            .map(|i| Corner {
                x: i * 30,
                y: 0,
                strength: f64::from(i as u32),
            })
            .collect();
        let kept = suppress_non_maxima(corners, 10.0, 50);
        assert_eq!(kept.len(), 50);
        // Strongest first.
        assert!(kept[0].strength >= kept[49].strength);
    }

    #[test]
    fn test_harris_fires_on_panel_corners() {
        let (image, panel) = ScreenshotBuilder::new(640, 420)
            .with_panel(100, 60, 420, 280)
            .with_accents(false)
            .build();
        let panel = panel.unwrap();
        let gray = image.to_gray();
        let corners = harris_corners(&gray, &CornerConfig::default());
        let corners = suppress_non_maxima(corners, 10.0, 50);
        assert!(!corners.is_empty());
        // At least one suppressed corner lies near the panel's top-left.
        let near_tl = corners.iter().any(|c| {
            (c.x as i32 - panel.x).abs() <= 6 && (c.y as i32 - panel.y).abs() <= 6
        });
        assert!(near_tl, "no corner near panel top-left");
    }

    #[test]
    fn test_detect_none_on_flat_image() {
        let image = RgbaImage::new(vec![40u8; 400 * 400 * 4], 400, 400).unwrap();
        let det = CornerDetector::default();
        let result = det.detect(&image, &DetectContext::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_detect_finds_styled_panel() {
        let (image, panel) = ScreenshotBuilder::new(800, 1000)
            .with_panel(140, 300, 520, 340)
            .build();
        let panel = panel.unwrap();
        let det = CornerDetector::default();
        let result = det.detect(&image, &DetectContext::default()).unwrap();
        let result = result.expect("styled panel should produce a corner candidate");
        assert_eq!(result.method, DetectionMethod::Corner);
        assert!(result.bounds.contained_in(image.width, image.height));
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(result.bounds.iou(&panel) > 0.3);
    }

    proptest::proptest! {
        #[test]
        fn prop_suppression_enforces_radius(
            coords in proptest::collection::vec((0..400usize, 0..400usize, 0..1000u32), 0..80),
            radius in 2.0..30.0f64,
        ) {
            let corners: Vec<Corner> = coords
                .iter()
                .map(|&(x, y, s)| Corner { x, y, strength: f64::from(s) })
                .collect();
            let kept = suppress_non_maxima(corners, radius, 50);
            proptest::prop_assert!(kept.len() <= 50);
            for (i, a) in kept.iter().enumerate() {
                for b in kept.iter().skip(i + 1) {
                    let dx = a.x as f64 - b.x as f64;
                    let dy = a.y as f64 - b.y as f64;
                    proptest::prop_assert!(dx * dx + dy * dy >= radius * radius);
                }
            }
        }
    }

    #[test]
    fn test_cancelled_detect_returns_none() {
        let (image, _) = ScreenshotBuilder::new(800, 1000)
            .with_panel(140, 300, 520, 340)
            .build();
        let ctx = DetectContext::default();
        ctx.cancel.cancel();
        let det = CornerDetector::default();
        assert!(det.detect(&image, &ctx).unwrap().is_none());
    }
}
