//! Canny edge extraction and contour-based build-area detection.
//!
//! Pipeline: Gaussian blur, Sobel magnitude and direction, non-maximum
//! suppression into four direction bins, double threshold, 8-neighbor
//! hysteresis, then 8-connected component tracing over the surviving edge
//! pixels. Each contour's bounding rectangle is a candidate.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use std::time::Instant;

use bumpalo::Bump;
use bumpalo::collections::Vec as BumpVec;

use crate::config::EdgeConfig;
use crate::geometry::{Rect, position_score, triangular_score};
use crate::gradient::compute_sobel;
use crate::image::{GrayImage, RgbaImage, is_dark_background};
use crate::{DetectContext, DetectionMethod, DetectionResult, DetectorFailure, RoiDetector};

/// A traced edge component: its extent and point count.
#[derive(Clone, Copy, Debug)]
pub struct Contour {
    /// Bounding rectangle of the component.
    pub bounds: Rect,
    /// Number of edge pixels in the component.
    pub len: usize,
}

/// Canny edge / contour based build-area detector.
pub struct EdgeContourDetector {
    config: EdgeConfig,
}

impl EdgeContourDetector {
    /// Create a detector with custom tuning.
    #[must_use]
    pub fn new(config: EdgeConfig) -> Self {
        Self { config }
    }
}

impl Default for EdgeContourDetector {
    fn default() -> Self {
        Self::new(EdgeConfig::default())
    }
}

impl RoiDetector for EdgeContourDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Edge
    }

    fn detect(
        &self,
        image: &RgbaImage,
        ctx: &DetectContext,
    ) -> Result<Option<DetectionResult>, DetectorFailure> {
        let _span = tracing::info_span!("edge_detect").entered();
        let start = Instant::now();
        let w = image.width;
        let h = image.height;
        if w < 8 || h < 8 {
            return Ok(None);
        }

        let arena = Bump::new();
        let gray = image.to_gray();

        let mut blurred = vec![0u8; w * h];
        crate::filter::gaussian_blur(&arena, &gray, &mut blurred, self.config.blur_sigma);
        let blurred = GrayImage {
            width: w,
            height: h,
            data: blurred,
        };

        let edge_map = canny_edges(&arena, &blurred, &self.config);
        if ctx.cancel.is_cancelled() {
            return Ok(None);
        }

        let contours = trace_contours(&arena, edge_map, w, h, self.config.min_contour_len, ctx);
        tracing::debug!(contours = contours.len(), "edge components traced");

        let image_area = (w * h) as f64;
        let mut candidates = 0usize;
        let mut best: Option<(f64, Rect)> = None;
        for contour in &contours {
            let rect = contour.bounds;
            let area = rect.area() as f64;
            if area < self.config.area_range.0 || area > self.config.area_range.1 {
                continue;
            }
            let aspect = rect.aspect_ratio();
            if aspect < self.config.aspect_range.0 || aspect > self.config.aspect_range.1 {
                continue;
            }
            let rel_area = area / image_area;
            if rel_area < self.config.relative_area_range.0
                || rel_area > self.config.relative_area_range.1
            {
                continue;
            }
            candidates += 1;
            let score = self.score_candidate(image, &rect, rel_area, aspect);
            if best.is_none_or(|(s, _)| score > s) {
                best = Some((score, rect));
            }
        }

        Ok(best.map(|(score, rect)| {
            DetectionResult::new(rect, score, DetectionMethod::Edge)
                .with_meta("contours", contours.len())
                .with_meta("candidates", candidates)
                .with_meta("elapsed_ms", start.elapsed().as_secs_f64() * 1000.0)
        }))
    }
}

impl EdgeContourDetector {
    /// Score: 0.3 size + 0.2 aspect + 0.2 position + 0.3 content.
    fn score_candidate(&self, image: &RgbaImage, rect: &Rect, rel_area: f64, aspect: f64) -> f64 {
        let (area_lo, area_hi) = self.config.relative_area_range;
        let size_score = triangular_score(rel_area, area_lo, 0.35, area_hi);

        let (aspect_lo, aspect_hi) = self.config.aspect_range;
        let aspect_score = triangular_score(aspect, aspect_lo, 1.6, aspect_hi);

        let pos_score = position_score(rect, image.width, image.height);

        // Content: sample the candidate interior on a coarse grid and grade
        // the dark-pixel ratio against the expected panel fill.
        let step = ((rect.width.min(rect.height) / 20) as usize).max(1);
        let mut sampled = 0usize;
        let mut dark = 0usize;
        let mut y = rect.y as usize;
        while y < rect.bottom() as usize {
            let mut x = rect.x as usize;
            while x < rect.right() as usize {
                sampled += 1;
                if is_dark_background(image.pixel(x, y)) {
                    dark += 1;
                }
                x += step;
            }
            y += step;
        }
        let content_score = if sampled == 0 {
            0.0
        } else {
            triangular_score(dark as f64 / sampled as f64, 0.0, 0.4, 1.0)
        };

        0.3 * size_score + 0.2 * aspect_score + 0.2 * pos_score + 0.3 * content_score
    }
}

/// Run the Canny pipeline and return the final edge map (255 = edge).
///
/// The returned slice is arena-allocated and row-major `width * height`.
pub fn canny_edges<'a>(arena: &'a Bump, gray: &GrayImage, config: &EdgeConfig) -> &'a [u8] {
    let w = gray.width;
    let h = gray.height;
    let grads = compute_sobel(gray);

    // Non-maximum suppression: keep a pixel only if its magnitude is at
    // least that of both neighbors along the gradient direction, binned
    // into four directions at +-pi/8.
    let thinned = arena.alloc_slice_fill_copy(w * h, 0.0f32);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let g = grads[y * w + x];
            if g.mag < config.low_threshold {
                continue;
            }
            let mut angle = f32::from(g.gy).atan2(f32::from(g.gx)).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            let (n1, n2) = if !(22.5..157.5).contains(&angle) {
                (grads[y * w + x - 1].mag, grads[y * w + x + 1].mag)
            } else if angle < 67.5 {
                (grads[(y - 1) * w + x + 1].mag, grads[(y + 1) * w + x - 1].mag)
            } else if angle < 112.5 {
                (grads[(y - 1) * w + x].mag, grads[(y + 1) * w + x].mag)
            } else {
                (grads[(y - 1) * w + x - 1].mag, grads[(y + 1) * w + x + 1].mag)
            };
            if g.mag >= n1 && g.mag >= n2 {
                thinned[y * w + x] = g.mag;
            }
        }
    }

    // Double threshold: 2 = strong, 1 = weak.
    let classes = arena.alloc_slice_fill_copy(w * h, 0u8);
    for (i, &m) in thinned.iter().enumerate() {
        if m >= config.high_threshold {
            classes[i] = 2;
        } else if m >= config.low_threshold {
            classes[i] = 1;
        }
    }

    // Hysteresis: weak pixels survive only when 8-connected to a strong one.
    let edges = arena.alloc_slice_fill_copy(w * h, 0u8);
    let mut stack = BumpVec::new_in(arena);
    for i in 0..w * h {
        if classes[i] == 2 && edges[i] == 0 {
            edges[i] = 255;
            stack.push(i as u32);
            while let Some(idx) = stack.pop() {
                let idx = idx as usize;
                let x = idx % w;
                let y = idx / w;
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as i32 + dx;
                        let ny = y as i32 + dy;
                        if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                            continue;
                        }
                        let ni = ny as usize * w + nx as usize;
                        if classes[ni] >= 1 && edges[ni] == 0 {
                            edges[ni] = 255;
                            stack.push(ni as u32);
                        }
                    }
                }
            }
        }
    }

    edges
}

/// Trace 8-connected components of the edge map via flood fill and return
/// contours with at least `min_len` points.
pub fn trace_contours(
    arena: &Bump,
    edge_map: &[u8],
    w: usize,
    h: usize,
    min_len: usize,
    ctx: &DetectContext,
) -> Vec<Contour> {
    let visited = arena.alloc_slice_fill_copy(w * h, false);
    let mut contours = Vec::new();
    let mut stack = BumpVec::new_in(arena);

    for seed in 0..w * h {
        if edge_map[seed] == 0 || visited[seed] {
            continue;
        }
        if ctx.cancel.is_cancelled() {
            return contours;
        }

        let mut len = 0usize;
        let mut min_x = usize::MAX;
        let mut max_x = 0usize;
        let mut min_y = usize::MAX;
        let mut max_y = 0usize;

        visited[seed] = true;
        stack.push(seed as u32);
        while let Some(idx) = stack.pop() {
            let idx = idx as usize;
            let x = idx % w;
            let y = idx / w;
            len += 1;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let ni = ny as usize * w + nx as usize;
                    if edge_map[ni] != 0 && !visited[ni] {
                        visited[ni] = true;
                        stack.push(ni as u32);
                    }
                }
            }
        }

        if len >= min_len {
            contours.push(Contour {
                bounds: Rect::new(
                    min_x as i32,
                    min_y as i32,
                    (max_x - min_x + 1) as u32,
                    (max_y - min_y + 1) as u32,
                ),
                len,
            });
        }
    }

    contours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::bright_rect_screenshot;

    #[test]
    fn test_canny_finds_rectangle_outline() {
        let rect = Rect::new(40, 30, 120, 80);
        let image = bright_rect_screenshot(240, 180, rect);
        let gray = image.to_gray();
        let arena = Bump::new();
        let edges = canny_edges(&arena, &gray, &EdgeConfig::default());
        let edge_count = edges.iter().filter(|&&e| e != 0).count();
        // Roughly the rectangle perimeter, allowing smear from the blur.
        let perimeter = 2 * (120 + 80);
        assert!(edge_count > perimeter / 2, "too few edges: {edge_count}");
        assert!(edge_count < perimeter * 4, "too many edges: {edge_count}");
    }

    #[test]
    fn test_trace_contours_min_len() {
        let w = 32;
        let h = 32;
        let mut edge_map = vec![0u8; w * h];
        // A 20-pixel horizontal segment and an isolated 3-pixel blip.
        for x in 5..25 {
            edge_map[10 * w + x] = 255;
        }
        for x in 5..8 {
            edge_map[20 * w + x] = 255;
        }
        let arena = Bump::new();
        let contours = trace_contours(&arena, &edge_map, w, h, 10, &DetectContext::default());
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len, 20);
        assert_eq!(contours[0].bounds, Rect::new(5, 10, 20, 1));
    }

    #[test]
    fn test_detect_bright_panel_iou() {
        // The canonical synthetic case: dark 800x1000 screenshot with one
        // bright 500x300 panel.
        let panel = Rect::new(150, 350, 500, 300);
        let image = bright_rect_screenshot(800, 1000, panel);
        let det = EdgeContourDetector::default();
        let result = det
            .detect(&image, &DetectContext::default())
            .unwrap()
            .expect("panel should be detected");
        assert_eq!(result.method, DetectionMethod::Edge);
        assert!(result.bounds.contained_in(800, 1000));
        assert!(
            result.bounds.iou(&panel) >= 0.7,
            "IoU too low: {} for {:?}",
            result.bounds.iou(&panel),
            result.bounds
        );
    }

    #[test]
    fn test_detect_none_on_flat_image() {
        let image = RgbaImage::new(vec![30u8; 400 * 400 * 4], 400, 400).unwrap();
        let det = EdgeContourDetector::default();
        assert!(det.detect(&image, &DetectContext::default()).unwrap().is_none());
    }
}
