//! Synthetic UI-motif templates and normalized cross-correlation matching.
//!
//! The library is built lazily on first use and shared read-only
//! afterwards. Motifs mimic the build-area chrome: corner frames in four
//! orientations, hexagon outlines and fills, and horizontal/vertical frame
//! lines, each rendered at three sizes. Matching runs zero-mean NCC on a
//! subsampled grid, then clusters nearby matches and estimates the panel
//! bounds from the cluster extent.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use std::sync::OnceLock;
use std::time::Instant;

use multiversion::multiversion;
use rayon::prelude::*;

use crate::config::TemplateConfig;
use crate::geometry::{Rect, position_score, triangular_score};
use crate::image::{GrayImage, RgbaImage};
use crate::{DetectContext, DetectionMethod, DetectionResult, DetectorFailure, RoiDetector};

/// Motif family of a template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateKind {
    /// L-shaped corner frame (one of four orientations).
    CornerFrame,
    /// Hexagon cell, outlined or filled.
    Hexagon,
    /// Straight frame line, horizontal or vertical.
    FrameLine,
}

/// One synthetic template with precomputed correlation data.
pub struct Template {
    /// Stable identifier, e.g. `corner_tl_64x32`.
    pub id: String,
    /// Motif family, used by the diversity score.
    pub kind: TemplateKind,
    /// Template width in pixels.
    pub width: usize,
    /// Template height in pixels.
    pub height: usize,
    /// Rendered grayscale pattern, row-major.
    data: Vec<u8>,
    /// Subsampled positions used during correlation.
    samples: Vec<(usize, usize)>,
    /// Zero-mean template values at the sampled positions.
    sample_values: Vec<f32>,
    /// L2 norm of `sample_values`.
    norm: f32,
}

impl Template {
    fn new(id: String, kind: TemplateKind, width: usize, height: usize, data: Vec<u8>) -> Self {
        let step = (width.min(height) / 16).max(1);
        let mut samples = Vec::new();
        let mut y = 0;
        while y < height {
            let mut x = 0;
            while x < width {
                samples.push((x, y));
                x += step;
            }
            y += step;
        }

        let mean =
            samples.iter().map(|&(x, y)| f32::from(data[y * width + x])).sum::<f32>()
                / samples.len() as f32;
        let sample_values: Vec<f32> = samples
            .iter()
            .map(|&(x, y)| f32::from(data[y * width + x]) - mean)
            .collect();
        let norm = sample_values.iter().map(|v| v * v).sum::<f32>().sqrt();

        Self {
            id,
            kind,
            width,
            height,
            data,
            samples,
            sample_values,
            norm,
        }
    }

    /// Sliding-window stride for this template.
    fn stride(&self) -> usize {
        (self.width.min(self.height) / 4).max(1)
    }

    /// The rendered grayscale pattern and its dimensions.
    #[must_use]
    pub fn pattern(&self) -> (&[u8], usize, usize) {
        (&self.data, self.width, self.height)
    }
}

/// A single template hit above the match threshold.
#[derive(Clone, Copy, Debug)]
pub struct TemplateMatch {
    /// Top-left x of the matched window.
    pub x: usize,
    /// Top-left y of the matched window.
    pub y: usize,
    /// Matched window width.
    pub width: usize,
    /// Matched window height.
    pub height: usize,
    /// Normalized cross-correlation score.
    pub score: f64,
    /// Motif family of the matched template.
    pub kind: TemplateKind,
}

impl TemplateMatch {
    fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

static LIBRARY: OnceLock<Vec<Template>> = OnceLock::new();

/// The shared template library, built on first access.
pub fn template_library() -> &'static [Template] {
    LIBRARY.get_or_init(build_library)
}

const TEMPLATE_SIZES: [(usize, usize); 3] = [(64, 32), (96, 48), (128, 64)];
const BG: u8 = 30;
const FG: u8 = 220;

fn build_library() -> Vec<Template> {
    let _span = tracing::info_span!("build_template_library").entered();
    let mut out = Vec::new();
    for &(w, h) in &TEMPLATE_SIZES {
        for orient in ["tl", "tr", "bl", "br"] {
            out.push(Template::new(
                format!("corner_{orient}_{w}x{h}"),
                TemplateKind::CornerFrame,
                w,
                h,
                render_corner_frame(w, h, orient),
            ));
        }
        out.push(Template::new(
            format!("hex_outline_{w}x{h}"),
            TemplateKind::Hexagon,
            w,
            h,
            render_hexagon(w, h, false),
        ));
        out.push(Template::new(
            format!("hex_filled_{w}x{h}"),
            TemplateKind::Hexagon,
            w,
            h,
            render_hexagon(w, h, true),
        ));
        out.push(Template::new(
            format!("frame_h_{w}x{h}"),
            TemplateKind::FrameLine,
            w,
            h,
            render_frame_line(w, h, true),
        ));
        out.push(Template::new(
            format!("frame_v_{w}x{h}"),
            TemplateKind::FrameLine,
            w,
            h,
            render_frame_line(w, h, false),
        ));
    }
    out
}

fn render_corner_frame(w: usize, h: usize, orient: &str) -> Vec<u8> {
    let mut data = vec![BG; w * h];
    let t = (h / 10).max(2);
    let (top, left) = match orient {
        "tl" => (true, true),
        "tr" => (true, false),
        "bl" => (false, true),
        _ => (false, false),
    };
    for y in 0..h {
        for x in 0..w {
            let in_h_bar = if top { y < t } else { y >= h - t };
            let in_v_bar = if left { x < t } else { x >= w - t };
            if in_h_bar || in_v_bar {
                data[y * w + x] = FG;
            }
        }
    }
    data
}

fn render_hexagon(w: usize, h: usize, filled: bool) -> Vec<u8> {
    let mut data = vec![BG; w * h];
    let cx = w as f64 / 2.0;
    let cy = h as f64 / 2.0;
    // Flat-top hexagon inscribed in the template, half-extents.
    let rx = w as f64 * 0.45;
    let ry = h as f64 * 0.45;

    let inside = |px: f64, py: f64, scale: f64| -> bool {
        let dx = (px - cx).abs() / (rx * scale);
        let dy = (py - cy).abs() / (ry * scale);
        // |y| <= 1 within the flat band, plus the two slanted sides:
        // dx <= 1 and the corner cut dx + dy/2 <= 1.25 approximates a hex.
        dx <= 1.0 && dy <= 1.0 && dx + dy * 0.5 <= 1.25
    };

    for y in 0..h {
        for x in 0..w {
            let px = x as f64 + 0.5;
            let py = y as f64 + 0.5;
            if inside(px, py, 1.0) {
                let on_ring = !inside(px, py, 0.82);
                if filled || on_ring {
                    data[y * w + x] = FG;
                }
            }
        }
    }
    data
}

fn render_frame_line(w: usize, h: usize, horizontal: bool) -> Vec<u8> {
    let mut data = vec![BG; w * h];
    if horizontal {
        let t = (h / 8).max(2);
        let y0 = h / 2 - t / 2;
        for y in y0..y0 + t {
            for x in 0..w {
                data[y * w + x] = FG;
            }
        }
    } else {
        let t = (w / 8).max(2);
        let x0 = w / 2 - t / 2;
        for y in 0..h {
            for x in x0..x0 + t {
                data[y * w + x] = FG;
            }
        }
    }
    data
}

/// Zero-mean NCC between a template and one image window.
///
/// Returns 0 for windows with no intensity variance.
#[multiversion(targets(
    "x86_64+avx2+bmi1+bmi2+popcnt+lzcnt",
    "x86_64+avx512f+avx512bw+avx512dq+avx512vl",
    "aarch64+neon"
))]
fn ncc_at(tpl: &Template, gray: &GrayImage, ox: usize, oy: usize) -> f64 {
    let w = gray.width;
    let n = tpl.samples.len() as f32;

    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut cross = 0.0f32;
    for (i, &(sx, sy)) in tpl.samples.iter().enumerate() {
        let v = f32::from(gray.data[(oy + sy) * w + ox + sx]);
        sum += v;
        sum_sq += v * v;
        cross += tpl.sample_values[i] * v;
    }

    let var = sum_sq - sum * sum / n;
    if var <= f32::EPSILON || tpl.norm <= f32::EPSILON {
        return 0.0;
    }
    // cross already equals the zero-mean numerator because the template
    // samples sum to zero.
    f64::from(cross / (tpl.norm * var.sqrt()))
}

/// Slide every library template over the image and collect matches at or
/// above the threshold, strongest first, capped at `max_matches`.
pub fn find_matches(
    gray: &GrayImage,
    config: &TemplateConfig,
    ctx: &DetectContext,
) -> Vec<TemplateMatch> {
    let library = template_library();

    let mut matches: Vec<TemplateMatch> = library
        .par_iter()
        .map(|tpl| {
            let mut hits = Vec::new();
            if gray.width < tpl.width || gray.height < tpl.height {
                return hits;
            }
            let stride = tpl.stride();
            let mut y = 0;
            while y + tpl.height <= gray.height {
                if ctx.cancel.is_cancelled() {
                    return hits;
                }
                let mut x = 0;
                while x + tpl.width <= gray.width {
                    let score = ncc_at(tpl, gray, x, y);
                    if score >= config.match_threshold {
                        hits.push(TemplateMatch {
                            x,
                            y,
                            width: tpl.width,
                            height: tpl.height,
                            score,
                            kind: tpl.kind,
                        });
                    }
                    x += stride;
                }
                y += stride;
            }
            hits
        })
        .reduce(Vec::new, |mut a, mut b| {
            a.append(&mut b);
            a
        });

    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches.truncate(config.max_matches);
    matches
}

/// A group of nearby matches.
struct Cluster {
    members: Vec<TemplateMatch>,
    bounds: Rect,
}

/// Greedy seed-and-absorb clustering: the strongest unassigned match seeds
/// a cluster and absorbs every unassigned match within the radius.
fn cluster_matches(matches: &[TemplateMatch], radius: f64) -> Vec<Cluster> {
    let radius_sq = radius * radius;
    let mut assigned = vec![false; matches.len()];
    let mut clusters = Vec::new();

    for seed_idx in 0..matches.len() {
        if assigned[seed_idx] {
            continue;
        }
        assigned[seed_idx] = true;
        let seed = matches[seed_idx];
        let (scx, scy) = seed.center();
        let mut members = vec![seed];

        for (idx, m) in matches.iter().enumerate().skip(seed_idx + 1) {
            if assigned[idx] {
                continue;
            }
            let (cx, cy) = m.center();
            let dx = cx - scx;
            let dy = cy - scy;
            if dx * dx + dy * dy <= radius_sq {
                assigned[idx] = true;
                members.push(*m);
            }
        }

        let min_x = members.iter().map(|m| m.x).min().unwrap_or(0);
        let min_y = members.iter().map(|m| m.y).min().unwrap_or(0);
        let max_x = members.iter().map(|m| m.x + m.width).max().unwrap_or(0);
        let max_y = members.iter().map(|m| m.y + m.height).max().unwrap_or(0);
        clusters.push(Cluster {
            members,
            bounds: Rect::new(
                min_x as i32,
                min_y as i32,
                (max_x - min_x) as u32,
                (max_y - min_y) as u32,
            ),
        });
    }

    clusters
}

/// Template-matching based build-area detector.
pub struct TemplateMatchDetector {
    config: TemplateConfig,
}

impl TemplateMatchDetector {
    /// Create a detector with custom tuning.
    #[must_use]
    pub fn new(config: TemplateConfig) -> Self {
        Self { config }
    }
}

impl Default for TemplateMatchDetector {
    fn default() -> Self {
        Self::new(TemplateConfig::default())
    }
}

impl RoiDetector for TemplateMatchDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Template
    }

    fn detect(
        &self,
        image: &RgbaImage,
        ctx: &DetectContext,
    ) -> Result<Option<DetectionResult>, DetectorFailure> {
        let _span = tracing::info_span!("template_detect").entered();
        let start = Instant::now();

        let gray = image.to_gray();
        let matches = find_matches(&gray, &self.config, ctx);
        tracing::debug!(matches = matches.len(), "template matches collected");
        if matches.is_empty() || ctx.cancel.is_cancelled() {
            return Ok(None);
        }

        let clusters = cluster_matches(&matches, self.config.cluster_radius);
        let image_area = (image.width * image.height) as f64;
        let margin = self.config.bounds_margin as i32;

        let mut best: Option<(f64, Rect, usize)> = None;
        for cluster in &clusters {
            if cluster.members.len() < self.config.min_cluster_size {
                continue;
            }

            // Expand the cluster extent by the frame margin, clamped to the
            // image, to estimate the full panel bounds.
            let x0 = (cluster.bounds.x - margin).max(0);
            let y0 = (cluster.bounds.y - margin).max(0);
            let x1 = (cluster.bounds.right() + margin).min(image.width as i32);
            let y1 = (cluster.bounds.bottom() + margin).min(image.height as i32);
            if x1 <= x0 || y1 <= y0 {
                continue;
            }
            let bounds = Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32);

            let area = bounds.area() as f64;
            if area < self.config.area_range.0 || area > self.config.area_range.1 {
                continue;
            }
            let aspect = bounds.aspect_ratio();
            if aspect < self.config.aspect_range.0 || aspect > self.config.aspect_range.1 {
                continue;
            }

            let avg_match = cluster.members.iter().map(|m| m.score).sum::<f64>()
                / cluster.members.len() as f64;

            let mut diversity: f64 = 0.0;
            if cluster.members.iter().any(|m| m.kind == TemplateKind::CornerFrame) {
                diversity += 0.4;
            }
            if cluster.members.iter().any(|m| m.kind == TemplateKind::Hexagon) {
                diversity += 0.3;
            }
            if cluster.members.iter().any(|m| m.kind == TemplateKind::FrameLine) {
                diversity += 0.3;
            }
            let diversity = diversity.min(1.0);

            let size_score = (cluster.members.len() as f64 / 10.0).min(1.0);
            let pos_score = position_score(&bounds, image.width, image.height);
            let rel_area = area / image_area;
            let area_score = triangular_score(rel_area, 0.1, 0.35, 0.8);

            let score = 0.3 * avg_match
                + 0.2 * diversity
                + 0.15 * size_score
                + 0.15 * pos_score
                + 0.2 * area_score;

            if best.is_none_or(|(s, _, _)| score > s) {
                best = Some((score, bounds, cluster.members.len()));
            }
        }

        Ok(best.map(|(score, bounds, cluster_size)| {
            DetectionResult::new(bounds, score, DetectionMethod::Template)
                .with_meta("matches", matches.len())
                .with_meta("clusters", clusters.len())
                .with_meta("cluster_size", cluster_size)
                .with_meta("elapsed_ms", start.elapsed().as_secs_f64() * 1000.0)
        }))
    }
}
