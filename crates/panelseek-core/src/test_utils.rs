//! Synthetic screenshot generation for tests and benchmarks.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use rand::prelude::*;
use rand_distr::{Distribution, Normal};

use crate::geometry::Rect;
use crate::image::RgbaImage;

const BACKGROUND: [u8; 3] = [56, 58, 66];
const PANEL_FILL: [u8; 3] = [22, 24, 40];
const PANEL_BORDER: [u8; 3] = [200, 205, 220];
const ACCENT: [u8; 3] = [235, 150, 60];
const BORDER_THICKNESS: usize = 3;

/// A builder for synthetic game screenshots containing a styled build-area
/// panel: dark fill, bright frame, and a sprinkling of saturated accent
/// cells, on a neutral background.
pub struct ScreenshotBuilder {
    width: usize,
    height: usize,
    panel: Option<Rect>,
    accents: bool,
    noise_sigma: f64,
    blur: bool,
}

impl ScreenshotBuilder {
    /// Create a builder for a `width` x `height` screenshot.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            panel: None,
            accents: true,
            noise_sigma: 0.0,
            blur: false,
        }
    }

    /// Place the build-area panel.
    #[must_use]
    pub fn with_panel(mut self, x: i32, y: i32, width: u32, height: u32) -> Self {
        self.panel = Some(Rect::new(x, y, width, height));
        self
    }

    /// Toggle the accent cells inside the panel (on by default).
    #[must_use]
    pub fn with_accents(mut self, accents: bool) -> Self {
        self.accents = accents;
        self
    }

    /// Add Gaussian pixel noise with the given standard deviation.
    #[must_use]
    pub fn with_noise(mut self, sigma: f64) -> Self {
        self.noise_sigma = sigma;
        self
    }

    /// Apply a 3x3 box blur after drawing.
    #[must_use]
    pub fn with_blur(mut self, blur: bool) -> Self {
        self.blur = blur;
        self
    }

    /// Render the screenshot. Returns the image and the panel rectangle.
    ///
    /// # Panics
    /// Panics if a panel was placed partially outside the canvas.
    #[must_use]
    pub fn build(self) -> (RgbaImage, Option<Rect>) {
        let mut data = vec![0u8; self.width * self.height * 4];
        for px in data.chunks_exact_mut(4) {
            px[0] = BACKGROUND[0];
            px[1] = BACKGROUND[1];
            px[2] = BACKGROUND[2];
            px[3] = 255;
        }

        if let Some(panel) = self.panel {
            assert!(
                panel.contained_in(self.width, self.height),
                "panel {panel:?} outside {}x{} canvas",
                self.width,
                self.height
            );
            draw_panel(&mut data, self.width, panel, self.accents);
        }

        if self.noise_sigma > 0.0 {
            let mut rng = thread_rng();
            let normal = Normal::new(0.0, self.noise_sigma).expect("valid noise sigma");
            for px in data.chunks_exact_mut(4) {
                let noise = normal.sample(&mut rng);
                for channel in px.iter_mut().take(3) {
                    *channel = (f64::from(*channel) + noise).clamp(0.0, 255.0) as u8;
                }
            }
        }

        if self.blur {
            data = box_blur_rgba(&data, self.width, self.height);
        }

        let image = RgbaImage {
            width: self.width,
            height: self.height,
            data,
        };
        (image, self.panel)
    }
}

fn set_px(data: &mut [u8], width: usize, x: usize, y: usize, rgb: [u8; 3]) {
    let i = (y * width + x) * 4;
    data[i] = rgb[0];
    data[i + 1] = rgb[1];
    data[i + 2] = rgb[2];
}

fn draw_panel(data: &mut [u8], width: usize, panel: Rect, accents: bool) {
    let x0 = panel.x as usize;
    let y0 = panel.y as usize;
    let x1 = panel.right() as usize;
    let y1 = panel.bottom() as usize;

    // Fill and frame.
    for y in y0..y1 {
        for x in x0..x1 {
            let on_border = x < x0 + BORDER_THICKNESS
                || x >= x1 - BORDER_THICKNESS
                || y < y0 + BORDER_THICKNESS
                || y >= y1 - BORDER_THICKNESS;
            set_px(
                data,
                width,
                x,
                y,
                if on_border { PANEL_BORDER } else { PANEL_FILL },
            );
        }
    }

    if !accents {
        return;
    }

    // Accent cells on a deterministic grid, roughly one ninth coverage,
    // standing in for the hex highlights the real UI draws.
    let spacing = ((panel.width.min(panel.height) / 10) as usize).max(12);
    let dot = (spacing / 3).max(2);
    let inset = BORDER_THICKNESS + spacing / 2;
    let mut y = y0 + inset;
    while y + dot < y1 - BORDER_THICKNESS {
        let mut x = x0 + inset;
        while x + dot < x1 - BORDER_THICKNESS {
            for dy in 0..dot {
                for dx in 0..dot {
                    set_px(data, width, x + dx, y + dy, ACCENT);
                }
            }
            x += spacing;
        }
        y += spacing;
    }
}

fn box_blur_rgba(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut blurred = data.to_vec();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            for c in 0..3 {
                let mut sum = 0u32;
                for dy in 0..3 {
                    for dx in 0..3 {
                        sum += u32::from(data[((y + dy - 1) * width + (x + dx - 1)) * 4 + c]);
                    }
                }
                blurred[(y * width + x) * 4 + c] = (sum / 9) as u8;
            }
        }
    }
    blurred
}

/// A dark screenshot with a single bright filled rectangle: the canonical
/// edge-detector fixture.
#[must_use]
pub fn bright_rect_screenshot(width: usize, height: usize, rect: Rect) -> RgbaImage {
    let mut data = vec![0u8; width * height * 4];
    for px in data.chunks_exact_mut(4) {
        px[0] = 24;
        px[1] = 26;
        px[2] = 40;
        px[3] = 255;
    }
    for y in rect.y.max(0) as usize..(rect.bottom() as usize).min(height) {
        for x in rect.x.max(0) as usize..(rect.right() as usize).min(width) {
            set_px(&mut data, width, x, y, [215, 218, 230]);
        }
    }
    RgbaImage {
        width,
        height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{is_dark_background, is_saturated_accent};

    #[test]
    fn test_builder_reports_panel_rect() {
        let (image, panel) = ScreenshotBuilder::new(320, 240)
            .with_panel(40, 30, 200, 120)
            .build();
        assert_eq!(panel, Some(Rect::new(40, 30, 200, 120)));
        image.validate().unwrap();
        // Border pixel is bright, interior is dark, background is neither.
        assert_eq!(image.pixel(40, 30)[0], PANEL_BORDER[0]);
        assert!(is_dark_background(image.pixel(140, 90)));
        assert!(!is_dark_background(image.pixel(5, 5)));
    }

    #[test]
    fn test_accents_present_and_saturated() {
        let (image, _) = ScreenshotBuilder::new(640, 420)
            .with_panel(70, 60, 500, 300)
            .build();
        let mut accents = 0usize;
        for y in 60..360 {
            for x in 70..570 {
                if is_saturated_accent(image.pixel(x, y)) {
                    accents += 1;
                }
            }
        }
        let ratio = accents as f64 / (500.0 * 300.0);
        assert!(ratio > 0.05 && ratio < 0.4, "accent ratio {ratio}");
    }

    #[test]
    fn test_noise_perturbs_pixels() {
        let (clean, _) = ScreenshotBuilder::new(64, 64).build();
        let (noisy, _) = ScreenshotBuilder::new(64, 64).with_noise(8.0).build();
        let differing = clean
            .data
            .iter()
            .zip(noisy.data.iter())
            .filter(|(a, b)| a != b)
            .count();
        assert!(differing > 100);
    }

    #[test]
    fn test_bright_rect_fixture() {
        let rect = Rect::new(10, 10, 40, 20);
        let image = bright_rect_screenshot(100, 80, rect);
        assert!(image.pixel(30, 20)[0] > 200);
        assert!(is_dark_background(image.pixel(5, 5)));
    }
}
