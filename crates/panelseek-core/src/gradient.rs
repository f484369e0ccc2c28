//! Sobel gradient computation shared by the corner and edge detectors.

#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::image::GrayImage;

/// Gradient data for a single pixel.
#[derive(Clone, Copy, Default)]
pub struct Gradient {
    /// Gradient in x-direction.
    pub gx: i16,
    /// Gradient in y-direction.
    pub gy: i16,
    /// Euclidean gradient magnitude.
    pub mag: f32,
}

/// Compute 3x3 Sobel gradients for the entire image.
///
/// Border pixels keep the zero default; every consumer in this crate
/// ignores the outermost ring anyway.
#[must_use]
pub fn compute_sobel(img: &GrayImage) -> Vec<Gradient> {
    let w = img.width;
    let h = img.height;
    let mut grads = vec![Gradient::default(); w * h];
    if w < 3 || h < 3 {
        return grads;
    }

    // Sobel kernels:
    // Gx: [-1 0 1; -2 0 2; -1 0 1]
    // Gy: [-1 -2 -1; 0 0 0; 1 2 1]

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let p00 = i16::from(img.get(x - 1, y - 1));
            let p10 = i16::from(img.get(x, y - 1));
            let p20 = i16::from(img.get(x + 1, y - 1));
            let p01 = i16::from(img.get(x - 1, y));
            let p21 = i16::from(img.get(x + 1, y));
            let p02 = i16::from(img.get(x - 1, y + 1));
            let p12 = i16::from(img.get(x, y + 1));
            let p22 = i16::from(img.get(x + 1, y + 1));

            let gx = -p00 + p20 - 2 * p01 + 2 * p21 - p02 + p22;
            let gy = -p00 - 2 * p10 - p20 + p02 + 2 * p12 + p22;

            let mag = (f32::from(gx) * f32::from(gx) + f32::from(gy) * f32::from(gy)).sqrt();

            grads[y * w + x] = Gradient { gx, gy, mag };
        }
    }

    grads
}

/// Sobel gradients on a normalized-luminance plane.
///
/// The Harris response threshold is calibrated against intensities in
/// `[0, 1]`, so the corner detector works on floats end to end.
#[must_use]
pub fn compute_sobel_normalized(lum: &[f32], w: usize, h: usize) -> (Vec<f32>, Vec<f32>) {
    let mut gx = vec![0.0f32; w * h];
    let mut gy = vec![0.0f32; w * h];
    if w < 3 || h < 3 {
        return (gx, gy);
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let p00 = lum[i - w - 1];
            let p10 = lum[i - w];
            let p20 = lum[i - w + 1];
            let p01 = lum[i - 1];
            let p21 = lum[i + 1];
            let p02 = lum[i + w - 1];
            let p12 = lum[i + w];
            let p22 = lum[i + w + 1];

            gx[i] = -p00 + p20 - 2.0 * p01 + 2.0 * p21 - p02 + p22;
            gy[i] = -p00 - 2.0 * p10 - p20 + p02 + 2.0 * p12 + p22;
        }
    }

    (gx, gy)
}
