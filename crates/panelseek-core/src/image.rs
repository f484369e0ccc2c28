//! Image buffers and RGBA-to-luminance conversion.

use crate::error::RoiError;

/// A fully decoded RGBA8 screenshot.
///
/// The buffer is row-major, 4 bytes per pixel, with no padding between rows.
/// Decoding is the uploader's responsibility; this type only verifies that
/// the buffer it was handed is plausible. Fields are public so zero-copy
/// construction stays possible, but [`RgbaImage::new`] and
/// [`RgbaImage::validate`] are the supported entry points.
#[derive(Clone, Debug)]
pub struct RgbaImage {
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Packed RGBA8 pixel data, `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl RgbaImage {
    /// Create a new image after validating the buffer against the dimensions.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Result<Self, RoiError> {
        let img = Self {
            width,
            height,
            data,
        };
        img.validate()?;
        Ok(img)
    }

    /// Re-check the decoded-image invariants.
    ///
    /// Callers that build the struct directly (or receive it across an FFI
    /// boundary) get the same guarantees the constructor enforces.
    pub fn validate(&self) -> Result<(), RoiError> {
        if self.width == 0 || self.height == 0 {
            return Err(RoiError::InvalidInput(format!(
                "zero-sized image ({}x{})",
                self.width, self.height
            )));
        }
        let required = self.width * self.height * 4;
        if self.data.len() != required {
            return Err(RoiError::InvalidInput(format!(
                "buffer holds {} bytes, expected {} for {}x{} RGBA8",
                self.data.len(),
                required,
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// Fetch one pixel as `[r, g, b, a]`.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Convert to a single-channel luminance image using
    /// `Y = 0.299 R + 0.587 G + 0.114 B`.
    #[must_use]
    pub fn to_gray(&self) -> GrayImage {
        let mut data = Vec::with_capacity(self.width * self.height);
        for px in self.data.chunks_exact(4) {
            let y = 0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
            data.push(y.round().clamp(0.0, 255.0) as u8);
        }
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// A single-channel 8-bit luminance image.
#[derive(Clone, Debug)]
pub struct GrayImage {
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Row-major luminance values.
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Fetch one luminance value.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Luminance rescaled to `[0, 1]` floats, for response functions that
    /// are tuned against normalized intensities.
    #[must_use]
    pub fn to_normalized(&self) -> Vec<f32> {
        self.data.iter().map(|&v| f32::from(v) / 255.0).collect()
    }
}

/// Whether a pixel looks like the dark panel background the UI draws.
///
/// Shared by the corner detector's color score and the edge detector's
/// content score so both agree on what "dark" means.
#[inline]
pub(crate) fn is_dark_background(px: [u8; 4]) -> bool {
    px[0] < 50 && px[1] < 50 && px[2] < 80
}

/// Whether a pixel looks like a saturated accent element (buttons, hex
/// highlights) rather than background or text.
#[inline]
pub(crate) fn is_saturated_accent(px: [u8; 4]) -> bool {
    let max = px[0].max(px[1]).max(px[2]);
    let min = px[0].min(px[1]).min(px[2]);
    max > 150 && max - min > 60
}
