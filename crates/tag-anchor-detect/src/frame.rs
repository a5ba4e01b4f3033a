//! Camera frames and borrowed RGBA image views.

use nalgebra::Matrix4;

/// RGBA8 pixels.
pub const BYTES_PER_PIXEL: usize = 4;

/// Borrowed row-major RGBA8 image.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h*4
}

impl<'a> ImageView<'a> {
    /// Wrap `data` if it holds exactly `width * height` non-empty RGBA8 pixels.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Option<Self> {
        let expected = width.checked_mul(height)?.checked_mul(BYTES_PER_PIXEL)?;
        if expected == 0 || data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn rgba(&self, x: i32, y: i32) -> [u8; 4] {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return [0; 4];
        }
        let i = (y as usize * self.width + x as usize) * BYTES_PER_PIXEL;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Rec.601 luma of one pixel; out-of-bounds reads as black.
    #[inline]
    pub fn luma(&self, x: i32, y: i32) -> u8 {
        let [r, g, b, _] = self.rgba(x, y);
        luma_601(r, g, b)
    }

    /// Grayscale copy of the whole image, row-major `width * height`.
    ///
    /// Most tag detectors consume a single luminance plane.
    pub fn to_gray(&self) -> Vec<u8> {
        self.data
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| luma_601(px[0], px[1], px[2]))
            .collect()
    }
}

#[inline]
fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    let y = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    ((y + 500) / 1000) as u8
}

/// One camera frame as delivered by the frame source.
///
/// The frame owns its pixel buffer; the scheduler moves it into a detection
/// request and drops it once the worker has processed (or discarded) it.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Capture time in seconds, on the same clock as device pose samples.
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Vertical field of view in radians, when the source reports one.
    pub fov: Option<f32>,
    /// Display correction transform reported by the source. Carried through
    /// unchanged; detection works on raw sensor pixels.
    pub display_correction: Option<Matrix4<f32>>,
    /// Row-major RGBA8 pixels.
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(timestamp: f64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            timestamp,
            width,
            height,
            fov: None,
            display_correction: None,
            pixels,
        }
    }

    pub fn with_fov(mut self, fov: f32) -> Self {
        self.fov = Some(fov);
        self
    }

    pub fn with_display_correction(mut self, correction: Matrix4<f32>) -> Self {
        self.display_correction = Some(correction);
        self
    }

    /// Borrow the pixels as an image, or `None` when the buffer is empty or
    /// does not match `width * height * 4` bytes.
    pub fn image(&self) -> Option<ImageView<'_>> {
        ImageView::new(self.width as usize, self.height as usize, &self.pixels)
    }
}
