//! Camera frames from `image` buffers.

use crate::detect::Frame;

/// Copy an `image::RgbaImage` into a [`Frame`] captured at `timestamp`.
pub fn frame_from_rgba(img: &::image::RgbaImage, timestamp: f64) -> Frame {
    Frame::new(timestamp, img.width(), img.height(), img.as_raw().clone())
}

/// Convert any decoded image to RGBA8 and wrap it as a [`Frame`].
pub fn frame_from_dynamic(img: &::image::DynamicImage, timestamp: f64) -> Frame {
    frame_from_rgba(&img.to_rgba8(), timestamp)
}
