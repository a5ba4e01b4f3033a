//! Seam between the scheduler and a concrete tag detector.

use serde::{Deserialize, Serialize};
use tag_anchor_core::RawDetection;

use crate::ImageView;

/// Everything a detector instance is specialised for. A change in any field
/// requires a fresh instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectorKey {
    pub width: u32,
    pub height: u32,
    pub decimation: u32,
}

/// Wall time spent in one named detector stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileSample {
    pub name: String,
    pub micros: u64,
}

/// Output of one detector invocation.
#[derive(Clone, Debug, Default)]
pub struct DetectorOutput {
    /// Tag poses relative to the camera.
    pub detections: Vec<RawDetection>,
    /// Per-stage timings, possibly empty.
    pub profile: Vec<ProfileSample>,
}

/// Errors reported by a detector implementation.
#[derive(thiserror::Error, Debug)]
pub enum DetectorError {
    #[error("image is {got_width}x{got_height}, detector was built for {expected_width}x{expected_height}")]
    SizeMismatch {
        expected_width: u32,
        expected_height: u32,
        got_width: u32,
        got_height: u32,
    },
    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),
    #[error("detector backend failed: {0}")]
    Backend(String),
}

/// A tag detector specialised for one [`DetectorKey`].
///
/// Instances are created on the main loop and used exclusively by the
/// detection worker, which is also the only place they are dropped.
pub trait TagDetector: Send {
    /// Detect tags in `image`; `fov` is the vertical field of view in radians
    /// and `tag_size` the printed tag edge length in metres.
    fn process(
        &mut self,
        image: &ImageView<'_>,
        fov: f32,
        tag_size: f32,
    ) -> Result<DetectorOutput, DetectorError>;
}

/// Builds detector instances on demand.
pub trait DetectorFactory: Send {
    fn build(&self, key: DetectorKey) -> Result<Box<dyn TagDetector>, DetectorError>;
}

impl<F> DetectorFactory for F
where
    F: Fn(DetectorKey) -> Result<Box<dyn TagDetector>, DetectorError> + Send,
{
    fn build(&self, key: DetectorKey) -> Result<Box<dyn TagDetector>, DetectorError> {
        self(key)
    }
}
