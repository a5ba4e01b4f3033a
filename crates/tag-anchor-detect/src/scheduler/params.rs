use serde::{Deserialize, Serialize};
use std::time::Duration;
use tag_anchor_core::{DeviceOrientation, DEFAULT_POSE_HISTORY};

/// Configuration for the detection scheduler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerParams {
    /// Printed tag edge length in metres.
    pub tag_size: f32,
    /// Detector input decimation factor. Changing it rebuilds the detector.
    pub decimation: u32,
    /// Sensor mounting relative to the device pose.
    pub orientation: DeviceOrientation,
    /// Attach a profiling summary to every n-th frame; `0` disables it.
    pub profile_every: u64,
    /// Upper bound on how long `shutdown` waits for the worker.
    pub shutdown_timeout_ms: u64,
    /// Number of device pose samples kept for interpolation.
    pub pose_history: usize,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            tag_size: 0.0556,
            decimation: 2,
            orientation: DeviceOrientation::Fixed,
            profile_every: 30,
            shutdown_timeout_ms: 2000,
            pose_history: DEFAULT_POSE_HISTORY,
        }
    }
}

impl SchedulerParams {
    #[inline]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !self.tag_size.is_finite() || self.tag_size <= 0.0 {
            return Err(ParamsError::TagSize(self.tag_size));
        }
        if self.decimation == 0 {
            return Err(ParamsError::Decimation);
        }
        if self.pose_history == 0 {
            return Err(ParamsError::PoseHistory);
        }
        Ok(())
    }
}

/// Invalid scheduler configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParamsError {
    #[error("tag size must be finite and positive, got {0}")]
    TagSize(f32),
    #[error("decimation must be at least 1")]
    Decimation,
    #[error("pose history must hold at least one sample")]
    PoseHistory,
}
