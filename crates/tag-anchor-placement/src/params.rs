use serde::{Deserialize, Serialize};
use tag_anchor_core::{FilterThresholds, GateCenter};

/// Accumulation and smoothing configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingParams {
    /// Maximum detections kept per tag.
    pub max_detections: usize,
    /// Drop detections older than `max_age` seconds.
    pub staling: bool,
    /// Smoothing window in seconds.
    pub max_age: f64,
    /// Position inlier gate in metres.
    pub filter_position: f64,
    /// Rotation inlier gate in degrees.
    pub filter_angle_deg: f64,
    /// What the inlier gates are centred on.
    pub gate_center: GateCenter,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            max_detections: 1000,
            staling: true,
            max_age: 2.0,
            filter_position: 0.1,
            filter_angle_deg: 10.0,
            gate_center: GateCenter::Mean,
        }
    }
}

impl SmoothingParams {
    pub fn thresholds(&self) -> FilterThresholds {
        FilterThresholds::new(self.filter_position, self.filter_angle_deg)
            .with_center(self.gate_center)
    }

    /// Reject values the accumulator cannot run with. Infinite gates are
    /// allowed and disable filtering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_detections == 0 {
            return Err(ConfigError::MaxDetections);
        }
        if self.max_age.is_nan() || self.max_age <= 0.0 {
            return Err(ConfigError::MaxAge(self.max_age));
        }
        if self.filter_position.is_nan() || self.filter_position < 0.0 {
            return Err(ConfigError::FilterPosition(self.filter_position));
        }
        if self.filter_angle_deg.is_nan() || self.filter_angle_deg < 0.0 {
            return Err(ConfigError::FilterAngle(self.filter_angle_deg));
        }
        Ok(())
    }
}

/// Invalid smoothing configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("max_detections must be >= 1")]
    MaxDetections,
    #[error("max_age must be > 0, got {0}")]
    MaxAge(f64),
    #[error("filter_position must be >= 0, got {0}")]
    FilterPosition(f64),
    #[error("filter_angle_deg must be >= 0, got {0}")]
    FilterAngle(f64),
}
