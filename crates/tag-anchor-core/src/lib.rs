//! Core types and math for anchoring virtual content to fiducial tags.
//!
//! This crate is purely geometric and single-threaded. It knows nothing about
//! images or detectors; it provides:
//! - rigid poses and the Euler convention used by calibration offsets,
//! - a short device pose history with time-interpolated lookup,
//! - reconciliation of camera-frame tag poses into world space,
//! - position/rotation averaging with outlier gates.

mod average;
mod detection;
mod device_pose;
mod logger;
mod pose;
mod reconcile;

pub use average::{
    angular_distance_deg, blend_rotation, mean_pose, mean_position, mean_rotation, robust_mean,
    FilterThresholds, GateCenter, RobustMean,
};
pub use detection::{Detection, RawDetection, TagId};
pub use device_pose::{DevicePoseSample, DevicePoseTracker, DEFAULT_POSE_HISTORY};
pub use pose::{EulerAngles, Pose};
pub use reconcile::{corrected_rotation, detector_fov, reconcile, DeviceOrientation};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;

pub use nalgebra::{UnitQuaternion, Vector3};
