//! Camera-frame tag poses -> world-space detections.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Detection, DevicePoseSample, RawDetection};

/// How the camera image is oriented relative to the device pose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    /// Camera image axes coincide with the device pose axes.
    #[default]
    Fixed,
    /// Portrait phone/tablet: the sensor is mounted a quarter turn from the
    /// display, so the device rotation is pre-rotated by 90° about its own
    /// forward axis and the FOV axes are swapped.
    Handheld,
}

/// Device rotation corrected for the sensor mounting of `orientation`.
pub fn corrected_rotation(
    device_rotation: &UnitQuaternion<f64>,
    orientation: DeviceOrientation,
) -> UnitQuaternion<f64> {
    match orientation {
        DeviceOrientation::Fixed => *device_rotation,
        DeviceOrientation::Handheld => {
            let forward = device_rotation * Vector3::z_axis();
            UnitQuaternion::from_axis_angle(&forward, std::f64::consts::FRAC_PI_2)
                * device_rotation
        }
    }
}

/// FOV to hand to the detector for an image of `width x height`.
///
/// In handheld mode the vertical FOV reported by the device spans the image
/// width, so it is rescaled onto the height axis.
pub fn detector_fov(fov: f32, width: u32, height: u32, orientation: DeviceOrientation) -> f32 {
    match orientation {
        DeviceOrientation::Fixed => fov,
        DeviceOrientation::Handheld if width > 0 => fov / width as f32 * height as f32,
        DeviceOrientation::Handheld => fov,
    }
}

/// Place a camera-frame detection in the world using the device pose the
/// frame was captured at.
pub fn reconcile(
    raw: &RawDetection,
    device: &DevicePoseSample,
    orientation: DeviceOrientation,
    capture_timestamp: f64,
    frame_seq: u64,
) -> Detection {
    let rotation = corrected_rotation(&device.rotation, orientation);
    Detection::new(
        raw.tag_id,
        device.position + rotation * raw.local_position,
        rotation * raw.local_rotation,
        capture_timestamp,
        frame_seq,
    )
}
