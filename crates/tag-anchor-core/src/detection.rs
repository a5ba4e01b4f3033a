use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::Pose;

/// Decoded tag identifier. Ids are non-negative by construction.
pub type TagId = u32;

/// Tag pose as reported by a detector, expressed in the camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub tag_id: TagId,
    pub local_position: Vector3<f64>,
    pub local_rotation: UnitQuaternion<f64>,
}

/// World-space tag observation. Immutable once produced by the reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    tag_id: TagId,
    world_position: Vector3<f64>,
    world_rotation: UnitQuaternion<f64>,
    capture_timestamp: f64,
    frame_seq: u64,
}

impl Detection {
    pub fn new(
        tag_id: TagId,
        world_position: Vector3<f64>,
        world_rotation: UnitQuaternion<f64>,
        capture_timestamp: f64,
        frame_seq: u64,
    ) -> Self {
        Self {
            tag_id,
            world_position,
            world_rotation,
            capture_timestamp,
            frame_seq,
        }
    }

    #[inline]
    pub fn tag_id(&self) -> TagId {
        self.tag_id
    }

    #[inline]
    pub fn world_position(&self) -> Vector3<f64> {
        self.world_position
    }

    #[inline]
    pub fn world_rotation(&self) -> UnitQuaternion<f64> {
        self.world_rotation
    }

    /// Main-loop time at which the source frame was submitted.
    #[inline]
    pub fn capture_timestamp(&self) -> f64 {
        self.capture_timestamp
    }

    /// Sequence number of the source frame.
    #[inline]
    pub fn frame_seq(&self) -> u64 {
        self.frame_seq
    }

    pub fn world_pose(&self) -> Pose {
        Pose::new(self.world_position, self.world_rotation)
    }
}
