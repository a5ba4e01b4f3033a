//! Short history of device poses with time-interpolated lookup.
//!
//! Frames are delivered with a capture timestamp that usually lags the
//! main-loop clock, so the pose the device had *when the frame was captured*
//! is reconstructed from the two samples bracketing that instant.

use std::collections::VecDeque;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::average::blend_rotation;
use crate::Pose;

/// Ring-buffer capacity used by [`DevicePoseTracker::default`].
pub const DEFAULT_POSE_HISTORY: usize = 8;

/// One device pose observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DevicePoseSample {
    /// Monotonic seconds.
    pub timestamp: f64,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl DevicePoseSample {
    pub fn new(
        timestamp: f64,
        fov: f32,
        position: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self {
            timestamp,
            fov,
            position,
            rotation,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }

    /// Interpolate towards `next` at `fraction` in `[0, 1]`.
    ///
    /// Position and FOV are lerped, rotation is slerped. The returned sample
    /// carries the interpolated timestamp.
    pub fn interpolate(&self, next: &DevicePoseSample, fraction: f64) -> DevicePoseSample {
        let t = fraction;
        DevicePoseSample {
            timestamp: self.timestamp + (next.timestamp - self.timestamp) * t,
            fov: self.fov + (next.fov - self.fov) * t as f32,
            position: self.position.lerp(&next.position, t),
            rotation: blend_rotation(&self.rotation, &next.rotation, t),
        }
    }
}

/// Bounded, strictly time-ordered buffer of [`DevicePoseSample`].
#[derive(Clone, Debug)]
pub struct DevicePoseTracker {
    samples: VecDeque<DevicePoseSample>,
    capacity: usize,
}

impl Default for DevicePoseTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_POSE_HISTORY)
    }
}

impl DevicePoseTracker {
    /// Tracker keeping at most `capacity` samples (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<&DevicePoseSample> {
        self.samples.back()
    }

    /// Record `sample` if its timestamp is finite and strictly newer than the
    /// last one.
    ///
    /// Returns `true` when the sample was stored.
    pub fn sample(&mut self, sample: DevicePoseSample) -> bool {
        if !sample.timestamp.is_finite() {
            return false;
        }
        if let Some(last) = self.samples.back() {
            if sample.timestamp <= last.timestamp {
                return false;
            }
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        true
    }

    /// Device pose at `timestamp`.
    ///
    /// Samples strictly older than the bracketing pair are discarded, so
    /// queries are expected in non-decreasing time order. Returns `None` only
    /// when no sample has been recorded.
    pub fn pose_at(&mut self, timestamp: f64) -> Option<DevicePoseSample> {
        let mut before: Option<DevicePoseSample> = None;
        loop {
            let at = *self.samples.front()?;
            if self.samples.len() == 1 && at.timestamp < timestamp {
                // Target is at or beyond the newest sample: no extrapolation.
                return Some(at);
            }
            if at.timestamp >= timestamp {
                return Some(match before {
                    None => at,
                    Some(before) => {
                        let span = at.timestamp - before.timestamp;
                        let fraction = (timestamp - before.timestamp) / span;
                        before.interpolate(&at, fraction)
                    }
                });
            }
            before = self.samples.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
