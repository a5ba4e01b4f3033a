//! Rigid poses and the Euler-angle convention used by calibration offsets.
//!
//! World space is right-handed with `+Z` as the device "forward" axis. All
//! poses are expressed in `f64`.

use nalgebra::{Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Rigid transform: rotation followed by translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Map a point expressed in this pose's local frame into the parent frame.
    #[inline]
    pub fn transform_point(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.position + self.rotation * local
    }

    /// Compose `self * other` (apply `other` first, then `self`).
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            position: self.transform_point(&other.position),
            rotation: self.rotation * other.rotation,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Euler angles in **degrees**.
///
/// The rotation is built as `Ry(y) * Rx(x) * Rz(z)`: roll about Z first, then
/// pitch about X, then yaw about Y. This matches the convention most scene
/// editors use when authoring placement offsets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// `cos(pitch)` below which yaw and roll are treated as one axis.
const GIMBAL_LOCK_EPS: f64 = 1e-9;

impl EulerAngles {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Quaternion for these angles.
    pub fn to_rotation(&self) -> UnitQuaternion<f64> {
        let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.y.to_radians());
        let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.x.to_radians());
        let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.z.to_radians());
        ry * rx * rz
    }

    /// Recover angles from a rotation (inverse of [`EulerAngles::to_rotation`]).
    ///
    /// At the gimbal-lock singularity (`|x| = 90°`) the roll is pinned to zero
    /// and the remaining rotation is attributed to yaw.
    pub fn from_rotation(rotation: &UnitQuaternion<f64>) -> Self {
        let m: Rotation3<f64> = rotation.to_rotation_matrix();
        let m = m.matrix();

        // cos(x) from the column it scales; asin is ill-conditioned near the lock
        let sx = -m[(1, 2)];
        let cx = m[(0, 2)].hypot(m[(2, 2)]);
        let x = sx.atan2(cx);

        let (y, z) = if cx > GIMBAL_LOCK_EPS {
            (m[(0, 2)].atan2(m[(2, 2)]), m[(1, 0)].atan2(m[(1, 1)]))
        } else {
            ((-m[(2, 0)]).atan2(m[(0, 0)]), 0.0)
        };

        Self {
            x: x.to_degrees(),
            y: y.to_degrees(),
            z: z.to_degrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn euler_composition_order_is_yaw_pitch_roll() {
        let e = EulerAngles::new(30.0, 45.0, 60.0);
        let expected = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 45f64.to_radians())
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 30f64.to_radians())
            * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 60f64.to_radians());
        assert_relative_eq!(e.to_rotation(), expected, epsilon = 1e-12);
    }

    #[test]
    fn euler_recovers_angles_away_from_gimbal_lock() {
        for e in [
            EulerAngles::new(10.0, -120.0, 35.0),
            EulerAngles::new(-80.0, 170.0, -5.0),
            EulerAngles::zero(),
        ] {
            let back = EulerAngles::from_rotation(&e.to_rotation());
            assert_relative_eq!(back.x, e.x, epsilon = 1e-9);
            assert_relative_eq!(back.y, e.y, epsilon = 1e-9);
            assert_relative_eq!(back.z, e.z, epsilon = 1e-9);
        }
    }

    #[test]
    fn euler_at_gimbal_lock_still_reproduces_rotation() {
        for e in [
            EulerAngles::new(90.0, 20.0, 15.0),
            EulerAngles::new(-90.0, -40.0, 70.0),
            EulerAngles::new(90.0, 0.0, 0.0),
        ] {
            let q = e.to_rotation();
            let back = EulerAngles::from_rotation(&q);
            assert_relative_eq!(back.x, e.x, epsilon = 1e-9);
            assert_relative_eq!(back.z, 0.0);
            assert!(q.angle_to(&back.to_rotation()) < 1e-9);
        }
    }

    #[test]
    fn euler_near_gimbal_lock_reproduces_rotation() {
        for x in [89.9, 89.999, -89.9999] {
            let q = EulerAngles::new(x, 25.0, -10.0).to_rotation();
            let back = EulerAngles::from_rotation(&q).to_rotation();
            assert!(q.angle_to(&back) < 1e-7);
        }
    }

    #[test]
    fn compose_applies_right_operand_first() {
        let a = Pose::new(
            Vector3::new(1.0, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
        );
        let b = Pose::new(Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity());
        let c = a.compose(&b);
        assert_relative_eq!(c.position, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }
}
