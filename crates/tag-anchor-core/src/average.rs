//! Position/rotation averaging with a single-pass outlier filter.
//!
//! The rotation mean is incremental: the running mean is slerped towards the
//! i-th sample by `1 / (i + 1)`. This is exact for two samples and a good
//! approximation for tightly clustered rotations, but it depends on sample
//! order and is not the geometric (Karcher) mean.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::Pose;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Slerp `a` towards `b` by `t`, taking the short arc.
///
/// Identical (or numerically indistinguishable) inputs return `a`.
#[inline]
pub fn blend_rotation(
    a: &UnitQuaternion<f64>,
    b: &UnitQuaternion<f64>,
    t: f64,
) -> UnitQuaternion<f64> {
    if a == b {
        return *a;
    }
    a.try_slerp(b, t, 1e-12).unwrap_or(*a)
}

/// Angle between two rotations in degrees, in `[0, 180]`.
#[inline]
pub fn angular_distance_deg(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) -> f64 {
    a.angle_to(b).to_degrees()
}

/// Arithmetic mean. `None` for an empty input.
pub fn mean_position<I>(positions: I) -> Option<Vector3<f64>>
where
    I: IntoIterator<Item = Vector3<f64>>,
{
    let mut sum = Vector3::zeros();
    let mut n = 0usize;
    for p in positions {
        sum += p;
        n += 1;
    }
    (n > 0).then(|| sum / n as f64)
}

/// Incremental slerp mean. `None` for an empty input.
pub fn mean_rotation<I>(rotations: I) -> Option<UnitQuaternion<f64>>
where
    I: IntoIterator<Item = UnitQuaternion<f64>>,
{
    let mut iter = rotations.into_iter();
    let mut avg = iter.next()?;
    for (i, r) in iter.enumerate() {
        // `i` counts from the second sample, so its weight is 1 / (i + 2).
        let t = 1.0 / (i as f64 + 2.0);
        avg = blend_rotation(&avg, &r, t);
    }
    Some(avg)
}

/// Mean of a set of poses (positions and rotations averaged independently).
pub fn mean_pose(poses: &[Pose]) -> Option<Pose> {
    let position = mean_position(poses.iter().map(|p| p.position))?;
    let rotation = mean_rotation(poses.iter().map(|p| p.rotation))?;
    Some(Pose::new(position, rotation))
}

/// Reference point the inlier gates are centred on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCenter {
    /// Unfiltered mean of all samples.
    #[default]
    Mean,
    /// Component-wise median position and medoid rotation.
    ///
    /// Robust against a single far outlier dragging the mean away from the
    /// cluster; costs `O(n^2)` angle evaluations for the rotation medoid.
    Median,
}

/// Inlier gates for [`robust_mean`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterThresholds {
    /// Max distance (world units) from the gate centre.
    pub position: f64,
    /// Max angle (degrees) from the gate centre.
    pub angle_deg: f64,
    #[serde(default)]
    pub center: GateCenter,
}

impl FilterThresholds {
    /// Mean-centred gates.
    pub fn new(position: f64, angle_deg: f64) -> Self {
        Self {
            position,
            angle_deg,
            center: GateCenter::Mean,
        }
    }

    /// Thresholds that accept every sample.
    pub fn disabled() -> Self {
        Self::new(f64::INFINITY, f64::INFINITY)
    }

    pub fn with_center(mut self, center: GateCenter) -> Self {
        self.center = center;
        self
    }
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self::new(0.1, 10.0)
    }
}

/// Output of [`robust_mean`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RobustMean {
    /// Mean over the inlier subsets (falls back to `unfiltered` per component).
    pub filtered: Pose,
    /// Mean over every sample.
    pub unfiltered: Pose,
    pub position_inliers: usize,
    pub rotation_inliers: usize,
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

fn median_position(poses: &[Pose]) -> Vector3<f64> {
    let axis = |k: usize| {
        let mut v: Vec<f64> = poses.iter().map(|p| p.position[k]).collect();
        median(&mut v)
    };
    Vector3::new(axis(0), axis(1), axis(2))
}

fn medoid_rotation(poses: &[Pose]) -> UnitQuaternion<f64> {
    poses
        .iter()
        .map(|a| {
            let cost: f64 = poses.iter().map(|b| a.rotation.angle_to(&b.rotation)).sum();
            (cost, a.rotation)
        })
        .min_by(|x, y| x.0.total_cmp(&y.0))
        .map(|(_, r)| r)
        .unwrap_or_else(UnitQuaternion::identity)
}

/// Two-stage mean: average everything, drop samples far from the gate centre,
/// average again.
///
/// Position and rotation inliers are selected independently, so a sample can
/// contribute its rotation while its position is rejected (or vice versa).
/// An empty inlier subset falls back to the unfiltered mean for that
/// component. Returns `None` only for an empty input.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "trace", skip(poses), fields(n = poses.len()))
)]
pub fn robust_mean(poses: &[Pose], thresholds: &FilterThresholds) -> Option<RobustMean> {
    let unfiltered = mean_pose(poses)?;
    let (center_position, center_rotation) = match thresholds.center {
        GateCenter::Mean => (unfiltered.position, unfiltered.rotation),
        GateCenter::Median => (median_position(poses), medoid_rotation(poses)),
    };

    let position_inliers: Vec<Vector3<f64>> = poses
        .iter()
        .map(|p| p.position)
        .filter(|p| (p - center_position).norm() <= thresholds.position)
        .collect();
    let rotation_inliers: Vec<UnitQuaternion<f64>> = poses
        .iter()
        .map(|p| p.rotation)
        .filter(|r| angular_distance_deg(r, &center_rotation) <= thresholds.angle_deg)
        .collect();

    let position = mean_position(position_inliers.iter().copied()).unwrap_or(unfiltered.position);
    let rotation = mean_rotation(rotation_inliers.iter().copied()).unwrap_or(unfiltered.rotation);

    Some(RobustMean {
        filtered: Pose::new(position, rotation),
        unfiltered,
        position_inliers: position_inliers.len(),
        rotation_inliers: rotation_inliers.len(),
    })
}
