//! Per-tag smoothed poses.

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tag_anchor_core::{robust_mean, Detection, FilterThresholds, Pose, TagId};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::DetectionAccumulator;

/// Filtered and unfiltered mean of one tag's accumulated detections.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmoothedTagPose {
    pub smoothed_position: Vector3<f64>,
    pub smoothed_rotation: UnitQuaternion<f64>,
    pub raw_average_position: Vector3<f64>,
    pub raw_average_rotation: UnitQuaternion<f64>,
}

impl SmoothedTagPose {
    #[inline]
    pub fn smoothed(&self) -> Pose {
        Pose::new(self.smoothed_position, self.smoothed_rotation)
    }

    #[inline]
    pub fn raw_average(&self) -> Pose {
        Pose::new(self.raw_average_position, self.raw_average_rotation)
    }
}

/// Smooth one tag's detections. `None` when there are none.
pub fn smooth_detections<'a, I>(
    detections: I,
    thresholds: &FilterThresholds,
) -> Option<SmoothedTagPose>
where
    I: IntoIterator<Item = &'a Detection>,
{
    let poses: Vec<Pose> = detections.into_iter().map(Detection::world_pose).collect();
    let mean = robust_mean(&poses, thresholds)?;
    Some(SmoothedTagPose {
        smoothed_position: mean.filtered.position,
        smoothed_rotation: mean.filtered.rotation,
        raw_average_position: mean.unfiltered.position,
        raw_average_rotation: mean.unfiltered.rotation,
    })
}

/// Smooth every tag in `accumulator`. The result depends only on the
/// accumulator's current contents.
#[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
pub fn smooth_all(
    accumulator: &DetectionAccumulator,
    thresholds: &FilterThresholds,
) -> HashMap<TagId, SmoothedTagPose> {
    accumulator
        .iter()
        .filter_map(|(id, queue)| smooth_detections(queue, thresholds).map(|s| (id, s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tag_anchor_core::GateCenter;

    fn det(tag_id: TagId, x: f64, t: f64) -> Detection {
        Detection::new(
            tag_id,
            Vector3::new(x, 0.0, 0.0),
            UnitQuaternion::identity(),
            t,
            0,
        )
    }

    #[test]
    fn outlier_far_from_cluster_is_rejected_with_median_gate() {
        let dets = [det(5, 0.0, 0.0), det(5, 0.01, 0.1), det(5, 10.0, 0.2)];
        let thresholds = FilterThresholds::new(0.05, 10.0).with_center(GateCenter::Median);
        let s = smooth_detections(&dets, &thresholds).unwrap();
        assert_relative_eq!(s.smoothed_position, Vector3::new(0.005, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(
            s.raw_average_position,
            Vector3::new(10.01 / 3.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn mean_gate_that_rejects_everything_falls_back() {
        let dets = [det(5, 0.0, 0.0), det(5, 0.01, 0.1), det(5, 10.0, 0.2)];
        let s = smooth_detections(&dets, &FilterThresholds::new(0.05, 10.0)).unwrap();
        assert_eq!(s.smoothed_position, s.raw_average_position);
    }

    #[test]
    fn smooth_all_covers_every_tag() {
        let mut acc = DetectionAccumulator::new(10, None);
        acc.extend([det(1, 1.0, 0.0), det(2, 2.0, 0.0), det(1, 3.0, 0.0)], 0.0);
        let all = smooth_all(&acc, &FilterThresholds::disabled());
        assert_eq!(all.len(), 2);
        assert_relative_eq!(all[&1].smoothed_position.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(all[&2].smoothed_position.x, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn no_detections_no_pose() {
        let empty: [Detection; 0] = [];
        assert!(smooth_detections(&empty, &FilterThresholds::default()).is_none());
    }
}
