//! Object pose from smoothed tag poses and placement offsets.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tag_anchor_core::{mean_pose, Pose, TagId};

use crate::{SmoothedTagPose, TagPlacement};

/// Caller-chosen handle for a placed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An object tracking a set of tag placements, and its current pose.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorBinding {
    pub placements: Vec<TagPlacement>,
    /// Last derived pose; left untouched while no placement has data.
    pub pose: Pose,
    /// Whether `pose` has ever been derived from detections.
    pub anchored: bool,
}

impl AnchorBinding {
    pub fn new(placements: Vec<TagPlacement>, initial: Pose) -> Self {
        Self {
            placements,
            pose: initial,
            anchored: false,
        }
    }

    /// Re-derive the pose from `smoothed`. Returns `true` if it changed.
    pub fn update(&mut self, smoothed: &HashMap<TagId, SmoothedTagPose>) -> bool {
        match derive_anchor(&self.placements, smoothed) {
            Some(pose) => {
                let changed = pose != self.pose;
                self.pose = pose;
                self.anchored = true;
                changed
            }
            None => false,
        }
    }
}

/// Where `placement` says the object is, given its tag's smoothed pose.
pub fn anchor_candidate(placement: &TagPlacement, tag: &SmoothedTagPose) -> Pose {
    let r = tag.smoothed_rotation;
    Pose::new(
        tag.smoothed_position - r * placement.position_offset,
        r * placement.rotation_offset.to_rotation().inverse(),
    )
}

/// Average of the candidates of every placement whose tag has a smoothed
/// pose, or `None` when none of them has one yet.
pub fn derive_anchor(
    placements: &[TagPlacement],
    smoothed: &HashMap<TagId, SmoothedTagPose>,
) -> Option<Pose> {
    let candidates: Vec<Pose> = placements
        .iter()
        .filter_map(|p| {
            let tag = smoothed.get(&p.detector_id()?)?;
            Some(anchor_candidate(p, tag))
        })
        .collect();
    mean_pose(&candidates)
}
