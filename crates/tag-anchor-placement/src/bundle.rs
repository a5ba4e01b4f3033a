//! Calibration bundle: the models to place and where their tags sit.

use std::collections::HashSet;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tag_anchor_core::{EulerAngles, TagId};

fn unit_scale() -> Vector3<f64> {
    Vector3::new(1.0, 1.0, 1.0)
}

/// One renderable model of a bundle, positioned relative to the anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubModel {
    pub name: String,
    pub uri: String,
    #[serde(default = "Vector3::zeros")]
    pub translation: Vector3<f64>,
    #[serde(default)]
    pub rotation: EulerAngles,
    #[serde(default = "unit_scale")]
    pub scale: Vector3<f64>,
}

/// Where a physical tag sits relative to the anchored object.
///
/// Ids are kept signed as entered so that validation can report negative
/// values instead of failing to parse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagPlacement {
    pub tag_id: i64,
    #[serde(default = "Vector3::zeros")]
    pub position_offset: Vector3<f64>,
    #[serde(default)]
    pub rotation_offset: EulerAngles,
}

impl TagPlacement {
    pub fn new(tag_id: TagId, position_offset: Vector3<f64>, rotation_offset: EulerAngles) -> Self {
        Self {
            tag_id: i64::from(tag_id),
            position_offset,
            rotation_offset,
        }
    }

    /// Detector tag id, or `None` if the stored id is out of range.
    #[inline]
    pub fn detector_id(&self) -> Option<TagId> {
        TagId::try_from(self.tag_id).ok()
    }
}

/// Bundle validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    #[error("bundle has no name")]
    EmptyName,
    #[error("bundle contains no models")]
    NoModels,
    #[error("bundle has no tag placements")]
    NoPlacements,
    #[error("tag id {0} is negative")]
    NegativeTagId(i64),
    #[error("tag id {0} is out of range")]
    TagIdOutOfRange(i64),
    #[error("tag id {0} appears more than once")]
    DuplicateTagId(i64),
}

/// Named set of models plus the tag placements that anchor them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBundle {
    pub name: String,
    pub models: Vec<SubModel>,
    pub tag_placements: Vec<TagPlacement>,
}

impl CalibrationBundle {
    /// Check the structural rules: a name, at least one model and one
    /// placement, and unique non-negative tag ids.
    pub fn validate(&self) -> Result<(), BundleError> {
        if self.name.trim().is_empty() {
            return Err(BundleError::EmptyName);
        }
        if self.models.is_empty() {
            return Err(BundleError::NoModels);
        }
        if self.tag_placements.is_empty() {
            return Err(BundleError::NoPlacements);
        }

        let mut seen = HashSet::with_capacity(self.tag_placements.len());
        for p in &self.tag_placements {
            if p.tag_id < 0 {
                return Err(BundleError::NegativeTagId(p.tag_id));
            }
            if p.detector_id().is_none() {
                return Err(BundleError::TagIdOutOfRange(p.tag_id));
            }
            if !seen.insert(p.tag_id) {
                return Err(BundleError::DuplicateTagId(p.tag_id));
            }
        }
        Ok(())
    }

    pub fn placement(&self, tag_id: TagId) -> Option<&TagPlacement> {
        self.tag_placements
            .iter()
            .find(|p| p.detector_id() == Some(tag_id))
    }
}
