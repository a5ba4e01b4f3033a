//! Interactive calibration: dragging a handle nudges every tag placement of
//! an object at once.

use log::{debug, warn};
use nalgebra::Vector3;
use tag_anchor_core::{EulerAngles, Pose};

use crate::TagPlacement;

/// One coordinate of a placement offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The Euler component (degrees) about this axis.
    pub fn euler(self, angles: &EulerAngles) -> f64 {
        match self {
            Axis::X => angles.x,
            Axis::Y => angles.y,
            Axis::Z => angles.z,
        }
    }

    pub fn euler_mut(self, angles: &mut EulerAngles) -> &mut f64 {
        match self {
            Axis::X => &mut angles.x,
            Axis::Y => &mut angles.y,
            Axis::Z => &mut angles.z,
        }
    }
}

/// Tracks a user-manipulated handle for one anchored object.
///
/// While selected, handle motion is written back into the placement offsets
/// so that the next anchor derivation moves the object with the handle.
/// While not selected, the handle is snapped onto the reference placement so
/// it shows where that tag is expected to be.
#[derive(Clone, Debug)]
pub struct PlacementAdjuster {
    selected: bool,
    last_handle: Pose,
    reference: usize,
}

impl PlacementAdjuster {
    /// `reference` indexes the placement the idle handle follows.
    pub fn new(handle: &Pose, reference: usize) -> Self {
        Self {
            selected: false,
            last_handle: *handle,
            reference,
        }
    }

    #[inline]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    #[inline]
    pub fn reference(&self) -> usize {
        self.reference
    }

    pub fn select(&mut self) {
        debug!("placement adjustment started");
        self.selected = true;
    }

    pub fn deselect(&mut self) {
        debug!("placement adjustment finished");
        self.selected = false;
    }

    /// Run one cycle.
    ///
    /// `object` is the anchored object's current pose. When selected, the
    /// handle's motion since the previous cycle is folded into `placements`;
    /// otherwise `handle` is overwritten and `placements` are left alone.
    pub fn update(&mut self, handle: &mut Pose, object: &Pose, placements: &mut [TagPlacement]) {
        if self.selected {
            if *handle != self.last_handle {
                apply_handle_delta(&self.last_handle, handle, object, placements);
            }
        } else if let Some(reference) = placements.get(self.reference) {
            let rotation = object.rotation * reference.rotation_offset.to_rotation();
            *handle = Pose::new(
                object.position + rotation * reference.position_offset,
                rotation,
            );
        } else {
            warn!(
                "reference placement {} out of range ({} placements)",
                self.reference,
                placements.len()
            );
        }
        self.last_handle = *handle;
    }

    /// Offset of the object from the reference tag, in the form it is edited:
    /// the negated reference placement offsets.
    pub fn reference_offsets(
        &self,
        placements: &[TagPlacement],
    ) -> Option<(Vector3<f64>, EulerAngles)> {
        placements.get(self.reference).map(|r| {
            let e = r.rotation_offset;
            (-r.position_offset, EulerAngles::new(-e.x, -e.y, -e.z))
        })
    }

    /// Set one coordinate of the edited reference translation to `value`.
    ///
    /// Every placement moves by the same amount along `axis`, so the tags
    /// keep their layout relative to each other. Returns `false` and leaves
    /// `placements` untouched when `value` is not finite or the reference is
    /// out of range.
    pub fn set_reference_translation(
        &self,
        axis: Axis,
        value: f64,
        placements: &mut [TagPlacement],
    ) -> bool {
        let Some(current) = self.reference_component(value, placements, |p| {
            p.position_offset[axis.index()]
        }) else {
            return false;
        };
        let delta = -value - current;
        for p in placements.iter_mut() {
            p.position_offset[axis.index()] += delta;
        }
        debug!("reference translation {axis:?} set to {value}");
        true
    }

    /// Set one Euler component (degrees) of the edited reference rotation to
    /// `value`, shifting the same component of every placement.
    pub fn set_reference_rotation(
        &self,
        axis: Axis,
        value: f64,
        placements: &mut [TagPlacement],
    ) -> bool {
        let Some(current) =
            self.reference_component(value, placements, |p| axis.euler(&p.rotation_offset))
        else {
            return false;
        };
        let delta = -value - current;
        for p in placements.iter_mut() {
            *axis.euler_mut(&mut p.rotation_offset) += delta;
        }
        debug!("reference rotation {axis:?} set to {value}");
        true
    }

    fn reference_component(
        &self,
        value: f64,
        placements: &[TagPlacement],
        component: impl Fn(&TagPlacement) -> f64,
    ) -> Option<f64> {
        if !value.is_finite() {
            warn!("ignoring non-finite reference value {value}");
            return None;
        }
        match placements.get(self.reference) {
            Some(reference) => Some(component(reference)),
            None => {
                warn!(
                    "reference placement {} out of range ({} placements)",
                    self.reference,
                    placements.len()
                );
                None
            }
        }
    }
}

/// Shift every placement rigidly by the handle motion `from -> to`, expressed
/// in the object frame.
fn apply_handle_delta(from: &Pose, to: &Pose, object: &Pose, placements: &mut [TagPlacement]) {
    let delta_position = to.position - from.position;
    let delta_rotation = to.rotation * from.rotation.inverse();
    let a = object.rotation;
    let a_inv = a.inverse();

    for p in placements.iter_mut() {
        let e = p.rotation_offset.to_rotation();
        p.position_offset -= e.inverse() * (a_inv * delta_position);
        let updated = a_inv * delta_rotation.inverse() * a * e;
        p.rotation_offset = EulerAngles::from_rotation(&updated);
    }
}
