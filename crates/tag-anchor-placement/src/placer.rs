use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};
use tag_anchor_core::{Detection, FilterThresholds, Pose, TagId};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    smooth_all, AnchorBinding, BundleError, CalibrationBundle, ConfigError,
    DetectionAccumulator, ObjectId, SmoothedTagPose, SmoothingParams, TagPlacement,
};

/// Callback invoked with the distinct tag ids of every accumulated batch.
pub type TagsObservedListener = Box<dyn FnMut(&[TagId]) + Send>;

/// Main-loop owner of tag history, smoothed tag poses and object anchors.
///
/// Feed detection batches with [`on_detections`](Self::on_detections) as they
/// arrive and call [`update`](Self::update) once per tick to recompute the
/// smoothed poses and re-anchor every bound object.
pub struct TagPlacer {
    params: SmoothingParams,
    thresholds: FilterThresholds,
    accumulator: DetectionAccumulator,
    smoothed: HashMap<TagId, SmoothedTagPose>,
    bindings: BTreeMap<ObjectId, AnchorBinding>,
    bundles: BTreeMap<ObjectId, CalibrationBundle>,
    listeners: Vec<TagsObservedListener>,
}

impl TagPlacer {
    pub fn new(params: SmoothingParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            thresholds: params.thresholds(),
            accumulator: DetectionAccumulator::from_params(&params),
            params,
            smoothed: HashMap::new(),
            bindings: BTreeMap::new(),
            bundles: BTreeMap::new(),
            listeners: Vec::new(),
        })
    }

    #[inline]
    pub fn params(&self) -> &SmoothingParams {
        &self.params
    }

    #[inline]
    pub fn accumulator(&self) -> &DetectionAccumulator {
        &self.accumulator
    }

    /// Register a "tags observed" listener.
    pub fn on_tags_observed(&mut self, listener: impl FnMut(&[TagId]) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Accumulate a batch and notify listeners. Returns the distinct tag ids
    /// in the batch.
    pub fn on_detections<I>(&mut self, detections: I, now: f64) -> Vec<TagId>
    where
        I: IntoIterator<Item = Detection>,
    {
        let observed = self.accumulator.extend(detections, now);
        if !observed.is_empty() {
            trace!("observed tags {observed:?}");
            for listener in &mut self.listeners {
                listener(&observed);
            }
        }
        observed
    }

    /// Recompute smoothed tag poses and object anchors. Returns the objects
    /// whose pose changed.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn update(&mut self, now: f64) -> Vec<ObjectId> {
        self.accumulator.purge_stale(now);
        self.smoothed = smooth_all(&self.accumulator, &self.thresholds);

        let mut moved = Vec::new();
        for (id, binding) in self.bindings.iter_mut() {
            if binding.update(&self.smoothed) {
                moved.push(*id);
            }
        }
        moved
    }

    #[inline]
    pub fn smoothed(&self) -> &HashMap<TagId, SmoothedTagPose> {
        &self.smoothed
    }

    pub fn smoothed_pose(&self, tag_id: TagId) -> Option<&SmoothedTagPose> {
        self.smoothed.get(&tag_id)
    }

    /// Bind `object` to `placements`. An existing binding keeps its pose.
    pub fn set_binding(&mut self, object: ObjectId, placements: Vec<TagPlacement>) {
        match self.bindings.get_mut(&object) {
            Some(binding) => binding.placements = placements,
            None => {
                debug!("binding object {object} to {} placement(s)", placements.len());
                self.bindings
                    .insert(object, AnchorBinding::new(placements, Pose::identity()));
            }
        }
    }

    /// Validate `bundle` and bind `object` to its placements.
    pub fn bind_bundle(
        &mut self,
        object: ObjectId,
        bundle: &CalibrationBundle,
    ) -> Result<(), BundleError> {
        bundle.validate()?;
        self.set_binding(object, bundle.tag_placements.clone());
        self.bundles.insert(object, bundle.clone());
        Ok(())
    }

    pub fn remove_binding(&mut self, object: ObjectId) -> Option<AnchorBinding> {
        self.bundles.remove(&object);
        self.bindings.remove(&object)
    }

    /// The bundle `object` was bound from, carrying the current (possibly
    /// adjusted) placements. `None` for unknown objects and for bindings made
    /// with [`set_binding`](Self::set_binding).
    pub fn bundle(&self, object: ObjectId) -> Option<CalibrationBundle> {
        let binding = self.bindings.get(&object)?;
        let mut bundle = self.bundles.get(&object)?.clone();
        bundle.tag_placements = binding.placements.clone();
        Some(bundle)
    }

    pub fn binding(&self, object: ObjectId) -> Option<&AnchorBinding> {
        self.bindings.get(&object)
    }

    /// Mutable access, e.g. for a [`PlacementAdjuster`](crate::PlacementAdjuster)
    /// editing the placements in place.
    pub fn binding_mut(&mut self, object: ObjectId) -> Option<&mut AnchorBinding> {
        self.bindings.get_mut(&object)
    }

    pub fn object_pose(&self, object: ObjectId) -> Option<Pose> {
        self.bindings.get(&object).map(|b| b.pose)
    }

    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.bindings.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};
    use std::sync::{Arc, Mutex};
    use tag_anchor_core::EulerAngles;

    fn det(tag_id: TagId, position: Vector3<f64>, t: f64) -> Detection {
        Detection::new(tag_id, position, UnitQuaternion::identity(), t, 0)
    }

    #[test]
    fn scenario_outlier_with_median_gate() {
        let params = SmoothingParams {
            filter_position: 0.05,
            gate_center: tag_anchor_core::GateCenter::Median,
            ..SmoothingParams::default()
        };
        let mut placer = TagPlacer::new(params).unwrap();
        placer.on_detections(
            [
                det(5, Vector3::new(0.0, 0.0, 0.0), 0.0),
                det(5, Vector3::new(0.01, 0.0, 0.0), 0.0),
                det(5, Vector3::new(10.0, 0.0, 0.0), 0.0),
            ],
            0.0,
        );
        placer.update(0.0);
        let s = placer.smoothed_pose(5).unwrap();
        assert_relative_eq!(s.smoothed_position, Vector3::new(0.005, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn stale_tags_disappear_on_update() {
        let mut placer = TagPlacer::new(SmoothingParams::default()).unwrap();
        placer.on_detections([det(1, Vector3::zeros(), 0.0)], 0.0);
        placer.update(1.0);
        assert!(placer.smoothed_pose(1).is_some());
        placer.update(3.5);
        assert!(placer.smoothed_pose(1).is_none());
    }

    #[test]
    fn bound_object_follows_tag() {
        let mut placer = TagPlacer::new(SmoothingParams::default()).unwrap();
        let object = ObjectId(1);
        placer.set_binding(
            object,
            vec![TagPlacement::new(
                3,
                Vector3::new(0.0, 0.0, 0.5),
                EulerAngles::zero(),
            )],
        );

        assert!(placer.update(0.0).is_empty());
        assert_eq!(placer.object_pose(object), Some(Pose::identity()));

        placer.on_detections([det(3, Vector3::new(1.0, 2.0, 3.0), 0.0)], 0.0);
        assert_eq!(placer.update(0.1), vec![object]);
        let pose = placer.object_pose(object).unwrap();
        assert_relative_eq!(pose.position, Vector3::new(1.0, 2.0, 2.5), epsilon = 1e-12);

        assert!(placer.remove_binding(object).is_some());
        assert!(placer.object_pose(object).is_none());
    }

    #[test]
    fn listeners_see_each_batch() {
        let seen: Arc<Mutex<Vec<Vec<TagId>>>> = Arc::default();
        let mut placer = TagPlacer::new(SmoothingParams::default()).unwrap();
        {
            let seen = Arc::clone(&seen);
            placer.on_tags_observed(move |ids| seen.lock().unwrap().push(ids.to_vec()));
        }
        placer.on_detections([det(2, Vector3::zeros(), 0.0), det(7, Vector3::zeros(), 0.0)], 0.0);
        placer.on_detections(std::iter::empty(), 0.0);
        placer.on_detections([det(7, Vector3::zeros(), 0.1)], 0.1);
        assert_eq!(*seen.lock().unwrap(), vec![vec![2, 7], vec![7]]);
    }

    #[test]
    fn bind_bundle_rejects_invalid_bundle() {
        let mut placer = TagPlacer::new(SmoothingParams::default()).unwrap();
        let bundle = CalibrationBundle {
            name: "empty".into(),
            models: Vec::new(),
            tag_placements: Vec::new(),
        };
        assert_eq!(
            placer.bind_bundle(ObjectId(1), &bundle),
            Err(BundleError::NoModels)
        );
        assert!(placer.binding(ObjectId(1)).is_none());
    }

    #[test]
    fn bundle_carries_adjusted_placements() {
        let mut placer = TagPlacer::new(SmoothingParams::default()).unwrap();
        let bundle = CalibrationBundle {
            name: "desk".into(),
            models: vec![crate::SubModel {
                name: "lamp".into(),
                uri: "lamp.glb".into(),
                translation: Vector3::zeros(),
                rotation: EulerAngles::zero(),
                scale: Vector3::repeat(1.0),
            }],
            tag_placements: vec![TagPlacement::new(
                3,
                Vector3::new(0.0, 0.0, 0.5),
                EulerAngles::zero(),
            )],
        };
        placer.bind_bundle(ObjectId(2), &bundle).unwrap();
        assert_eq!(placer.bundle(ObjectId(2)), Some(bundle.clone()));

        placer.binding_mut(ObjectId(2)).unwrap().placements[0].position_offset.x = 0.2;
        let edited = placer.bundle(ObjectId(2)).unwrap();
        assert_eq!(edited.name, "desk");
        assert_eq!(edited.models, bundle.models);
        assert_eq!(edited.tag_placements[0].position_offset, Vector3::new(0.2, 0.0, 0.5));

        // plain bindings have no bundle to write back
        placer.set_binding(ObjectId(5), bundle.tag_placements.clone());
        assert!(placer.bundle(ObjectId(5)).is_none());

        placer.remove_binding(ObjectId(2));
        assert!(placer.bundle(ObjectId(2)).is_none());
    }
}
