//! Main-loop driver tying detection, smoothing and adjustment together.

use std::collections::BTreeMap;

use log::warn;

use crate::core::{Detection, DevicePoseSample, Pose, TagId};
use crate::detect::{DetectionScheduler, DetectorFactory, Frame, FrameDisposition, SchedulerError};
use crate::placement::{
    Axis, CalibrationBundle, ObjectId, PlacementAdjuster, TagPlacement, TagPlacer,
};
use crate::{SessionConfig, SessionError};

/// What one [`AnchorSession::tick`] did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// World-space detections that arrived this tick, in arrival order.
    pub detections: Vec<Detection>,
    /// Number of worker results (successful or not) consumed this tick.
    pub batches: usize,
    /// Per-frame failures reported by the worker.
    pub errors: Vec<SchedulerError>,
    /// Detector timing summaries.
    pub profiles: Vec<String>,
    /// Objects whose anchored pose changed.
    pub moved: Vec<ObjectId>,
}

impl TickReport {
    /// Distinct tag ids seen this tick, in first-seen order.
    pub fn tag_ids(&self) -> Vec<TagId> {
        let mut ids = Vec::new();
        for d in &self.detections {
            if !ids.contains(&d.tag_id()) {
                ids.push(d.tag_id());
            }
        }
        ids
    }
}

struct HandleState {
    adjuster: PlacementAdjuster,
    handle: Pose,
}

/// Owns the detection scheduler, the tag placer and any placement adjusters,
/// and advances them once per main-loop tick.
///
/// The session never blocks on detection: frames go to the worker through
/// [`submit_frame`](Self::submit_frame) and results are picked up by the next
/// [`tick`](Self::tick).
pub struct AnchorSession {
    scheduler: DetectionScheduler,
    placer: TagPlacer,
    handles: BTreeMap<ObjectId, HandleState>,
}

impl AnchorSession {
    pub fn new(
        config: SessionConfig,
        factory: impl DetectorFactory + 'static,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let placer = TagPlacer::new(config.smoothing)?;
        let scheduler = DetectionScheduler::new(config.scheduler, factory)?;
        Ok(Self {
            scheduler,
            placer,
            handles: BTreeMap::new(),
        })
    }

    #[inline]
    pub fn scheduler(&self) -> &DetectionScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn scheduler_mut(&mut self) -> &mut DetectionScheduler {
        &mut self.scheduler
    }

    #[inline]
    pub fn placer(&self) -> &TagPlacer {
        &self.placer
    }

    #[inline]
    pub fn placer_mut(&mut self) -> &mut TagPlacer {
        &mut self.placer
    }

    /// Hand a camera frame to the detection worker.
    pub fn submit_frame(
        &mut self,
        frame: Frame,
        device_now: DevicePoseSample,
    ) -> Result<FrameDisposition, SessionError> {
        Ok(self.scheduler.submit_frame(frame, device_now)?)
    }

    /// Advance one main-loop cycle at the time of `device_now`.
    ///
    /// Samples the device pose, consumes finished detections, re-smooths
    /// every tag, re-anchors bound objects and runs the adjusters.
    pub fn tick(&mut self, device_now: DevicePoseSample) -> TickReport {
        let now = device_now.timestamp;
        self.scheduler.sample_device_pose(device_now);

        let mut report = TickReport::default();
        for outcome in self.scheduler.poll() {
            report.batches += 1;
            match outcome {
                Ok(batch) => {
                    self.placer.on_detections(batch.detections.iter().copied(), now);
                    report.detections.extend(batch.detections);
                    report.profiles.extend(batch.profile);
                }
                Err(err) => {
                    warn!("detection failed: {err}");
                    report.errors.push(err);
                }
            }
        }

        report.moved = self.placer.update(now);

        for (object, state) in self.handles.iter_mut() {
            if let Some(binding) = self.placer.binding_mut(*object) {
                state
                    .adjuster
                    .update(&mut state.handle, &binding.pose, &mut binding.placements);
            }
        }
        report
    }

    /// Validate `bundle` and anchor `object` to its tag placements.
    pub fn bind(&mut self, object: ObjectId, bundle: &CalibrationBundle) -> Result<(), SessionError> {
        Ok(self.placer.bind_bundle(object, bundle)?)
    }

    /// Stop tracking `object`; its adjuster goes with it.
    pub fn unbind(&mut self, object: ObjectId) -> bool {
        self.handles.remove(&object);
        self.placer.remove_binding(object).is_some()
    }

    pub fn object_pose(&self, object: ObjectId) -> Option<Pose> {
        self.placer.object_pose(object)
    }

    /// The bundle bound to `object` with its current, possibly adjusted,
    /// placements; ready for [`CalibrationBundle::write_json`].
    pub fn bundle(&self, object: ObjectId) -> Option<CalibrationBundle> {
        self.placer.bundle(object)
    }

    /// Attach an adjustment handle to a bound object. The idle handle follows
    /// placement `reference`.
    pub fn attach_handle(&mut self, object: ObjectId, reference: usize) -> Result<(), SessionError> {
        let Some(binding) = self.placer.binding(object) else {
            return Err(SessionError::UnknownObject(object));
        };
        let handle = binding.pose;
        self.handles.insert(
            object,
            HandleState {
                adjuster: PlacementAdjuster::new(&handle, reference),
                handle,
            },
        );
        Ok(())
    }

    pub fn handle(&self, object: ObjectId) -> Option<Pose> {
        self.handles.get(&object).map(|s| s.handle)
    }

    /// Move the handle, e.g. from user input. Only takes effect on the
    /// calibration while the handle is selected.
    pub fn handle_mut(&mut self, object: ObjectId) -> Option<&mut Pose> {
        self.handles.get_mut(&object).map(|s| &mut s.handle)
    }

    pub fn select_handle(&mut self, object: ObjectId) -> Result<(), SessionError> {
        self.handles
            .get_mut(&object)
            .map(|s| s.adjuster.select())
            .ok_or(SessionError::UnknownObject(object))
    }

    pub fn deselect_handle(&mut self, object: ObjectId) -> Result<(), SessionError> {
        self.handles
            .get_mut(&object)
            .map(|s| s.adjuster.deselect())
            .ok_or(SessionError::UnknownObject(object))
    }

    /// Set one coordinate of the object's offset from the handle's reference
    /// tag. Returns `Ok(false)` when the value was rejected.
    pub fn set_reference_translation(
        &mut self,
        object: ObjectId,
        axis: Axis,
        value: f64,
    ) -> Result<bool, SessionError> {
        let (adjuster, placements) = self.reference_edit(object)?;
        Ok(adjuster.set_reference_translation(axis, value, placements))
    }

    /// Rotation counterpart of
    /// [`set_reference_translation`](Self::set_reference_translation), in degrees.
    pub fn set_reference_rotation(
        &mut self,
        object: ObjectId,
        axis: Axis,
        value: f64,
    ) -> Result<bool, SessionError> {
        let (adjuster, placements) = self.reference_edit(object)?;
        Ok(adjuster.set_reference_rotation(axis, value, placements))
    }

    fn reference_edit(
        &mut self,
        object: ObjectId,
    ) -> Result<(&PlacementAdjuster, &mut [TagPlacement]), SessionError> {
        let state = self
            .handles
            .get(&object)
            .ok_or(SessionError::UnknownObject(object))?;
        let binding = self
            .placer
            .binding_mut(object)
            .ok_or(SessionError::UnknownObject(object))?;
        Ok((&state.adjuster, &mut binding.placements))
    }

    /// Stop the detection worker within the configured timeout.
    pub fn shutdown(&mut self) -> Result<(), SessionError> {
        Ok(self.scheduler.shutdown()?)
    }
}
