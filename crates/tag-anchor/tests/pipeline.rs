use std::thread;
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use nalgebra::{UnitQuaternion, Vector3};

use tag_anchor::core::{DevicePoseSample, EulerAngles, RawDetection};
use tag_anchor::detect::{
    DetectorError, DetectorKey, DetectorOutput, Frame, FrameDisposition, ImageView,
    SchedulerError, TagDetector,
};
use tag_anchor::placement::{Axis, CalibrationBundle, ObjectId, SubModel, TagPlacement};
use tag_anchor::{AnchorSession, SessionConfig, SessionError, TickReport};

const OBJECT: ObjectId = ObjectId(3);

/// Always sees tag 4 two metres in front of the camera.
struct FixedDetector;

impl TagDetector for FixedDetector {
    fn process(
        &mut self,
        _image: &ImageView<'_>,
        _fov: f32,
        _tag_size: f32,
    ) -> Result<DetectorOutput, DetectorError> {
        Ok(DetectorOutput {
            detections: vec![RawDetection {
                tag_id: 4,
                local_position: Vector3::new(0.0, 0.0, 2.0),
                local_rotation: UnitQuaternion::identity(),
            }],
            profile: Vec::new(),
        })
    }
}

fn fixed_factory(_key: DetectorKey) -> Result<Box<dyn TagDetector>, DetectorError> {
    Ok(Box::new(FixedDetector))
}

fn device(t: f64) -> DevicePoseSample {
    DevicePoseSample::new(t, 1.0, Vector3::zeros(), UnitQuaternion::identity())
}

fn frame(t: f64) -> Frame {
    Frame::new(t, 4, 4, vec![0; 4 * 4 * 4])
}

fn bundle() -> CalibrationBundle {
    CalibrationBundle {
        name: "shelf".into(),
        models: vec![SubModel {
            name: "vase".into(),
            uri: "vase.glb".into(),
            translation: Vector3::zeros(),
            rotation: EulerAngles::zero(),
            scale: Vector3::repeat(1.0),
        }],
        tag_placements: vec![TagPlacement::new(
            4,
            Vector3::new(0.0, 0.0, 0.5),
            EulerAngles::zero(),
        )],
    }
}

fn tick_until_batch(session: &mut AnchorSession, device_now: DevicePoseSample) -> TickReport {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let report = session.tick(device_now);
        if report.batches > 0 {
            return report;
        }
        assert!(Instant::now() < deadline, "no detection result");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn session_anchors_and_adjusts_object() {
    let mut session = AnchorSession::new(SessionConfig::default(), fixed_factory).unwrap();
    session.bind(OBJECT, &bundle()).unwrap();
    session.attach_handle(OBJECT, 0).unwrap();

    let disposition = session.submit_frame(frame(0.0), device(0.0)).unwrap();
    assert!(matches!(disposition, FrameDisposition::Scheduled { frame_seq: 0, .. }));
    let report = tick_until_batch(&mut session, device(0.0));
    assert_eq!(report.tag_ids(), vec![4]);
    assert_eq!(report.moved, vec![OBJECT]);
    assert!(report.errors.is_empty());
    // first frame carries the profile summary
    assert_eq!(report.profiles.len(), 1);

    let pose = session.object_pose(OBJECT).unwrap();
    assert_relative_eq!(pose.position, Vector3::new(0.0, 0.0, 1.5), epsilon = 1e-9);

    // idle handle sits on the reference tag
    let handle = session.handle(OBJECT).unwrap();
    assert_relative_eq!(handle.position, Vector3::new(0.0, 0.0, 2.0), epsilon = 1e-9);

    // dragging the selected handle rewrites the placement offsets
    session.select_handle(OBJECT).unwrap();
    session.handle_mut(OBJECT).unwrap().position.x += 0.1;
    session.tick(device(0.1));
    let placement = &session.placer().binding(OBJECT).unwrap().placements[0];
    assert_relative_eq!(
        placement.position_offset,
        Vector3::new(-0.1, 0.0, 0.5),
        epsilon = 1e-9
    );

    // and the next derivation moves the object with it
    let report = session.tick(device(0.2));
    assert_eq!(report.moved, vec![OBJECT]);
    let pose = session.object_pose(OBJECT).unwrap();
    assert_relative_eq!(pose.position, Vector3::new(0.1, 0.0, 1.5), epsilon = 1e-9);

    session.deselect_handle(OBJECT).unwrap();
    session.tick(device(0.3));
    let handle = session.handle(OBJECT).unwrap();
    assert_relative_eq!(handle.position, Vector3::new(0.0, 0.0, 2.0), epsilon = 1e-9);

    assert!(session.unbind(OBJECT));
    assert!(session.handle(OBJECT).is_none());
    assert!(session.object_pose(OBJECT).is_none());
    session.shutdown().unwrap();
}

#[test]
fn stale_detections_stop_moving_the_object() {
    let mut session = AnchorSession::new(SessionConfig::default(), fixed_factory).unwrap();
    session.bind(OBJECT, &bundle()).unwrap();
    session.submit_frame(frame(0.0), device(0.0)).unwrap();
    tick_until_batch(&mut session, device(0.0));
    let anchored = session.object_pose(OBJECT).unwrap();

    // beyond max_age the tag drops out but the object keeps its last pose
    let report = session.tick(device(5.0));
    assert!(report.moved.is_empty());
    assert!(session.placer().smoothed_pose(4).is_none());
    assert_eq!(session.object_pose(OBJECT), Some(anchored));
}

#[test]
fn handle_operations_require_a_bound_object() {
    let mut session = AnchorSession::new(SessionConfig::default(), fixed_factory).unwrap();
    assert!(matches!(
        session.attach_handle(OBJECT, 0),
        Err(SessionError::UnknownObject(OBJECT))
    ));
    assert!(matches!(
        session.select_handle(OBJECT),
        Err(SessionError::UnknownObject(OBJECT))
    ));
    assert!(!session.unbind(OBJECT));
}

#[test]
fn invalid_bundle_is_rejected() {
    let mut session = AnchorSession::new(SessionConfig::default(), fixed_factory).unwrap();
    let mut bad = bundle();
    bad.tag_placements[0].tag_id = -2;
    assert!(matches!(
        session.bind(OBJECT, &bad),
        Err(SessionError::Bundle(_))
    ));
    assert!(session.object_pose(OBJECT).is_none());
}

#[test]
fn frames_after_shutdown_are_refused() {
    let mut session = AnchorSession::new(SessionConfig::default(), fixed_factory).unwrap();
    session.shutdown().unwrap();
    assert!(matches!(
        session.submit_frame(frame(0.0), device(0.0)),
        Err(SessionError::Scheduler(SchedulerError::Stopped))
    ));
}

#[test]
fn adjusted_bundle_can_be_saved_and_reloaded() {
    let mut session = AnchorSession::new(SessionConfig::default(), fixed_factory).unwrap();
    session.bind(OBJECT, &bundle()).unwrap();
    session.attach_handle(OBJECT, 0).unwrap();
    session.submit_frame(frame(0.0), device(0.0)).unwrap();
    tick_until_batch(&mut session, device(0.0));

    session.select_handle(OBJECT).unwrap();
    session.handle_mut(OBJECT).unwrap().position.x += 0.1;
    session.tick(device(0.1));
    session.deselect_handle(OBJECT).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shelf.json");
    session.bundle(OBJECT).unwrap().write_json(&path).unwrap();

    let saved = CalibrationBundle::load_json(&path).unwrap();
    assert_eq!(saved.name, "shelf");
    assert_eq!(saved.models, bundle().models);
    assert_eq!(saved.tag_placements.len(), 1);
    assert_eq!(saved.tag_placements[0].tag_id, 4);
    assert_relative_eq!(
        saved.tag_placements[0].position_offset,
        Vector3::new(-0.1, 0.0, 0.5),
        epsilon = 1e-9
    );

    // a fresh session bound to the saved bundle anchors where the drag left off
    let mut restored = AnchorSession::new(SessionConfig::default(), fixed_factory).unwrap();
    restored.bind(OBJECT, &saved).unwrap();
    restored.submit_frame(frame(0.0), device(0.0)).unwrap();
    tick_until_batch(&mut restored, device(0.0));
    let pose = restored.object_pose(OBJECT).unwrap();
    assert_relative_eq!(pose.position, Vector3::new(0.1, 0.0, 1.5), epsilon = 1e-9);
}

#[test]
fn reference_edits_move_the_object() {
    let mut session = AnchorSession::new(SessionConfig::default(), fixed_factory).unwrap();
    session.bind(OBJECT, &bundle()).unwrap();
    assert!(matches!(
        session.set_reference_translation(OBJECT, Axis::X, 0.2),
        Err(SessionError::UnknownObject(OBJECT))
    ));
    session.attach_handle(OBJECT, 0).unwrap();
    session.submit_frame(frame(0.0), device(0.0)).unwrap();
    tick_until_batch(&mut session, device(0.0));

    // the object sits 0.5 m in front of the tag, shown as -0.5
    assert!(session.set_reference_translation(OBJECT, Axis::Z, -0.3).unwrap());
    assert!(session.set_reference_rotation(OBJECT, Axis::Y, 0.0).unwrap());
    assert!(!session.set_reference_translation(OBJECT, Axis::X, f64::NAN).unwrap());
    let placement = &session.bundle(OBJECT).unwrap().tag_placements[0];
    assert_relative_eq!(placement.position_offset, Vector3::new(0.0, 0.0, 0.3), epsilon = 1e-12);
    assert_eq!(placement.rotation_offset, EulerAngles::zero());

    let report = session.tick(device(0.1));
    assert_eq!(report.moved, vec![OBJECT]);
    let pose = session.object_pose(OBJECT).unwrap();
    assert_relative_eq!(pose.position, Vector3::new(0.0, 0.0, 1.7), epsilon = 1e-9);
}
