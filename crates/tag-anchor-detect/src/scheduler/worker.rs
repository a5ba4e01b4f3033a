use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use tag_anchor_core::{reconcile, DeviceOrientation, DevicePoseSample};

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::mailbox::Mailbox;
use super::result::{format_profile, DetectionBatch, WorkerOutcome};
use crate::{Frame, SchedulerError, TagDetector};

/// Detector handle shared between the main loop (which builds and retires it)
/// and the worker (which runs and drops it).
pub(crate) type SharedDetector = Arc<Mutex<Box<dyn TagDetector>>>;

/// Everything the worker needs to process one frame.
pub(crate) struct DetectionRequest {
    pub detector: SharedDetector,
    pub frame: Frame,
    pub device: DevicePoseSample,
    pub fov: f32,
    pub tag_size: f32,
    pub orientation: DeviceOrientation,
    pub capture_timestamp: f64,
    pub frame_seq: u64,
    pub with_profile: bool,
}

/// State shared by the scheduler and its worker thread.
pub(crate) struct Shared {
    pub mailbox: Mailbox<DetectionRequest>,
    pub stop: AtomicBool,
    pub results: Mutex<VecDeque<WorkerOutcome>>,
    pub retired: Mutex<Vec<SharedDetector>>,
    pub exited: Mutex<bool>,
    pub exited_cv: Condvar,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            mailbox: Mailbox::new(),
            stop: AtomicBool::new(false),
            results: Mutex::new(VecDeque::new()),
            retired: Mutex::new(Vec::new()),
            exited: Mutex::new(false),
            exited_cv: Condvar::new(),
        }
    }

    /// Hand a detector to the worker for disposal.
    pub(crate) fn retire(&self, detector: SharedDetector) {
        self.retired.lock().push(detector);
    }

    fn dispose_retired(&self) {
        let retired = std::mem::take(&mut *self.retired.lock());
        if !retired.is_empty() {
            debug!("disposing {} retired detector(s)", retired.len());
        }
        drop(retired);
    }
}

/// Marks the worker as exited even if the loop unwinds.
struct ExitGuard<'a>(&'a Shared);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.dispose_retired();
        let mut exited = self.0.exited.lock();
        *exited = true;
        self.0.exited_cv.notify_all();
    }
}

pub(crate) fn run(shared: Arc<Shared>) {
    let _guard = ExitGuard(&shared);
    debug!("detection worker started");
    loop {
        let request = shared.mailbox.wait_take();
        if shared.stop.load(Ordering::Acquire) {
            if let Some(dropped) = request {
                trace!("dropping pending frame {} on shutdown", dropped.frame_seq);
            }
            break;
        }
        let Some(request) = request else {
            continue;
        };

        let outcome = process(request);
        shared.results.lock().push_back(outcome);
        shared.dispose_retired();
    }
    debug!("detection worker stopped");
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(request), fields(frame_seq = request.frame_seq))
)]
fn process(request: DetectionRequest) -> WorkerOutcome {
    let DetectionRequest {
        detector,
        frame,
        device,
        fov,
        tag_size,
        orientation,
        capture_timestamp,
        frame_seq,
        with_profile,
    } = request;

    // validated before the request was queued
    let Some(image) = frame.image() else {
        return Ok(DetectionBatch {
            frame_seq,
            capture_timestamp,
            detections: Vec::new(),
            profile: None,
        });
    };

    let output = {
        let mut detector = detector.lock();
        catch_unwind(AssertUnwindSafe(|| detector.process(&image, fov, tag_size)))
    };
    let output = output
        .map_err(|payload| SchedulerError::DetectorPanicked {
            frame_seq,
            message: panic_message(payload.as_ref()),
        })?
        .map_err(|source| SchedulerError::Detector { frame_seq, source })?;

    let detections = output
        .detections
        .iter()
        .map(|raw| reconcile(raw, &device, orientation, capture_timestamp, frame_seq))
        .collect::<Vec<_>>();
    trace!("frame {frame_seq}: {} tag(s)", detections.len());

    Ok(DetectionBatch {
        frame_seq,
        capture_timestamp,
        detections,
        profile: with_profile.then(|| format_profile(&output.profile)),
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
