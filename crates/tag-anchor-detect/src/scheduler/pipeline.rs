use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, trace, warn};
use parking_lot::Mutex;
use tag_anchor_core::{detector_fov, DevicePoseSample, DevicePoseTracker};

use super::worker::{self, DetectionRequest, SharedDetector, Shared};
use super::{SchedulerError, SchedulerParams, WorkerOutcome};
use crate::{DetectorFactory, DetectorKey, Frame};

/// Name of the background detection thread.
pub const WORKER_THREAD_NAME: &str = "tag-detect";

/// What happened to a frame handed to [`DetectionScheduler::submit_frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Queued for detection. `replaced` is set when a request the worker had
    /// not picked up yet was dropped in its favour.
    Scheduled { frame_seq: u64, replaced: bool },
    /// No device pose has been sampled yet.
    NoDevicePose,
    /// The pixel buffer is empty or does not match the frame size.
    InvalidImage,
}

/// Runs tag detection on a background thread, one frame at a time.
///
/// The main loop calls [`sample_device_pose`](Self::sample_device_pose) every
/// tick, [`submit_frame`](Self::submit_frame) for every camera frame and
/// [`poll`](Self::poll) once per tick. None of these block on detection: a
/// frame arriving while the worker is busy replaces any frame still waiting,
/// so at most one detection runs and one waits.
pub struct DetectionScheduler {
    params: SchedulerParams,
    factory: Box<dyn DetectorFactory>,
    tracker: DevicePoseTracker,
    current: Option<(DetectorKey, SharedDetector)>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    next_seq: u64,
}

impl DetectionScheduler {
    /// Validate `params` and start the worker thread.
    pub fn new(
        params: SchedulerParams,
        factory: impl DetectorFactory + 'static,
    ) -> Result<Self, SchedulerError> {
        params.validate()?;
        let shared = Arc::new(Shared::new());
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .spawn(move || worker::run(shared))
                .map_err(SchedulerError::Spawn)?
        };
        Ok(Self {
            tracker: DevicePoseTracker::with_capacity(params.pose_history),
            params,
            factory: Box::new(factory),
            current: None,
            shared,
            worker: Some(worker),
            next_seq: 0,
        })
    }

    #[inline]
    pub fn params(&self) -> &SchedulerParams {
        &self.params
    }

    /// Change the tag size used for subsequent frames.
    pub fn set_tag_size(&mut self, tag_size: f32) -> Result<(), SchedulerError> {
        let params = SchedulerParams {
            tag_size,
            ..self.params.clone()
        };
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Change the decimation factor; the detector is rebuilt on the next frame.
    pub fn set_decimation(&mut self, decimation: u32) -> Result<(), SchedulerError> {
        let params = SchedulerParams {
            decimation,
            ..self.params.clone()
        };
        params.validate()?;
        self.params = params;
        Ok(())
    }

    #[inline]
    pub fn tracker(&self) -> &DevicePoseTracker {
        &self.tracker
    }

    /// Record the device pose for the current tick. Returns `false` when the
    /// sample was not newer than the last one and got ignored.
    pub fn sample_device_pose(&mut self, sample: DevicePoseSample) -> bool {
        self.tracker.sample(sample)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Queue `frame` for detection.
    ///
    /// `device_now` is the device pose at the time of the call; its timestamp
    /// is used as the capture time of every detection in the frame. The pose
    /// the detections are reconciled against is interpolated at the frame's
    /// own timestamp.
    pub fn submit_frame(
        &mut self,
        frame: Frame,
        device_now: DevicePoseSample,
    ) -> Result<FrameDisposition, SchedulerError> {
        if self.worker.is_none() {
            return Err(SchedulerError::Stopped);
        }
        let capture_timestamp = device_now.timestamp;
        self.tracker.sample(device_now);
        let Some(device) = self.tracker.pose_at(frame.timestamp) else {
            trace!("no device pose yet, skipping frame");
            return Ok(FrameDisposition::NoDevicePose);
        };

        // never build a detector for a degenerate size
        if frame.width == 0 || frame.height == 0 {
            trace!("skipping {}x{} frame", frame.width, frame.height);
            return Ok(FrameDisposition::InvalidImage);
        }

        let key = DetectorKey {
            width: frame.width,
            height: frame.height,
            decimation: self.params.decimation,
        };
        let detector = self.detector_for(key)?;

        if frame.image().is_none() {
            trace!(
                "skipping frame with {} byte buffer for {}x{}",
                frame.pixels.len(),
                frame.width,
                frame.height
            );
            return Ok(FrameDisposition::InvalidImage);
        }

        let frame_seq = self.next_seq;
        self.next_seq += 1;
        let fov = detector_fov(
            frame.fov.unwrap_or(device.fov),
            frame.width,
            frame.height,
            self.params.orientation,
        );
        let with_profile =
            self.params.profile_every > 0 && frame_seq % self.params.profile_every == 0;

        let request = DetectionRequest {
            detector,
            frame,
            device,
            fov,
            tag_size: self.params.tag_size,
            orientation: self.params.orientation,
            capture_timestamp,
            frame_seq,
            with_profile,
        };

        let replaced = match self.shared.mailbox.put(request) {
            Some(displaced) => {
                trace!("frame {} superseded by {frame_seq}", displaced.frame_seq);
                self.shared.retire(displaced.detector);
                true
            }
            None => false,
        };
        Ok(FrameDisposition::Scheduled {
            frame_seq,
            replaced,
        })
    }

    /// Drain everything the worker finished since the last call.
    pub fn poll(&mut self) -> Vec<WorkerOutcome> {
        self.shared.results.lock().drain(..).collect()
    }

    /// Stop the worker, waiting at most the configured shutdown timeout.
    ///
    /// A detection in flight is allowed to finish; a pending one is dropped.
    /// Results already queued stay available to [`poll`](Self::poll).
    /// Calling this again after a successful shutdown is a no-op.
    pub fn shutdown(&mut self) -> Result<(), SchedulerError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        let timeout = self.params.shutdown_timeout();
        self.shared.stop.store(true, Ordering::Release);
        self.shared.mailbox.wake();

        let deadline = Instant::now() + timeout;
        let finished = {
            let mut exited = self.shared.exited.lock();
            while !*exited {
                if self
                    .shared
                    .exited_cv
                    .wait_until(&mut exited, deadline)
                    .timed_out()
                {
                    break;
                }
            }
            *exited
        };

        if !finished {
            // the thread is detached; it exits on its own once the detector returns
            warn!("detection worker still busy after {timeout:?}, detaching");
            return Err(SchedulerError::ShutdownTimeout { timeout });
        }

        handle.join().map_err(|_| SchedulerError::WorkerPanicked)?;
        // the worker is gone, so the remaining detector handles die here
        drop(self.shared.mailbox.take());
        self.shared.retired.lock().clear();
        self.current = None;
        debug!("detection scheduler shut down");
        Ok(())
    }

    fn detector_for(&mut self, key: DetectorKey) -> Result<SharedDetector, SchedulerError> {
        if let Some((current_key, detector)) = &self.current {
            if *current_key == key {
                return Ok(Arc::clone(detector));
            }
        }

        if let Some((old_key, old)) = self.current.take() {
            debug!(
                "rebuilding detector: {}x{}/{} -> {}x{}/{}",
                old_key.width,
                old_key.height,
                old_key.decimation,
                key.width,
                key.height,
                key.decimation
            );
            self.shared.retire(old);
        }

        let detector = self
            .factory
            .build(key)
            .map_err(|source| SchedulerError::DetectorBuild { key, source })?;
        let detector: SharedDetector = Arc::new(Mutex::new(detector));
        self.current = Some((key, Arc::clone(&detector)));
        Ok(detector)
    }
}

impl Drop for DetectionScheduler {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!("detection scheduler shutdown failed: {err}");
        }
    }
}
