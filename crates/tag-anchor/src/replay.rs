//! Offline replay of recorded detection sessions.
//!
//! A [`Recording`] stores, per camera frame, the device pose at submission
//! time and the camera-frame detections a real detector produced. Replaying
//! it drives a full [`AnchorSession`] (worker thread included) with a
//! [`ReplayDetector`] that hands back the recorded detections, so smoothing
//! and anchoring can be re-run with different parameters.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::{DevicePoseSample, Pose, RawDetection, TagId};
use crate::detect::{
    DetectorError, DetectorKey, DetectorOutput, Frame, FrameDisposition, ImageView, ProfileSample,
    TagDetector, BYTES_PER_PIXEL,
};
use crate::placement::{CalibrationBundle, ObjectId};
use crate::{AnchorSession, SessionConfig, SessionError};

/// Object the bundle is bound to during a replay.
pub const REPLAY_OBJECT: ObjectId = ObjectId(0);

const STEP_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One recorded camera frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedStep {
    /// Device pose when the frame was submitted.
    pub device: DevicePoseSample,
    /// Capture timestamp reported with the frame.
    pub frame_timestamp: f64,
    /// Per-frame FOV, when the source reported one.
    #[serde(default)]
    pub fov: Option<f32>,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

/// A recorded session: frame geometry plus one entry per frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub steps: Vec<RecordedStep>,
}

impl Recording {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// State of the replayed object after one recorded frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayStep {
    pub index: usize,
    pub timestamp: f64,
    /// Sequence number the frame was scheduled under, if it was.
    pub frame_seq: Option<u64>,
    /// Distinct tags detected in this frame.
    pub tags: Vec<TagId>,
    /// Detection failures reported for this frame.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Whether the object pose has been derived from detections yet.
    pub anchored: bool,
    pub pose: Pose,
}

/// Detector that answers each frame with the detections recorded for it.
///
/// The recording index travels in the first pixel of the frame, see
/// [`replay_frame`].
pub struct ReplayDetector {
    key: DetectorKey,
    steps: Arc<Vec<Vec<RawDetection>>>,
}

impl ReplayDetector {
    pub fn new(key: DetectorKey, steps: Arc<Vec<Vec<RawDetection>>>) -> Self {
        Self { key, steps }
    }
}

impl TagDetector for ReplayDetector {
    fn process(
        &mut self,
        image: &ImageView<'_>,
        _fov: f32,
        _tag_size: f32,
    ) -> Result<DetectorOutput, DetectorError> {
        let started = Instant::now();
        if image.width != self.key.width as usize || image.height != self.key.height as usize {
            return Err(DetectorError::SizeMismatch {
                expected_width: self.key.width,
                expected_height: self.key.height,
                got_width: image.width as u32,
                got_height: image.height as u32,
            });
        }
        let index = u32::from_le_bytes(image.rgba(0, 0)) as usize;
        let detections = self
            .steps
            .get(index)
            .cloned()
            .ok_or_else(|| DetectorError::Backend(format!("no recorded frame {index}")))?;
        Ok(DetectorOutput {
            detections,
            profile: vec![ProfileSample {
                name: "replay".to_string(),
                micros: started.elapsed().as_micros() as u64,
            }],
        })
    }
}

/// Blank RGBA frame carrying `index` in its first pixel.
pub fn replay_frame(index: u32, width: u32, height: u32, timestamp: f64) -> Frame {
    let mut pixels = vec![0; width as usize * height as usize * BYTES_PER_PIXEL];
    if let Some(first) = pixels.get_mut(..BYTES_PER_PIXEL) {
        first.copy_from_slice(&index.to_le_bytes());
    }
    Frame::new(timestamp, width, height, pixels)
}

/// Replay `recording` against `bundle` and report the object pose after
/// every frame.
///
/// Each frame is submitted and the session ticked until its result comes
/// back, so no frame is superseded. A frame that produces no result within a
/// few seconds fails the replay with [`SessionError::Stalled`].
pub fn run_replay(
    recording: &Recording,
    bundle: &CalibrationBundle,
    config: SessionConfig,
) -> Result<Vec<ReplayStep>, SessionError> {
    let recorded: Arc<Vec<Vec<RawDetection>>> = Arc::new(
        recording
            .steps
            .iter()
            .map(|s| s.detections.clone())
            .collect(),
    );
    let factory = move |key: DetectorKey| -> Result<Box<dyn TagDetector>, DetectorError> {
        Ok(Box::new(ReplayDetector::new(key, Arc::clone(&recorded))))
    };

    let mut session = AnchorSession::new(config, factory)?;
    session.bind(REPLAY_OBJECT, bundle)?;
    info!(
        "replaying {} frame(s) of {}x{} against bundle '{}'",
        recording.steps.len(),
        recording.width,
        recording.height,
        bundle.name
    );

    let mut out = Vec::with_capacity(recording.steps.len());
    for (index, step) in recording.steps.iter().enumerate() {
        let mut frame = replay_frame(
            index as u32,
            recording.width,
            recording.height,
            step.frame_timestamp,
        );
        if let Some(fov) = step.fov {
            frame = frame.with_fov(fov);
        }

        let frame_seq = match session.submit_frame(frame, step.device)? {
            FrameDisposition::Scheduled { frame_seq, .. } => Some(frame_seq),
            other => {
                debug!("frame {index} not scheduled: {other:?}");
                None
            }
        };

        let mut tags: Vec<TagId> = Vec::new();
        let mut errors = Vec::new();
        let deadline = Instant::now() + STEP_TIMEOUT;
        loop {
            let report = session.tick(step.device);
            for id in report.tag_ids() {
                if !tags.contains(&id) {
                    tags.push(id);
                }
            }
            errors.extend(report.errors.iter().map(ToString::to_string));
            if frame_seq.is_none() || report.batches > 0 {
                break;
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Stalled(STEP_TIMEOUT));
            }
            thread::sleep(POLL_INTERVAL);
        }

        let binding = session
            .placer()
            .binding(REPLAY_OBJECT)
            .ok_or(SessionError::UnknownObject(REPLAY_OBJECT))?;
        out.push(ReplayStep {
            index,
            timestamp: step.device.timestamp,
            frame_seq,
            tags,
            errors,
            anchored: binding.anchored,
            pose: binding.pose,
        });
    }

    session.shutdown()?;
    Ok(out)
}
