use std::fmt::Write as _;

use tag_anchor_core::Detection;

use crate::{ProfileSample, SchedulerError};

/// World-space detections from one processed frame.
#[derive(Clone, Debug)]
pub struct DetectionBatch {
    /// Sequence number the scheduler assigned to the source frame.
    pub frame_seq: u64,
    /// Main-loop time at which the frame was submitted.
    pub capture_timestamp: f64,
    pub detections: Vec<Detection>,
    /// Human-readable detector timings, present on profiling frames only.
    pub profile: Option<String>,
}

/// What the worker hands back for each processed request.
pub type WorkerOutcome = Result<DetectionBatch, SchedulerError>;

pub(crate) fn format_profile(samples: &[ProfileSample]) -> String {
    let mut out = String::from("detector runtime (usec)");
    for sample in samples {
        let _ = write!(out, "\n{}: {}", sample.name, sample.micros);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_lists_one_stage_per_line() {
        let text = format_profile(&[
            ProfileSample {
                name: "decimate".into(),
                micros: 120,
            },
            ProfileSample {
                name: "quads".into(),
                micros: 3400,
            },
        ]);
        assert_eq!(text, "detector runtime (usec)\ndecimate: 120\nquads: 3400");
    }
}
