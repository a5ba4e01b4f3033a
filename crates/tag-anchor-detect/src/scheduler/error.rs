use std::time::Duration;

use crate::{DetectorError, DetectorKey, ParamsError};

/// Errors raised by the detection scheduler.
///
/// Per-frame failures (`Detector`, `DetectorPanicked`) come back through
/// [`DetectionScheduler::poll`](crate::DetectionScheduler::poll); the worker
/// keeps serving later frames after reporting them.
#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    InvalidParams(#[from] ParamsError),
    #[error("failed to spawn detection worker")]
    Spawn(#[source] std::io::Error),
    #[error("failed to build detector for {}x{} (decimation {})", key.width, key.height, key.decimation)]
    DetectorBuild {
        key: DetectorKey,
        #[source]
        source: DetectorError,
    },
    #[error("detection failed on frame {frame_seq}")]
    Detector {
        frame_seq: u64,
        #[source]
        source: DetectorError,
    },
    #[error("detector panicked on frame {frame_seq}: {message}")]
    DetectorPanicked { frame_seq: u64, message: String },
    #[error("detection worker did not stop within {timeout:?}")]
    ShutdownTimeout { timeout: Duration },
    #[error("detection scheduler is shut down")]
    Stopped,
    #[error("detection worker panicked")]
    WorkerPanicked,
}
