//! Background detection scheduling.
//!
//! This module wires together device pose interpolation, detector lifecycle
//! management, the one-deep request mailbox and the worker thread that turns
//! camera-frame detections into world-space ones.

mod error;
mod mailbox;
mod params;
mod pipeline;
mod result;
mod worker;

pub use error::SchedulerError;
pub use params::{ParamsError, SchedulerParams};
pub use pipeline::{DetectionScheduler, FrameDisposition, WORKER_THREAD_NAME};
pub use result::{DetectionBatch, WorkerOutcome};
