//! Off-main-loop fiducial tag detection.
//!
//! This crate focuses on:
//! - camera frames and RGBA image views,
//! - the [`TagDetector`] / [`DetectorFactory`] seam a concrete detector plugs into,
//! - a [`DetectionScheduler`] that runs one detection at a time on a worker
//!   thread, coalesces bursts of frames (latest wins) and reconciles results
//!   against the device pose the frame was captured at.
//!
//! It does **not** find tags itself. Plug in an AprilTag/ArUco backend by
//! implementing [`TagDetector`].

mod capability;
mod frame;
mod scheduler;

pub use capability::{
    DetectorError, DetectorFactory, DetectorKey, DetectorOutput, ProfileSample, TagDetector,
};
pub use frame::{Frame, ImageView, BYTES_PER_PIXEL};
pub use scheduler::{
    DetectionBatch, DetectionScheduler, FrameDisposition, ParamsError, SchedulerError,
    SchedulerParams, WorkerOutcome, WORKER_THREAD_NAME,
};
