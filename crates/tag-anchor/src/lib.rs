//! Anchor virtual objects to printed fiducial tags.
//!
//! This crate ties the workspace together:
//! - re-exports of the underlying crates,
//! - [`AnchorSession`], a main-loop driver that schedules detection on a
//!   background worker, smooths the results and keeps bound objects anchored,
//! - replay of recorded sessions, used by the `tag-anchor` CLI,
//! - (feature-gated) conversion of `image` buffers into camera frames.
//!
//! ## Quickstart
//!
//! ```no_run
//! use tag_anchor::detect::{DetectorError, DetectorKey, Frame, TagDetector};
//! use tag_anchor::placement::{CalibrationBundle, ObjectId};
//! use tag_anchor::{AnchorSession, SessionConfig};
//!
//! # fn my_detector(_: DetectorKey) -> Result<Box<dyn TagDetector>, DetectorError> { todo!() }
//! # fn next_device_pose() -> tag_anchor::core::DevicePoseSample { todo!() }
//! # fn next_frame() -> Option<Frame> { todo!() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bundle = CalibrationBundle::load_json("bundle.json")?;
//! let mut session = AnchorSession::new(SessionConfig::default(), my_detector)?;
//! session.bind(ObjectId(0), &bundle)?;
//!
//! loop {
//!     let device = next_device_pose();
//!     if let Some(frame) = next_frame() {
//!         session.submit_frame(frame, device)?;
//!     }
//!     let report = session.tick(device);
//!     if report.moved.contains(&ObjectId(0)) {
//!         println!("object at {:?}", session.object_pose(ObjectId(0)));
//!     }
//! }
//! # }
//! ```
//!
//! ## API map
//! - `tag_anchor::core`: poses, device pose history, reconciliation, averaging.
//! - `tag_anchor::detect`: frames, the detector seam and the detection scheduler.
//! - `tag_anchor::placement`: accumulation, smoothing, anchoring and adjustment.
//! - `tag_anchor::frames` (feature `image`): frames from `image::RgbaImage`.

pub use tag_anchor_core as core;
pub use tag_anchor_detect as detect;
pub use tag_anchor_placement as placement;

mod config;
mod replay;
mod session;

#[cfg(feature = "image")]
pub mod frames;

pub use config::{SessionConfig, SessionError};
pub use replay::{
    replay_frame, run_replay, RecordedStep, Recording, ReplayDetector, ReplayStep,
    REPLAY_OBJECT,
};
pub use session::{AnchorSession, TickReport};
