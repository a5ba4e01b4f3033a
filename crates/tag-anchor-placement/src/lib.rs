//! Turning noisy per-frame tag detections into stable object anchors.
//!
//! Current focus:
//! - per-tag detection history bounded by count and age,
//! - outlier-gated smoothing of each tag's pose,
//! - deriving an object's pose from one or more tags and their calibrated
//!   placement offsets,
//! - interactive adjustment of those offsets through a handle.
//!
//! Everything here runs on the caller's thread; detection scheduling lives in
//! `tag-anchor-detect`.

mod accumulator;
mod adjuster;
mod anchor;
mod bundle;
mod io;
mod params;
mod placer;
mod smoothing;

pub use accumulator::DetectionAccumulator;
pub use adjuster::{Axis, PlacementAdjuster};
pub use anchor::{anchor_candidate, derive_anchor, AnchorBinding, ObjectId};
pub use bundle::{BundleError, CalibrationBundle, SubModel, TagPlacement};
pub use io::PlacementIoError;
pub use params::{ConfigError, SmoothingParams};
pub use placer::{TagPlacer, TagsObservedListener};
pub use smoothing::{smooth_all, smooth_detections, SmoothedTagPose};
