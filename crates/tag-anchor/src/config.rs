//! Session configuration and the facade error type.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::detect::{SchedulerError, SchedulerParams};
use crate::placement::{BundleError, ConfigError, ObjectId, PlacementIoError, SmoothingParams};

/// Errors produced by the session-level helpers.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Smoothing(#[from] ConfigError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    PlacementIo(#[from] PlacementIoError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("object {0} is not bound")]
    UnknownObject(ObjectId),
    #[error("no detection result within {0:?}")]
    Stalled(std::time::Duration),
}

/// Everything an [`AnchorSession`](crate::AnchorSession) is configured with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub scheduler: SchedulerParams,
    pub smoothing: SmoothingParams,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        self.scheduler.validate().map_err(SchedulerError::from)?;
        self.smoothing.validate()?;
        Ok(())
    }

    /// Load and validate a JSON config. Missing sections take defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
