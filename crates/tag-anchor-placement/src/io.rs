//! JSON helpers for calibration bundles and smoothing configuration.

use std::{fs, path::Path};

use crate::{BundleError, CalibrationBundle, ConfigError, SmoothingParams};

#[derive(thiserror::Error, Debug)]
pub enum PlacementIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CalibrationBundle {
    /// Load and validate a bundle from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PlacementIoError> {
        let raw = fs::read_to_string(path)?;
        let bundle: Self = serde_json::from_str(&raw)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Write this bundle to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PlacementIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl SmoothingParams {
    /// Load and validate smoothing parameters. Missing fields take defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PlacementIoError> {
        let raw = fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&raw)?;
        params.validate()?;
        Ok(params)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PlacementIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
