use std::path::{Path, PathBuf};
use std::fs;
use crate::common::error::Result;
use crate::common::paths::system_data_dir;

/// Resolves the data directories every store and sink writes under.
#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        let base_dir = if enabled {
            PathBuf::from("./dev_data")
        } else {
            system_data_dir()
        };

        Self::with_base_dir(enabled, base_dir)
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        let mode = Self { enabled, base_dir };

        // System directories are left to the stores, which create what they use
        if enabled {
            fs::create_dir_all(mode.identities_dir())?;
            fs::create_dir_all(mode.collections_dir())?;
            fs::create_dir_all(mode.artifacts_dir())?;
            fs::create_dir_all(mode.logs_dir())?;

            tracing::debug!("Development mode enabled - data will be saved to: {}",
                     mode.base_dir.display());
        }

        Ok(mode)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn identities_dir(&self) -> PathBuf {
        self.base_dir.join("identities")
    }

    pub fn collections_dir(&self) -> PathBuf {
        self.base_dir.join("collections")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.base_dir.join("artifacts")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }
}
