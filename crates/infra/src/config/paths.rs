//! Filesystem layout under the agent root

use std::path::{Path, PathBuf};

use tidewater_domain::constants::{
    DIR_LOGS, DIR_STATE, DIR_TEMP, DIR_UPLOADS, FILE_DEVICE_CONFIG, FILE_LAST_PROCESSED, FILE_PID,
    FILE_SETTINGS_JSON, FILE_SETTINGS_TOML,
};
use tidewater_domain::{AgentError, Result};

use crate::errors::infra_err;

/// Directory name used under `$HOME` when no root is given
pub const DEFAULT_ROOT_DIR: &str = ".tidewater";

/// Every path the agent reads or writes, derived from one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPaths {
    root: PathBuf,
}

impl AgentPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$HOME/.tidewater`
    pub fn default_root() -> Result<PathBuf> {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(DEFAULT_ROOT_DIR))
            .ok_or_else(|| AgentError::Config("HOME is not set; pass --root".into()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(DIR_TEMP)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(DIR_LOGS)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(DIR_STATE)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.state_dir().join(DIR_UPLOADS)
    }

    pub fn device_config(&self) -> PathBuf {
        self.root.join(FILE_DEVICE_CONFIG)
    }

    pub fn last_processed(&self) -> PathBuf {
        self.state_dir().join(FILE_LAST_PROCESSED)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join(FILE_PID)
    }

    /// Candidate settings files in lookup order
    pub fn settings_candidates(&self) -> [PathBuf; 2] {
        [self.root.join(FILE_SETTINGS_TOML), self.root.join(FILE_SETTINGS_JSON)]
    }

    /// Create every directory of the layout
    pub fn ensure(&self) -> Result<()> {
        let dirs = [
            self.root.clone(),
            self.temp_dir(),
            self.logs_dir(),
            self.state_dir(),
            self.uploads_dir(),
        ];
        for dir in dirs {
            std::fs::create_dir_all(&dir)
                .map_err(|e| infra_err(e, format!("create {}", dir.display())))?;
        }
        Ok(())
    }
}
