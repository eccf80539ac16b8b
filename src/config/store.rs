//! Device record persistence.
//!
//! # Responsibilities
//! - Read and write the JSON device record
//! - Track whether the device has completed first-time setup
//!
//! # Design Decisions
//! - Storage sits behind [`ConfigStore`] so the portal can be exercised
//!   against any backend
//! - A missing record is not an error; callers fall back to defaults

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::record::ConfigRecord;
use crate::config::schema::DeviceSettings;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read/write access to the persisted device record.
pub trait ConfigStore {
    /// Load the record, or `None` if none has been saved yet.
    fn load(&self) -> Result<Option<ConfigRecord>, StoreError>;

    /// Replace the stored record.
    fn save(&mut self, record: &ConfigRecord) -> Result<(), StoreError>;

    /// Whether first-time setup has completed.
    fn is_configured(&self) -> bool;

    /// Set or clear the configured marker.
    fn set_configured(&mut self, configured: bool) -> Result<(), StoreError>;
}

/// Stores the record as a JSON file and the configured marker as a file.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    record_path: PathBuf,
    flag_path: PathBuf,
}

impl FileConfigStore {
    pub fn new(record_path: impl Into<PathBuf>, flag_path: impl Into<PathBuf>) -> Self {
        Self {
            record_path: record_path.into(),
            flag_path: flag_path.into(),
        }
    }

    pub fn from_settings(settings: &DeviceSettings) -> Self {
        Self::new(&settings.record_path, &settings.configured_flag_path)
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Option<ConfigRecord>, StoreError> {
        let content = match fs::read_to_string(&self.record_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = ?self.record_path, "No device record found, using defaults");
                return Ok(None);
            }
            Err(e) => return Err(io_error(&self.record_path)(e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                path: self.record_path.clone(),
                source,
            })
    }

    fn save(&mut self, record: &ConfigRecord) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(record).map_err(|source| StoreError::Decode {
            path: self.record_path.clone(),
            source,
        })?;
        fs::write(&self.record_path, content).map_err(io_error(&self.record_path))?;
        tracing::info!(path = ?self.record_path, "Device record saved");
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.flag_path.exists()
    }

    fn set_configured(&mut self, configured: bool) -> Result<(), StoreError> {
        let result = if configured {
            fs::write(&self.flag_path, b"1")
        } else {
            match fs::remove_file(&self.flag_path) {
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            }
        };
        result.map_err(io_error(&self.flag_path))
    }
}
