//! Packaging configuration
//!
//! Stored in `~/.config/chartpack/packaging.yaml`. Every field has a default,
//! so an empty or missing file yields [`SaveOptions::default`].

use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Informational marker carried in the gzip header's extra field
pub const HEADER_MARKER: &[u8] = b"+Y2hhcnRwYWNrIGFyY2hpdmUK";

/// Options controlling how archives are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOptions {
    /// gzip level, 0 (store) to 9 (best)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Label written to the gzip header comment
    #[serde(default = "default_comment")]
    pub comment: String,

    /// Stamp every entry with mtime 0 instead of the write time
    #[serde(default)]
    pub reproducible: bool,
}

fn default_compression_level() -> u32 {
    6
}

fn default_comment() -> String {
    "chartpack".to_string()
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
            comment: default_comment(),
            reproducible: false,
        }
    }
}

impl SaveOptions {
    /// Load options from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load options from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let options: Self = serde_yaml::from_str(&content).map_err(|e| CoreError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if options.compression_level > 9 {
            return Err(CoreError::Config {
                path: path.to_path_buf(),
                message: format!(
                    "compressionLevel must be between 0 and 9, got {}",
                    options.compression_level
                ),
            });
        }

        Ok(options)
    }

    /// Write options to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|e| CoreError::io(path, e))?;
        Ok(())
    }

    /// `<config dir>/chartpack/packaging.yaml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chartpack").join("packaging.yaml"))
    }

    pub(crate) fn compression(&self) -> Compression {
        Compression::new(self.compression_level.min(9))
    }
}
