use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::human::SizeFormat;

/// Report settings; every field has a default so a config file may be partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Installation root the report is relative to.
    pub root: PathBuf,
    /// Directory levels expanded below the listed directory.
    pub depth: usize,
    pub size_format: SizeFormat,
    /// Compute sizes of listed entries on the rayon pool.
    pub parallel_sizes: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            depth: 1,
            size_format: SizeFormat::default(),
            parallel_sizes: true,
        }
    }
}

impl ReportConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
