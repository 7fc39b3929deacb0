//! Configuration loaded from a TOML file.
//!
//! The defaults reproduce a stock installation: files live under `files/`
//! relative to the project root, scratch files under `system/tmp/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Top-level configuration.
///
/// All fields have sensible defaults so the library works without a config
/// file. Call [`Config::load`] to read from a TOML path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Extra `extension = ["mime/type", "icon.svg"]` entries.
    #[serde(default)]
    pub mime: HashMap<String, (String, String)>,
}

impl Config {
    /// Loads configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the file does not exist.
    /// - [`CoreError::PermissionDenied`] if the file is not readable.
    /// - [`CoreError::ConfigParse`] if the TOML is malformed.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CoreError::from_io(path, e))?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn parse(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::ConfigParse(e.to_string()))
    }
}

/// Where files live and how committed files are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Project root; every file path is relative to it.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Directory (relative to the root) whose contents are indexed.
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    /// Scratch directory (relative to the root) for pending writes.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
    /// Permission bits applied to committed files. Unix only.
    #[serde(default = "default_file_mode")]
    pub file_mode: Option<u32>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            upload_path: default_upload_path(),
            temp_dir: default_temp_dir(),
            file_mode: default_file_mode(),
        }
    }
}

/// File index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSON index location, relative to the root.
    #[serde(default = "default_index_path")]
    pub index_path: String,
    /// Folder names that are never indexed.
    #[serde(default)]
    pub excluded_folders: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_path: default_index_path(),
            excluded_folders: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_upload_path() -> String {
    "files".to_string()
}

fn default_temp_dir() -> String {
    "system/tmp".to_string()
}

fn default_file_mode() -> Option<u32> {
    Some(0o644)
}

fn default_index_path() -> String {
    "system/dbafs.json".to_string()
}
