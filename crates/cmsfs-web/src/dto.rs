use std::time::UNIX_EPOCH;

use cmsfs_core::{CoreResult, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct FileInfoDto {
    pub path: String,
    pub name: String,
    pub extension: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub mtime: u64,
    pub mime: String,
    pub icon: String,
    pub hash: String,
    pub is_image: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub view_width: Option<u32>,
    pub view_height: Option<u32>,
    /// Index uuid when the file is synchronized.
    pub uuid: Option<String>,
}

impl FileInfoDto {
    pub fn from_file(file: &mut File) -> CoreResult<Self> {
        let mtime = file
            .mtime()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let view = file.view_size();
        let image = file.image_size();
        Ok(Self {
            path: file.path().to_string(),
            name: file.basename().to_string(),
            extension: file.extension(),
            size: file.size()?,
            mtime,
            mime: file.mime(),
            icon: file.icon(),
            hash: file.hash()?,
            is_image: file.is_image(),
            width: image.map(|s| s.width),
            height: image.map(|s| s.height),
            view_width: view.map(|s| s.width),
            view_height: view.map(|s| s.height),
            uuid: file.get_model()?.map(|m| m.uuid),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConcatRequest {
    pub path: String,
    pub content: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "\n".to_string()
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub path: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub mode: cmsfs_core::ResizeMode,
}

#[derive(Debug, Serialize)]
pub struct OpResponse {
    pub success: bool,
    pub path: String,
}

impl OpResponse {
    pub fn ok(path: impl Into<String>) -> Self {
        Self {
            success: true,
            path: path.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResizeResponse {
    pub success: bool,
    /// `None` when the file is not a resizable image.
    pub url: Option<String>,
}
