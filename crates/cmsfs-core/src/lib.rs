//! cmsfs core library: CMS-style file handles.
//!
//! `cmsfs-core` provides [`File`], a handle on one file below a site root
//! that resolves metadata lazily, commits writes atomically on close, and
//! keeps a file index in sync. It has no HTTP dependency; `cmsfs-web`
//! exposes it over a JSON API.
//!
//! # Modules
//!
//! - [`fs`]: the [`File`] handle, filesystem service, hashing and downloads.
//! - [`image`]: dimension probes, the shared size cache and resizing.
//! - [`dbafs`]: the file index ([`JsonDbafs`]) and its synchronization policy.
//! - [`mime`]: extension to MIME type and icon mapping.
//! - [`context`]: the [`FileContext`] shared by all handles.
//! - [`config`]: TOML-based settings.
//! - [`error`]: Unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod config;
pub mod context;
pub mod dbafs;
pub mod error;
pub mod fs;
pub mod image;
pub mod mime;

pub use config::settings::Config;
pub use context::{FileContext, FileContextBuilder};
pub use dbafs::{Dbafs, DbafsRecord, JsonDbafs, NoDbafs, ResourceKind};
pub use error::{CoreError, CoreResult};
pub use fs::{BinaryResponse, File, Files, LocalFiles, PathParts};
pub use image::{
    DefaultImageProbe, DefaultImageResizer, ImageProbe, ImageResizer, ImageSize, ImageSizeCache,
    ResizeMode, SvgSize,
};
pub use mime::{MimeInfo, MimeTable};

/// Normalises a string to NFC (composed) form.
///
/// macOS stores filenames in NFD (decomposed), so the same name can arrive
/// in either form. Handles and index keys always use NFC.
pub fn nfc_string(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    s.nfc().collect()
}
