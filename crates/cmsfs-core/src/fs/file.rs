//! File handle with lazily resolved metadata and committed-on-close writes.
//!
//! A [`File`] is identified by a path relative to the context root. Nothing
//! touches the disk on construction; metadata is resolved on first access and
//! cached on the handle. Writes go to a temporary file in the scratch
//! directory, and [`File::close`] renames it over the target. Dropping a
//! handle with an uncommitted write discards the temporary file.

use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use tempfile::NamedTempFile;

use crate::context::FileContext;
use crate::dbafs::DbafsRecord;
use crate::error::{CoreError, CoreResult};
use crate::fs::hash::{md5_file, MAX_HASH_FILE_SIZE};
use crate::fs::response::BinaryResponse;
use crate::image::probe::gunzip;
use crate::image::{ImageSize, ResizeMode, SvgSize};
use crate::mime::MimeInfo;

const GD_IMAGE_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "png"];
const SVG_IMAGE_EXTENSIONS: &[&str] = &["svg", "svgz"];

const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];
const BOM_UTF16_LE: &[u8] = &[0xFF, 0xFE];
const BOM_UTF16_BE: &[u8] = &[0xFE, 0xFF];

/// Splits a path into directory, basename, filename and extension.
static PATH_INFO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)[\\/]*(([^/\\]*?)(\.([^.\\/]+?)|))[\\/.]*$").expect("valid path regex")
});

/// Components of a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParts {
    /// Parent directory, `.` for top-level files.
    pub dirname: String,
    /// Last component including the extension.
    pub basename: String,
    /// Last component without the extension.
    pub filename: String,
    /// Extension as written, without the dot.
    pub extension: String,
}

impl PathParts {
    pub fn parse(path: &str) -> Self {
        let Some(caps) = PATH_INFO.captures(path) else {
            return Self {
                dirname: ".".to_string(),
                basename: path.to_string(),
                filename: path.to_string(),
                extension: String::new(),
            };
        };
        let group = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default().to_string();

        let dirname = group(1);
        Self {
            dirname: if dirname.is_empty() { ".".to_string() } else { dirname },
            basename: group(2),
            filename: group(3),
            extension: group(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Truncate,
    Append,
}

/// A handle on one file below the context root.
#[derive(Debug)]
pub struct File {
    ctx: Arc<FileContext>,
    path: String,
    parts: Option<PathParts>,
    image_size: Option<Option<ImageSize>>,
    view_size: Option<Option<ImageSize>>,
    model: Option<Option<DbafsRecord>>,
    pending: Option<NamedTempFile>,
}

impl File {
    /// Creates a handle for `path` (relative to the context root).
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidName`] if the path is empty or contains `..`.
    /// - [`CoreError::IsADirectory`] if the path is an existing directory.
    pub fn new(ctx: Arc<FileContext>, path: &str) -> CoreResult<Self> {
        let path = normalize_path(path)?;
        if ctx.root().join(&path).is_dir() {
            return Err(CoreError::IsADirectory(PathBuf::from(path)));
        }
        Ok(Self {
            ctx,
            path,
            parts: None,
            image_size: None,
            view_size: None,
            model: None,
            pending: None,
        })
    }

    /// Creates the file (empty) if it does not exist yet.
    ///
    /// # Errors
    ///
    /// [`CoreError::CreateFailed`] naming the path if the file could not be
    /// written.
    pub fn create_if_not_exists(&mut self) -> CoreResult<()> {
        if self.exists() {
            return Ok(());
        }
        let created = self.write("").and_then(|()| self.close());
        created.map_err(|e| {
            tracing::warn!("failed to create {}: {e}", self.path);
            CoreError::CreateFailed(PathBuf::from(&self.path))
        })
    }

    /// The path relative to the context root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn abs_path(&self) -> PathBuf {
        self.ctx.root().join(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.abs_path().exists()
    }

    /// `true` while a write is pending (not yet committed by [`File::close`]).
    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.metadata()?.len())
    }

    /// Last modification time.
    pub fn mtime(&self) -> CoreResult<SystemTime> {
        Ok(self.metadata()?.modified()?)
    }

    /// Last access time.
    pub fn atime(&self) -> CoreResult<SystemTime> {
        Ok(self.metadata()?.accessed()?)
    }

    /// Inode change time on Unix, creation time elsewhere.
    pub fn ctime(&self) -> CoreResult<SystemTime> {
        let meta = self.metadata()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let secs = u64::try_from(meta.ctime()).unwrap_or(0);
            Ok(UNIX_EPOCH + std::time::Duration::new(secs, meta.ctime_nsec() as u32))
        }
        #[cfg(not(unix))]
        {
            Ok(meta.created()?)
        }
    }

    pub fn path_parts(&mut self) -> &PathParts {
        self.parts.get_or_insert_with(|| PathParts::parse(&self.path))
    }

    pub fn dirname(&mut self) -> &str {
        &self.path_parts().dirname
    }

    pub fn basename(&mut self) -> &str {
        &self.path_parts().basename
    }

    pub fn filename(&mut self) -> &str {
        &self.path_parts().filename
    }

    /// Lowercase extension without the dot.
    pub fn extension(&mut self) -> String {
        self.path_parts().extension.to_lowercase()
    }

    /// Extension as written in the path.
    pub fn orig_extension(&mut self) -> &str {
        &self.path_parts().extension
    }

    pub fn mime_info(&mut self) -> MimeInfo<'_> {
        let ext = self.extension();
        self.ctx.mime().lookup(&ext)
    }

    pub fn mime(&mut self) -> String {
        self.mime_info().mime.to_string()
    }

    pub fn icon(&mut self) -> String {
        self.mime_info().icon.to_string()
    }

    /// MD5 of the file content, or an empty string for files of 2 GiB and
    /// more.
    pub fn hash(&self) -> CoreResult<String> {
        if self.size()? >= MAX_HASH_FILE_SIZE {
            tracing::debug!("not hashing {}: file too large", self.path);
            return Ok(String::new());
        }
        md5_file(&self.abs_path())
    }

    /// GIF, JPEG or PNG.
    pub fn is_gd_image(&mut self) -> bool {
        GD_IMAGE_EXTENSIONS.contains(&self.extension().as_str())
    }

    pub fn is_svg_image(&mut self) -> bool {
        SVG_IMAGE_EXTENSIONS.contains(&self.extension().as_str())
    }

    pub fn is_image(&mut self) -> bool {
        self.is_gd_image() || self.is_svg_image()
    }

    /// Intrinsic image size.
    ///
    /// Resolved from the shared cache (keyed by path and mtime), a raster
    /// header probe, or an SVG probe, in that order. Non-images, unreadable
    /// rasters and SVGs without absolute dimensions yield `None`.
    pub fn image_size(&mut self) -> Option<ImageSize> {
        if let Some(size) = self.image_size {
            return size;
        }

        let key = Path::new(&self.path).to_path_buf();
        let mtime = self.mtime().unwrap_or(UNIX_EPOCH);
        if let Some(hit) = self.ctx.image_sizes().get(&key, mtime) {
            tracing::debug!("image size cache hit for {}", self.path);
            self.image_size = Some(hit);
            return hit;
        }

        let size = if self.is_gd_image() {
            match self.ctx.probe().raster_size(&self.abs_path()) {
                Ok(size) => Some(size),
                Err(e) => {
                    tracing::warn!("cannot read image size of {}: {e}", self.path);
                    None
                }
            }
        } else if self.is_svg_image() {
            match self.ctx.probe().vector_size(&self.abs_path()) {
                Ok(SvgSize::Absolute(size)) => Some(size),
                Ok(SvgSize::Relative(_) | SvgSize::Undefined) => None,
                Err(e) => {
                    tracing::warn!("cannot read svg size of {}: {e}", self.path);
                    None
                }
            }
        } else {
            None
        };

        self.ctx.image_sizes().insert(&key, mtime, size);
        self.image_size = Some(size);
        size
    }

    pub fn width(&mut self) -> Option<u32> {
        self.image_size().map(|s| s.width)
    }

    pub fn height(&mut self) -> Option<u32> {
        self.image_size().map(|s| s.height)
    }

    /// Size for display boxes. Falls back to the SVG viewBox when the image
    /// has no intrinsic size; `None` if either axis is zero.
    pub fn view_size(&mut self) -> Option<ImageSize> {
        if let Some(size) = self.view_size {
            return size;
        }

        let is_svg = self.is_svg_image();
        let size = match self.image_size() {
            Some(size) => Some(size),
            None if is_svg => match self.ctx.probe().vector_size(&self.abs_path()) {
                Ok(SvgSize::Absolute(size) | SvgSize::Relative(size)) => Some(size),
                Ok(SvgSize::Undefined) => None,
                Err(e) => {
                    tracing::warn!("cannot read svg view box of {}: {e}", self.path);
                    None
                }
            },
            None => None,
        }
        .filter(|s| !s.is_empty());

        self.view_size = Some(size);
        size
    }

    pub fn view_width(&mut self) -> Option<u32> {
        self.view_size().map(|s| s.width)
    }

    pub fn view_height(&mut self) -> Option<u32> {
        self.view_size().map(|s| s.height)
    }

    /// `data:<mime>;base64,<content>`; `svgz` content is inflated first.
    pub fn data_uri(&mut self) -> CoreResult<String> {
        let content = if self.extension() == "svgz" {
            let raw = std::fs::read(self.abs_path())
                .map_err(|e| CoreError::from_io(Path::new(&self.path), e))?;
            gunzip(&raw)?
        } else {
            self.get_content()?
        };
        Ok(format!("data:{};base64,{}", self.mime(), BASE64.encode(content)))
    }

    /// Replaces the content. Repeated calls before [`File::close`] append to
    /// the pending write.
    pub fn write(&mut self, content: impl AsRef<[u8]>) -> CoreResult<()> {
        self.fputs(content.as_ref(), WriteMode::Truncate)
    }

    /// Appends `content` followed by `separator` to the existing content.
    pub fn append(&mut self, content: impl AsRef<[u8]>, separator: &str) -> CoreResult<()> {
        let mut buf = content.as_ref().to_vec();
        buf.extend_from_slice(separator.as_bytes());
        self.fputs(&buf, WriteMode::Append)
    }

    /// Inserts `content` followed by `separator` before the existing content.
    pub fn prepend(&mut self, content: impl AsRef<[u8]>, separator: &str) -> CoreResult<()> {
        let existing = match self.get_content() {
            Ok(existing) => existing,
            Err(CoreError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        let mut buf = content.as_ref().to_vec();
        buf.extend_from_slice(separator.as_bytes());
        buf.extend_from_slice(&existing);

        self.rewind_pending()?;
        self.write(buf)
    }

    /// Empties the file. The truncation is committed by [`File::close`] like
    /// any other write.
    pub fn truncate(&mut self) -> CoreResult<()> {
        self.rewind_pending()?;
        self.write("")
    }

    /// Commits the pending write by renaming the temporary file over the
    /// target, then indexes the target if it is synchronized.
    ///
    /// Closing a handle without a pending write does nothing.
    pub fn close(&mut self) -> CoreResult<()> {
        let Some(temp) = self.pending.take() else {
            return Ok(());
        };
        let temp_path = temp.into_temp_path();

        self.ensure_parent_dir(&self.path)?;
        self.ctx.files().rename(&temp_path, Path::new(&self.path))?;
        // The temporary file now lives at the target path.
        let _ = temp_path.keep();

        if let Some(mode) = self.ctx.file_mode() {
            if let Err(e) = self.ctx.files().chmod(Path::new(&self.path), mode) {
                tracing::warn!("cannot set mode {mode:o} on {}: {e}", self.path);
            }
        }
        self.image_size = None;
        self.view_size = None;

        if self.ctx.dbafs().should_be_synchronized(&self.path) {
            match self.ctx.dbafs().add_resource(&self.path) {
                Ok(record) => self.model = Some(Some(record)),
                Err(e) => tracing::warn!("cannot index {}: {e}", self.path),
            }
        }
        Ok(())
    }

    /// Deletes the file and its index record.
    ///
    /// The outcome is that of the file deletion; index failures are logged.
    pub fn delete(&mut self) -> CoreResult<()> {
        let result = self.ctx.files().delete(Path::new(&self.path));

        if self.ctx.dbafs().should_be_synchronized(&self.path) {
            if let Err(e) = self.ctx.dbafs().delete_resource(&self.path) {
                tracing::warn!("cannot remove {} from index: {e}", self.path);
            }
        }
        self.model = None;
        result
    }

    /// Renames the file to `new_path` and moves its index record along.
    ///
    /// On failure the handle keeps its old path and cached metadata.
    pub fn rename_to(&mut self, new_path: &str) -> CoreResult<()> {
        let new_path = normalize_path(new_path)?;
        self.ensure_parent_dir(&new_path)?;
        self.ctx
            .files()
            .rename(Path::new(&self.path), Path::new(&new_path))?;

        let dbafs = self.ctx.dbafs();
        let sync_source = dbafs.should_be_synchronized(&self.path);
        let sync_target = dbafs.should_be_synchronized(&new_path);
        let synced = match (sync_source, sync_target) {
            (true, true) => dbafs.move_resource(&self.path, &new_path).map(drop),
            (true, false) => dbafs.delete_resource(&self.path),
            (false, true) => dbafs.add_resource(&new_path).map(drop),
            (false, false) => Ok(()),
        };
        if let Err(e) = synced {
            tracing::warn!("cannot update index for {} -> {new_path}: {e}", self.path);
        }

        self.path = new_path;
        self.parts = None;
        self.image_size = None;
        self.view_size = None;
        self.model = None;
        Ok(())
    }

    /// Copies the file to `new_path` and indexes the copy if the target is
    /// synchronized.
    pub fn copy_to(&mut self, new_path: &str) -> CoreResult<()> {
        let new_path = normalize_path(new_path)?;
        self.ensure_parent_dir(&new_path)?;
        self.ctx
            .files()
            .copy(Path::new(&self.path), Path::new(&new_path))?;

        let dbafs = self.ctx.dbafs();
        let sync_source = dbafs.should_be_synchronized(&self.path);
        let sync_target = dbafs.should_be_synchronized(&new_path);
        let synced = match (sync_source, sync_target) {
            (true, true) => dbafs.copy_resource(&self.path, &new_path).map(drop),
            (false, true) => dbafs.add_resource(&new_path).map(drop),
            _ => Ok(()),
        };
        if let Err(e) = synced {
            tracing::warn!("cannot index copy {}: {e}", new_path);
        }
        Ok(())
    }

    /// Resizes the image in place and returns its URL.
    ///
    /// Returns `Ok(None)` for non-images without calling the resizer.
    pub fn resize_to(
        &mut self,
        width: u32,
        height: u32,
        mode: ResizeMode,
    ) -> CoreResult<Option<String>> {
        if !self.is_image() {
            return Ok(None);
        }

        let url = self.ctx.resizer().resize(
            &self.abs_path(),
            Path::new(&self.path),
            width,
            height,
            mode,
        )?;
        if url.is_some() {
            self.parts = None;
            self.image_size = None;
            self.view_size = None;
        }
        Ok(url)
    }

    /// Builds an attachment response for this file. `filename` defaults to
    /// the basename.
    pub fn send_to_browser(&mut self, filename: Option<&str>) -> CoreResult<BinaryResponse> {
        let length = self.size()?;
        let name = match filename {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.basename().to_string(),
        };
        let mime = self.mime();
        Ok(BinaryResponse::attachment(self.abs_path(), name, mime, length))
    }

    /// The index record of this file, if the path is synchronized.
    pub fn get_model(&mut self) -> CoreResult<Option<DbafsRecord>> {
        if let Some(model) = &self.model {
            return Ok(model.clone());
        }
        let model = if self.ctx.dbafs().should_be_synchronized(&self.path) {
            self.ctx.dbafs().find_by_path(&self.path)?
        } else {
            None
        };
        self.model = Some(model.clone());
        Ok(model)
    }

    /// The content, read from the pending write if there is one. A single
    /// leading byte-order mark is removed.
    pub fn get_content(&self) -> CoreResult<Vec<u8>> {
        let source = match &self.pending {
            Some(temp) => temp.path().to_path_buf(),
            None => self.abs_path(),
        };
        let content =
            std::fs::read(&source).map_err(|e| CoreError::from_io(Path::new(&self.path), e))?;
        Ok(strip_bom(&content).to_vec())
    }

    /// [`File::get_content`] as text, replacing invalid UTF-8.
    pub fn get_content_string(&self) -> CoreResult<String> {
        Ok(String::from_utf8_lossy(&self.get_content()?).into_owned())
    }

    /// The content split into lines. `\r\n`, `\n` and a lone `\r` all end a
    /// line and are not part of it.
    pub fn get_content_as_array(&self) -> CoreResult<Vec<String>> {
        let content = self
            .get_content_string()?
            .replace("\r\n", "\n")
            .replace('\r', "\n");
        Ok(content.lines().map(str::to_string).collect())
    }

    fn metadata(&self) -> CoreResult<std::fs::Metadata> {
        std::fs::metadata(self.abs_path()).map_err(|e| CoreError::from_io(Path::new(&self.path), e))
    }

    fn fputs(&mut self, content: &[u8], mode: WriteMode) -> CoreResult<()> {
        let temp = match self.pending.take() {
            Some(temp) => temp,
            None => self.open_temp(mode)?,
        };
        let temp = self.pending.insert(temp);
        temp.as_file_mut().write_all(content)?;
        Ok(())
    }

    fn open_temp(&self, mode: WriteMode) -> CoreResult<NamedTempFile> {
        let files = self.ctx.files();
        let mut temp = files.create_temp(self.ctx.temp_dir())?;
        if mode == WriteMode::Append && self.exists() {
            files.copy(Path::new(&self.path), temp.path())?;
            temp.as_file_mut().seek(SeekFrom::End(0))?;
        }
        Ok(temp)
    }

    fn rewind_pending(&mut self) -> CoreResult<()> {
        if let Some(temp) = self.pending.as_mut() {
            let file = temp.as_file_mut();
            file.set_len(0)?;
            file.rewind()?;
        }
        Ok(())
    }

    fn ensure_parent_dir(&self, path: &str) -> CoreResult<()> {
        match Path::new(path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                if !self.ctx.root().join(parent).is_dir() {
                    self.ctx.files().mkdir_all(parent)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!("discarded uncommitted write to {}", self.path);
        }
    }
}

/// Removes one leading UTF-8, UTF-16LE or UTF-16BE byte-order mark, checked
/// in that order.
pub fn strip_bom(content: &[u8]) -> &[u8] {
    [BOM_UTF8, BOM_UTF16_LE, BOM_UTF16_BE]
        .iter()
        .find_map(|bom| content.strip_prefix(*bom))
        .unwrap_or(content)
}

fn normalize_path(path: &str) -> CoreResult<String> {
    let path = crate::nfc_string(&path.replace('\\', "/"));
    let path = path.trim_matches('/');
    if path.is_empty() || path.split('/').any(|s| s == "..") {
        return Err(CoreError::InvalidName(path.to_string()));
    }
    Ok(path.to_string())
}
