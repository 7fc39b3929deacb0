//! Services shared by every [`crate::File`].
//!
//! A [`FileContext`] is built once (from a [`Config`] or by hand in tests)
//! and handed to file handles as an `Arc`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::settings::Config;
use crate::dbafs::{Dbafs, JsonDbafs, NoDbafs};
use crate::fs::files::{Files, LocalFiles};
use crate::image::{
    DefaultImageProbe, DefaultImageResizer, ImageProbe, ImageResizer, ImageSizeCache,
};
use crate::mime::MimeTable;

/// Collaborators and settings a file handle needs.
pub struct FileContext {
    root: PathBuf,
    temp_dir: PathBuf,
    file_mode: Option<u32>,
    files: Arc<dyn Files>,
    dbafs: Arc<dyn Dbafs>,
    probe: Arc<dyn ImageProbe>,
    resizer: Arc<dyn ImageResizer>,
    image_sizes: Arc<ImageSizeCache>,
    mime: MimeTable,
}

impl FileContext {
    /// Starts a context rooted at `root` with local files, no index and the
    /// default image services.
    pub fn builder(root: impl Into<PathBuf>) -> FileContextBuilder {
        let root = root.into();
        FileContextBuilder {
            files: Arc::new(LocalFiles::new(root.clone())),
            root,
            temp_dir: PathBuf::from("system/tmp"),
            file_mode: Some(0o644),
            dbafs: Arc::new(NoDbafs),
            probe: Arc::new(DefaultImageProbe),
            resizer: Arc::new(DefaultImageResizer),
            image_sizes: Arc::new(ImageSizeCache::new()),
            mime: MimeTable::default(),
        }
    }

    /// Builds a context from configuration, opening the JSON file index when
    /// synchronization is enabled.
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::builder(config.files.root_dir.clone())
            .temp_dir(&config.files.temp_dir)
            .file_mode(config.files.file_mode)
            .mime(MimeTable::with_overrides(config.mime.clone()));
        if config.sync.enabled {
            builder = builder.dbafs(Arc::new(JsonDbafs::from_config(config)));
        }
        builder.build()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn file_mode(&self) -> Option<u32> {
        self.file_mode
    }

    pub fn files(&self) -> &dyn Files {
        self.files.as_ref()
    }

    pub fn dbafs(&self) -> &dyn Dbafs {
        self.dbafs.as_ref()
    }

    pub fn probe(&self) -> &dyn ImageProbe {
        self.probe.as_ref()
    }

    pub fn resizer(&self) -> &dyn ImageResizer {
        self.resizer.as_ref()
    }

    pub fn image_sizes(&self) -> &ImageSizeCache {
        &self.image_sizes
    }

    pub fn mime(&self) -> &MimeTable {
        &self.mime
    }
}

impl std::fmt::Debug for FileContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileContext")
            .field("root", &self.root)
            .field("temp_dir", &self.temp_dir)
            .field("file_mode", &self.file_mode)
            .field("cached_image_sizes", &self.image_sizes.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`FileContext`]; every collaborator can be swapped.
pub struct FileContextBuilder {
    root: PathBuf,
    temp_dir: PathBuf,
    file_mode: Option<u32>,
    files: Arc<dyn Files>,
    dbafs: Arc<dyn Dbafs>,
    probe: Arc<dyn ImageProbe>,
    resizer: Arc<dyn ImageResizer>,
    image_sizes: Arc<ImageSizeCache>,
    mime: MimeTable,
}

impl FileContextBuilder {
    /// Scratch directory for pending writes, relative to the root.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn file_mode(mut self, mode: Option<u32>) -> Self {
        self.file_mode = mode;
        self
    }

    pub fn files(mut self, files: Arc<dyn Files>) -> Self {
        self.files = files;
        self
    }

    pub fn dbafs(mut self, dbafs: Arc<dyn Dbafs>) -> Self {
        self.dbafs = dbafs;
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ImageProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn resizer(mut self, resizer: Arc<dyn ImageResizer>) -> Self {
        self.resizer = resizer;
        self
    }

    /// Shares an existing cache, e.g. between contexts with the same root.
    pub fn image_sizes(mut self, cache: Arc<ImageSizeCache>) -> Self {
        self.image_sizes = cache;
        self
    }

    pub fn mime(mut self, mime: MimeTable) -> Self {
        self.mime = mime;
        self
    }

    pub fn build(self) -> FileContext {
        FileContext {
            root: self.root,
            temp_dir: self.temp_dir,
            file_mode: self.file_mode,
            files: self.files,
            dbafs: self.dbafs,
            probe: self.probe,
            resizer: self.resizer,
            image_sizes: self.image_sizes,
            mime: self.mime,
        }
    }
}
