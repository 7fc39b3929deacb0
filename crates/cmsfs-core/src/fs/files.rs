//! Filesystem service used by [`crate::File`].
//!
//! Every mutation a file handle performs goes through a [`Files`]
//! implementation instead of calling `std::fs` directly. Paths are relative
//! to the service root; absolute paths are used as given.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{CoreError, CoreResult};

/// Filesystem primitives resolved against a root directory.
pub trait Files: Send + Sync {
    /// The directory relative paths are resolved against.
    fn root(&self) -> &Path;

    /// Resolves `path` against [`Files::root`].
    fn resolve(&self, path: &Path) -> PathBuf {
        self.root().join(path)
    }

    /// Creates an empty temporary file with a random name inside `dir`.
    fn create_temp(&self, dir: &Path) -> CoreResult<NamedTempFile>;

    /// Renames `from` to `to`, replacing `to` if it exists.
    fn rename(&self, from: &Path, to: &Path) -> CoreResult<()>;

    /// Copies the file `from` to `to` and returns the number of bytes copied.
    fn copy(&self, from: &Path, to: &Path) -> CoreResult<u64>;

    /// Deletes a single file.
    fn delete(&self, path: &Path) -> CoreResult<()>;

    /// Sets permission bits. A no-op where the platform has none.
    fn chmod(&self, path: &Path, mode: u32) -> CoreResult<()>;

    /// Creates `path` and all missing ancestors.
    fn mkdir_all(&self, path: &Path) -> CoreResult<()>;
}

/// [`Files`] backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFiles {
    root: PathBuf,
}

impl LocalFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Files for LocalFiles {
    fn root(&self) -> &Path {
        &self.root
    }

    fn create_temp(&self, dir: &Path) -> CoreResult<NamedTempFile> {
        let dir = self.resolve(dir);
        std::fs::create_dir_all(&dir).map_err(|e| CoreError::from_io(&dir, e))?;
        let temp = tempfile::Builder::new()
            .prefix("cmsfs-")
            .tempfile_in(&dir)
            .map_err(|e| CoreError::from_io(&dir, e))?;
        tracing::debug!("created temp file {}", temp.path().display());
        Ok(temp)
    }

    fn rename(&self, from: &Path, to: &Path) -> CoreResult<()> {
        let src = self.resolve(from);
        let dest = self.resolve(to);
        // A dangling symlink is still renamed.
        if std::fs::symlink_metadata(&src).is_err() {
            return Err(CoreError::NotFound(from.to_path_buf()));
        }
        std::fs::rename(&src, &dest).map_err(|e| CoreError::from_io(to, e))?;
        tracing::debug!("renamed {} to {}", from.display(), to.display());
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> CoreResult<u64> {
        let src = self.resolve(from);
        let dest = self.resolve(to);
        let meta = std::fs::metadata(&src).map_err(|e| CoreError::from_io(from, e))?;
        if meta.is_dir() {
            return Err(CoreError::IsADirectory(from.to_path_buf()));
        }
        let copied = std::fs::copy(&src, &dest).map_err(|e| CoreError::from_io(to, e))?;
        tracing::debug!("copied {} to {} ({copied} bytes)", from.display(), to.display());
        Ok(copied)
    }

    fn delete(&self, path: &Path) -> CoreResult<()> {
        let target = self.resolve(path);
        // Symlinks are removed, not followed.
        std::fs::remove_file(&target).map_err(|e| CoreError::from_io(path, e))?;
        tracing::debug!("deleted {}", path.display());
        Ok(())
    }

    fn chmod(&self, path: &Path, mode: u32) -> CoreResult<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let target = self.resolve(path);
            std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode))
                .map_err(|e| CoreError::from_io(path, e))?;
        }
        #[cfg(not(unix))]
        let _ = (path, mode);
        Ok(())
    }

    fn mkdir_all(&self, path: &Path) -> CoreResult<()> {
        let target = self.resolve(path);
        std::fs::create_dir_all(&target).map_err(|e| CoreError::from_io(path, e))
    }
}
