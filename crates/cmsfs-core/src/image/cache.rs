//! Image size cache keyed by path and modification time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use super::probe::ImageSize;

type CacheKey = (PathBuf, SystemTime);

/// Remembers resolved image sizes, including "no size" results.
///
/// The cache is explicitly unbounded: an entry is never evicted, and a
/// changed file simply produces a new key through its new mtime. Share one
/// instance per [`crate::FileContext`].
#[derive(Debug, Default)]
pub struct ImageSizeCache {
    entries: Mutex<HashMap<CacheKey, Option<ImageSize>>>,
}

impl ImageSizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(result)` on a hit, where `result` may itself be `None`
    /// for files known to have no usable size.
    pub fn get(&self, path: &Path, mtime: SystemTime) -> Option<Option<ImageSize>> {
        self.lock().get(&(path.to_path_buf(), mtime)).copied()
    }

    pub fn insert(&self, path: &Path, mtime: SystemTime, size: Option<ImageSize>) {
        self.lock().insert((path.to_path_buf(), mtime), size);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Option<ImageSize>>> {
        // Poisoning is ignored: no code path panics while the map is inconsistent.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn miss_then_hit() {
        let cache = ImageSizeCache::new();
        let mtime = UNIX_EPOCH + Duration::from_secs(100);

        assert_eq!(cache.get(Path::new("files/a.png"), mtime), None);

        cache.insert(Path::new("files/a.png"), mtime, Some(ImageSize::new(4, 2)));

        assert_eq!(
            cache.get(Path::new("files/a.png"), mtime),
            Some(Some(ImageSize::new(4, 2)))
        );
    }

    #[test]
    fn negative_results_are_cached() {
        let cache = ImageSizeCache::new();
        cache.insert(Path::new("files/a.svg"), UNIX_EPOCH, None);

        assert_eq!(cache.get(Path::new("files/a.svg"), UNIX_EPOCH), Some(None));
    }

    #[test]
    fn new_mtime_is_a_new_key() {
        let cache = ImageSizeCache::new();
        let old = UNIX_EPOCH + Duration::from_secs(1);
        let new = UNIX_EPOCH + Duration::from_secs(2);
        cache.insert(Path::new("files/a.png"), old, Some(ImageSize::new(1, 1)));

        assert_eq!(cache.get(Path::new("files/a.png"), new), None);

        cache.insert(Path::new("files/a.png"), new, Some(ImageSize::new(2, 2)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_empties_cache() {
        let cache = ImageSizeCache::new();
        cache.insert(Path::new("a.png"), UNIX_EPOCH, None);
        assert!(!cache.is_empty());

        cache.clear();

        assert!(cache.is_empty());
    }
}
