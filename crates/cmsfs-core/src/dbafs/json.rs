//! JSON-persisted file index.
//!
//! The index is loaded once on [`JsonDbafs::open`] and written back after
//! every mutation. Writes go through a temporary file in the index directory
//! so a crash never leaves a truncated index behind.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{Dbafs, DbafsRecord, ResourceKind};
use crate::config::settings::Config;
use crate::error::{CoreError, CoreResult};
use crate::fs::hash::{md5_bytes, md5_file};

/// Marker file that excludes a folder (and everything below it).
pub const NOSYNC_MARKER: &str = ".nosync";

type Records = BTreeMap<String, DbafsRecord>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    records: Vec<DbafsRecord>,
}

/// [`Dbafs`] stored as a JSON file.
#[derive(Debug)]
pub struct JsonDbafs {
    root: PathBuf,
    index_path: PathBuf,
    upload_path: String,
    excluded_folders: Vec<String>,
    records: Mutex<Records>,
}

impl JsonDbafs {
    /// Opens the index at `index_path` (relative to `root`). A missing or
    /// unreadable index starts empty.
    pub fn open(
        root: impl Into<PathBuf>,
        index_path: impl AsRef<Path>,
        upload_path: &str,
        excluded_folders: Vec<String>,
    ) -> Self {
        let root = root.into();
        let index_path = root.join(index_path);
        let records = load(&index_path);
        tracing::debug!(
            "opened file index {} ({} records)",
            index_path.display(),
            records.len()
        );
        Self {
            root,
            index_path,
            upload_path: normalize(upload_path),
            excluded_folders,
            records: Mutex::new(records),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::open(
            config.files.root_dir.clone(),
            &config.sync.index_path,
            &config.files.upload_path,
            config.sync.excluded_folders.clone(),
        )
    }

    /// Snapshot of every record, ordered by path.
    pub fn records(&self) -> Vec<DbafsRecord> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn save(&self, records: &Records) -> CoreResult<()> {
        let dir = self.index_path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| CoreError::from_io(dir, e))?;

        let index = IndexFile {
            records: records.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&index)
            .map_err(|e| CoreError::Sync(format!("serialize index: {e}")))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.persist(&self.index_path)
            .map_err(|e| CoreError::from_io(&self.index_path, e.error))?;
        Ok(())
    }

    /// Inserts or refreshes the record for `path`, creating parent folders.
    fn upsert(&self, records: &mut Records, path: &str) -> CoreResult<DbafsRecord> {
        let abs = self.root.join(path);
        let meta = std::fs::metadata(&abs).map_err(|e| CoreError::from_io(Path::new(path), e))?;
        let pid = self.ensure_parents(records, path)?;

        let kind = if meta.is_dir() {
            ResourceKind::Folder
        } else {
            ResourceKind::File
        };
        let hash = match kind {
            ResourceKind::File => md5_file(&abs)?,
            ResourceKind::Folder => folder_hash(records, path),
        };
        let uuid = records
            .get(path)
            .map(|r| r.uuid.clone())
            .unwrap_or_else(new_uuid);

        let record = new_record(uuid, pid, kind, path, hash);
        records.insert(path.to_string(), record.clone());
        Ok(record)
    }

    /// Makes sure every folder between the upload path and `path` has a
    /// record. Returns the uuid of the direct parent, if it has one.
    fn ensure_parents(&self, records: &mut Records, path: &str) -> CoreResult<Option<String>> {
        let Some(parent) = parent_of(path) else {
            return Ok(None);
        };
        if parent == self.upload_path || !parent.starts_with(&self.upload_path) {
            return Ok(None);
        }
        if let Some(existing) = records.get(parent) {
            return Ok(Some(existing.uuid.clone()));
        }

        let pid = self.ensure_parents(records, parent)?;
        let record = new_record(new_uuid(), pid, ResourceKind::Folder, parent, String::new());
        let uuid = record.uuid.clone();
        tracing::debug!("indexed folder {parent}");
        records.insert(parent.to_string(), record);
        Ok(Some(uuid))
    }

    /// Recomputes folder hashes from the parent of `path` up to the upload
    /// path.
    fn update_folder_hashes(&self, records: &mut Records, path: &str) {
        let mut current = parent_of(path);
        while let Some(folder) = current {
            if folder == self.upload_path || !folder.starts_with(&self.upload_path) {
                break;
            }
            let hash = folder_hash(records, folder);
            if let Some(record) = records.get_mut(folder) {
                record.hash = hash;
            }
            current = parent_of(folder);
        }
    }

    fn is_excluded_by_marker(&self, path: &str) -> bool {
        let mut dir = PathBuf::from(&self.upload_path);
        if self.root.join(&dir).join(NOSYNC_MARKER).exists() {
            return true;
        }

        let rest = path[self.upload_path.len()..].trim_start_matches('/');
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let (last, ancestors) = match segments.split_last() {
            Some(split) => split,
            None => return false,
        };
        for segment in ancestors {
            dir.push(segment);
            if self.root.join(&dir).join(NOSYNC_MARKER).exists() {
                return true;
            }
        }

        dir.push(last);
        let abs = self.root.join(&dir);
        abs.is_dir() && abs.join(NOSYNC_MARKER).exists()
    }
}

impl Dbafs for JsonDbafs {
    fn should_be_synchronized(&self, path: &str) -> bool {
        let path = normalize(path);
        if path.split('/').any(|s| s == ".." || s == ".") {
            return false;
        }
        let under_upload = path
            .strip_prefix(&self.upload_path)
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1);
        if !under_upload {
            return false;
        }
        if path
            .split('/')
            .any(|s| self.excluded_folders.iter().any(|ex| ex == s))
        {
            return false;
        }
        !self.is_excluded_by_marker(&path)
    }

    fn add_resource(&self, path: &str) -> CoreResult<DbafsRecord> {
        let path = normalize(path);
        let mut records = self.lock();
        let record = self.upsert(&mut records, &path)?;
        self.update_folder_hashes(&mut records, &path);
        self.save(&records)?;
        tracing::debug!("indexed {path}");
        Ok(record)
    }

    fn delete_resource(&self, path: &str) -> CoreResult<()> {
        let path = normalize(path);
        let prefix = format!("{path}/");
        let mut records = self.lock();

        let before = records.len();
        records.retain(|key, _| *key != path && !key.starts_with(&prefix));
        let removed = before - records.len();

        self.update_folder_hashes(&mut records, &path);
        self.save(&records)?;
        tracing::debug!("removed {path} from index ({removed} records)");
        Ok(())
    }

    fn move_resource(&self, from: &str, to: &str) -> CoreResult<DbafsRecord> {
        let (from, to) = (normalize(from), normalize(to));
        let mut records = self.lock();

        let Some(mut record) = records.remove(&from) else {
            let record = self.upsert(&mut records, &to)?;
            self.update_folder_hashes(&mut records, &to);
            self.save(&records)?;
            return Ok(record);
        };

        record.pid = self.ensure_parents(&mut records, &to)?;
        record.path = to.clone();
        record.name = name_of(&to).to_string();
        record.extension = extension_of(&to, record.kind);
        records.insert(to.clone(), record.clone());

        let prefix = format!("{from}/");
        let children: Vec<String> = records
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        for old_key in children {
            if let Some(mut child) = records.remove(&old_key) {
                let new_key = format!("{to}/{}", &old_key[prefix.len()..]);
                child.path = new_key.clone();
                records.insert(new_key, child);
            }
        }

        self.update_folder_hashes(&mut records, &from);
        self.update_folder_hashes(&mut records, &to);
        self.save(&records)?;
        tracing::debug!("moved {from} to {to} in index");
        Ok(record)
    }

    fn copy_resource(&self, from: &str, to: &str) -> CoreResult<DbafsRecord> {
        let (from, to) = (normalize(from), normalize(to));
        let mut records = self.lock();

        let Some(source) = records.get(&from).cloned() else {
            let record = self.upsert(&mut records, &to)?;
            self.update_folder_hashes(&mut records, &to);
            self.save(&records)?;
            return Ok(record);
        };

        let mut uuids: HashMap<String, String> = HashMap::new();
        let mut copy = source.clone();
        copy.uuid = new_uuid();
        copy.pid = self.ensure_parents(&mut records, &to)?;
        copy.path = to.clone();
        copy.name = name_of(&to).to_string();
        copy.extension = extension_of(&to, copy.kind);
        copy.tstamp = now();
        uuids.insert(source.uuid.clone(), copy.uuid.clone());

        // BTreeMap order visits parents before their children.
        let prefix = format!("{from}/");
        let children: Vec<DbafsRecord> = records
            .values()
            .filter(|r| r.path.starts_with(&prefix))
            .cloned()
            .collect();
        records.insert(to.clone(), copy.clone());
        for child in children {
            let mut dup = child.clone();
            dup.uuid = new_uuid();
            dup.pid = child.pid.as_ref().and_then(|p| uuids.get(p).cloned());
            dup.path = format!("{to}/{}", &child.path[prefix.len()..]);
            dup.tstamp = copy.tstamp;
            uuids.insert(child.uuid, dup.uuid.clone());
            records.insert(dup.path.clone(), dup);
        }

        self.update_folder_hashes(&mut records, &to);
        self.save(&records)?;
        tracing::debug!("copied {from} to {to} in index");
        Ok(copy)
    }

    fn find_by_path(&self, path: &str) -> CoreResult<Option<DbafsRecord>> {
        Ok(self.lock().get(&normalize(path)).cloned())
    }
}

fn load(path: &Path) -> Records {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Records::new(),
    };
    match serde_json::from_str::<IndexFile>(&contents) {
        Ok(index) => index
            .records
            .into_iter()
            .map(|r| (r.path.clone(), r))
            .collect(),
        Err(e) => {
            tracing::warn!("ignoring unreadable file index {}: {e}", path.display());
            Records::new()
        }
    }
}

fn new_record(
    uuid: String,
    pid: Option<String>,
    kind: ResourceKind,
    path: &str,
    hash: String,
) -> DbafsRecord {
    DbafsRecord {
        uuid,
        pid,
        tstamp: now(),
        kind,
        path: path.to_string(),
        name: name_of(path).to_string(),
        extension: extension_of(path, kind),
        hash,
    }
}

/// MD5 over the `name:hash` lines of a folder's direct children.
fn folder_hash(records: &Records, folder: &str) -> String {
    let prefix = format!("{folder}/");
    let mut listing = String::new();
    for record in records.values() {
        if let Some(rest) = record.path.strip_prefix(&prefix) {
            if !rest.contains('/') {
                listing.push_str(&record.name);
                listing.push(':');
                listing.push_str(&record.hash);
                listing.push('\n');
            }
        }
    }
    md5_bytes(listing.as_bytes())
}

fn normalize(path: &str) -> String {
    crate::nfc_string(&path.replace('\\', "/"))
        .trim_matches('/')
        .to_string()
}

fn parent_of(path: &str) -> Option<&str> {
    path.rfind('/').map(|i| &path[..i])
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn extension_of(path: &str, kind: ResourceKind) -> String {
    if kind == ResourceKind::Folder {
        return String::new();
    }
    let name = name_of(path);
    match name.rfind('.') {
        Some(i) if i > 0 => name[i + 1..].to_lowercase(),
        _ => String::new(),
    }
}

fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
