use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::SharedStore;
use crate::error::WidgetError;

const LOCK_WAIT: Duration = Duration::from_secs(2);
const LOCK_RETRY: Duration = Duration::from_millis(5);
/// A lock file older than this was left by a process that died mid-write.
const LOCK_STALE: Duration = Duration::from_secs(10);

/// JSON-file store shared by every process that opens the same path.
///
/// The file is the only copy: reads go to disk, and each write is a
/// read-modify-write under a lock file, so keys another process wrote in the
/// meantime are kept.
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WidgetError> {
        let path = path.into();
        let keys = read_map(&path)?.len();
        debug!(path = %path.display(), keys, "opened widget store");
        Ok(Self {
            lock_path: path.with_extension("json.lock"),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SharedStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        match read_map(&self.path) {
            Ok(mut map) => map.remove(key),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "widget store unreadable");
                None
            }
        }
    }

    fn with_mut(&self, f: &mut dyn FnMut(&mut Map<String, Value>)) -> Result<(), WidgetError> {
        let _lock = FileLock::acquire(&self.lock_path)?;
        let mut map = read_map(&self.path)?;
        f(&mut map);
        let bytes = serde_json::to_vec_pretty(&map)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn read_map(path: &Path) -> Result<Map<String, Value>, WidgetError> {
    match fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
        Err(e) => Err(e.into()),
    }
}

/// Exclusive lock held by creating `path`; released (removed) on drop.
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, WidgetError> {
        let deadline = Instant::now() + LOCK_WAIT;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => {
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(path) {
                        warn!(path = %path.display(), "removing stale store lock");
                        let _ = fs::remove_file(path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(WidgetError::StoreWrite(format!(
                            "store lock busy at {}",
                            path.display()
                        )));
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| SystemTime::now().duration_since(t).ok())
        .is_some_and(|age| age > LOCK_STALE)
}
