//! Filesystem-backed local store.
//!
//! Each key is a file in the data directory:
//! ```text
//! <DATA_DIR>/
//!   nutrisync.appState
//!   nutrisync.selectedDate
//!   ...
//! ```
//!
//! Several processes may open the same directory. A subscriber starts a
//! filesystem watcher on the directory and hears about any file whose
//! contents changed without going through this handle.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;

use super::{
    next_origin, ExternalWrites, LocalStore, StoreError, StoreEvent, EXTERNAL_ORIGIN,
};

const EVENT_CAPACITY: usize = 64;

type Fingerprints = HashMap<String, [u8; 32]>;

/// A running directory watcher and the channel it feeds.
struct DirWatch {
    sender: broadcast::Sender<StoreEvent>,
    _watcher: RecommendedWatcher,
}

/// Local store persisting one file per key.
pub struct FileLocalStore {
    data_dir: PathBuf,
    origin: u64,
    /// Last known content hash per key, updated by our own writes and by the
    /// watcher. Holding this lock serializes writes with watcher reads, so
    /// the watcher never mistakes one of our writes for a foreign one.
    known: Arc<Mutex<Fingerprints>>,
    watch: Mutex<Option<DirWatch>>,
}

impl FileLocalStore {
    /// Creates a store rooted at `data_dir`. The directory is created on the
    /// first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            origin: next_origin(),
            known: Arc::new(Mutex::new(HashMap::new())),
            watch: Mutex::new(None),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Rejects keys that would escape the data directory.
    fn validate_key(key: &str) -> Result<(), StoreError> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
            || key.starts_with('.')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn path(&self, key: &str) -> PathBuf {
        self.data_dir.join(key)
    }

    fn known(&self) -> MutexGuard<'_, Fingerprints> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, key: &str, value: Option<String>) {
        let watch = self.watch.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(watch) = watch.as_ref() {
            let _ = watch.sender.send(StoreEvent {
                origin: self.origin,
                key: key.to_string(),
                value,
            });
        }
    }

    /// Subscribes to the directory watcher, starting it if needed.
    fn watch(&self) -> Result<broadcast::Receiver<StoreEvent>, StoreError> {
        let mut watch = self.watch.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(watch) = watch.as_ref() {
            return Ok(watch.sender.subscribe());
        }

        fs::create_dir_all(&self.data_dir).map_err(|e| StoreError::Io {
            path: self.data_dir.clone(),
            source: e,
        })?;
        {
            // Baseline so files that already exist are not reported as changes.
            let mut known = self.known();
            for (key, bytes) in read_dir_files(&self.data_dir) {
                known.insert(key, fingerprint(&bytes));
            }
        }

        let (sender, receiver) = broadcast::channel(EVENT_CAPACITY);
        let handler_known = Arc::clone(&self.known);
        let handler_sender = sender.clone();
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for (key, value) in observe(&handler_known, &event) {
                    tracing::debug!(key = %key, "external write detected");
                    let _ = handler_sender.send(StoreEvent {
                        origin: EXTERNAL_ORIGIN,
                        key,
                        value,
                    });
                }
            }
            Err(e) => tracing::warn!(error = %e, "local store watcher error"),
        };
        let mut watcher = notify::recommended_watcher(handler)
            .map_err(|e| StoreError::Unavailable(format!("cannot watch data dir: {}", e)))?;
        watcher
            .watch(&self.data_dir, RecursiveMode::NonRecursive)
            .map_err(|e| StoreError::Unavailable(format!("cannot watch data dir: {}", e)))?;

        tracing::debug!(dir = %self.data_dir.display(), "watching local store");
        *watch = Some(DirWatch {
            sender,
            _watcher: watcher,
        });
        Ok(receiver)
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Self::validate_key(key)?;
        let path = self.path(key);

        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Self::validate_key(key)?;

        {
            let mut known = self.known();

            fs::create_dir_all(&self.data_dir).map_err(|e| StoreError::Io {
                path: self.data_dir.clone(),
                source: e,
            })?;

            // Write then rename so readers never see a half-written file.
            let path = self.path(key);
            let tmp = self.data_dir.join(format!(".{}.tmp", key));
            fs::write(&tmp, value).map_err(|e| StoreError::Io {
                path: tmp.clone(),
                source: e,
            })?;
            fs::rename(&tmp, &path).map_err(|e| StoreError::Io { path, source: e })?;

            known.insert(key.to_string(), fingerprint(value.as_bytes()));
        }

        self.publish(key, Some(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        Self::validate_key(key)?;

        let removed = {
            let mut known = self.known();
            let path = self.path(key);
            match fs::remove_file(&path) {
                Ok(()) => {
                    known.remove(key);
                    true
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                Err(e) => return Err(StoreError::Io { path, source: e }),
            }
        };

        if removed {
            self.publish(key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> ExternalWrites {
        match self.watch() {
            Ok(receiver) => ExternalWrites::new(self.origin, receiver),
            Err(e) => {
                tracing::warn!(error = %e, "external writes will not be observed");
                // Closed channel: the subscriber sees end of stream.
                let (_, rx) = broadcast::channel(1);
                ExternalWrites::new(self.origin, rx)
            }
        }
    }
}

fn fingerprint(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Reads every key file in `dir`, skipping temporaries.
fn read_dir_files(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let key = entry.file_name().into_string().ok()?;
            if key.starts_with('.') {
                return None;
            }
            let bytes = fs::read(entry.path()).ok()?;
            Some((key, bytes))
        })
        .collect()
}

/// Turns a filesystem event into the key changes it represents, updating
/// `known`. Files whose contents match the last known fingerprint were
/// written by this handle (or are unchanged) and are skipped.
fn observe(known: &Mutex<Fingerprints>, event: &Event) -> Vec<(String, Option<String>)> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }

    let mut known = known.lock().unwrap_or_else(PoisonError::into_inner);
    let mut changes = Vec::new();

    for path in &event.paths {
        let Some(key) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if key.starts_with('.') {
            continue;
        }

        match fs::read(path) {
            Ok(bytes) => {
                let digest = fingerprint(&bytes);
                if known.get(key) == Some(&digest) {
                    continue;
                }
                known.insert(key.to_string(), digest);
                changes.push((
                    key.to_string(),
                    Some(String::from_utf8_lossy(&bytes).into_owned()),
                ));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if known.remove(key).is_some() {
                    changes.push((key.to_string(), None));
                }
            }
            Err(e) => {
                tracing::debug!(key, error = %e, "cannot read changed file");
            }
        }
    }

    changes
}
