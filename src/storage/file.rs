use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{StateStorage, StorageError};

const STATE_FILE_VERSION: u32 = 1;

/// Configuration for file-backed state storage.
#[derive(Debug, Clone)]
pub struct StateStorageConfig {
    pub path: PathBuf,
}

impl StateStorageConfig {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `~/.storefront/state.json`.
    pub fn default_path() -> PathBuf {
        default_storefront_dir().join("state.json")
    }
}

/// JSON-file storage. Fields are staged in memory and the whole blob is
/// rewritten atomically on `save_state`.
///
/// # Example
/// ```no_run
/// use storefront_session::storage::{FileStateStorage, StateStorage, StateStorageConfig};
///
/// let storage = FileStateStorage::open(StateStorageConfig::new("/tmp/state.json".into()))?;
/// storage.set_field("customer", serde_json::Value::Null)?;
/// storage.save_state()?;
/// # Ok::<(), storefront_session::storage::StorageError>(())
/// ```
#[derive(Debug)]
pub struct FileStateStorage {
    path: PathBuf,
    fields: Mutex<BTreeMap<String, Value>>,
}

impl FileStateStorage {
    /// Open storage at the configured path, loading any existing blob.
    ///
    /// A missing file yields empty state.
    pub fn open(config: StateStorageConfig) -> Result<Self, StorageError> {
        let fields = read_state_file(&config.path)?;
        Ok(Self {
            path: config.path,
            fields: Mutex::new(fields),
        })
    }

    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(StateStorageConfig::new(StateStorageConfig::default_path()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.fields
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateStorage for FileStateStorage {
    fn get_field(&self, name: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.lock().get(name).cloned())
    }

    fn set_field(&self, name: &str, value: Value) -> Result<(), StorageError> {
        self.lock().insert(name.to_string(), value);
        Ok(())
    }

    fn remove_field(&self, name: &str) -> Result<(), StorageError> {
        self.lock().remove(name);
        Ok(())
    }

    fn save_state(&self) -> Result<(), StorageError> {
        let file = StateFile {
            version: STATE_FILE_VERSION,
            fields: self.lock().clone(),
        };
        let serialized = serde_json::to_vec_pretty(&file)?;
        write_state_file(&self.path, &serialized)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StateFile {
    version: u32,
    fields: BTreeMap<String, Value>,
}

fn read_state_file(path: &Path) -> Result<BTreeMap<String, Value>, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(err.into()),
    };
    let file: StateFile = serde_json::from_str(&raw)?;
    if file.version != STATE_FILE_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: file.version,
            expected: STATE_FILE_VERSION,
        });
    }
    Ok(file.fields)
}

fn default_storefront_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".storefront"))
        .unwrap_or_else(|| PathBuf::from(".storefront"))
}

/// Sibling temp file holding the next state blob. Removed on drop unless
/// it was renamed over the target.
struct PendingWrite {
    temp: PathBuf,
    committed: bool,
}

impl PendingWrite {
    fn stage(target: &Path, data: &[u8]) -> Result<Self, StorageError> {
        let file_name = target.file_name().ok_or_else(|| {
            StorageError::Io(format!("state path {} has no file name", target.display()))
        })?;
        let temp = target.with_file_name(format!(
            ".{}.pending-{}",
            file_name.to_string_lossy(),
            temp_suffix()
        ));

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&temp)?;

        let pending = Self {
            temp,
            committed: false,
        };
        file.write_all(data)?;
        file.sync_all()?;
        Ok(pending)
    }

    fn commit(mut self, target: &Path) -> Result<(), StorageError> {
        fs::rename(&self.temp, target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

fn temp_suffix() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!(
        "{}-{nanos}-{}",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Replace `path` with `data` in one rename, creating parent directories.
fn write_state_file(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    PendingWrite::stage(path, data)?.commit(path)
}
