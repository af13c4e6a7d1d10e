//! Persisted key-value state: named fields flushed together as one blob.

pub mod file;
pub mod memory;

pub use file::{FileStateStorage, StateStorageConfig};
pub use memory::InMemoryStateStorage;

use serde_json::Value;
use thiserror::Error;

use crate::types::CustomerWithToken;

/// Field under which the session unit is persisted.
pub const SESSION_FIELD: &str = "customer";

/// Storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Unsupported state file version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Staged field storage.
///
/// `set_field` and `remove_field` only stage; nothing is durable until
/// `save_state` flushes every staged field at once.
pub trait StateStorage: Send + Sync {
    fn get_field(&self, name: &str) -> Result<Option<Value>, StorageError>;
    fn set_field(&self, name: &str, value: Value) -> Result<(), StorageError>;
    fn remove_field(&self, name: &str) -> Result<(), StorageError>;
    fn save_state(&self) -> Result<(), StorageError>;
}

/// Read the persisted session, if any.
pub fn load_session(storage: &dyn StateStorage) -> Result<Option<CustomerWithToken>, StorageError> {
    match storage.get_field(SESSION_FIELD)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

/// Stage and flush the session.
pub fn store_session(storage: &dyn StateStorage, session: &CustomerWithToken) -> Result<(), StorageError> {
    storage.set_field(SESSION_FIELD, serde_json::to_value(session)?)?;
    storage.save_state()
}

/// Remove the persisted session entry.
pub fn clear_session(storage: &dyn StateStorage) -> Result<(), StorageError> {
    storage.remove_field(SESSION_FIELD)?;
    storage.save_state()
}
