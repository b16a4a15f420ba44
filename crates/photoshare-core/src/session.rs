//! Session store: the signed-in identity and its enrollment flag.
//!
//! The identity lives in memory and in a pluggable key-value store so it
//! survives restarts. `save()` writes the durable copy before memory;
//! `mark_enrolled()` updates memory even when the durable write fails, and the
//! next `load()` sees whatever was last persisted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::types::Identity;

/// Key under which the identity record is persisted.
pub const IDENTITY_KEY: &str = "user";

/// Durable string key-value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        // Write-then-rename: readers never see a half-written record.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Single source of truth for "signed in" and "has enrolled a face".
pub struct SessionStore<S> {
    backend: S,
    identity: Option<Identity>,
}

impl<S: KeyValueStore> SessionStore<S> {
    /// Wrap a backend without reading it. Call [`load`](Self::load) to restore.
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            identity: None,
        }
    }

    /// Restore the identity from durable storage.
    ///
    /// Missing, unreadable and corrupt records all yield `None`.
    pub fn load(&mut self) -> Option<&Identity> {
        self.identity = match self.backend.get(IDENTITY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding corrupt session record");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "session storage unreadable; starting signed out");
                None
            }
        };
        self.identity.as_ref()
    }

    /// Persist `identity`, replacing any previous one.
    pub fn save(&mut self, identity: Identity) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&identity)?;
        self.backend.set(IDENTITY_KEY, &raw)?;
        tracing::debug!(subject = %identity.subject_id, "session saved");
        self.identity = Some(identity);
        Ok(())
    }

    /// Forget the identity. Safe to call when already signed out.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.identity = None;
        self.backend.remove(IDENTITY_KEY)
    }

    /// Flip `has_enrolled_face` on.
    ///
    /// The in-memory copy is always updated. If the durable write fails the
    /// error is returned and the next `load()` sees the old durable value.
    pub fn mark_enrolled(&mut self) -> Result<(), StoreError> {
        let Some(identity) = self.identity.as_mut() else {
            return Ok(());
        };
        if identity.has_enrolled_face {
            return Ok(());
        }
        identity.has_enrolled_face = true;
        let raw = serde_json::to_string(&*identity)?;
        self.backend.set(IDENTITY_KEY, &raw)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    pub fn has_enrolled_face(&self) -> bool {
        self.identity.as_ref().is_some_and(|i| i.has_enrolled_face)
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }
}
