//! Durable, origin-scoped string key-value storage.
//!
//! This is the contract fallback snapshots and persisted alert state are
//! written through. It is deliberately synchronous and string-typed,
//! mirroring the simple storage primitive the consuming environment
//! provides.

use parking_lot::RwLock;
use spintrack_core::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// Synchronous string key-value storage that survives reloads.
pub trait DurableStorage: Send + Sync {
    fn get(&self, storage_key: &str) -> Option<String>;
    fn set(&self, storage_key: &str, value: &str) -> Result<()>;
    fn remove(&self, storage_key: &str);
    /// Keys currently present, for sweep-style cleanup.
    fn keys(&self) -> Vec<String>;
}

/// Process-local storage for tests and ephemeral embedders.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, storage_key: &str) -> Option<String> {
        self.entries.read().get(storage_key).cloned()
    }

    fn set(&self, storage_key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(storage_key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, storage_key: &str) {
        self.entries.write().remove(storage_key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

/// File-backed storage: one file per storage key under a directory.
///
/// Writes go through a temp file rename so a crash mid-write never leaves a
/// torn record. Storage keys are percent-free identifiers; anything outside
/// `[A-Za-z0-9._-]` is escaped to keep file names portable.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::storage(dir.display().to_string(), format!("create dir: {e}"))
        })?;
        Ok(Self { dir })
    }

    fn file_name(storage_key: &str) -> String {
        let mut name = String::with_capacity(storage_key.len());
        for c in storage_key.chars() {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                name.push(c);
            } else {
                name.push_str(&format!("%{:02x}", c as u32));
            }
        }
        name
    }

    fn path_for(&self, storage_key: &str) -> PathBuf {
        self.dir.join(Self::file_name(storage_key))
    }

    fn storage_key(file_name: &str) -> String {
        let mut key = String::with_capacity(file_name.len());
        let mut chars = file_name.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                key.push(c);
                continue;
            }
            let hex: String = chars.by_ref().take(2).collect();
            match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                Some(decoded) => key.push(decoded),
                None => {
                    key.push('%');
                    key.push_str(&hex);
                }
            }
        }
        key
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, storage_key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(storage_key)).ok()
    }

    fn set(&self, storage_key: &str, value: &str) -> Result<()> {
        let path = self.path_for(storage_key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)
            .and_then(|()| fs::rename(&tmp, &path))
            .map_err(|e| Error::storage(storage_key, format!("write failed: {e}")))
    }

    fn remove(&self, storage_key: &str) {
        if let Err(e) = fs::remove_file(self.path_for(storage_key)) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(storage_key, error = %e, "failed to remove storage entry");
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.ends_with(".tmp"))
            .map(|name| Self::storage_key(&name))
            .collect()
    }
}
