use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::domain::error::StoreError;

/// Persistent key-value storage holding whole values under string keys.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let values = self
            .values
            .lock()
            .map_err(|_| StoreError::Storage("storage lock poisoned".into()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StoreError::Storage("storage lock poisoned".into()))?;
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// One file per key under a directory. Values are written to a temporary
/// file and renamed over the old one.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::Storage(format!("invalid storage key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = value.len(), "value written");
        Ok(())
    }
}

/// Browser `localStorage`.
#[cfg(target_arch = "wasm32")]
pub struct BrowserStorage;

#[cfg(target_arch = "wasm32")]
impl KeyValueStorage for BrowserStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        use gloo_storage::{LocalStorage, Storage};

        LocalStorage::raw()
            .get_item(key)
            .map(|value| value.map(String::into_bytes))
            .map_err(|e| StoreError::Storage(format!("{e:?}")))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        use gloo_storage::{LocalStorage, Storage};

        let text = std::str::from_utf8(value)
            .map_err(|e| StoreError::Storage(format!("value is not utf-8: {e}")))?;
        LocalStorage::raw()
            .set_item(key, text)
            .map_err(|e| StoreError::Storage(format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_get_set() {
        let storage = MemoryStorage::new();
        assert!(storage.get("k").unwrap().is_none());
        storage.set("k", b"v1").unwrap();
        storage.set("k", b"v2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some(&b"v2"[..]));
    }

    #[test]
    fn file_storage_replaces_whole_value() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("nested")).unwrap();
        assert!(storage.get("fictional-news-articles").unwrap().is_none());

        storage.set("fictional-news-articles", b"[1,2,3]").unwrap();
        storage.set("fictional-news-articles", b"[]").unwrap();
        assert_eq!(
            storage.get("fictional-news-articles").unwrap().as_deref(),
            Some(&b"[]"[..])
        );
        assert!(!dir.path().join("nested/.fictional-news-articles.json.tmp").exists());
    }

    #[test]
    fn file_storage_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        assert!(storage.set("../escape", b"x").is_err());
        assert!(storage.get("").is_err());
    }
}
