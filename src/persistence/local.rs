//! File-backed local storage adapter
//!
//! One `<encoded key>.json` file per key inside a data directory. Keys are
//! percent-encoded so any string maps to a valid file name.

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{PersistenceAdapter, PersistenceError, PersistenceResult, WriteOptions};

const EXTENSION: &str = "json";

/// Durable adapter storing each key as a JSON file
#[derive(Debug, Clone)]
pub struct LocalStorageAdapter {
    dir: PathBuf,
}

impl LocalStorageAdapter {
    /// Create an adapter rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The data directory must still exist; it is not silently recreated
    fn ensure_dir(&self) -> PersistenceResult<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(PersistenceError::Unavailable(format!(
                "data directory {} is missing",
                self.dir.display()
            )))
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", urlencoding::encode(key), EXTENSION))
    }
}

impl PersistenceAdapter for LocalStorageAdapter {
    fn name(&self) -> &str {
        "local"
    }

    fn get(&self, key: &str) -> PersistenceResult<Option<Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn set(&self, key: &str, value: &Value, _options: &WriteOptions) -> PersistenceResult<()> {
        self.ensure_dir()?;
        let content = serde_json::to_string_pretty(value)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistenceResult<bool> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> PersistenceResult<bool> {
        Ok(self.path_for(key).exists())
    }

    fn keys(&self) -> PersistenceResult<Vec<String>> {
        self.ensure_dir()?;
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let key = urlencoding::decode(stem)
                .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
            keys.push(key.into_owned());
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip_survives_new_instance() {
        let dir = tempdir().unwrap();
        let opts = WriteOptions::default();

        let adapter = LocalStorageAdapter::new(dir.path()).unwrap();
        adapter.set("statehub_global", &json!({"theme": "dark"}), &opts).unwrap();

        let reopened = LocalStorageAdapter::new(dir.path()).unwrap();
        assert_eq!(
            reopened.get("statehub_global").unwrap(),
            Some(json!({"theme": "dark"}))
        );
    }

    #[test]
    fn test_awkward_keys() {
        let dir = tempdir().unwrap();
        let adapter = LocalStorageAdapter::new(dir.path()).unwrap();
        let opts = WriteOptions::default();

        adapter.set("a/b c:d", &json!(true), &opts).unwrap();
        assert!(adapter.exists("a/b c:d").unwrap());
        assert_eq!(adapter.keys().unwrap(), vec!["a/b c:d".to_string()]);
    }

    #[test]
    fn test_remove_missing() {
        let dir = tempdir().unwrap();
        let adapter = LocalStorageAdapter::new(dir.path()).unwrap();
        assert!(!adapter.remove("nope").unwrap());
        assert_eq!(adapter.get("nope").unwrap(), None);
    }

    #[test]
    fn test_missing_dir_is_unavailable() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("data");
        let adapter = LocalStorageAdapter::new(&root).unwrap();
        std::fs::remove_dir_all(&root).unwrap();

        let err = adapter
            .set("statehub_global", &json!(1), &WriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Unavailable(_)));
        assert!(matches!(adapter.keys(), Err(PersistenceError::Unavailable(_))));
        assert_eq!(adapter.get("statehub_global").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let dir = tempdir().unwrap();
        let adapter = LocalStorageAdapter::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{oops").unwrap();

        let err = adapter.get("broken").unwrap_err();
        assert!(matches!(err, PersistenceError::Serialization(_)));
    }

    #[test]
    fn test_clear_namespace() {
        let dir = tempdir().unwrap();
        let adapter = LocalStorageAdapter::new(dir.path()).unwrap();
        let opts = WriteOptions::default();

        adapter.set("statehub_a", &json!(1), &opts).unwrap();
        adapter.set("statehub_b", &json!(2), &opts).unwrap();
        adapter.set("keep", &json!(3), &opts).unwrap();

        assert_eq!(adapter.clear_namespace("statehub_").unwrap(), 2);
        assert_eq!(adapter.keys().unwrap(), vec!["keep".to_string()]);
    }
}
