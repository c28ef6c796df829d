//! JSON-file key-value store backing user overrides.
//!
//! One file (`overrides.json`) holds a flat string-keyed object; each value is
//! a self-describing serialized record. Keys are namespaced by entity kind
//! (`guide:<id>`) plus dedicated bookkeeping keys (contact id counter, seeded
//! flag).
//!
//! Durability contract: every mutation rewrites the file via temp-file +
//! `sync_all` + atomic rename before returning, so a crash between `put` and
//! the next read never loses an acknowledged write and never exposes a
//! half-written file. Mutations replace whole records; there is no
//! field-level patching.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::PersistenceError;

pub struct KvStore {
    path: PathBuf,
    map: RwLock<BTreeMap<String, Value>>,
}

impl KvStore {
    /// Open (or create) the store at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(PersistenceError::CreateDir)?;
            }
        }

        let map = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            map: RwLock::new(map),
        })
    }

    /// Read a record. Missing keys and stale-shaped values both read as None.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let map = self.map.read();
        map.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Replace a record and flush. On a flush failure the in-memory map is
    /// restored, so a failed put is a no-op.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), PersistenceError> {
        let value = serde_json::to_value(value)?;
        let mut map = self.map.write();
        let previous = map.insert(key.to_string(), value);
        if let Err(e) = self.flush(&map) {
            match previous {
                Some(prev) => map.insert(key.to_string(), prev),
                None => map.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Remove a record and flush. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut map = self.map.write();
        let previous = match map.remove(key) {
            Some(prev) => prev,
            None => return Ok(()),
        };
        if let Err(e) = self.flush(&map) {
            map.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    /// Remove every key in a namespace and flush once.
    pub fn remove_prefix(&self, prefix: &str) -> Result<(), PersistenceError> {
        let mut map = self.map.write();
        let doomed: Vec<String> = map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        if doomed.is_empty() {
            return Ok(());
        }
        let mut removed: Vec<(String, Value)> = Vec::with_capacity(doomed.len());
        for key in doomed {
            if let Some(value) = map.remove(&key) {
                removed.push((key, value));
            }
        }
        if let Err(e) = self.flush(&map) {
            for (key, value) in removed {
                map.insert(key, value);
            }
            return Err(e);
        }
        Ok(())
    }

    /// List all `(suffix, record)` pairs in a namespace. The prefix is
    /// stripped from the returned keys.
    pub fn scan_prefix<T: DeserializeOwned>(&self, prefix: &str) -> Vec<(String, T)> {
        let map = self.map.read();
        map.range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter_map(|(k, v)| {
                let record = serde_json::from_value(v.clone()).ok()?;
                Some((k[prefix.len()..].to_string(), record))
            })
            .collect()
    }

    /// Rewrite the backing file atomically: temp file in the same directory,
    /// fsync, then rename over the live file.
    fn flush(&self, map: &BTreeMap<String, Value>) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            use std::io::Write;
            let mut file = fs::File::create(&tmp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, KvStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = KvStore::open_at(dir.path().join("overrides.json")).expect("open");
        (dir, store)
    }

    #[test]
    fn test_put_get_round_trip() {
        let (_dir, store) = open_temp();
        store.put("guide:cpr-001", &42u64).expect("put");
        assert_eq!(store.get::<u64>("guide:cpr-001"), Some(42));
        assert_eq!(store.get::<u64>("guide:missing"), None);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("overrides.json");
        {
            let store = KvStore::open_at(path.clone()).expect("open");
            store.put("counter", &1000i64).expect("put");
        }
        let store = KvStore::open_at(path).expect("reopen");
        assert_eq!(store.get::<i64>("counter"), Some(1000));
    }

    #[test]
    fn test_remove_and_prefix_scan() {
        let (_dir, store) = open_temp();
        store.put("guide:a", &1u32).expect("put");
        store.put("guide:b", &2u32).expect("put");
        store.put("other:c", &3u32).expect("put");

        let mut scanned = store.scan_prefix::<u32>("guide:");
        scanned.sort();
        assert_eq!(scanned, vec![("a".to_string(), 1), ("b".to_string(), 2)]);

        store.remove("guide:a").expect("remove");
        assert_eq!(store.get::<u32>("guide:a"), None);

        store.remove_prefix("guide:").expect("remove_prefix");
        assert!(store.scan_prefix::<u32>("guide:").is_empty());
        assert_eq!(store.get::<u32>("other:c"), Some(3));
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("overrides.json");
        let store = KvStore::open_at(path.clone()).expect("open");
        store.put("k", &"v").expect("put");
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
