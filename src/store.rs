use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::codec::{self, SkippedRecord};
use crate::record::Record;

/// Default persistence file used when nothing else is configured.
pub const DEFAULT_STORE_FILE: &str = "file.json";

pub fn derive_store_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(name);
    if path.extension().is_none() {
        path.set_extension("json");
    }
    path
}

pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// In-memory object store keyed by `<Tag>.<Id>`, backed by one JSON file.
#[derive(Clone, Debug)]
pub struct ObjectStore {
    path: PathBuf,
    objects: BTreeMap<String, Record>,
    retained: BTreeMap<String, JsonValue>,
}

/// Outcome of loading the persistence file.
#[derive(Debug, Default)]
pub struct ReloadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl ObjectStore {
    /// Empty store persisting to `path`. Nothing is read until [`reload`].
    ///
    /// [`reload`]: ObjectStore::reload
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            objects: BTreeMap::new(),
            retained: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current mapping of key to record.
    pub fn all(&self) -> &BTreeMap<String, Record> {
        &self.objects
    }

    /// Persisted members that could not be rebuilt; saved back unchanged.
    pub fn retained(&self) -> &BTreeMap<String, JsonValue> {
        &self.retained
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.objects.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Record> {
        self.objects.get_mut(key)
    }

    /// Insert a record under its composite key, returning the key.
    pub fn register(&mut self, record: Record) -> String {
        let key = record.key();
        debug!(%key, "registering record");
        self.objects.insert(key.clone(), record);
        key
    }

    /// Drop a record from memory. Not persisted until the next [`save`].
    ///
    /// [`save`]: ObjectStore::save
    pub fn remove(&mut self, key: &str) -> Option<Record> {
        self.objects.remove(key)
    }

    /// Truncate and rewrite the persistence file with the full mapping.
    pub fn save(&self) -> Result<()> {
        let text = codec::encode(&self.objects, &self.retained)?;
        ensure_parent_dirs(&self.path)?;
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        info!(path = %self.path.display(), records = self.objects.len(), "saved object store");
        Ok(())
    }

    /// Load the persistence file, overwriting entries that share a key.
    ///
    /// A missing file leaves the store untouched. Members that cannot be
    /// rebuilt are retained as raw JSON so a later save does not drop them.
    pub fn reload(&mut self) -> Result<ReloadReport> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no persistence file yet");
                return Ok(ReloadReport::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()));
            }
        };
        let decoded = codec::decode(&text)
            .with_context(|| format!("failed to load {}", self.path.display()))?;

        let loaded = decoded.records.len();
        for record in decoded.records {
            let key = record.key();
            self.retained.remove(&key);
            self.objects.insert(key, record);
        }
        for skipped in &decoded.skipped {
            self.retained
                .insert(skipped.key.clone(), skipped.document.clone());
        }
        info!(
            path = %self.path.display(),
            loaded,
            skipped = decoded.skipped.len(),
            "reloaded object store"
        );
        Ok(ReloadReport {
            loaded,
            skipped: decoded.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTag;
    use serde_json::json;
    use tempfile::TempDir;

    fn temp_store() -> Result<(TempDir, ObjectStore)> {
        let dir = TempDir::new()?;
        let store = ObjectStore::new(dir.path().join("file.json"));
        Ok((dir, store))
    }

    #[test]
    fn derive_store_path_adds_extension() {
        assert_eq!(derive_store_path("data"), PathBuf::from("data.json"));
        assert_eq!(derive_store_path("data.db"), PathBuf::from("data.db"));
    }

    #[test]
    fn reload_without_file_is_empty() -> Result<()> {
        let (_dir, mut store) = temp_store()?;
        let report = store.reload()?;
        assert_eq!(report.loaded, 0);
        assert!(report.skipped.is_empty());
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn save_then_reload_into_fresh_store() -> Result<()> {
        let (dir, mut store) = temp_store()?;
        let mut user = TypeTag::User.fresh();
        user.set_attribute("first_name", json!("Betty"))?;
        user.set_attribute("age", json!(30))?;
        let key = store.register(user.clone());
        store.register(TypeTag::City.fresh());
        store.save()?;

        let mut reopened = ObjectStore::new(dir.path().join("file.json"));
        let report = reopened.reload()?;
        assert_eq!(report.loaded, 2);
        assert_eq!(reopened.get(&key), Some(&user));
        Ok(())
    }

    #[test]
    fn registered_keys_do_not_collide() {
        let mut store = ObjectStore::new("unused.json");
        let a = store.register(TypeTag::State.fresh());
        let b = store.register(TypeTag::State.fresh());
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn removal_persists_only_after_save() -> Result<()> {
        let (dir, mut store) = temp_store()?;
        let key = store.register(TypeTag::Amenity.fresh());
        store.save()?;
        store.remove(&key);
        store.save()?;

        let mut reopened = ObjectStore::new(dir.path().join("file.json"));
        reopened.reload()?;
        assert!(!reopened.contains(&key));
        Ok(())
    }

    #[test]
    fn save_replaces_previous_contents() -> Result<()> {
        let (_dir, mut store) = temp_store()?;
        let first = store.register(TypeTag::User.fresh());
        store.save()?;
        store.remove(&first);
        let second = store.register(TypeTag::User.fresh());
        store.save()?;

        let text = fs::read_to_string(store.path())?;
        assert!(!text.contains(&first));
        assert!(text.contains(&second));
        Ok(())
    }

    #[test]
    fn reload_overwrites_matching_keys() -> Result<()> {
        let (_dir, mut store) = temp_store()?;
        let key = store.register(TypeTag::Place.fresh());
        store.save()?;
        store
            .get_mut(&key)
            .expect("registered")
            .set_attribute("name", json!("changed"))?;

        store.reload()?;
        assert!(store.get(&key).expect("reloaded").attribute("name").is_none());
        Ok(())
    }

    #[test]
    fn save_creates_parent_directories() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested/deeper/file.json");
        let mut store = ObjectStore::new(&path);
        store.register(TypeTag::BaseModel.fresh());
        store.save()?;
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn unreadable_members_survive_later_saves() -> Result<()> {
        let (dir, mut store) = temp_store()?;
        let original = json!({
            "User.1": {
                "__class__": "User",
                "id": 1,
                "created_at": "2020-01-01T00:00:00.000000",
                "updated_at": "2020-01-01T00:00:00.000000",
                "email": "keep@me",
            },
            "Ghost.2": {
                "__class__": "Ghost",
                "id": "2",
                "created_at": "2020-01-01T00:00:00.000000",
                "updated_at": "2020-01-01T00:00:00.000000",
            },
            "City.3": {
                "__class__": "City",
                "id": "3",
                "updated_at": "2020-01-01T00:00:00.000000",
            },
        });
        fs::write(store.path(), original.to_string())?;

        let report = store.reload()?;
        assert_eq!(report.loaded, 1);
        assert!(store.contains("User.1"));
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(skipped, vec!["City.3", "Ghost.2"]);

        store.register(TypeTag::City.fresh());
        store.save()?;

        let text = fs::read_to_string(dir.path().join("file.json"))?;
        let saved: JsonValue = serde_json::from_str(&text)?;
        assert_eq!(saved["Ghost.2"], original["Ghost.2"]);
        assert_eq!(saved["City.3"], original["City.3"]);
        assert_eq!(saved["User.1"]["email"], json!("keep@me"));
        assert_eq!(saved.as_object().map(|m| m.len()), Some(4));
        Ok(())
    }

    #[test]
    fn malformed_file_fails_reload() -> Result<()> {
        let (_dir, mut store) = temp_store()?;
        fs::write(store.path(), "{ truncated")?;
        assert!(store.reload().is_err());
        assert!(store.is_empty());
        Ok(())
    }
}
