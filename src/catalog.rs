use crate::error::CatalogError;
use crate::storage::Storage;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata about one stored envelope. Holds nothing secret.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    id: Uuid,
    owner: String,
    filename: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
    file_path: String,
}

impl CatalogEntry {
    pub fn new(
        id: Uuid,
        owner: String,
        filename: String,
        size_bytes: u64,
        created_at: DateTime<Utc>,
        file_path: String,
    ) -> Self {
        Self {
            id,
            owner,
            filename,
            size_bytes,
            created_at,
            file_path,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Original (plaintext) file name.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Plaintext size.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Object store path of the envelope.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }
}

/// Metadata catalog keyed by entry id.
pub trait Catalog {
    fn insert(&mut self, entry: CatalogEntry) -> Result<()>;
    fn get(&self, id: Uuid) -> Option<&CatalogEntry>;
    /// Entries of `owner`, newest first.
    fn list(&self, owner: &str) -> Vec<&CatalogEntry>;
    fn remove(&mut self, id: Uuid) -> Result<CatalogEntry>;
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct Entries {
    entries: HashMap<Uuid, CatalogEntry>,
}

impl Entries {
    fn insert(&mut self, entry: CatalogEntry) -> Result<(), CatalogError> {
        if self.entries.contains_key(&entry.id) {
            return Err(CatalogError::AlreadyExists(entry.id));
        }
        self.entries.insert(entry.id, entry);
        Ok(())
    }

    fn remove(&mut self, id: Uuid) -> Result<CatalogEntry, CatalogError> {
        self.entries.remove(&id).ok_or(CatalogError::NotFound(id))
    }

    fn list(&self, owner: &str) -> Vec<&CatalogEntry> {
        let mut out: Vec<_> = self
            .entries
            .values()
            .filter(|e| e.owner == owner)
            .collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        out
    }
}

/// Catalog persisted as one JSON document, rewritten after every change.
pub struct JsonCatalog {
    entries: Entries,
    storage: Storage,
}

impl JsonCatalog {
    /// Loads the catalog, or starts an empty one if the file is missing.
    pub fn open(storage: Storage) -> Result<Self> {
        let entries = if storage.exists() {
            let data = storage.load()?;
            serde_json::from_slice(&data).with_context(|| {
                format!("failed to parse catalog {}", storage.path().display())
            })?
        } else {
            Entries::default()
        };

        Ok(Self { entries, storage })
    }

    pub fn len(&self) -> usize {
        self.entries.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.entries.is_empty()
    }

    fn save(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.entries)?;
        self.storage.save(&data).context("failed to write catalog")
    }
}

impl Catalog for JsonCatalog {
    fn insert(&mut self, entry: CatalogEntry) -> Result<()> {
        let id = entry.id;
        self.entries.insert(entry)?;
        if let Err(e) = self.save() {
            self.entries.entries.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    fn get(&self, id: Uuid) -> Option<&CatalogEntry> {
        self.entries.entries.get(&id)
    }

    fn list(&self, owner: &str) -> Vec<&CatalogEntry> {
        self.entries.list(owner)
    }

    fn remove(&mut self, id: Uuid) -> Result<CatalogEntry> {
        let entry = self.entries.remove(id)?;
        if let Err(e) = self.save() {
            self.entries.entries.insert(id, entry);
            return Err(e);
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn entry(owner: &str, name: &str, created_at: DateTime<Utc>) -> CatalogEntry {
        CatalogEntry::new(
            Uuid::new_v4(),
            owner.to_string(),
            name.to_string(),
            11,
            created_at,
            format!("{owner}/{}_{name}.enc", created_at.timestamp_millis()),
        )
    }

    #[test]
    fn insert_and_get_works() {
        let dir = tempdir().unwrap();
        let mut catalog = JsonCatalog::open(Storage::new(dir.path().join("c.json"))).unwrap();
        assert!(catalog.is_empty());

        let e = entry("alice", "a.txt", Utc::now());
        let id = e.id();
        catalog.insert(e.clone()).unwrap();

        assert_eq!(catalog.get(id), Some(&e));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn insert_existing_id_fails() {
        let dir = tempdir().unwrap();
        let mut catalog = JsonCatalog::open(Storage::new(dir.path().join("c.json"))).unwrap();

        let e = entry("alice", "a.txt", Utc::now());
        catalog.insert(e.clone()).unwrap();

        let err = catalog.insert(e.clone()).unwrap_err();
        match err.downcast_ref::<CatalogError>() {
            Some(CatalogError::AlreadyExists(id)) => assert_eq!(*id, e.id()),
            other => panic!("expected AlreadyExists, got: {other:?}"),
        }
    }

    #[test]
    fn list_is_newest_first_and_per_owner() {
        let dir = tempdir().unwrap();
        let mut catalog = JsonCatalog::open(Storage::new(dir.path().join("c.json"))).unwrap();

        let now = Utc::now();
        catalog.insert(entry("alice", "old.txt", now - Duration::hours(1))).unwrap();
        catalog.insert(entry("alice", "new.txt", now)).unwrap();
        catalog.insert(entry("bob", "other.txt", now)).unwrap();

        let names: Vec<_> = catalog.list("alice").iter().map(|e| e.filename()).collect();
        assert_eq!(names, vec!["new.txt", "old.txt"]);
        assert_eq!(catalog.list("bob").len(), 1);
        assert!(catalog.list("carol").is_empty());
    }

    #[test]
    fn remove_not_existing_fails() {
        let dir = tempdir().unwrap();
        let mut catalog = JsonCatalog::open(Storage::new(dir.path().join("c.json"))).unwrap();

        let id = Uuid::new_v4();
        let err = catalog.remove(id).unwrap_err();
        match err.downcast_ref::<CatalogError>() {
            Some(CatalogError::NotFound(missing)) => assert_eq!(*missing, id),
            other => panic!("expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn catalog_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.json");

        let e = entry("alice", "a.txt", Utc::now());
        {
            let mut catalog = JsonCatalog::open(Storage::new(path.clone())).unwrap();
            catalog.insert(e.clone()).unwrap();
        }

        let mut catalog = JsonCatalog::open(Storage::new(path.clone())).unwrap();
        assert_eq!(catalog.get(e.id()), Some(&e));

        catalog.remove(e.id()).unwrap();
        let catalog = JsonCatalog::open(Storage::new(path)).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn corrupted_catalog_fails_to_open() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("c.json"));
        storage.save(b"not json").unwrap();

        assert!(JsonCatalog::open(storage).is_err());
    }
}
