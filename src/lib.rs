pub mod catalog;
pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;

pub use crate::catalog::{Catalog, CatalogEntry, JsonCatalog};
pub use crate::config::{VaultConfig, validate_owner};
pub use crate::crypto::{EnvelopeCodec, KdfParams, OsRandom, SecureRandom, open, seal};
pub use crate::error::{CatalogError, EnvelopeError};
pub use crate::storage::{DirObjectStore, ObjectStore, Storage};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Encrypted file vault: envelopes in an object store, metadata in a catalog.
///
/// Passwords are used only for the duration of a call and never stored.
pub struct Vault<S, C, R = OsRandom> {
    codec: EnvelopeCodec<R>,
    objects: S,
    catalog: C,
    owner: String,
}

impl Vault<DirObjectStore, JsonCatalog> {
    /// Opens the on-disk vault described by `config`.
    pub fn open_local(config: &VaultConfig) -> Result<Self> {
        let objects = DirObjectStore::new(config.objects_dir());
        let catalog = JsonCatalog::open(Storage::new(config.catalog_path()))
            .context("failed to open vault catalog")?;

        Self::new(EnvelopeCodec::new(), objects, catalog, config.owner())
    }
}

impl<S: ObjectStore, C: Catalog, R: SecureRandom> Vault<S, C, R> {
    /// # Errors
    ///
    /// Returns an error if `owner` is not a single plain path segment.
    pub fn new(
        codec: EnvelopeCodec<R>,
        objects: S,
        catalog: C,
        owner: impl Into<String>,
    ) -> Result<Self> {
        let owner = owner.into();
        validate_owner(&owner)?;

        Ok(Self {
            codec,
            objects,
            catalog,
            owner,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Seals `plaintext` and stores it under a fresh object path.
    pub fn upload(
        &mut self,
        filename: &str,
        plaintext: &[u8],
        password: &[u8],
    ) -> Result<CatalogEntry> {
        self.upload_at(filename, plaintext, password, Utc::now())
    }

    fn upload_at(
        &mut self,
        filename: &str,
        plaintext: &[u8],
        password: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<CatalogEntry> {
        let envelope = self.codec.seal(plaintext, password)?;

        let id = Uuid::new_v4();
        let path = object_path(&self.owner, created_at, id, filename);
        self.objects
            .put(&path, &envelope)
            .with_context(|| format!("failed to store '{path}'"))?;

        let entry = CatalogEntry::new(
            id,
            self.owner.clone(),
            filename.to_string(),
            plaintext.len() as u64,
            created_at,
            path,
        );

        if let Err(e) = self.catalog.insert(entry.clone()) {
            if let Err(cleanup) = self.objects.remove(entry.file_path()) {
                tracing::warn!(
                    path = entry.file_path(),
                    error = %cleanup,
                    "orphaned envelope left in store"
                );
            }
            return Err(e);
        }

        tracing::info!(id = %entry.id(), path = entry.file_path(), "uploaded");
        Ok(entry)
    }

    /// This owner's entries, newest first.
    pub fn list(&self) -> Vec<&CatalogEntry> {
        self.catalog.list(&self.owner)
    }

    pub fn entry(&self, id: Uuid) -> Result<&CatalogEntry> {
        self.catalog
            .get(id)
            .filter(|e| e.owner() == self.owner)
            .ok_or_else(|| CatalogError::NotFound(id).into())
    }

    /// Fetches and opens an envelope.
    ///
    /// A wrong password surfaces as [`EnvelopeError::Decryption`] in the
    /// error chain.
    pub fn download(
        &self,
        id: Uuid,
        password: &[u8],
    ) -> Result<(CatalogEntry, Zeroizing<Vec<u8>>)> {
        let entry = self.entry(id)?.clone();
        let envelope = self
            .objects
            .get(entry.file_path())
            .with_context(|| format!("failed to fetch '{}'", entry.file_path()))?;

        let plaintext = self.codec.open(&envelope, password)?;
        Ok((entry, plaintext))
    }

    /// Removes the envelope, then its catalog entry.
    pub fn delete(&mut self, id: Uuid) -> Result<CatalogEntry> {
        let path = self.entry(id)?.file_path().to_string();

        if self.objects.exists(&path)? {
            self.objects.remove(&path)?;
        } else {
            tracing::warn!(path = %path, "envelope already missing from store");
        }

        let entry = self.catalog.remove(id)?;
        tracing::info!(id = %id, "deleted");
        Ok(entry)
    }
}

/// `{owner}/{unix_millis}_{id}_{filename}.enc`
pub fn object_path(owner: &str, created_at: DateTime<Utc>, id: Uuid, filename: &str) -> String {
    let name: String = filename
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!(
        "{owner}/{}_{id}_{}",
        created_at.timestamp_millis(),
        crypto::sealed_file_name(&name)
    )
}
