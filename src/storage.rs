//! Storage backends for envelopes and the catalog.

use anyhow::{Context, Result, bail};
use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// An opaque byte store keyed by relative path.
///
/// Implementations must return exactly the bytes that were written and
/// must refuse to `put` over an existing object.
pub trait ObjectStore {
    fn put(&self, path: &str, data: &[u8]) -> Result<()>;
    fn get(&self, path: &str) -> Result<Vec<u8>>;
    fn remove(&self, path: &str) -> Result<()>;
    fn exists(&self, path: &str) -> Result<bool>;
}

/// A single file on disk, written atomically.
#[derive(Clone, Debug)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance with the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns `true` if the storage file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the entire storage file into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Saves data to the storage file using atomic write.
    ///
    /// This method ensures crash-safety by:
    /// 1. Writing data to a temporary file with random name
    /// 2. Syncing the temporary file to disk
    /// 3. Atomically replacing the old file with the new one
    /// 4. Syncing the parent directory to ensure the rename is persisted
    ///
    /// If a crash occurs during save, either the old or new file will be present,
    /// never a corrupted partial write.
    ///
    /// Creates parent directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.random_tmp_path()?;

        // fail if the temp name is taken
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .context("failed to create temporary file")?;

        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = self.atomic_replace(&tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        if let Some(parent) = self.path.parent() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }

        tracing::debug!(path = %self.path.display(), len = data.len(), "saved file");
        Ok(())
    }

    /// Deletes the storage file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be removed.
    pub fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path)
            .with_context(|| format!("failed to remove {}", self.path.display()))
    }

    /// Returns the path to the storage file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generates a unique temporary file path in the same directory.
    ///
    /// Format: `filename.tmp.<randomhex>`
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8];
        fill(&mut buf)?;

        let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

        let file_name = self
            .path
            .file_name()
            .context("storage path has no file name")?
            .to_string_lossy();

        let tmp_name = format!("{}.tmp.{}", file_name, rand_string);

        Ok(self.path.with_file_name(tmp_name))
    }

    /// Atomically replaces the target file with the temporary file.
    ///
    /// Uses Windows `ReplaceFileW` API with `REPLACEFILE_WRITE_THROUGH` flag
    /// to ensure the operation is truly atomic and persisted to disk.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        // ReplaceFileW requires an existing target
        if !self.path.exists() {
            fs::rename(tmp_path, &self.path)?;
            return Ok(());
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY:
        // - Strings are valid UTF-16 and null-terminated
        // - Pointers remain valid during the call
        // - Windows does not retain the pointers after return
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).context("atomic replace failed");
        }

        Ok(())
    }

    /// On Unix, `rename()` is atomic when both paths are on the same filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

/// Object store rooted at a local directory. Each object is one file.
#[derive(Clone, Debug)]
pub struct DirObjectStore {
    root: PathBuf,
}

impl DirObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn storage(&self, path: &str) -> Result<Storage> {
        let rel = Path::new(path);
        if path.is_empty() {
            bail!("object path is empty");
        }
        if !rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            bail!("object path '{path}' must be relative and may not contain '..'");
        }
        Ok(Storage::new(self.root.join(rel)))
    }
}

impl ObjectStore for DirObjectStore {
    fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        let storage = self.storage(path)?;
        if storage.exists() {
            bail!("object '{path}' already exists");
        }
        storage.save(data)
    }

    fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.storage(path)?.load()
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.storage(path)?.remove()
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.storage(path)?.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    // --------------------------------------------------
    // STORAGE
    // --------------------------------------------------

    #[test]
    fn load_returns_written_data() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("store.db"));

        storage.save(b"hello world").unwrap();

        assert_eq!(storage.load().unwrap(), b"hello world");
    }

    #[test]
    fn load_fails_if_file_does_not_exist() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("missing.db"));

        assert!(storage.load().is_err());
    }

    #[test]
    fn exists_tracks_save_and_remove() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("store.db"));
        assert!(!storage.exists());

        storage.save(b"data").unwrap();
        assert!(storage.exists());

        storage.remove().unwrap();
        assert!(!storage.exists());
    }

    #[test]
    fn tmp_names_are_unique_siblings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let storage = Storage::new(path.clone());

        let a = storage.random_tmp_path().unwrap();
        let b = storage.random_tmp_path().unwrap();

        assert_eq!(a.parent(), path.parent());
        assert_ne!(a, path);
        assert_ne!(a, b);
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let storage = Storage::new(path.clone());

        storage.save(b"first").unwrap();
        storage.save(b"second").unwrap();

        assert_eq!(fs::read(path).unwrap(), b"second");
    }

    #[test]
    fn tmp_file_is_removed_after_success() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("store.db"));
        storage.save(b"data").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], "store.db");
    }

    // --------------------------------------------------
    // OBJECT STORE
    // --------------------------------------------------

    #[test]
    fn object_store_returns_exact_bytes() {
        let dir = tempdir().unwrap();
        let store = DirObjectStore::new(dir.path().to_path_buf());

        let data: Vec<u8> = (0..=255).collect();
        store.put("owner/123_a.bin.enc", &data).unwrap();

        assert!(store.exists("owner/123_a.bin.enc").unwrap());
        assert_eq!(store.get("owner/123_a.bin.enc").unwrap(), data);
        assert!(dir.path().join("owner").join("123_a.bin.enc").exists());
    }

    #[test]
    fn object_store_remove() {
        let dir = tempdir().unwrap();
        let store = DirObjectStore::new(dir.path().to_path_buf());

        store.put("x.enc", b"x").unwrap();
        store.remove("x.enc").unwrap();

        assert!(!store.exists("x.enc").unwrap());
        assert!(store.remove("x.enc").is_err());
    }

    #[test]
    fn object_store_refuses_to_replace_existing_object() {
        let dir = tempdir().unwrap();
        let store = DirObjectStore::new(dir.path().to_path_buf());

        store.put("alice/1_a.enc", b"first").unwrap();
        let err = store.put("alice/1_a.enc", b"second").unwrap_err();

        assert!(err.to_string().contains("already exists"));
        assert_eq!(store.get("alice/1_a.enc").unwrap(), b"first");
    }

    #[test]
    fn object_store_rejects_escaping_paths() {
        let dir = tempdir().unwrap();
        let store = DirObjectStore::new(dir.path().join("objects"));

        assert!(store.put("../outside", b"x").is_err());
        assert!(store.put("a/../../outside", b"x").is_err());
        assert!(store.put("", b"x").is_err());
        assert!(store.get("/etc/passwd").is_err());
    }
}
