use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Owner used when none is configured.
pub const DEFAULT_OWNER: &str = "local";

const CATALOG_FILE: &str = "catalog.json";
const OBJECTS_DIR: &str = "objects";

/// Where a local vault lives and whose files it shows.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    root: PathBuf,
    owner: String,
}

impl VaultConfig {
    pub fn new(root: PathBuf, owner: impl Into<String>) -> Self {
        Self {
            root,
            owner: owner.into(),
        }
    }

    /// Resolve the optional overrides against platform defaults.
    pub fn resolve(root: Option<PathBuf>, owner: Option<String>) -> Result<Self> {
        let root = match root {
            Some(p) => p,
            None => default_root()?,
        };
        let owner = owner
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| DEFAULT_OWNER.to_string());
        validate_owner(&owner)?;
        Ok(Self::new(root, owner))
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.root.join(OBJECTS_DIR)
    }
}

/// Owners become the first segment of every object path, so they must be
/// one plain segment.
pub fn validate_owner(owner: &str) -> Result<()> {
    if owner.is_empty() {
        bail!("owner cannot be empty");
    }
    if owner.contains(['/', '\\']) || owner == "." || owner == ".." {
        bail!("owner '{owner}' may not contain path separators or be '.' / '..'");
    }
    Ok(())
}

pub fn default_root() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("", "", "vaultseal").context("could not determine platform directories")?;

    Ok(project_dirs.data_dir().to_path_buf())
}
