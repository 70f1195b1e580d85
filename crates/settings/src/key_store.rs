//! Durable credential storage.
//!
//! The key store is a flat JSON object (`{"anthropic_api_key": "..."}`) in a
//! hidden `.evalkit` directory. It is the lowest-precedence credential source
//! and is written only through [`crate::SettingsStore::edit`] with
//! `persist = true`.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{SettingKey, SettingsError};

/// Name of the hidden directory holding the key store.
pub const HIDDEN_DIR: &str = ".evalkit";

/// File name of the key store within [`HIDDEN_DIR`].
pub const KEY_FILE: &str = "keys.json";

/// Handle to a key-store file. The file need not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    /// Key store under `root/.evalkit/keys.json`.
    pub fn in_dir(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(HIDDEN_DIR).join(KEY_FILE),
        }
    }

    /// Key store at an explicit file path.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Locates the key store for the current working directory.
    ///
    /// Walks up from the working directory looking for an existing `.evalkit`
    /// directory; falls back to the home directory, then to the working
    /// directory itself.
    pub fn discover() -> Result<Self, SettingsError> {
        let cwd = std::env::current_dir().ok();
        if let Some(cwd) = &cwd {
            for ancestor in cwd.ancestors() {
                if ancestor.join(HIDDEN_DIR).is_dir() {
                    return Ok(Self::in_dir(ancestor));
                }
            }
        }
        dirs::home_dir()
            .or(cwd)
            .map(Self::in_dir)
            .ok_or(SettingsError::NoKeyStoreLocation)
    }

    /// Path of the key-store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every stored value. A missing file is an empty store.
    pub fn load(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| SettingsError::KeyStoreFormat {
            path: self.path.clone(),
            source,
        })
    }

    /// Reads one credential.
    pub fn fetch(&self, key: SettingKey) -> Result<Option<String>, SettingsError> {
        Ok(self.load()?.remove(key.as_str()))
    }

    /// Applies a set of changes: `Some` stores a value, `None` removes it.
    ///
    /// Does nothing (and creates no file) when `changes` is empty.
    pub fn apply(&self, changes: &[(SettingKey, Option<String>)]) -> Result<(), SettingsError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut stored = self.load()?;
        for (key, value) in changes {
            match value {
                Some(v) => stored.insert(key.as_str().to_string(), v.clone()),
                None => stored.remove(key.as_str()),
            };
        }
        self.write(&stored)?;
        debug!(path = %self.path.display(), changed = changes.len(), "Updated key store");
        Ok(())
    }

    // Write to a sibling temp file and rename so readers never see a torn file.
    fn write(&self, stored: &BTreeMap<String, String>) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(stored).map_err(|source| {
            SettingsError::KeyStoreFormat {
                path: self.path.clone(),
                source,
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(body.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}
