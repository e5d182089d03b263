//! Durable single-slot credential storage.
//!
//! The persisted credential is the authoritative "logged in" signal: its absence at startup means
//! logged out. Both the transport (on 401) and the session store (on login/logout) write the same
//! slot, so there is exactly one [`CredentialStorage`] per session context, shared via `Arc`.

use std::{
    collections::BTreeMap,
    fs,
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::config::StorageConfig;
use crate::errors::{Error, Result};

/// A single durable slot holding the bearer credential.
pub trait CredentialStorage: Send + Sync {
    /// Read the persisted credential, if any.
    fn load(&self) -> Result<Option<String>>;

    /// Persist `token`, replacing any previous credential.
    fn store(&self, token: &str) -> Result<()>;

    /// Remove the persisted credential. Removing an absent credential succeeds.
    fn clear(&self) -> Result<()>;
}

/// Build the storage backend selected in configuration.
pub fn from_config(config: &StorageConfig) -> Arc<dyn CredentialStorage> {
    match config {
        StorageConfig::File { path, key } => Arc::new(FileCredentialStorage::new(path.clone(), key.clone())),
        StorageConfig::Memory => Arc::new(MemoryCredentialStorage::default()),
    }
}

/// Credential kept in a JSON object on disk under a configurable key, e.g.
/// `{"token": "eyJhbGciOi..."}`. Other keys in the file are preserved.
#[derive(Debug, Clone)]
pub struct FileCredentialStorage {
    path: PathBuf,
    key: String,
}

impl FileCredentialStorage {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(Error::Storage {
                operation: format!("read credential file {}: {e}", self.path.display()),
            }),
        }
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        let bytes = self.read_bytes()?;
        if bytes.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| Error::Storage {
            operation: format!("parse credential file {}: {e}", self.path.display()),
        })
    }

    /// Entries to rewrite, and whether the file on disk was unparseable and must be replaced.
    fn entries_for_update(&self) -> Result<(BTreeMap<String, String>, bool)> {
        let bytes = self.read_bytes()?;
        if bytes.is_empty() {
            return Ok((BTreeMap::new(), false));
        }
        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok((entries, false)),
            Err(e) => {
                warn!(error = %e, "Credential file is unparseable, replacing it");
                Ok((BTreeMap::new(), true))
            }
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::Storage {
                operation: format!("create directory {}: {e}", parent.display()),
            })?;
        }

        let json = serde_json::to_vec_pretty(entries).map_err(|e| Error::Storage {
            operation: format!("serialize credential file: {e}"),
        })?;

        // Write then rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("tmp");
        write_private(&tmp, &json)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| Error::Storage {
                operation: format!("write credential file {}: {e}", self.path.display()),
            })
    }
}

/// Write `contents` to a fresh file readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    // A leftover file would keep its old permissions
    if let Err(e) = fs::remove_file(path)
        && e.kind() != ErrorKind::NotFound
    {
        return Err(e);
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl CredentialStorage for FileCredentialStorage {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Option<String>> {
        let token = self.read_entries()?.remove(&self.key).filter(|t| !t.is_empty());
        debug!(present = token.is_some(), "Loaded persisted credential");
        Ok(token)
    }

    #[instrument(skip(self, token), fields(path = %self.path.display()))]
    fn store(&self, token: &str) -> Result<()> {
        let (mut entries, _) = self.entries_for_update()?;
        entries.insert(self.key.clone(), token.to_string());
        self.write_entries(&entries)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn clear(&self) -> Result<()> {
        let (mut entries, corrupt) = self.entries_for_update()?;
        if entries.remove(&self.key).is_none() && !corrupt {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}

/// Process-local storage, used for ephemeral sessions and in tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryCredentialStorage {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStorage for MemoryCredentialStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot.lock().clone())
    }

    fn store(&self, token: &str) -> Result<()> {
        *self.slot.lock() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.slot.lock().take();
        Ok(())
    }
}
