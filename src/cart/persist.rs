use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Error;

/// Client-local key-value storage the cart serializes into.
///
/// Values are opaque strings (the store writes JSON).
pub trait CartPersistence: Send + Sync {
    /// Stored value for `key`, or `None` if nothing was saved yet.
    fn load(&self, key: &str) -> Result<Option<String>, Error>;

    fn save(&self, key: &str, value: &str) -> Result<(), Error>;

    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// In-process persistence. Clones share the same entries, so a store can be
/// reopened over a clone to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CartPersistence for MemoryPersistence {
    fn load(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory.
///
/// Writes go through a temporary file and a rename so a crash never leaves
/// a half-written cart behind.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn io_error(op: &str, path: &Path, e: std::io::Error) -> Error {
    Error::Persistence(format!("{op} {}: {e}", path.display()))
}

impl CartPersistence for FilePersistence {
    fn load(&self, key: &str) -> Result<Option<String>, Error> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), Error> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error("create", &self.dir, e))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|e| io_error("write", &tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_error("rename", &path, e))
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &path, e)),
        }
    }
}
