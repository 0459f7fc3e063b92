//! ==============================================================================
//! store.rs - key-value file store
//! ==============================================================================
//!
//! purpose:
//!     the watch and the phone app talk through a flat key-value store of
//!     small files. this module hides where that store lives:
//!     - FileStore:   one file per key inside a directory (the real thing)
//!     - MemoryStore: a map, for tests and dry runs
//!
//! relationships:
//!     - used by: mailbox.rs (draining), settings.rs, watchface.rs (debug dumps)
//!
//! ==============================================================================

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub trait KvStore {
    /// `Ok(None)` when the key does not exist
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, contents: &str) -> Result<()>;
    /// erasing a missing key is not an error
    fn erase(&mut self, key: &str) -> Result<()>;

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        match self.read(key)? {
            Some(text) => {
                let value = serde_json::from_str(&text)
                    .with_context(|| format!("invalid JSON in {key}"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        let text = serde_json::to_string(value)?;
        self.write(key, &text)
    }
}

// ==============================================================================
// directory-backed store
// ==============================================================================

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create store directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(anyhow!("invalid store key {key:?}"));
        }
        Ok(self.root.join(key))
    }
}

impl KvStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn write(&mut self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // write-then-rename so a reader never sees half a file
        let tmp = self.root.join(format!(".{key}.tmp"));
        std::fs::write(&tmp, contents)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move {} into place", path.display()))?;
        Ok(())
    }

    fn erase(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to erase {}", path.display())),
        }
    }
}

// ==============================================================================
// in-memory store
// ==============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl KvStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, contents: &str) -> Result<()> {
        self.entries.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn erase(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// a store that is never reachable
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct UnavailableStore;

#[cfg(test)]
impl KvStore for UnavailableStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Err(anyhow!("store unavailable reading {key}"))
    }

    fn write(&mut self, key: &str, _contents: &str) -> Result<()> {
        Err(anyhow!("store unavailable writing {key}"))
    }

    fn erase(&mut self, key: &str) -> Result<()> {
        Err(anyhow!("store unavailable erasing {key}"))
    }
}
