//! Route table persistence.
//!
//! The computed route table is written to a shared store after discovery and
//! read back on the next boot, but only in production mode. Outside
//! production both operations are no-ops so edits to controllers show up
//! immediately.

use crate::logging::{debug, trace, warn};
use crate::route::RouteRecord;
use crate::runtime_config::RuntimeMode;
use crate::{Error, Result};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fixed key shared by save and load.
pub const ROUTE_CACHE_KEY: &str = "trellis-routes.cache.json";

/// Minimal key/value storage behind the route cache.
pub trait CacheStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace whatever is stored under `key`.
    fn write(&self, key: &str, contents: &str) -> Result<()>;
}

/// One file per key inside a directory, the system temp dir by default.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn temp() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::temp()
    }
}

impl CacheStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_for(key);
        // Truncate only once the lock is held.
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        file.lock_exclusive()?;
        let written = replace_contents(&mut file, contents);
        let unlocked = FileExt::unlock(&file);

        written?;
        unlocked?;
        trace!(path = %path.display(), bytes = contents.len(), "Cache file written");
        Ok(())
    }
}

fn replace_contents(file: &mut File, contents: &str) -> std::io::Result<()> {
    file.set_len(0)?;
    file.write_all(contents.as_bytes())?;
    file.flush()
}

/// In-process store, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

/// Production-only persistence of the route table.
#[derive(Clone)]
pub struct RouteCache {
    store: Arc<dyn CacheStore>,
    mode: RuntimeMode,
}

impl RouteCache {
    pub fn new(store: Arc<dyn CacheStore>, mode: RuntimeMode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.mode.is_production()
    }

    /// The cached table, or `None` outside production or on a miss.
    ///
    /// An unreadable entry counts as a miss.
    pub fn load(&self) -> Result<Option<Vec<RouteRecord>>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let Some(contents) = self.store.read(ROUTE_CACHE_KEY)? else {
            debug!("Route cache miss");
            return Ok(None);
        };

        match serde_json::from_str::<Vec<RouteRecord>>(&contents) {
            Ok(table) => {
                debug!(routes = table.len(), "Route cache hit");
                Ok(Some(table))
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable route cache");
                Ok(None)
            }
        }
    }

    /// Persist `table`, overwriting the previous entry. No-op outside production.
    pub fn save(&self, table: &[RouteRecord]) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let contents = serde_json::to_string_pretty(table)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        self.store.write(ROUTE_CACHE_KEY, &contents)?;
        debug!(routes = table.len(), "Route table cached");
        Ok(())
    }
}
