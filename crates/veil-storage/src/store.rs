//! The store façade over the embedded LMDB environment.
//!
//! Environments are keyed singletons: [`Store::instance`] for the same
//! canonical path returns aliasing handles, so every engine sharing a
//! data directory shares one map size and one write transaction lock.
//! When a write hits a capacity condition the environment grows by its
//! growth factor and the caller retries; see
//! [`Store::with_capacity_retry`].

use crate::error::{StorageError, StorageResult};
use heed::types::Bytes;
use heed::{Database, EnvOpenOptions, RoTxn, RwTxn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Initial size of the memory map.
const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024;

/// Multiplier applied to the map size when it fills up.
const GROWTH_FACTOR: usize = 2;

/// Maximum number of named databases per environment.
const MAX_DATABASES: u32 = 16;

static INSTANCES: Lazy<Mutex<HashMap<PathBuf, Weak<Store>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// A shared handle to one embedded environment.
pub struct Store {
    env: heed::Env,
    path: PathBuf,
    /// Serializes writers across every engine sharing the environment.
    write_mutex: Mutex<()>,
}

impl Store {
    /// Open (or alias) the environment at the given path.
    pub fn instance(path: impl AsRef<Path>) -> StorageResult<Arc<Store>> {
        std::fs::create_dir_all(path.as_ref())?;
        let canonical = path.as_ref().canonicalize()?;

        let mut instances = INSTANCES.lock();

        if let Some(existing) = instances.get(&canonical).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        debug!(path = %canonical.display(), "Opening store environment");

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(DEFAULT_MAP_SIZE)
                .max_dbs(MAX_DATABASES)
                .open(&canonical)?
        };

        let store = Arc::new(Store {
            env,
            path: canonical.clone(),
            write_mutex: Mutex::new(()),
        });

        instances.insert(canonical, Arc::downgrade(&store));

        Ok(store)
    }

    /// The canonical path of the environment.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (creating if missing) a named database.
    pub fn open_database(&self, name: &str) -> StorageResult<Database<Bytes, Bytes>> {
        let mut wtxn = self.env.write_txn()?;
        let database = self.env.create_database::<Bytes, Bytes>(&mut wtxn, Some(name))?;
        wtxn.commit()?;
        Ok(database)
    }

    /// Begin a read-only transaction. Readers never block the writer.
    pub fn read_txn(&self) -> StorageResult<RoTxn<'_>> {
        Ok(self.env.read_txn()?)
    }

    /// Begin a write transaction.
    pub fn write_txn(&self) -> StorageResult<RwTxn<'_>> {
        Ok(self.env.write_txn()?)
    }

    /// Acquire the environment-wide writer lock.
    pub fn lock_writer(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.write_mutex.lock()
    }

    /// Grow the memory map by the growth factor.
    pub fn grow(&self) -> StorageResult<()> {
        let new_size = self.env.info().map_size * GROWTH_FACTOR;

        trace!(
            path = %self.path.display(),
            new_size,
            "Growing store environment"
        );

        unsafe { self.env.resize(new_size)? };
        Ok(())
    }

    /// Run a transactional operation, transparently growing the map and
    /// retrying whenever the store reports a capacity condition. The
    /// operation must begin its own transaction on each attempt so a
    /// failed attempt is fully aborted before the retry.
    pub fn with_capacity_retry<T>(
        &self,
        mut operation: impl FnMut() -> StorageResult<T>,
    ) -> StorageResult<T> {
        loop {
            match operation() {
                Err(error) if error.is_capacity() => {
                    trace!(%error, "Store capacity reached, growing and retrying");
                    self.grow()?;
                }
                other => return other,
            }
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        INSTANCES.lock().remove(&self.path);
    }
}
