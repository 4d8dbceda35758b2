//! Durable key-value storage backing the place store.
//!
//! The store keeps its whole collection under a single key, so the storage
//! layer only needs string reads and full overwrites. [`AppDbState`] provides
//! that on top of an LMDB environment; anything else implementing
//! [`KeyValueStorage`] can stand in for it.

use std::fs;
use std::path::{Path, PathBuf};

use lmdb::{Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info};

use crate::app_response::AppResponse;

const DATABASE_NAME: &str = "checkin_store";

/// Minimal persistence contract used by [`crate::place_store::PlaceStore`].
pub trait KeyValueStorage {
    /// Returns the value stored under `key`, or `None` if the key was never written.
    fn read(&self, key: &str) -> Result<Option<String>, AppResponse>;

    /// Replaces whatever is stored under `key` with `value`.
    fn write(&mut self, key: &str, value: &str) -> Result<(), AppResponse>;
}

/// LMDB-backed storage living in a `<name>.lmdb` directory.
pub struct AppDbState {
    env: Environment,
    db: Database,
    path: PathBuf,
}

impl AppDbState {
    /// Opens (or creates) the environment in `path`.
    pub fn open(path: impl AsRef<Path>, map_size: usize) -> Result<Self, AppResponse> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(map_size)
            .open(&path)?;
        let db = env.create_db(Some(DATABASE_NAME), DatabaseFlags::empty())?;

        info!("Opened LMDB environment at {}", path.display());
        Ok(Self { env, db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes every key while keeping the environment usable.
    pub fn clear_all_records(&self) -> Result<(), AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.clear_db(self.db)?;
        txn.commit()?;
        info!("Cleared all records in {}", self.path.display());
        Ok(())
    }

    /// Forces buffered data to disk.
    pub fn sync(&self) -> Result<(), AppResponse> {
        self.env.sync(true)?;
        Ok(())
    }

    /// Syncs and releases the environment.
    pub fn close(self) -> Result<(), AppResponse> {
        self.sync()?;
        info!("Closed LMDB environment at {}", self.path.display());
        Ok(())
    }
}

impl KeyValueStorage for AppDbState {
    fn read(&self, key: &str) -> Result<Option<String>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|e| {
                    AppResponse::SerializationError(format!("Value under '{key}' is not UTF-8: {e}"))
                })?;
                Some(text.to_string())
            }
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        debug!("Wrote {} bytes under '{}'", value.len(), key);
        Ok(())
    }
}
