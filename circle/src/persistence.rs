//! File-backed client store.
//!
//! One JSON document per record under a data directory:
//!
//! ```text
//! <data_dir>/cart.json
//! <data_dir>/wishlist.json
//! <data_dir>/ticketsSold.json
//! ```
//!
//! Writes go to a sibling temp file that is then renamed over the record, so
//! a crash mid-write leaves either the old or the new document, never half of
//! one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use vybz_core::store::{ClientStore, StoreError, StoreKey};

/// [`ClientStore`] writing `<key>.json` files into a directory.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) the data directory.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            StoreError::Unavailable(format!("cannot create data directory {}: {e}", dir.display()))
        })?;
        tracing::debug!(dir = %dir.display(), "Opened client store");
        Ok(Self { dir })
    }

    /// Directory holding the records
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `key`
    #[must_use]
    pub fn path_of(&self, key: StoreKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl ClientStore for JsonFileStore {
    fn read(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_of(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { key, source }),
        }
    }

    fn write(&self, key: StoreKey, payload: &str) -> Result<(), StoreError> {
        let path = self.path_of(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key.as_str()));

        let io = |source| StoreError::Io { key, source };
        let mut file = fs::File::create(&tmp).map_err(io)?;
        file.write_all(payload.as_bytes()).map_err(io)?;
        file.sync_all().map_err(io)?;
        drop(file);
        fs::rename(&tmp, &path).map_err(io)?;

        tracing::trace!(path = %path.display(), bytes = payload.len(), "Record written");
        Ok(())
    }
}
