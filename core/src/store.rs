//! Client store abstraction.
//!
//! The shop keeps exactly three durable records: the cart, the wishlist and
//! the tickets-sold ledger. Each record is a JSON document that is replaced
//! wholesale on every save; there is no partial merge and no schema
//! versioning.
//!
//! # Implementations
//!
//! - `JsonFileStore` (in `vybz-circle`): one file per record under a data directory
//! - `InMemoryClientStore` (in `vybz-testing`): fast, inspectable test double
//!
//! # Reading
//!
//! [`load_or_default`] never fails: a missing record and a record that no
//! longer parses both come back as the type's empty value. A stale or
//! hand-edited record therefore heals itself on the next save.
//!
//! ```
//! use std::collections::BTreeMap;
//! use vybz_core::store::{load_or_default, ClientStore, StoreError, StoreKey};
//!
//! struct Corrupted;
//!
//! impl ClientStore for Corrupted {
//!     fn read(&self, _key: StoreKey) -> Result<Option<String>, StoreError> {
//!         Ok(Some("{not json".to_string()))
//!     }
//!     fn write(&self, _key: StoreKey, _payload: &str) -> Result<(), StoreError> {
//!         Ok(())
//!     }
//! }
//!
//! let sold: BTreeMap<String, u32> = load_or_default(&Corrupted, StoreKey::TicketsSold);
//! assert!(sold.is_empty());
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Names of the durable records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StoreKey {
    /// Ordered cart lines
    #[serde(rename = "cart")]
    Cart,
    /// Ordered wishlist entries
    #[serde(rename = "wishlist")]
    Wishlist,
    /// Event id → committed ticket count
    #[serde(rename = "ticketsSold")]
    TicketsSold,
}

impl StoreKey {
    /// Every record the shop persists.
    pub const ALL: [Self; 3] = [Self::Cart, Self::Wishlist, Self::TicketsSold];

    /// Storage key as written to the backing store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Wishlist => "wishlist",
            Self::TicketsSold => "ticketsSold",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while reading or writing client store records.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing medium could not be read or written.
    #[error("I/O error on record '{key}': {source}")]
    Io {
        /// Record involved
        key: StoreKey,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A value could not be encoded to JSON.
    #[error("Serialization error on record '{key}': {message}")]
    Serialization {
        /// Record involved
        key: StoreKey,
        /// Encoder message
        message: String,
    },

    /// The store is unusable (poisoned lock, missing directory, ...).
    #[error("Client store unavailable: {0}")]
    Unavailable(String),
}

/// Durable key/value storage for the shop's client-local records.
///
/// Both operations are synchronous: a save has completed (or failed) by the
/// time it returns, so a reload always reflects the last committed state.
pub trait ClientStore: Send + Sync {
    /// Raw JSON stored under `key`, or `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing medium cannot be read.
    fn read(&self, key: StoreKey) -> Result<Option<String>, StoreError>;

    /// Replace the record under `key` with `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing medium cannot be written.
    fn write(&self, key: StoreKey, payload: &str) -> Result<(), StoreError>;
}

/// Load a record, falling back to `T::default()` when it is absent,
/// unreadable or malformed.
pub fn load_or_default<T>(store: &dyn ClientStore, key: StoreKey) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(error) => {
            tracing::warn!(key = %key, error = %error, "Client store read failed, using empty record");
            return T::default();
        },
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(key = %key, error = %error, "Stored record is malformed, using empty record");
            T::default()
        },
    }
}

/// Serialize `value` and overwrite the record under `key`.
///
/// # Errors
///
/// Returns [`StoreError`] if encoding or writing fails.
pub fn save<T>(store: &dyn ClientStore, key: StoreKey, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_string(value)
        .map_err(|e| StoreError::Serialization { key, message: e.to_string() })?;
    store.write(key, &payload)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<StoreKey, String>>);

    impl ClientStore for MapStore {
        fn read(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
            Ok(self.0.lock().unwrap().get(&key).cloned())
        }

        fn write(&self, key: StoreKey, payload: &str) -> Result<(), StoreError> {
            self.0.lock().unwrap().insert(key, payload.to_string());
            Ok(())
        }
    }

    struct BrokenStore;

    impl ClientStore for BrokenStore {
        fn read(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io {
                key,
                source: std::io::Error::other("disk gone"),
            })
        }

        fn write(&self, _key: StoreKey, _payload: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read only".to_string()))
        }
    }

    #[test]
    fn missing_record_loads_as_default() {
        let store = MapStore::default();
        let cart: Vec<u32> = load_or_default(&store, StoreKey::Cart);
        assert!(cart.is_empty());
    }

    #[test]
    fn save_then_load_replaces_whole_record() {
        let store = MapStore::default();
        save(&store, StoreKey::Wishlist, &vec![1, 2, 3]).unwrap();
        save(&store, StoreKey::Wishlist, &vec![9]).unwrap();

        let wishlist: Vec<u32> = load_or_default(&store, StoreKey::Wishlist);
        assert_eq!(wishlist, vec![9]);
    }

    #[test]
    fn structurally_incompatible_record_loads_as_default() {
        let store = MapStore::default();
        store.write(StoreKey::Cart, r#"{"id": "not-a-list"}"#).unwrap();

        let cart: Vec<u32> = load_or_default(&store, StoreKey::Cart);
        assert!(cart.is_empty());
    }

    #[test]
    fn read_failure_loads_as_default() {
        let sold: HashMap<String, u32> = load_or_default(&BrokenStore, StoreKey::TicketsSold);
        assert!(sold.is_empty());
    }

    #[test]
    fn write_failure_is_reported() {
        let result = save(&BrokenStore, StoreKey::Cart, &Vec::<u32>::new());
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn keys_use_client_record_names() {
        assert_eq!(StoreKey::TicketsSold.to_string(), "ticketsSold");
        assert_eq!(
            StoreKey::ALL.map(StoreKey::as_str),
            ["cart", "wishlist", "ticketsSold"]
        );
    }
}
