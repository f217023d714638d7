//! # Vybz Testing
//!
//! Testing utilities and helpers for the Vybz Circle shop.
//!
//! This crate provides:
//! - Mock implementations of environment traits (clock, client store)
//! - The [`ReducerTest`] given/when/then builder
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use vybz_testing::{mocks::InMemoryClientStore, test_clock};
//!
//! let store = InMemoryClientStore::new();
//! let env = ShopEnvironment::new(store.shared(), gateway, Arc::new(test_clock()));
//! ```


pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of environment traits
pub mod mocks {
    use chrono::{DateTime, Duration, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use vybz_core::environment::Clock;
    use vybz_core::store::{ClientStore, StoreError, StoreKey};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until [`FixedClock::advance`] moves it.
    ///
    /// # Example
    ///
    /// ```
    /// use vybz_testing::mocks::FixedClock;
    /// use vybz_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            if let Ok(mut time) = self.time.lock() {
                *time += by;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }

    /// In-memory client store
    ///
    /// Cheap to clone; clones share the same records, so a test can keep a
    /// handle to inspect what a session wrote or to simulate a page reload.
    #[derive(Clone, Debug, Default)]
    pub struct InMemoryClientStore {
        records: Arc<Mutex<HashMap<StoreKey, String>>>,
        writes: Arc<AtomicUsize>,
        fail_writes: Arc<AtomicBool>,
    }

    impl InMemoryClientStore {
        /// Create an empty store
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Arc-wrapped handle for environments
        #[must_use]
        pub fn shared(&self) -> Arc<dyn ClientStore> {
            Arc::new(self.clone())
        }

        /// Seed a raw record (e.g. a corrupted payload)
        pub fn seed(&self, key: StoreKey, raw: impl Into<String>) {
            if let Ok(mut records) = self.records.lock() {
                records.insert(key, raw.into());
            }
        }

        /// Raw JSON currently stored under `key`
        #[must_use]
        pub fn raw(&self, key: StoreKey) -> Option<String> {
            self.records.lock().ok().and_then(|records| records.get(&key).cloned())
        }

        /// Number of successful writes so far
        #[must_use]
        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        /// Make every following write fail
        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }
    }

    impl ClientStore for InMemoryClientStore {
        fn read(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
            let records = self
                .records
                .lock()
                .map_err(|_| StoreError::Unavailable("record lock poisoned".to_string()))?;
            Ok(records.get(&key).cloned())
        }

        fn write(&self, key: StoreKey, payload: &str) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("writes disabled".to_string()));
            }
            let mut records = self
                .records
                .lock()
                .map_err(|_| StoreError::Unavailable("record lock poisoned".to_string()))?;
            records.insert(key, payload.to_string());
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock, InMemoryClientStore};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vybz_core::environment::Clock;
    use vybz_core::store::{load_or_default, ClientStore, StoreKey};

    #[test]
    fn test_clock_is_new_year_2025() {
        let clock = test_clock();
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = test_clock();
        let before = clock.now();
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now() - before, Duration::hours(2));
    }

    #[test]
    fn in_memory_store_clones_share_records() {
        let store = InMemoryClientStore::new();
        let handle = store.shared();
        handle.write(StoreKey::Cart, "[]").unwrap();

        assert_eq!(store.raw(StoreKey::Cart).as_deref(), Some("[]"));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn in_memory_store_can_refuse_writes() {
        let store = InMemoryClientStore::new();
        store.fail_writes(true);
        assert!(store.write(StoreKey::Wishlist, "[]").is_err());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn seeded_garbage_loads_as_empty() {
        let store = InMemoryClientStore::new();
        store.seed(StoreKey::Cart, "][");
        let cart: Vec<u32> = load_or_default(&store, StoreKey::Cart);
        assert!(cart.is_empty());
    }
}
