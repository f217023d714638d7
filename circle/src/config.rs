//! Configuration management for the shop.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Client store configuration
    pub store: StoreConfig,
    /// Checkout configuration
    pub checkout: CheckoutConfig,
    /// Optional JSON catalog for the demo (`VYBZ_CATALOG_PATH`)
    pub catalog_path: Option<PathBuf>,
}

/// Client store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `cart.json`, `wishlist.json` and `ticketsSold.json`
    pub data_dir: PathBuf,
}

/// Checkout configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Simulated payment processing delay in milliseconds (default: 2000)
    pub payment_delay_ms: u64,
    /// How long callers wait for an outcome, in seconds (default: 30)
    pub timeout_secs: u64,
    /// Display currency label (default: KES)
    pub currency: String,
}

impl CheckoutConfig {
    /// Payment delay as a `Duration`
    #[must_use]
    pub const fn payment_delay(&self) -> Duration {
        Duration::from_millis(self.payment_delay_ms)
    }

    /// Outcome wait timeout as a `Duration`
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                data_dir: PathBuf::from(".vybz"),
            },
            checkout: CheckoutConfig {
                payment_delay_ms: 2000,
                timeout_secs: 30,
                currency: "KES".to_string(),
            },
            catalog_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            store: StoreConfig {
                data_dir: lookup("VYBZ_DATA_DIR")
                    .filter(|s| !s.trim().is_empty())
                    .map_or(defaults.store.data_dir, PathBuf::from),
            },
            checkout: CheckoutConfig {
                payment_delay_ms: lookup("VYBZ_PAYMENT_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.checkout.payment_delay_ms),
                timeout_secs: lookup("VYBZ_CHECKOUT_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|&secs: &u64| secs > 0)
                    .unwrap_or(defaults.checkout.timeout_secs),
                currency: lookup("VYBZ_CURRENCY")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.checkout.currency),
            },
            catalog_path: lookup("VYBZ_CATALOG_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.checkout.payment_delay(), Duration::from_secs(2));
        assert_eq!(config.checkout.timeout(), Duration::from_secs(30));
        assert_eq!(config.store.data_dir, PathBuf::from(".vybz"));
    }

    #[test]
    fn variables_override_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("VYBZ_DATA_DIR", "/tmp/vybz"),
            ("VYBZ_PAYMENT_DELAY_MS", "50"),
            ("VYBZ_CHECKOUT_TIMEOUT_SECS", "5"),
            ("VYBZ_CURRENCY", "USD"),
            ("VYBZ_CATALOG_PATH", "events.json"),
        ]));
        assert_eq!(config.store.data_dir, PathBuf::from("/tmp/vybz"));
        assert_eq!(config.checkout.payment_delay_ms, 50);
        assert_eq!(config.checkout.timeout_secs, 5);
        assert_eq!(config.checkout.currency, "USD");
        assert_eq!(config.catalog_path, Some(PathBuf::from("events.json")));
    }

    #[test]
    fn garbage_falls_back() {
        let config = Config::from_lookup(lookup(&[
            ("VYBZ_PAYMENT_DELAY_MS", "soon"),
            ("VYBZ_CHECKOUT_TIMEOUT_SECS", "0"),
            ("VYBZ_DATA_DIR", "  "),
        ]));
        assert_eq!(config, Config::default());
    }
}
