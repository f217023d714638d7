//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when reducers describe record writes and
//! user-facing notices.

/// Create an `Effect::Persist` overwriting one client store record.
///
/// Encoding failures are logged and degrade to `Effect::None`; the
/// in-memory state stays authoritative.
///
/// # Example
///
/// ```rust,ignore
/// use vybz_core::persist;
///
/// persist! {
///     store: env.store,
///     key: StoreKey::Cart,
///     value: &state.cart
/// }
/// ```
#[macro_export]
macro_rules! persist {
    (
        store: $store:expr,
        key: $key:expr,
        value: $value:expr
    ) => {
        match $crate::effect::Effect::persist(&$store, $key, $value) {
            Ok(effect) => effect,
            Err(error) => {
                $crate::tracing::error!(
                    key = %$key,
                    error = %error,
                    "Failed to encode record snapshot"
                );
                $crate::effect::Effect::None
            },
        }
    };
}

/// Create an `Effect::Notify` with a formatted message.
///
/// # Example
///
/// ```
/// use vybz_core::{effect::{Effect, NoticeLevel}, notify};
///
/// let effect: Effect<()> = notify!(warning: "{} is sold out", "Comedy Night");
/// match effect {
///     Effect::Notify(notice) => {
///         assert_eq!(notice.level, NoticeLevel::Warning);
///         assert_eq!(notice.message, "Comedy Night is sold out");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[macro_export]
macro_rules! notify {
    (info: $($arg:tt)+) => {
        $crate::effect::Effect::Notify($crate::effect::Notice::info(::std::format!($($arg)+)))
    };
    (warning: $($arg:tt)+) => {
        $crate::effect::Effect::Notify($crate::effect::Notice::warning(::std::format!($($arg)+)))
    };
    (error: $($arg:tt)+) => {
        $crate::effect::Effect::Notify($crate::effect::Notice::error(::std::format!($($arg)+)))
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use crate::effect::{Effect, NoticeLevel};
    use crate::store::{ClientStore, StoreError, StoreKey};
    use std::sync::Arc;

    struct NullStore;

    impl ClientStore for NullStore {
        fn read(&self, _key: StoreKey) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn write(&self, _key: StoreKey, _payload: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn persist_macro_builds_persist_effect() {
        let store: Arc<dyn ClientStore> = Arc::new(NullStore);
        let effect: Effect<()> = persist! {
            store: store,
            key: StoreKey::Wishlist,
            value: &Vec::<String>::new()
        };

        match effect {
            Effect::Persist(op) => {
                assert_eq!(op.key, StoreKey::Wishlist);
                assert_eq!(op.payload, "[]");
            },
            other => panic!("expected persist effect, got {other:?}"),
        }
    }

    #[test]
    fn notify_macro_formats_message() {
        let effect: Effect<()> = notify!(info: "Added {} x {}", 2, "Comedy Night");
        match effect {
            Effect::Notify(notice) => {
                assert_eq!(notice.level, NoticeLevel::Info);
                assert_eq!(notice.message, "Added 2 x Comedy Night");
            },
            other => panic!("expected notify effect, got {other:?}"),
        }
    }
}
