//! # Vybz Core
//!
//! Core traits and types for the Vybz Circle shop.
//!
//! The shop is built as a reducer over client-local state. Every user action
//! (add a ticket, toggle a wishlist entry, pay) is an `Action`; a `Reducer`
//! applies it to `State` and returns `Effect` descriptions that a runtime
//! session executes (persist a record, surface a notice, await a payment).
//!
//! ## Core Concepts
//!
//! - **State**: cart, wishlist, ledger and checkout progress
//! - **Action**: all inputs to a reducer (user commands and feedback events)
//! - **Reducer**: pure function `(State, Action, Environment) → Effects`
//! - **Effect**: side effect descriptions (not execution)
//! - **Environment**: injected dependencies via traits
//! - **Client store**: durable key/value records (`cart`, `wishlist`, `ticketsSold`)
//!
//! ## Example
//!
//! ```
//! use vybz_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Default)]
//! struct Counter {
//!     taps: u32,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum CounterAction {
//!     Tap,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = Counter;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Counter,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         match action {
//!             CounterAction::Tap => {
//!                 state.taps += 1;
//!                 smallvec![Effect::None]
//!             }
//!         }
//!     }
//! }
//!
//! let mut state = Counter::default();
//! let _ = CounterReducer.reduce(&mut state, CounterAction::Tap, &());
//! assert_eq!(state.taps, 1);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

#[doc(hidden)]
pub use tracing;

pub mod effect_macros;
pub mod store;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime session.
/// They are values (not execution). `Persist` and `Notify` run inline, before
/// the session's `send` returns; `Future` and `Delay` run on the async runtime
/// and feed their resulting action back into the reducer.
pub mod effect {
    use crate::store::{ClientStore, StoreError, StoreKey};
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    /// Severity of a user-facing notice.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum NoticeLevel {
        /// Informational (item added, payment succeeded)
        Info,
        /// Blocking notice the user should act on (sold out)
        Warning,
        /// Something went wrong (payment declined)
        Error,
    }

    /// A message meant for the person using the shop.
    ///
    /// The runtime broadcasts notices to subscribers; how they are shown
    /// (toast, banner, terminal line) is up to the presentation layer.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Notice {
        /// Severity
        pub level: NoticeLevel,
        /// Human readable text
        pub message: String,
    }

    impl Notice {
        /// Informational notice
        #[must_use]
        pub fn info(message: impl Into<String>) -> Self {
            Self {
                level: NoticeLevel::Info,
                message: message.into(),
            }
        }

        /// Warning notice
        #[must_use]
        pub fn warning(message: impl Into<String>) -> Self {
            Self {
                level: NoticeLevel::Warning,
                message: message.into(),
            }
        }

        /// Error notice
        #[must_use]
        pub fn error(message: impl Into<String>) -> Self {
            Self {
                level: NoticeLevel::Error,
                message: message.into(),
            }
        }
    }

    impl fmt::Display for Notice {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message)
        }
    }

    /// A full overwrite of one client store record.
    pub struct PersistOperation {
        /// Store to write into
        pub store: Arc<dyn ClientStore>,
        /// Record being replaced
        pub key: StoreKey,
        /// Serialized JSON snapshot
        pub payload: String,
    }

    impl fmt::Debug for PersistOperation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("PersistOperation")
                .field("key", &self.key)
                .field("payload_len", &self.payload.len())
                .finish_non_exhaustive()
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Overwrite a client store record (executed synchronously)
        Persist(PersistOperation),

        /// Surface a notice to the user
        Notify(Notice),

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Delayed action
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Persist(op) => f.debug_tuple("Effect::Persist").field(op).finish(),
                Effect::Notify(notice) => f.debug_tuple("Effect::Notify").field(notice).finish(),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Serialize `value` and describe overwriting `key` with it.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Serialization`] if `value` cannot be encoded.
        pub fn persist<T>(
            store: &Arc<dyn ClientStore>,
            key: StoreKey,
            value: &T,
        ) -> Result<Effect<Action>, StoreError>
        where
            T: Serialize + ?Sized,
        {
            let payload = serde_json::to_string(value)
                .map_err(|e| StoreError::Serialization { key, message: e.to_string() })?;
            Ok(Effect::Persist(PersistOperation {
                store: Arc::clone(store),
                key,
                payload,
            }))
        }

        /// Wrap an already-known action so it is fed back through the runtime.
        ///
        /// Used for outcome events that callers wait on.
        #[must_use]
        pub fn emit(action: Action) -> Effect<Action>
        where
            Action: Send + 'static,
        {
            Effect::Future(Box::pin(async move { Some(action) }))
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::effect::{Effect, Notice, NoticeLevel};
    use super::store::{ClientStore, StoreError, StoreKey};
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
    fn persist_effect_carries_json_payload() {
        let store: Arc<dyn ClientStore> = Arc::new(NullStore);
        let effect = Effect::<()>::persist(&store, StoreKey::TicketsSold, &[("42", 3)]).unwrap();

        match effect {
            Effect::Persist(op) => {
                assert_eq!(op.key, StoreKey::TicketsSold);
                assert_eq!(op.payload, r#"[["42",3]]"#);
            },
            other => panic!("expected persist effect, got {other:?}"),
        }
    }

    #[test]
    fn notice_constructors_set_level() {
        assert_eq!(Notice::info("a").level, NoticeLevel::Info);
        assert_eq!(Notice::warning("b").level, NoticeLevel::Warning);
        assert_eq!(Notice::error("c").to_string(), "c");
    }

    #[test]
    fn emit_resolves_to_action() {
        let Effect::Future(fut) = Effect::emit(7_u32) else {
            panic!("emit should produce a future effect");
        };
        assert_eq!(tokio_test::block_on(fut), Some(7));
    }
}
