//! # Vybz Runtime
//!
//! Runtime for the Vybz Circle shop: the [`Session`](session::Session) owns
//! the shop state, runs the reducer for every action and executes the effects
//! it returns.
//!
//! ## Effect execution
//!
//! - `Persist` and `Notify` run **inline**, while the state lock is still
//!   held, so a record on disk always matches the state that produced it and
//!   has been written by the time `send` returns.
//! - `Future` and `Delay` are spawned on the tokio runtime. The action they
//!   produce is fed back through `send` and then broadcast to observers.
//! - `Parallel` fans out; `Sequential` runs its inline effects in order and
//!   awaits its async effects one after another on a single task.
//!
//! ## Example
//!
//! ```ignore
//! use vybz_runtime::Session;
//!
//! let session = Session::new(ShopState::default(), ShopReducer::new(), env);
//! session.send(ShopAction::AddToCart { event }).await?;
//! let lines = session.state(|s| s.cart.len()).await;
//! ```

pub mod metrics;

pub use session::{Session, SessionError};

/// Session module - state ownership and effect execution
pub mod session {
    use crate::metrics::names;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use thiserror::Error;
    use tokio::sync::{RwLock, broadcast};
    use vybz_core::effect::{Effect, Notice, NoticeLevel, PersistOperation};
    use vybz_core::reducer::Reducer;

    /// Errors returned by session operations.
    #[derive(Error, Debug)]
    pub enum SessionError {
        /// Session is shutting down and not accepting new actions
        #[error("Session is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a terminal action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }

    /// Decrements the pending-effect counter when an async effect finishes,
    /// including when its task panics.
    struct PendingGuard(Arc<AtomicUsize>);

    impl Drop for PendingGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// The Session - owns state and runs the reducer/effect loop
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer type
    pub struct Session<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Actions produced by effects, broadcast after they were reduced.
        action_broadcast: broadcast::Sender<A>,
        /// User-facing notices produced by `Effect::Notify`.
        notice_broadcast: broadcast::Sender<Notice>,
    }

    impl<S, A, E, R> Clone for Session<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                action_broadcast: self.action_broadcast.clone(),
                notice_broadcast: self.notice_broadcast.clone(),
            }
        }
    }

    impl<S, A, E, R> Session<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + std::fmt::Debug + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new session with initial state, reducer, and environment
        ///
        /// Broadcast channels hold 16 actions and 16 notices; use
        /// [`Session::with_broadcast_capacity`] for chattier observers.
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, environment, 16)
        }

        /// Create a new session with custom broadcast channel capacity.
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity);
            let (notice_broadcast, _) = broadcast::channel(capacity);

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
                notice_broadcast,
            }
        }

        /// The injected environment.
        #[must_use]
        pub fn environment(&self) -> &E {
            &self.environment
        }

        /// Send an action to the session
        ///
        /// Runs the reducer under the state write lock and executes inline
        /// effects before releasing it. Async effects are spawned and keep
        /// running after this returns.
        ///
        /// # Errors
        ///
        /// Returns [`SessionError::ShutdownInProgress`] once shutdown started.
        #[tracing::instrument(skip(self, action), name = "session_send")]
        pub async fn send(&self, action: A) -> Result<(), SessionError> {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::warn!("Rejecting action, session is shutting down");
                return Err(SessionError::ShutdownInProgress);
            }

            ::metrics::counter!(names::ACTIONS_SENT).increment(1);
            tracing::trace!(?action, "Reducing action");

            let mut state = self.state.write().await;
            let effects = self.reducer.reduce(&mut *state, action, &self.environment);
            for effect in effects {
                self.execute_effect(effect);
            }
            drop(state);

            Ok(())
        }

        /// Send an action and wait for a matching result action
        ///
        /// Subscribes to the action broadcast before sending, then returns the
        /// first effect-produced action matching `predicate`. Matching actions
        /// have already been reduced, so state reads afterwards observe them.
        ///
        /// # Errors
        ///
        /// - [`SessionError::Timeout`]: no matching action within `timeout`
        /// - [`SessionError::ChannelClosed`]: broadcast channel closed
        /// - [`SessionError::ShutdownInProgress`]: session is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, SessionError>
        where
            F: Fn(&A) -> bool,
        {
            // Subscribe BEFORE sending to avoid race condition
            let mut rx = self.action_broadcast.subscribe();

            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(SessionError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| SessionError::Timeout)?
        }

        /// Subscribe to actions produced by effects.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Subscribe to user-facing notices.
        #[must_use]
        pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
            self.notice_broadcast.subscribe()
        }

        /// Read current state via a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Number of async effects still running.
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::SeqCst)
        }

        /// Stop accepting actions and wait for running effects to finish.
        ///
        /// # Errors
        ///
        /// Returns [`SessionError::ShutdownTimeout`] if effects are still
        /// running when `timeout` elapses.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), SessionError> {
            self.shutdown.store(true, Ordering::SeqCst);
            tracing::info!("Session shutdown initiated");

            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let pending = self.pending_effects();
                if pending == 0 {
                    tracing::info!("Session shutdown complete");
                    return Ok(());
                }
                if tokio::time::Instant::now() >= deadline {
                    tracing::warn!(pending, "Session shutdown timed out");
                    return Err(SessionError::ShutdownTimeout(pending));
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        fn track(&self) -> PendingGuard {
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            PendingGuard(Arc::clone(&self.pending_effects))
        }

        fn persist(op: &PersistOperation) {
            ::metrics::counter!(names::EFFECTS_EXECUTED, "type" => "persist").increment(1);
            match op.store.write(op.key, &op.payload) {
                Ok(()) => tracing::debug!(key = %op.key, bytes = op.payload.len(), "Record persisted"),
                Err(error) => {
                    ::metrics::counter!(names::PERSIST_FAILED, "key" => op.key.as_str()).increment(1);
                    tracing::error!(key = %op.key, error = %error, "Failed to persist record");
                },
            }
        }

        fn notify(&self, notice: Notice) {
            ::metrics::counter!(names::EFFECTS_EXECUTED, "type" => "notify").increment(1);
            match notice.level {
                NoticeLevel::Info => tracing::info!(notice = %notice, "Notice"),
                NoticeLevel::Warning => tracing::warn!(notice = %notice, "Notice"),
                NoticeLevel::Error => tracing::error!(notice = %notice, "Notice"),
            }
            // No subscribers is fine; notices are best-effort
            let _ = self.notice_broadcast.send(notice);
        }

        /// Feed an effect-produced action back through the reducer, then
        /// broadcast it to observers.
        async fn feed_back(&self, action: A) {
            if let Err(error) = self.send(action.clone()).await {
                tracing::warn!(error = %error, "Dropping effect-produced action");
                return;
            }
            let _ = self.action_broadcast.send(action);
        }

        /// Await an async effect to completion on the current task.
        async fn run_to_completion(&self, effect: Effect<A>) {
            match effect {
                Effect::Future(fut) => {
                    if let Some(action) = fut.await {
                        self.feed_back(action).await;
                    }
                },
                Effect::Delay { duration, action } => {
                    tokio::time::sleep(duration).await;
                    self.feed_back(*action).await;
                },
                other => self.execute_effect(other),
            }
        }

        /// Execute an effect
        ///
        /// Inline effects complete before this returns; async effects are
        /// spawned and tracked in the pending-effect counter.
        fn execute_effect(&self, effect: Effect<A>) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                },
                Effect::Persist(op) => Self::persist(&op),
                Effect::Notify(notice) => self.notify(notice),
                Effect::Future(fut) => {
                    ::metrics::counter!(names::EFFECTS_EXECUTED, "type" => "future").increment(1);
                    let guard = self.track();
                    let session = self.clone();
                    tokio::spawn(async move {
                        let _guard = guard;
                        if let Some(action) = fut.await {
                            session.feed_back(action).await;
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    ::metrics::counter!(names::EFFECTS_EXECUTED, "type" => "delay").increment(1);
                    let guard = self.track();
                    let session = self.clone();
                    tokio::spawn(async move {
                        let _guard = guard;
                        tokio::time::sleep(duration).await;
                        session.feed_back(*action).await;
                    });
                },
                Effect::Parallel(effects) => {
                    tracing::trace!(count = effects.len(), "Executing Effect::Parallel");
                    for effect in effects {
                        self.execute_effect(effect);
                    }
                },
                Effect::Sequential(effects) => {
                    tracing::trace!(count = effects.len(), "Executing Effect::Sequential");
                    let mut deferred = Vec::new();
                    for effect in effects {
                        match effect {
                            inline @ (Effect::None | Effect::Persist(_) | Effect::Notify(_)) => {
                                self.execute_effect(inline);
                            },
                            other => deferred.push(other),
                        }
                    }
                    if deferred.is_empty() {
                        return;
                    }
                    let guard = self.track();
                    let session = self.clone();
                    tokio::spawn(async move {
                        let _guard = guard;
                        for effect in deferred {
                            session.run_to_completion(effect).await;
                        }
                    });
                },
            }
        }
    }
}
