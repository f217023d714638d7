//! Integration tests for the session runtime
//!
//! Covers inline persistence, notice broadcasting, waiting for outcome
//! actions produced by effects, and graceful shutdown.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use std::time::Duration;
use vybz_core::{
    effect::{Effect, NoticeLevel},
    notify, persist,
    reducer::Reducer,
    smallvec,
    store::{ClientStore, StoreKey},
    SmallVec,
};
use vybz_runtime::{Session, SessionError};
use vybz_testing::InMemoryClientStore;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TallyAction {
    /// Bump the tally and save it
    Bump,
    /// Saved tally (outcome)
    Bumped { value: u32 },
    /// Start a slow job that reports after `after`
    Slow { id: u64, after: Duration },
    /// Slow job done (outcome)
    SlowDone { id: u64 },
    /// Run several steps in order
    Steps,
    /// One step of `Steps`
    Step { n: u32 },
}

#[derive(Debug, Clone, Default)]
struct TallyState {
    value: u32,
    steps: Vec<u32>,
    finished: Vec<u64>,
}

#[derive(Clone)]
struct TallyEnvironment {
    store: Arc<dyn ClientStore>,
}

#[derive(Clone)]
struct TallyReducer;

impl Reducer for TallyReducer {
    type State = TallyState;
    type Action = TallyAction;
    type Environment = TallyEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            TallyAction::Bump => {
                state.value += 1;
                let value = state.value;
                smallvec![
                    persist! { store: env.store, key: StoreKey::TicketsSold, value: &value },
                    notify!(info: "Tally is {value}"),
                    Effect::emit(TallyAction::Bumped { value }),
                ]
            },
            TallyAction::Slow { id, after } => smallvec![Effect::Delay {
                duration: after,
                action: Box::new(TallyAction::SlowDone { id }),
            }],
            TallyAction::SlowDone { id } => {
                state.finished.push(id);
                smallvec![Effect::None]
            },
            TallyAction::Steps => smallvec![Effect::chain(vec![
                Effect::emit(TallyAction::Step { n: 1 }),
                Effect::Delay {
                    duration: Duration::from_millis(5),
                    action: Box::new(TallyAction::Step { n: 2 }),
                },
                Effect::emit(TallyAction::Step { n: 3 }),
            ])],
            TallyAction::Step { n } => {
                state.steps.push(n);
                smallvec![Effect::None]
            },
            TallyAction::Bumped { .. } => smallvec![Effect::None],
        }
    }
}

type TallySession = Session<TallyState, TallyAction, TallyEnvironment, TallyReducer>;

fn session(store: &InMemoryClientStore) -> TallySession {
    Session::new(
        TallyState::default(),
        TallyReducer,
        TallyEnvironment {
            store: store.shared(),
        },
    )
}

// ============================================================================
// Tests
// ============================================================================

/// Persist effects have been written by the time `send` returns.
#[tokio::test]
async fn test_persist_runs_before_send_returns() {
    let store = InMemoryClientStore::new();
    let session = session(&store);

    session.send(TallyAction::Bump).await.unwrap();
    session.send(TallyAction::Bump).await.unwrap();

    assert_eq!(store.raw(StoreKey::TicketsSold).as_deref(), Some("2"));
    assert_eq!(store.write_count(), 2);
    assert_eq!(session.state(|s| s.value).await, 2);
}

/// A failing store is logged; state still advances.
#[tokio::test]
async fn test_persist_failure_does_not_block_state() {
    let store = InMemoryClientStore::new();
    store.fail_writes(true);
    let session = session(&store);

    session.send(TallyAction::Bump).await.unwrap();

    assert!(store.raw(StoreKey::TicketsSold).is_none());
    assert_eq!(session.state(|s| s.value).await, 1);
}

#[tokio::test]
async fn test_notices_are_broadcast() {
    let store = InMemoryClientStore::new();
    let session = session(&store);
    let mut notices = session.subscribe_notices();

    session.send(TallyAction::Bump).await.unwrap();

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);
    assert_eq!(notice.message, "Tally is 1");
}

#[tokio::test]
async fn test_send_and_wait_for_outcome() {
    let store = InMemoryClientStore::new();
    let session = session(&store);

    let outcome = session
        .send_and_wait_for(
            TallyAction::Bump,
            |a| matches!(a, TallyAction::Bumped { .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(outcome, TallyAction::Bumped { value: 1 });
}

/// Outcomes are broadcast only after they were reduced.
#[tokio::test(start_paused = true)]
async fn test_outcome_is_reduced_before_broadcast() {
    let store = InMemoryClientStore::new();
    let session = session(&store);

    session
        .send_and_wait_for(
            TallyAction::Slow {
                id: 7,
                after: Duration::from_secs(3),
            },
            |a| matches!(a, TallyAction::SlowDone { id: 7 }),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

    assert_eq!(session.state(|s| s.finished.clone()).await, vec![7]);
}

#[tokio::test(start_paused = true)]
async fn test_send_and_wait_for_times_out() {
    let store = InMemoryClientStore::new();
    let session = session(&store);

    let result = session
        .send_and_wait_for(
            TallyAction::Slow {
                id: 1,
                after: Duration::from_secs(60),
            },
            |a| matches!(a, TallyAction::SlowDone { .. }),
            Duration::from_secs(5),
        )
        .await;

    assert!(matches!(result, Err(SessionError::Timeout)));
}

/// Concurrent waiters each get their own outcome.
#[tokio::test(start_paused = true)]
async fn test_waiters_match_their_own_outcome() {
    let store = InMemoryClientStore::new();
    let session = session(&store);

    let wait = |id: u64, secs: u64| {
        session.send_and_wait_for(
            TallyAction::Slow {
                id,
                after: Duration::from_secs(secs),
            },
            move |a| matches!(a, TallyAction::SlowDone { id: done } if *done == id),
            Duration::from_secs(30),
        )
    };

    let (slow, fast) = tokio::join!(wait(1, 5), wait(2, 1));

    assert_eq!(slow.unwrap(), TallyAction::SlowDone { id: 1 });
    assert_eq!(fast.unwrap(), TallyAction::SlowDone { id: 2 });
    assert_eq!(session.state(|s| s.finished.clone()).await, vec![2, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_effects_keep_order() {
    let store = InMemoryClientStore::new();
    let session = session(&store);

    session
        .send_and_wait_for(
            TallyAction::Steps,
            |a| matches!(a, TallyAction::Step { n: 3 }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(session.state(|s| s.steps.clone()).await, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_effects_then_rejects() {
    let store = InMemoryClientStore::new();
    let session = session(&store);

    session
        .send(TallyAction::Slow {
            id: 1,
            after: Duration::from_millis(500),
        })
        .await
        .unwrap();
    assert_eq!(session.pending_effects(), 1);

    session.shutdown(Duration::from_secs(5)).await.unwrap();
    assert_eq!(session.pending_effects(), 0);

    let rejected = session.send(TallyAction::Bump).await;
    assert!(matches!(rejected, Err(SessionError::ShutdownInProgress)));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_times_out_with_pending_effects() {
    let store = InMemoryClientStore::new();
    let session = session(&store);

    session
        .send(TallyAction::Slow {
            id: 1,
            after: Duration::from_secs(60),
        })
        .await
        .unwrap();

    let result = session.shutdown(Duration::from_secs(1)).await;
    assert!(matches!(result, Err(SessionError::ShutdownTimeout(1))));
}
