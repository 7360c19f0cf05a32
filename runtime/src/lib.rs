//! # Bookflow Runtime
//!
//! Runtime implementation for the bookflow engine.
//!
//! This crate provides the [`Store`] that coordinates reducer execution and
//! effect handling: the action → reducer → effects → action feedback loop.
//! State mutation is serialized at the reducer, which gives the engine its
//! single-threaded, cooperative concurrency model; effects (network calls,
//! delayed ticks) run on spawned tasks and feed actions back in.
//!
//! ## Example
//!
//! ```ignore
//! use bookflow_runtime::Store;
//!
//! let store = Store::new(FlowState::default(), BookingFlowReducer, environment);
//!
//! // Send an action
//! store.send(FlowAction::LoadSlots { .. }).await?;
//!
//! // Read state
//! let step = store.state(|s| s.step()).await;
//! ```

use bookflow_core::effect::Effect;
use bookflow_core::reducer::Reducer;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

pub mod retry;

/// Errors that can occur during Store operations.
pub mod error {
    use thiserror::Error;

    /// Errors surfaced by the [`Store`](crate::Store).
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions.
        #[error("store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete.
        #[error("shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a terminal action in
        /// [`Store::send_and_wait_for`](crate::Store::send_and_wait_for).
        #[error("timeout waiting for action")]
        Timeout,

        /// The action broadcast channel closed, typically because the store
        /// is shutting down.
        #[error("action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// The Store runtime.
///
/// Owns state behind an async `RwLock`, runs the reducer while holding the
/// write lock, and executes returned effects on spawned tasks. Actions
/// produced by effects are fed back into the reducer and broadcast to
/// observers, which is what [`Store::send_and_wait_for`] builds on.
///
/// # Type Parameters
///
/// - `S`: state type
/// - `A`: action type
/// - `E`: environment type
/// - `R`: reducer implementation
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    inner: Arc<StoreInner<S, A, E, R>>,
}

struct StoreInner<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: RwLock<S>,
    reducer: R,
    environment: E,
    shutdown: AtomicBool,
    pending_effects: AtomicUsize,
    /// All actions produced by effects are broadcast to observers. This
    /// enables request-response patterns in tests and host adapters.
    action_broadcast: broadcast::Sender<A>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + Clone + std::fmt::Debug + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment.
    ///
    /// The action broadcast channel buffers 64 actions; slow observers that
    /// lag simply miss actions (the flow itself never depends on observers).
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        let (action_broadcast, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(initial_state),
                reducer,
                environment,
                shutdown: AtomicBool::new(false),
                pending_effects: AtomicUsize::new(0),
                action_broadcast,
            }),
        }
    }

    /// Send an action to the store.
    ///
    /// 1. Acquires the write lock on state
    /// 2. Calls the reducer with (state, action, environment)
    /// 3. Executes returned effects asynchronously
    ///
    /// `send()` returns after starting effect execution, not completion.
    /// Multiple concurrent `send()` calls serialize at the reducer level.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting
    /// down.
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub async fn send(&self, action: A) -> Result<(), StoreError> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(StoreError::ShutdownInProgress);
        }

        let effects = {
            let mut state = self.inner.state.write().await;
            self.inner
                .reducer
                .reduce(&mut state, action, &self.inner.environment)
        };

        for effect in effects {
            self.execute_effect(effect);
        }

        Ok(())
    }

    /// Send an action and wait for a matching result action.
    ///
    /// Designed for request-response patterns: subscribes to the action
    /// broadcast before sending (avoiding the race), sends the initial
    /// action, then returns the first effect-produced action matching the
    /// predicate.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`] if no matching action arrives in time
    /// - [`StoreError::ChannelClosed`] if the broadcast channel closes
    /// - [`StoreError::ShutdownInProgress`] if the store is shutting down
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        // Subscribe BEFORE sending to avoid missing fast responses.
        let mut rx = self.inner.action_broadcast.subscribe();

        self.send(action).await?;

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(candidate) if predicate(&candidate) => return Ok(candidate),
                    Ok(_) => {},
                    // Lagged observers keep waiting; the timeout catches
                    // anything that was dropped.
                    Err(broadcast::error::RecvError::Lagged(_)) => {},
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed)
                    },
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Read state through a projection function.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.inner.state.read().await;
        f(&state)
    }

    /// Subscribe to actions produced by effects.
    #[must_use]
    pub fn observe(&self) -> broadcast::Receiver<A> {
        self.inner.action_broadcast.subscribe()
    }

    /// Number of effects currently running.
    #[must_use]
    pub fn pending_effects(&self) -> usize {
        self.inner.pending_effects.load(Ordering::Acquire)
    }

    /// Initiate graceful shutdown: reject new actions, then wait for pending
    /// effects to complete.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
    /// when the timeout expires.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!("initiating graceful shutdown");
        self.inner.shutdown.store(true, Ordering::Release);

        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(50);

        loop {
            let pending = self.inner.pending_effects.load(Ordering::Acquire);
            if pending == 0 {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                tracing::error!(pending_effects = pending, "shutdown timed out");
                return Err(StoreError::ShutdownTimeout(pending));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn execute_effect(&self, effect: Effect<A>) {
        // Once shutdown begins, no new effects start. Without this gate a
        // self-rescheduling tick (countdown, idle, poll) would keep the
        // pending counter above zero forever.
        if self.inner.shutdown.load(Ordering::Acquire) {
            return;
        }

        match effect {
            Effect::None => {},

            Effect::Parallel(effects) => {
                for inner in effects {
                    self.execute_effect(inner);
                }
            },

            Effect::Sequential(effects) => {
                let store = self.clone();
                self.spawn_tracked(async move {
                    for inner in effects {
                        store.execute_effect_and_wait(inner).await;
                    }
                });
            },

            Effect::Delay { duration, action } => {
                let store = self.clone();
                self.spawn_tracked(async move {
                    tokio::time::sleep(duration).await;
                    store.feed_back(*action).await;
                });
            },

            Effect::Future(fut) => {
                let store = self.clone();
                self.spawn_tracked(async move {
                    if let Some(action) = fut.await {
                        store.feed_back(action).await;
                    }
                });
            },
        }
    }

    /// Sequential execution needs completion, so this variant awaits inline
    /// instead of spawning.
    async fn execute_effect_and_wait(&self, effect: Effect<A>) {
        match effect {
            Effect::None => {},
            Effect::Parallel(effects) | Effect::Sequential(effects) => {
                for inner in effects {
                    Box::pin(self.execute_effect_and_wait(inner)).await;
                }
            },
            Effect::Delay { duration, action } => {
                tokio::time::sleep(duration).await;
                self.feed_back(*action).await;
            },
            Effect::Future(fut) => {
                if let Some(action) = fut.await {
                    self.feed_back(action).await;
                }
            },
        }
    }

    /// Feed an effect-produced action back into the reducer and broadcast it
    /// to observers. Feedback ignores the shutdown flag so in-flight effects
    /// can land their final transitions.
    async fn feed_back(&self, action: A) {
        let broadcast_copy = action.clone();

        let effects = {
            let mut state = self.inner.state.write().await;
            self.inner
                .reducer
                .reduce(&mut state, action, &self.inner.environment)
        };

        // Receivers may be absent; that's fine.
        let _ = self.inner.action_broadcast.send(broadcast_copy);

        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn spawn_tracked<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.pending_effects.fetch_add(1, Ordering::AcqRel);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            fut.await;
            inner.pending_effects.fetch_sub(1, Ordering::AcqRel);
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bookflow_core::reducer::Effects;
    use bookflow_core::smallvec;

    #[derive(Clone, Debug, Default)]
    struct CounterState {
        count: i64,
        echoes: usize,
    }

    #[derive(Clone, Debug)]
    enum CounterAction {
        Increment,
        IncrementLater(Duration),
        EchoAsync,
        Echoed,
    }

    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = CounterState;
        type Action = CounterAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> Effects<Self::Action> {
            match action {
                CounterAction::Increment => {
                    state.count += 1;
                    smallvec![]
                },
                CounterAction::IncrementLater(duration) => {
                    smallvec![Effect::delay(duration, CounterAction::Increment)]
                },
                CounterAction::EchoAsync => {
                    smallvec![Effect::future(async { Some(CounterAction::Echoed) })]
                },
                CounterAction::Echoed => {
                    state.echoes += 1;
                    smallvec![]
                },
            }
        }
    }

    #[tokio::test]
    async fn send_runs_reducer_synchronously() {
        let store = Store::new(CounterState::default(), CounterReducer, ());
        store.send(CounterAction::Increment).await.unwrap();
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn delayed_action_feeds_back() {
        let store = Store::new(CounterState::default(), CounterReducer, ());
        store
            .send(CounterAction::IncrementLater(Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(store.state(|s| s.count).await, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn send_and_wait_for_matches_feedback_action() {
        let store = Store::new(CounterState::default(), CounterReducer, ());
        let result = store
            .send_and_wait_for(
                CounterAction::EchoAsync,
                |a| matches!(a, CounterAction::Echoed),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert!(matches!(result, CounterAction::Echoed));
        assert_eq!(store.state(|s| s.echoes).await, 1);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = Store::new(CounterState::default(), CounterReducer, ());
        store.shutdown(Duration::from_secs(1)).await.unwrap();
        let result = store.send(CounterAction::Increment).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
    }
}
