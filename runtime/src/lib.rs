//! # `PopSeoul` Runtime
//!
//! Runtime implementation for the `PopSeoul` client state architecture.
//!
//! This crate provides the Store that serializes reducer execution and the
//! effect scheduler that runs effects concurrently and cancels them by
//! identity.
//!
//! ## Core Components
//!
//! - **Store**: Holds the one live state of a root feature and processes
//!   actions one at a time
//! - **Scheduler**: Runs effects as Tokio tasks and feeds their actions back
//!   through the store's mailbox
//! - **Cancellation registry**: Maps cancellation identities to running
//!   tasks, so a popped screen or a superseded request stops delivering
//!
//! ## Example
//!
//! ```ignore
//! use popseoul_runtime::Store;
//!
//! let store = Store::new(MainTabState::default(), MainTabFeature::reducer(), environment);
//!
//! // Send an action
//! store.send(MainTabAction::Home(HomeTabAction::OnAppear)).await?;
//!
//! // Read state
//! let banners = store.state(|s| s.home.banner_list.len()).await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, watch};

mod scheduler;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// The remaining effects were cancelled.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for an action or for the store to become idle
        #[error("Timeout waiting for store")]
        Timeout,

        /// The store's processing loop is gone
        ///
        /// Returned when the loop stopped, typically because a reducer panicked.
        #[error("Store channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;
pub use store::Store;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use popseoul_runtime::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_broadcast_capacity(64)
///     .with_max_synchronous_sends(256)
///     .with_shutdown_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.action_broadcast_capacity, 64);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the broadcast channel of effect-produced actions
    pub action_broadcast_capacity: usize,
    /// Maximum synchronous sends drained for one incoming action
    ///
    /// Guards against reducers that keep sending to themselves. Actions
    /// beyond the bound are dropped and logged.
    pub max_synchronous_sends: usize,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(
        action_broadcast_capacity: usize,
        max_synchronous_sends: usize,
        default_shutdown_timeout: Duration,
    ) -> Self {
        Self {
            action_broadcast_capacity,
            max_synchronous_sends,
            default_shutdown_timeout,
        }
    }

    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.action_broadcast_capacity = capacity;
        self
    }

    /// Set the synchronous send bound
    #[must_use]
    pub const fn with_max_synchronous_sends(mut self, max: usize) -> Self {
        self.max_synchronous_sends = max;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            action_broadcast_capacity: 16,
            max_synchronous_sends: 1000,
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects started
/// directly by that action. Effects started by follow-up actions are not
/// tracked. A cancelled effect counts as complete.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(DetailChallengeAction::OnAppear).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a new handle and the tracking half used by the scheduler
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    ///
    /// Useful for initialization in loops where you need a `last_handle`.
    #[must_use]
    pub fn completed() -> Self {
        let (tx, rx) = watch::channel(());
        let _ = tx.send(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Number of tracked effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all tracked effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all tracked effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all
    /// effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: Tracking half of an [`EffectHandle`]
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    /// Effect started
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Effect completed or cancelled
    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: Count of queued actions plus running effect tasks
///
/// Zero means the store is idle.
#[derive(Default)]
struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

impl Outstanding {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.current() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Store module - The runtime for reducers
pub mod store {
    use super::scheduler::{Envelope, Scheduler};
    use super::{Arc, Duration, EffectHandle, Outstanding, StoreConfig, StoreError};
    use popseoul_core::{EffectId, Reducer};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::{RwLock, broadcast, mpsc, oneshot, watch};

    /// State shared between store clones and the processing loop
    pub(crate) struct Shared<S, A> {
        pub(crate) state: RwLock<S>,
        pub(crate) actions: broadcast::Sender<A>,
        pub(crate) revision: watch::Sender<u64>,
        pub(crate) outstanding: Arc<Outstanding>,
        pub(crate) config: StoreConfig,
        shutdown: AtomicBool,
    }

    /// Sending half of the processing loop's mailbox
    ///
    /// Dropping the last store clone stops the loop and cancels every
    /// running effect.
    struct Mailbox<A> {
        tx: mpsc::UnboundedSender<Envelope<A>>,
    }

    impl<A> Drop for Mailbox<A> {
        fn drop(&mut self) {
            let _ = self.tx.send(Envelope::Close);
        }
    }

    /// The Store - runtime coordinator for a root feature
    ///
    /// The Store manages:
    /// 1. State (one live value, behind a `RwLock` for readers)
    /// 2. A processing loop that applies the reducer to one action at a time
    /// 3. Effect execution, with follow-up actions fed back through the loop
    /// 4. Cancellation of running effects by identity
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    pub struct Store<S, A> {
        shared: Arc<Shared<S, A>>,
        mailbox: Arc<Mailbox<A>>,
    }

    impl<S, A> Clone for Store<S, A> {
        fn clone(&self) -> Self {
            Self {
                shared: Arc::clone(&self.shared),
                mailbox: Arc::clone(&self.mailbox),
            }
        }
    }

    impl<S, A> Store<S, A>
    where
        S: Send + Sync + 'static,
        A: Clone + Send + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// # Panics
        ///
        /// Panics if called outside a Tokio runtime (the processing loop is
        /// spawned immediately).
        #[must_use]
        pub fn new<R, E>(initial_state: S, reducer: R, environment: E) -> Self
        where
            R: Reducer<State = S, Action = A, Environment = E> + Send + 'static,
            E: Send + 'static,
        {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new store with custom configuration
        ///
        /// # Panics
        ///
        /// Panics if called outside a Tokio runtime.
        #[must_use]
        pub fn with_config<R, E>(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self
        where
            R: Reducer<State = S, Action = A, Environment = E> + Send + 'static,
            E: Send + 'static,
        {
            let (actions, _) = broadcast::channel(config.action_broadcast_capacity.max(1));
            let (revision, _) = watch::channel(0);
            let (tx, rx) = mpsc::unbounded_channel();

            let shared = Arc::new(Shared {
                state: RwLock::new(initial_state),
                actions,
                revision,
                outstanding: Arc::new(Outstanding::default()),
                config,
                shutdown: AtomicBool::new(false),
            });

            let scheduler = Scheduler::new(Arc::clone(&shared), reducer, environment, tx.clone());
            tokio::spawn(scheduler.run(rx));

            Self {
                shared,
                mailbox: Arc::new(Mailbox { tx }),
            }
        }

        /// Send an action to the store
        ///
        /// Resolves once the reducer has applied the action and every
        /// synchronous send it produced. Asynchronous effects keep running;
        /// use the returned [`EffectHandle`] to wait for them.
        ///
        /// # Errors
        ///
        /// - [`StoreError::ShutdownInProgress`] if the store is shutting down
        /// - [`StoreError::ChannelClosed`] if the processing loop stopped
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shared.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.actions.total").increment(1);

            let (handle, tracking) = EffectHandle::new();
            let (ack, done) = oneshot::channel();

            self.shared.outstanding.begin();
            if self
                .mailbox
                .tx
                .send(Envelope::Dispatch {
                    action,
                    tracking,
                    ack,
                })
                .is_err()
            {
                self.shared.outstanding.end();
                return Err(StoreError::ChannelClosed);
            }

            done.await.map_err(|_| StoreError::ChannelClosed)?;
            tracing::trace!("Action processed");
            Ok(handle)
        }

        /// Send an action and wait for a matching follow-up action
        ///
        /// Subscribes to the action broadcast before sending, so a fast
        /// effect cannot race the subscription.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: no matching action before the timeout
        /// - [`StoreError::ChannelClosed`]: the broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: the store is shutting down
        pub async fn send_and_wait_for<F>(&self, action: A, predicate: F, timeout: Duration) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            let mut rx = self.shared.actions.subscribe();

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
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to actions produced by effects and synchronous sends
        ///
        /// Actions sent from outside via [`Store::send`] are not broadcast.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.shared.actions.subscribe()
        }

        /// Observe state changes
        ///
        /// The value is a revision counter bumped after every processed
        /// action; read the state itself with [`Store::state`].
        #[must_use]
        pub fn changes(&self) -> watch::Receiver<u64> {
            self.shared.revision.subscribe()
        }

        /// Read current state via a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.shared.state.read().await;
            f(&state)
        }

        /// Cancel all effects registered under `id`
        ///
        /// Idempotent. Actions already produced by the cancelled work but not
        /// yet reduced are discarded.
        pub fn cancel(&self, id: impl Into<EffectId>) {
            let _ = self.mailbox.tx.send(Envelope::Cancel(id.into()));
        }

        /// Number of queued actions plus running effects
        #[must_use]
        pub fn pending(&self) -> usize {
            self.shared.outstanding.current()
        }

        /// Wait until no action is queued and no effect is running
        ///
        /// Long-lived effects keep the store busy until they are cancelled.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Timeout`] if the store is still busy when the
        /// timeout expires.
        pub async fn wait_until_idle(&self, timeout: Duration) -> Result<(), StoreError> {
            tokio::time::timeout(timeout, self.shared.outstanding.wait_idle())
                .await
                .map_err(|_| StoreError::Timeout)
        }

        /// Initiate graceful shutdown
        ///
        /// 1. Rejects new actions
        /// 2. Waits for running effects, up to `timeout`
        /// 3. Cancels whatever is still running after the timeout
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects were still running
        /// when the timeout expired.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shared.shutdown.store(true, Ordering::Release);

            if tokio::time::timeout(timeout, self.shared.outstanding.wait_idle())
                .await
                .is_ok()
            {
                tracing::info!("All effects completed, shutdown successful");
                metrics::counter!("store.shutdown.completed").increment(1);
                return Ok(());
            }

            let pending = self.shared.outstanding.current();
            tracing::error!(pending_effects = pending, "Shutdown timeout, cancelling remaining effects");
            metrics::counter!("store.shutdown.timeout").increment(1);
            let _ = self.mailbox.tx.send(Envelope::CancelAll);
            Err(StoreError::ShutdownTimeout(pending))
        }

        /// Shutdown with [`StoreConfig::default_shutdown_timeout`]
        ///
        /// # Errors
        ///
        /// See [`Store::shutdown`].
        pub async fn shutdown_default(&self) -> Result<(), StoreError> {
            self.shutdown(self.shared.config.default_shutdown_timeout).await
        }
    }
}
