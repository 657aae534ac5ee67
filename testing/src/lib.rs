//! # `PopSeoul` Testing
//!
//! Testing utilities and helpers for the `PopSeoul` client state architecture.
//!
//! This crate provides:
//! - Deterministic clocks for the injected [`Clock`]
//! - The [`ReducerTest`] Given-When-Then harness and effect assertions
//! - [`helpers::run_effects`] to execute a reducer's effects without a store
//! - Tracing setup for tests
//!
//! ## Example
//!
//! ```ignore
//! use popseoul_testing::{ReducerTest, assertions};
//!
//! ReducerTest::new(HomeTabFeature::new())
//!     .with_env(test_environment())
//!     .given_state(HomeTabState::default())
//!     .when_action(HomeTabAction::FetchRankList)
//!     .then_effects(assertions::assert_has_future_effect)
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use popseoul_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use popseoul_testing::mocks::FixedClock;
    /// use popseoul_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }

    /// Clock that only moves when told to
    ///
    /// Clones share the same time, so a test can keep one clone and hand
    /// another to the environment.
    ///
    /// ```
    /// use popseoul_testing::mocks::ManualClock;
    /// use popseoul_core::environment::Clock;
    /// use std::time::Duration;
    ///
    /// let clock = ManualClock::default();
    /// let start = clock.now();
    /// clock.advance(Duration::from_secs(300));
    /// assert_eq!((clock.now() - start).num_seconds(), 300);
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: std::time::Duration) {
            let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(epoch())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }
}

/// Test helpers and utilities
pub mod helpers {
    use futures::StreamExt;
    use popseoul_core::Effect;
    use std::future::Future;
    use std::pin::Pin;

    /// Execute effects to completion without a store and collect the
    /// actions they produce.
    ///
    /// Effects run one after another in declaration order. Cancellation
    /// identities are ignored and `Cancel` effects do nothing, so this
    /// suits asserting what a network effect answers with, not how effects
    /// race. Delays produce their action without waiting. Streams must be
    /// finite.
    pub async fn run_effects<A, I>(effects: I) -> Vec<A>
    where
        A: Send + 'static,
        I: IntoIterator<Item = Effect<A>>,
    {
        let mut actions = Vec::new();
        for effect in effects {
            collect(effect, &mut actions).await;
        }
        actions
    }

    fn collect<A>(effect: Effect<A>, actions: &mut Vec<A>) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>
    where
        A: Send + 'static,
    {
        Box::pin(async move {
            match effect {
                Effect::None | Effect::Cancel(_) => {},
                Effect::Send(action) => actions.push(action),
                Effect::Delay { action, .. } => actions.push(*action),
                Effect::Future(fut) => {
                    if let Some(action) = fut.await {
                        actions.push(action);
                    }
                },
                Effect::Stream(mut stream) => {
                    while let Some(action) = stream.next().await {
                        actions.push(action);
                    }
                },
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    for effect in effects {
                        collect(effect, actions).await;
                    }
                },
                Effect::Cancellable { effect, .. } => collect(*effect, actions).await,
            }
        })
    }

    /// Install a `tracing` subscriber that writes through the test harness
    ///
    /// Safe to call from every test; only the first call installs it.
    /// Honors `RUST_LOG`, defaulting to `debug`.
    pub fn init_test_tracing() {
        use tracing_subscriber::{EnvFilter, fmt};

        let _ = fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use helpers::{init_test_tracing, run_effects};
pub use mocks::{FixedClock, ManualClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use popseoul_core::{Effect, async_effect};
    use std::time::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::default();
        let handle = clock.clone();
        handle.advance(Duration::from_secs(60));
        assert_eq!(clock.now(), test_clock().now() + chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_run_effects_collects_in_order() {
        let stream = async_stream::stream! {
            yield 3;
            yield 4;
        };
        let actions = run_effects(vec![
            Effect::send(1),
            async_effect! { Some(2) }.cancellable("fetch", true),
            Effect::Stream(Box::pin(stream)),
            Effect::cancel("fetch"),
            Effect::Delay {
                duration: Duration::from_secs(60),
                action: Box::new(5),
            },
        ])
        .await;
        assert_eq!(actions, vec![1, 2, 3, 4, 5]);
    }
}
