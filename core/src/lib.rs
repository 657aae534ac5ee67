//! # `PopSeoul` Core
//!
//! Core traits and types for the `PopSeoul` client state architecture.
//!
//! Every screen of the app is a *feature*: a state value, a closed action
//! enum, and a reducer that turns `(State, Action, Environment)` into a new
//! state plus a list of effect descriptions. Effects are executed by the
//! runtime crate, which feeds their results back into the reducer as further
//! actions.
//!
//! ## Core Concepts
//!
//! - **State**: Value tree owned by a feature
//! - **Action**: Everything that can happen to a feature (user intent, network results)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions, optionally tagged with a cancellation identity
//! - **Environment**: Injected collaborators (network clients, session, clock)
//!
//! ## Example
//!
//! ```
//! use popseoul_core::{smallvec, Effect, Reducer, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct LikeState {
//!     likes: u32,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum LikeAction {
//!     Tapped,
//! }
//!
//! struct LikeReducer;
//!
//! impl Reducer for LikeReducer {
//!     type State = LikeState;
//!     type Action = LikeAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut LikeState,
//!         action: LikeAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<LikeAction>; 4]> {
//!         match action {
//!             LikeAction::Tapped => state.likes += 1,
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let mut state = LikeState::default();
//! let _ = LikeReducer.reduce(&mut state, LikeAction::Tapped, &());
//! assert_eq!(state.likes, 1);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod composition;
pub mod effect_macros;
pub mod navigation;

/// Reducer module - The core trait for feature logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They hold all feature logic and are deterministic and testable without a
/// runtime.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for feature logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The feature state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected collaborators this reducer needs
    ///
    /// Reducers must be total: an action that has no meaning in the current
    /// state returns `Effect::None` and leaves state untouched.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// 1. Updates state in place
        /// 2. Returns effect descriptions to be executed by the store
        ///
        /// Most reducers return zero or one effect, so the inline capacity of
        /// four avoids a heap allocation on the hot path.
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
/// Effects describe work for the runtime. They are values, not execution:
/// composable with [`Effect::merge`] and [`Effect::chain`], and cancellable
/// through [`Effect::cancellable`] / [`Effect::cancel`].
pub mod effect {
    use futures::{Stream, StreamExt};
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    /// Cancellation identity for in-flight effects.
    ///
    /// All work registered under an identity is cancelled together.
    /// Navigation frames derive one per frame, features use fixed names for
    /// "latest wins" requests.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct EffectId(String);

    impl EffectId {
        /// Create a new cancellation identity
        #[must_use]
        pub fn new(id: impl Into<String>) -> Self {
            Self(id.into())
        }

        /// Get the identity as a string slice
        #[must_use]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for EffectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<&str> for EffectId {
        fn from(value: &str) -> Self {
            Self::new(value)
        }
    }

    impl From<String> for EffectId {
        fn from(value: String) -> Self {
            Self(value)
        }
    }

    /// Boxed future produced by [`Effect::Future`]
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Boxed stream produced by [`Effect::Stream`]
    pub type EffectStream<Action> = Pin<Box<dyn Stream<Item = Action> + Send>>;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what
    /// should happen, returned from reducers and executed by the Store.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently, no ordering guarantee between them
        Parallel(Vec<Effect<Action>>),

        /// Run effects one after another, each after its predecessor completed
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
        Future(EffectFuture<Action>),

        /// Long-lived source of actions
        ///
        /// Every item is fed back into the reducer as it arrives. The stream
        /// runs until it ends or its cancellation identity is cancelled.
        Stream(EffectStream<Action>),

        /// Synchronous self-action
        ///
        /// Reduced by the store before it accepts the next external action.
        Send(Action),

        /// Register the wrapped effect under a cancellation identity
        Cancellable {
            /// Identity the work is registered under
            id: EffectId,
            /// Cancel earlier work under the same identity before starting
            cancel_in_flight: bool,
            /// The wrapped effect
            effect: Box<Effect<Action>>,
        },

        /// Cancel all work registered under an identity
        Cancel(EffectId),
    }

    // Manual Debug implementation since Future and Stream don't implement Debug
    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
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
                Effect::Stream(_) => write!(f, "Effect::Stream(<stream>)"),
                Effect::Send(action) => f.debug_tuple("Effect::Send").field(action).finish(),
                Effect::Cancellable {
                    id,
                    cancel_in_flight,
                    effect,
                } => f
                    .debug_struct("Effect::Cancellable")
                    .field("id", id)
                    .field("cancel_in_flight", cancel_in_flight)
                    .field("effect", effect)
                    .finish(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
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

        /// Send an action back into the reducer synchronously
        #[must_use]
        pub const fn send(action: Action) -> Effect<Action> {
            Effect::Send(action)
        }

        /// Cancel all work registered under `id`
        #[must_use]
        pub fn cancel(id: impl Into<EffectId>) -> Effect<Action> {
            Effect::Cancel(id.into())
        }

        /// Register this effect under a cancellation identity
        ///
        /// With `cancel_in_flight`, earlier work under the same identity is
        /// cancelled before this effect starts ("latest wins").
        #[must_use]
        pub fn cancellable(self, id: impl Into<EffectId>, cancel_in_flight: bool) -> Effect<Action> {
            if matches!(self, Effect::None) {
                return self;
            }
            Effect::Cancellable {
                id: id.into(),
                cancel_in_flight,
                effect: Box::new(self),
            }
        }

        /// Whether this effect does nothing
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }

    impl<Action> Effect<Action>
    where
        Action: Send + 'static,
    {
        /// Transform every action this effect will eventually produce
        ///
        /// Used to lift a child feature's effects into its parent's action type.
        #[must_use]
        pub fn map<B, F>(self, f: F) -> Effect<B>
        where
            B: Send + 'static,
            F: Fn(Action) -> B + Send + Sync + 'static,
        {
            let f: Arc<dyn Fn(Action) -> B + Send + Sync> = Arc::new(f);
            self.map_shared(&f)
        }

        fn map_shared<B>(self, f: &Arc<dyn Fn(Action) -> B + Send + Sync>) -> Effect<B>
        where
            B: Send + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Parallel(effects) => {
                    Effect::Parallel(effects.into_iter().map(|e| e.map_shared(f)).collect())
                },
                Effect::Sequential(effects) => {
                    Effect::Sequential(effects.into_iter().map(|e| e.map_shared(f)).collect())
                },
                Effect::Delay { duration, action } => Effect::Delay {
                    duration,
                    action: Box::new(f(*action)),
                },
                Effect::Future(fut) => {
                    let f = Arc::clone(f);
                    Effect::Future(Box::pin(async move { fut.await.map(|action| f(action)) }))
                },
                Effect::Stream(stream) => {
                    let f = Arc::clone(f);
                    Effect::Stream(Box::pin(stream.map(move |action| f(action))))
                },
                Effect::Send(action) => Effect::Send(f(action)),
                Effect::Cancellable {
                    id,
                    cancel_in_flight,
                    effect,
                } => Effect::Cancellable {
                    id,
                    cancel_in_flight,
                    effect: Box::new(effect.map_shared(f)),
                },
                Effect::Cancel(id) => Effect::Cancel(id),
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected via
/// the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use effect::{Effect, EffectId};
pub use environment::{Clock, SystemClock};
pub use reducer::Reducer;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum Child {
        Loaded(u32),
    }

    #[derive(Clone, Debug, PartialEq)]
    enum Parent {
        Child(Child),
    }

    #[test]
    fn cancellable_none_stays_none() {
        let effect: Effect<Child> = Effect::None.cancellable("fetch", true);
        assert!(effect.is_none());
    }

    #[test]
    fn map_rewraps_send_and_delay() {
        let effect = Effect::merge(vec![
            Effect::send(Child::Loaded(1)),
            Effect::Delay {
                duration: Duration::from_millis(5),
                action: Box::new(Child::Loaded(2)),
            },
        ])
        .map(Parent::Child);

        let Effect::Parallel(effects) = effect else {
            unreachable!("merge maps to parallel");
        };
        assert!(matches!(&effects[0], Effect::Send(Parent::Child(Child::Loaded(1)))));
        assert!(
            matches!(&effects[1], Effect::Delay { action, .. } if **action == Parent::Child(Child::Loaded(2)))
        );
    }

    #[test]
    fn map_keeps_cancellation_identity() {
        let effect = Effect::send(Child::Loaded(3))
            .cancellable("frame/1", false)
            .map(Parent::Child);

        match effect {
            Effect::Cancellable {
                id,
                cancel_in_flight,
                effect,
            } => {
                assert_eq!(id, EffectId::new("frame/1"));
                assert!(!cancel_in_flight);
                assert!(matches!(*effect, Effect::Send(Parent::Child(Child::Loaded(3)))));
            },
            other => unreachable!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn map_accepts_capturing_closures() {
        let offset = 10;
        let effect = Effect::merge(vec![Effect::send(1_u32), Effect::send(2_u32)]).map(move |n| n + offset);
        let Effect::Parallel(effects) = effect else {
            unreachable!("merge maps to parallel");
        };
        assert!(matches!(effects.as_slice(), [Effect::Send(11), Effect::Send(12)]));
    }

    #[test]
    fn map_wraps_future_output() {
        let effect = async_effect! { Some(Child::Loaded(7)) }.map(Parent::Child);
        let Effect::Future(fut) = effect else {
            unreachable!("future stays future");
        };
        assert_eq!(tokio_test::block_on(fut), Some(Parent::Child(Child::Loaded(7))));
    }

    #[tokio::test]
    async fn map_wraps_every_stream_item() {
        let stream = futures::stream::iter(vec![Child::Loaded(1), Child::Loaded(2)]);
        let effect = Effect::Stream(Box::pin(stream)).map(Parent::Child);
        let Effect::Stream(stream) = effect else {
            unreachable!("stream stays stream");
        };
        let items: Vec<Parent> = stream.collect().await;
        assert_eq!(
            items,
            vec![Parent::Child(Child::Loaded(1)), Parent::Child(Child::Loaded(2))]
        );
    }
}
