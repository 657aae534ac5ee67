//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers in various ways:
//! - **`combine_reducers`**: Run multiple reducers on the same state/action
//! - **`scope_reducer`**: Embed a child feature inside a parent feature
//!
//! # Examples
//!
//! ## Scoping a child feature
//!
//! ```
//! use popseoul_core::{smallvec, Effect, Reducer, SmallVec};
//! use popseoul_core::composition::scope_reducer;
//!
//! #[derive(Clone, Debug, Default)]
//! struct BannerState {
//!     page: usize,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum BannerAction {
//!     Next,
//! }
//!
//! struct BannerReducer;
//!
//! impl Reducer for BannerReducer {
//!     type State = BannerState;
//!     type Action = BannerAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut BannerState, action: BannerAction, _env: &()) -> SmallVec<[Effect<BannerAction>; 4]> {
//!         match action {
//!             BannerAction::Next => state.page += 1,
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! #[derive(Clone, Debug, Default)]
//! struct HomeState {
//!     banner: BannerState,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum HomeAction {
//!     Banner(BannerAction),
//!     Refresh,
//! }
//!
//! let scoped = scope_reducer(
//!     BannerReducer,
//!     |home: &mut HomeState| &mut home.banner,
//!     |action: HomeAction| match action {
//!         HomeAction::Banner(action) => Some(action),
//!         HomeAction::Refresh => None,
//!     },
//!     HomeAction::Banner,
//! );
//!
//! let mut state = HomeState::default();
//! let _ = scoped.reduce(&mut state, HomeAction::Banner(BannerAction::Next), &());
//! let _ = scoped.reduce(&mut state, HomeAction::Refresh, &());
//! assert_eq!(state.banner.page, 1);
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::SmallVec;

/// Boxed reducer accepted by [`combine_reducers`]
pub type BoxedReducer<S, A, E> = Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in order, and all effects are collected and
/// concatenated. A parent feature typically lists its scoped children first
/// and its own core reducer last, so the core observes child state after the
/// child handled the action.
#[must_use]
pub fn combine_reducers<S, A, E>(reducers: Vec<BoxedReducer<S, A, E>>) -> CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    reducers: Vec<BoxedReducer<S, A, E>>,
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut all_effects = SmallVec::new();

        for reducer in &self.reducers {
            let effects = reducer.reduce(state, action.clone(), env);
            all_effects.extend(effects.into_iter().filter(|effect| !effect.is_none()));
        }

        all_effects
    }
}

/// Scopes a child reducer into a parent feature.
///
/// 1. `state` focuses the child's state inside the parent's (a field lens).
/// 2. `extract` unwraps the parent action to the child case; parent actions
///    that are not for the child are ignored.
/// 3. The child reducer mutates its state in place.
/// 4. Child effects are mapped with `embed` so their follow-up actions
///    re-enter the parent as the child case.
pub fn scope_reducer<S, SubS, A, ChildA, E, R>(
    reducer: R,
    state: fn(&mut S) -> &mut SubS,
    extract: fn(A) -> Option<ChildA>,
    embed: fn(ChildA) -> A,
) -> ScopedReducer<S, SubS, A, ChildA, E, R>
where
    R: Reducer<State = SubS, Action = ChildA, Environment = E>,
{
    ScopedReducer {
        reducer,
        state,
        extract,
        embed,
    }
}

/// A scoped reducer that runs a child feature on a slice of parent state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, SubS, A, ChildA, E, R>
where
    R: Reducer<State = SubS, Action = ChildA, Environment = E>,
{
    reducer: R,
    state: fn(&mut S) -> &mut SubS,
    extract: fn(A) -> Option<ChildA>,
    embed: fn(ChildA) -> A,
}

impl<S, SubS, A, ChildA, E, R> Reducer for ScopedReducer<S, SubS, A, ChildA, E, R>
where
    A: Send + 'static,
    ChildA: Send + 'static,
    R: Reducer<State = SubS, Action = ChildA, Environment = E>,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let Some(child_action) = (self.extract)(action) else {
            return SmallVec::new();
        };

        let child_state = (self.state)(state);
        self.reducer
            .reduce(child_state, child_action, env)
            .into_iter()
            .map(|effect| effect.map(self.embed))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smallvec;

    #[derive(Clone, Default)]
    struct TestState {
        counter: i32,
        name: String,
    }

    #[derive(Clone)]
    enum TestAction {
        Increment,
        Decrement,
        SetName(String),
    }

    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.counter += 1;
                    smallvec![Effect::None]
                },
                TestAction::Decrement => {
                    state.counter -= 1;
                    smallvec![Effect::None]
                },
                TestAction::SetName(_) => smallvec![Effect::None],
            }
        }
    }

    struct NameReducer;

    impl Reducer for NameReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            if let TestAction::SetName(name) = action {
                state.name = name;
            }
            smallvec![Effect::None]
        }
    }

    #[test]
    fn test_combine_reducers() {
        let combined = combine_reducers(vec![Box::new(CounterReducer), Box::new(NameReducer)]);

        let mut state = TestState::default();

        let effects = combined.reduce(&mut state, TestAction::Increment, &());
        assert_eq!(state.counter, 1);
        assert!(effects.is_empty());

        let _ = combined.reduce(&mut state, TestAction::SetName("Namsan".to_string()), &());
        assert_eq!(state.name, "Namsan");

        let _ = combined.reduce(&mut state, TestAction::Decrement, &());
        assert_eq!(state.counter, 0);
        assert_eq!(state.name, "Namsan");
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct SubState {
        value: i32,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum SubAction {
        Add(i32),
        Reset,
    }

    struct SubReducer;

    impl Reducer for SubReducer {
        type State = SubState;
        type Action = SubAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                SubAction::Add(n) => {
                    state.value += n;
                    if state.value > 10 {
                        smallvec![Effect::send(SubAction::Reset)]
                    } else {
                        smallvec![Effect::None]
                    }
                },
                SubAction::Reset => {
                    state.value = 0;
                    smallvec![Effect::None]
                },
            }
        }
    }

    #[derive(Clone, Default)]
    struct ParentState {
        sub: SubState,
        other: String,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum ParentAction {
        Sub(SubAction),
        Rename(String),
    }

    fn scoped() -> ScopedReducer<ParentState, SubState, ParentAction, SubAction, (), SubReducer> {
        scope_reducer(
            SubReducer,
            |parent: &mut ParentState| &mut parent.sub,
            |action| match action {
                ParentAction::Sub(action) => Some(action),
                ParentAction::Rename(_) => None,
            },
            ParentAction::Sub,
        )
    }

    #[test]
    fn test_scope_reducer_mutates_child_in_place() {
        let scoped = scoped();
        let mut state = ParentState {
            sub: SubState { value: 5 },
            other: "hanok".to_string(),
        };

        let _ = scoped.reduce(&mut state, ParentAction::Sub(SubAction::Add(3)), &());
        assert_eq!(state.sub.value, 8);
        assert_eq!(state.other, "hanok");
    }

    #[test]
    fn test_scope_reducer_ignores_other_actions() {
        let scoped = scoped();
        let mut state = ParentState::default();

        let effects = scoped.reduce(&mut state, ParentAction::Rename("x".to_string()), &());
        assert!(effects.is_empty());
        assert_eq!(state.sub, SubState::default());
        assert!(state.other.is_empty());
    }

    #[test]
    fn test_scope_reducer_embeds_child_effects() {
        let scoped = scoped();
        let mut state = ParentState {
            sub: SubState { value: 9 },
            other: String::new(),
        };

        let effects = scoped.reduce(&mut state, ParentAction::Sub(SubAction::Add(5)), &());
        assert_eq!(effects.len(), 1);
        assert!(matches!(
            &effects[0],
            Effect::Send(ParentAction::Sub(SubAction::Reset))
        ));
    }
}
