//! Stack-based navigation
//!
//! A navigation stack is an ordered list of frames, each holding the state
//! of a pushed feature. Frames are addressed by a [`StackElementId`] that is
//! assigned on push and never reused, so an action addressed to a frame
//! cannot land on a different frame that later occupies the same position.
//!
//! [`for_each_stack`] wires an element reducer into a parent feature:
//! element actions are routed to their frame, the parent observes every
//! action (and may intercept element actions to push or pop), and the
//! effects of every frame that leaves the stack are cancelled.
//!
//! Cancellation identities used inside a frame are local to that frame:
//! `Cancellable` and `Cancel` ids an element reducer returns are prefixed
//! with the frame identity, so two frames of the same feature never cancel
//! each other's work.

use crate::effect::{Effect, EffectId};
use crate::reducer::Reducer;
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;

/// Stable identity of a frame within one [`StackState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackElementId(u64);

impl StackElementId {
    /// Raw counter value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StackElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered frames of a navigation stack
#[derive(Clone, Debug, PartialEq)]
pub struct StackState<S> {
    frames: Vec<(StackElementId, S)>,
    next_id: u64,
}

impl<S> Default for StackState<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StackState<S> {
    /// Empty stack
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: Vec::new(),
            next_id: 0,
        }
    }

    /// Push a frame on top and return its identity
    pub fn push(&mut self, state: S) -> StackElementId {
        let id = StackElementId(self.next_id);
        self.next_id += 1;
        self.frames.push((id, state));
        id
    }

    /// Remove the top frame
    pub fn pop(&mut self) -> Option<(StackElementId, S)> {
        self.frames.pop()
    }

    /// Remove the frame `id` and every frame above it
    ///
    /// Returns `false` (and does nothing) when no frame has that identity.
    pub fn pop_from(&mut self, id: StackElementId) -> bool {
        match self.position(id) {
            Some(index) => {
                self.frames.truncate(index);
                true
            },
            None => false,
        }
    }

    /// Remove every frame
    pub fn remove_all(&mut self) {
        self.frames.clear();
    }

    /// State of frame `id`
    #[must_use]
    pub fn get(&self, id: StackElementId) -> Option<&S> {
        self.frames
            .iter()
            .find(|(frame_id, _)| *frame_id == id)
            .map(|(_, state)| state)
    }

    /// Mutable state of frame `id`
    pub fn get_mut(&mut self, id: StackElementId) -> Option<&mut S> {
        self.frames
            .iter_mut()
            .find(|(frame_id, _)| *frame_id == id)
            .map(|(_, state)| state)
    }

    /// Whether frame `id` is on the stack
    #[must_use]
    pub fn contains(&self, id: StackElementId) -> bool {
        self.position(id).is_some()
    }

    /// Frame identities, bottom to top
    pub fn ids(&self) -> impl Iterator<Item = StackElementId> + '_ {
        self.frames.iter().map(|(id, _)| *id)
    }

    /// Frames, bottom to top
    pub fn iter(&self) -> impl Iterator<Item = (StackElementId, &S)> + '_ {
        self.frames.iter().map(|(id, state)| (*id, state))
    }

    /// Mutable frames, bottom to top
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (StackElementId, &mut S)> + '_ {
        self.frames.iter_mut().map(|(id, state)| (*id, state))
    }

    /// Top frame
    #[must_use]
    pub fn last(&self) -> Option<(StackElementId, &S)> {
        self.frames.last().map(|(id, state)| (*id, state))
    }

    /// Number of frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the stack is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn position(&self, id: StackElementId) -> Option<usize> {
        self.frames.iter().position(|(frame_id, _)| *frame_id == id)
    }
}

/// Actions understood by [`for_each_stack`]
#[derive(Clone, Debug, PartialEq)]
pub enum StackAction<S, A> {
    /// Action for the frame `id`
    Element {
        /// Target frame
        id: StackElementId,
        /// Action for the frame's feature
        action: A,
    },
    /// Push a frame
    Push {
        /// Initial state of the pushed feature
        state: S,
    },
    /// Pop the frame `id` and everything above it
    PopFrom {
        /// Lowest frame to remove
        id: StackElementId,
    },
}

/// Cancellation identity of every effect started by frame `id` of stack `name`
#[must_use]
pub fn frame_effect_id(name: &str, id: StackElementId) -> EffectId {
    EffectId::new(format!("{name}/{}", id.get()))
}

fn scope_to_frame<A>(effect: Effect<A>, frame: &EffectId) -> Effect<A> {
    let scoped = |id: &EffectId| EffectId::new(format!("{frame}/{id}"));
    match effect {
        Effect::Cancellable {
            id,
            cancel_in_flight,
            effect,
        } => Effect::Cancellable {
            id: scoped(&id),
            cancel_in_flight,
            effect: Box::new(scope_to_frame(*effect, frame)),
        },
        Effect::Cancel(id) => Effect::Cancel(scoped(&id)),
        Effect::Parallel(effects) => {
            Effect::Parallel(effects.into_iter().map(|e| scope_to_frame(e, frame)).collect())
        },
        Effect::Sequential(effects) => {
            Effect::Sequential(effects.into_iter().map(|e| scope_to_frame(e, frame)).collect())
        },
        other => other,
    }
}

/// Attach an element reducer to a navigation stack inside a parent feature.
///
/// - `name` scopes frame cancellation identities, one name per stack.
/// - `stack` is the field lens from parent state to the stack.
/// - `extract` recognises the parent's stack action case.
/// - `embed` wraps a stack action back into the parent's action type.
pub fn for_each_stack<P, El>(
    name: &'static str,
    parent: P,
    element: El,
    stack: fn(&mut P::State) -> &mut StackState<El::State>,
    extract: fn(&P::Action) -> Option<&StackAction<El::State, El::Action>>,
    embed: fn(StackAction<El::State, El::Action>) -> P::Action,
) -> ForEachStack<P, El>
where
    P: Reducer,
    El: Reducer<Environment = P::Environment>,
{
    ForEachStack {
        name,
        parent,
        element,
        stack,
        extract,
        embed,
    }
}

/// Parent reducer with a navigation stack.
///
/// Created by [`for_each_stack`].
pub struct ForEachStack<P, El>
where
    P: Reducer,
    El: Reducer<Environment = P::Environment>,
{
    name: &'static str,
    parent: P,
    element: El,
    stack: fn(&mut P::State) -> &mut StackState<El::State>,
    extract: fn(&P::Action) -> Option<&StackAction<El::State, El::Action>>,
    embed: fn(StackAction<El::State, El::Action>) -> P::Action,
}

enum StackEdit<S> {
    Push(S),
    PopFrom(StackElementId),
}

impl<P, El> Reducer for ForEachStack<P, El>
where
    P: Reducer,
    P::Action: Send + 'static,
    El: Reducer<Environment = P::Environment>,
    El::State: Clone + Send + 'static,
    El::Action: Clone + Send + 'static,
{
    type State = P::State;
    type Action = P::Action;
    type Environment = P::Environment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let before: Vec<StackElementId> = (self.stack)(state).ids().collect();
        let mut effects: SmallVec<[Effect<Self::Action>; 4]> = SmallVec::new();
        let mut edit = None;

        match (self.extract)(&action) {
            Some(StackAction::Element { id, action: element_action }) => {
                let id = *id;
                let element_action = element_action.clone();
                match (self.stack)(state).get_mut(id) {
                    Some(frame) => {
                        let embed = self.embed;
                        let frame_id = frame_effect_id(self.name, id);
                        for effect in self.element.reduce(frame, element_action, env) {
                            if effect.is_none() {
                                continue;
                            }
                            let effect = effect.map(move |action| embed(StackAction::Element { id, action }));
                            effects.push(scope_to_frame(effect, &frame_id).cancellable(frame_id.clone(), false));
                        }
                    },
                    None => {
                        tracing::debug!(stack = self.name, %id, "dropping action for missing stack element");
                    },
                }
            },
            Some(StackAction::Push { state: pushed }) => edit = Some(StackEdit::Push(pushed.clone())),
            Some(StackAction::PopFrom { id }) => edit = Some(StackEdit::PopFrom(*id)),
            None => {},
        }

        effects.extend(
            self.parent
                .reduce(state, action, env)
                .into_iter()
                .filter(|effect| !effect.is_none()),
        );

        let stack = (self.stack)(state);
        match edit {
            Some(StackEdit::Push(pushed)) => {
                let id = stack.push(pushed);
                tracing::trace!(stack = self.name, %id, "pushed stack element");
            },
            Some(StackEdit::PopFrom(id)) => {
                if !stack.pop_from(id) {
                    tracing::debug!(stack = self.name, %id, "pop for missing stack element ignored");
                }
            },
            None => {},
        }

        let remaining: HashSet<StackElementId> = stack.ids().collect();
        for id in before.into_iter().filter(|id| !remaining.contains(id)) {
            tracing::trace!(stack = self.name, %id, "cancelling effects of removed stack element");
            effects.push(Effect::Cancel(frame_effect_id(self.name, id)));
        }

        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smallvec;
    use proptest::prelude::*;

    #[test]
    fn push_assigns_fresh_ids() {
        let mut stack = StackState::new();
        let a = stack.push("a");
        let b = stack.push("b");
        assert_ne!(a, b);

        assert!(stack.pop_from(a));
        let c = stack.push("a");
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn pop_from_removes_frame_and_everything_above() {
        let mut stack = StackState::new();
        let a = stack.push(1);
        let b = stack.push(2);
        let _c = stack.push(3);

        assert!(stack.pop_from(b));
        assert_eq!(stack.ids().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn pop_from_missing_id_is_a_no_op() {
        let mut stack = StackState::new();
        let a = stack.push(1);
        assert!(stack.pop_from(a));
        let before = stack.clone();

        assert!(!stack.pop_from(a));
        assert_eq!(stack, before);
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Detail {
        loads: u32,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum DetailAction {
        Load,
        Loaded,
        Close,
        Track,
        Untrack,
    }

    struct DetailReducer;

    impl Reducer for DetailReducer {
        type State = Detail;
        type Action = DetailAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Detail,
            action: DetailAction,
            _env: &(),
        ) -> SmallVec<[Effect<DetailAction>; 4]> {
            match action {
                DetailAction::Load => smallvec![crate::async_effect! { Some(DetailAction::Loaded) }],
                DetailAction::Loaded => {
                    state.loads += 1;
                    smallvec![Effect::None]
                },
                DetailAction::Close => smallvec![Effect::None],
                DetailAction::Track => {
                    smallvec![crate::async_effect! { Some(DetailAction::Loaded) }.cancellable("tracking", true)]
                },
                DetailAction::Untrack => smallvec![Effect::cancel("tracking")],
            }
        }
    }

    #[derive(Clone, Debug, Default)]
    struct Root {
        path: StackState<Detail>,
        closed: u32,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum RootAction {
        Path(StackAction<Detail, DetailAction>),
    }

    struct RootReducer;

    impl Reducer for RootReducer {
        type State = Root;
        type Action = RootAction;
        type Environment = ();

        fn reduce(&self, state: &mut Root, action: RootAction, _env: &()) -> SmallVec<[Effect<RootAction>; 4]> {
            match action {
                RootAction::Path(StackAction::Element {
                    id,
                    action: DetailAction::Close,
                }) => {
                    state.closed += 1;
                    state.path.pop_from(id);
                    smallvec![Effect::None]
                },
                RootAction::Path(_) => smallvec![Effect::None],
            }
        }
    }

    fn root() -> ForEachStack<RootReducer, DetailReducer> {
        for_each_stack(
            "path",
            RootReducer,
            DetailReducer,
            |root: &mut Root| &mut root.path,
            |action| match action {
                RootAction::Path(action) => Some(action),
            },
            RootAction::Path,
        )
    }

    #[test]
    fn element_action_only_touches_its_frame() {
        let reducer = root();
        let mut state = Root::default();
        let first = state.path.push(Detail::default());
        let second = state.path.push(Detail::default());

        let _ = reducer.reduce(
            &mut state,
            RootAction::Path(StackAction::Element {
                id: first,
                action: DetailAction::Loaded,
            }),
            &(),
        );

        assert_eq!(state.path.get(first), Some(&Detail { loads: 1 }));
        assert_eq!(state.path.get(second), Some(&Detail::default()));
    }

    #[test]
    fn element_effects_are_registered_under_the_frame() {
        let reducer = root();
        let mut state = Root::default();
        let id = state.path.push(Detail::default());

        let effects = reducer.reduce(
            &mut state,
            RootAction::Path(StackAction::Element {
                id,
                action: DetailAction::Load,
            }),
            &(),
        );

        assert_eq!(effects.len(), 1);
        assert!(matches!(
            &effects[0],
            Effect::Cancellable { id: effect_id, .. } if *effect_id == frame_effect_id("path", id)
        ));
    }

    #[test]
    fn element_ids_are_local_to_their_frame() {
        let reducer = root();
        let mut state = Root::default();
        let first = state.path.push(Detail::default());
        let second = state.path.push(Detail::default());

        let track = reducer.reduce(
            &mut state,
            RootAction::Path(StackAction::Element {
                id: first,
                action: DetailAction::Track,
            }),
            &(),
        );
        let untrack = reducer.reduce(
            &mut state,
            RootAction::Path(StackAction::Element {
                id: second,
                action: DetailAction::Untrack,
            }),
            &(),
        );

        let Some(Effect::Cancellable { effect, .. }) = track.first() else {
            unreachable!("frame effect registered");
        };
        assert!(matches!(
            effect.as_ref(),
            Effect::Cancellable { id, cancel_in_flight: true, .. } if id.as_str() == "path/0/tracking"
        ));

        let Some(Effect::Cancellable { effect, .. }) = untrack.first() else {
            unreachable!("frame effect registered");
        };
        assert!(matches!(effect.as_ref(), Effect::Cancel(id) if id.as_str() == "path/1/tracking"));
    }

    #[test]
    fn action_for_missing_frame_is_dropped() {
        let reducer = root();
        let mut state = Root::default();
        let id = state.path.push(Detail::default());
        state.path.pop();

        let effects = reducer.reduce(
            &mut state,
            RootAction::Path(StackAction::Element {
                id,
                action: DetailAction::Load,
            }),
            &(),
        );

        assert!(effects.is_empty());
        assert!(state.path.is_empty());
    }

    #[test]
    fn parent_pop_cancels_frame_effects() {
        let reducer = root();
        let mut state = Root::default();
        let id = state.path.push(Detail::default());

        let effects = reducer.reduce(
            &mut state,
            RootAction::Path(StackAction::Element {
                id,
                action: DetailAction::Close,
            }),
            &(),
        );

        assert_eq!(state.closed, 1);
        assert!(state.path.is_empty());
        assert!(matches!(
            effects.last(),
            Some(Effect::Cancel(effect_id)) if *effect_id == frame_effect_id("path", id)
        ));
    }

    #[test]
    fn push_and_pop_actions_edit_the_stack() {
        let reducer = root();
        let mut state = Root::default();

        let _ = reducer.reduce(
            &mut state,
            RootAction::Path(StackAction::Push {
                state: Detail::default(),
            }),
            &(),
        );
        let Some((id, _)) = state.path.last() else {
            unreachable!("frame pushed");
        };

        let effects = reducer.reduce(&mut state, RootAction::Path(StackAction::PopFrom { id }), &());
        assert!(state.path.is_empty());
        assert_eq!(effects.len(), 1);

        let effects = reducer.reduce(&mut state, RootAction::Path(StackAction::PopFrom { id }), &());
        assert!(effects.is_empty());
    }

    proptest! {
        #[test]
        fn ids_are_never_reused(ops in proptest::collection::vec(0u8..3, 1..64)) {
            let mut stack = StackState::new();
            let mut seen = HashSet::new();
            for op in ops {
                match op {
                    0 | 1 => {
                        let id = stack.push(op);
                        prop_assert!(seen.insert(id));
                    },
                    _ => {
                        if let Some((id, _)) = stack.last() {
                            prop_assert!(stack.pop_from(id));
                        }
                    },
                }
            }
        }
    }
}
