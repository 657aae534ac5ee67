//! Badge collection screen, reached from the profile tab and from a
//! completed challenge.

use crate::environment::AppEnvironment;
use popseoul_core::{Effect, Reducer, SmallVec, smallvec};

/// My badge state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MyBadgeState;

/// My badge actions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MyBadgeAction {
    /// Delegate: leave the screen
    TappedBack,
}

/// My badge reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct MyBadgeFeature;

impl MyBadgeFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for MyBadgeFeature {
    type State = MyBadgeState;
    type Action = MyBadgeAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        _state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            MyBadgeAction::TappedBack => smallvec![Effect::None],
        }
    }
}
