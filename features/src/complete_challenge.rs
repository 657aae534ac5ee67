//! Completion screen shown after the last stamp of a challenge.

use crate::environment::AppEnvironment;
use popseoul_clients::ChallengeTheme;
use popseoul_core::{Effect, Reducer, SmallVec, smallvec};

/// Complete challenge state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompleteChallengeState {
    /// Theme of the completed challenge
    pub theme: ChallengeTheme,
}

impl CompleteChallengeState {
    /// Screen for a challenge of `theme`
    #[must_use]
    pub const fn new(theme: ChallengeTheme) -> Self {
        Self { theme }
    }
}

/// Complete challenge actions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompleteChallengeAction {
    /// Delegate: clear the stack and show the badges under the profile tab
    MoveToBadge,
    /// Delegate: leave the screen
    TappedBack,
}

/// Complete challenge reducer; both actions are routed by the main tab
#[derive(Clone, Copy, Debug, Default)]
pub struct CompleteChallengeFeature;

impl CompleteChallengeFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for CompleteChallengeFeature {
    type State = CompleteChallengeState;
    type Action = CompleteChallengeAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        _state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            CompleteChallengeAction::MoveToBadge | CompleteChallengeAction::TappedBack => smallvec![Effect::None],
        }
    }
}
