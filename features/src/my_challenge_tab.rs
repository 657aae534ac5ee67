//! My-challenge tab: the user's challenges filtered by progress.

use crate::config::DedupPolicy;
use crate::environment::AppEnvironment;
use popseoul_clients::{Challenge, ChallengeStatus};
use popseoul_core::{Effect, Reducer, SmallVec, async_effect, smallvec};
use std::sync::Arc;

/// My-challenge tab state
#[derive(Clone, Debug, PartialEq)]
pub struct MyChallengeTabState {
    /// Selected filter
    pub status_filter: ChallengeStatus,
    /// Challenges matching the filter
    pub list: Vec<Challenge>,
    /// Filter whose fetch is in flight
    pub loading: Option<ChallengeStatus>,
    /// Failed requests since launch
    pub network_errors: u32,
}

impl Default for MyChallengeTabState {
    fn default() -> Self {
        Self {
            status_filter: ChallengeStatus::Progress,
            list: Vec::new(),
            loading: None,
            network_errors: 0,
        }
    }
}

/// My-challenge tab actions
#[derive(Clone, Debug, PartialEq)]
pub enum MyChallengeTabAction {
    /// The tab came on screen
    OnAppear,
    /// Switch between in-progress and completed
    FilterChanged(ChallengeStatus),
    /// Fetch the list for a filter
    Fetch(ChallengeStatus),
    /// The list arrived
    Fetched(ChallengeStatus, Vec<Challenge>),
    /// The fetch failed
    FetchFailed(ChallengeStatus),
    /// Delegate: open a challenge
    TappedItem(i64),
    /// Delegate: go back to the home tab
    MoveToHome,
    /// A request failed
    NetworkError,
}

const FETCH: &str = "my-challenge/fetch";

/// My-challenge tab reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct MyChallengeTabFeature;

impl MyChallengeTabFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for MyChallengeTabFeature {
    type State = MyChallengeTabState;
    type Action = MyChallengeTabAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            MyChallengeTabAction::OnAppear => {
                smallvec![Effect::send(MyChallengeTabAction::Fetch(state.status_filter))]
            },

            MyChallengeTabAction::FilterChanged(status) => {
                if status == state.status_filter {
                    return smallvec![Effect::None];
                }
                state.status_filter = status;
                state.list.clear();
                smallvec![Effect::send(MyChallengeTabAction::Fetch(status))]
            },

            MyChallengeTabAction::Fetch(status) => {
                if !env.is_authenticated() {
                    return smallvec![Effect::None];
                }
                let cancel_in_flight = match env.config.my_challenge_dedup {
                    DedupPolicy::TrackInFlight if state.loading == Some(status) => {
                        tracing::debug!(?status, "my challenge fetch already in flight");
                        return smallvec![Effect::None];
                    },
                    DedupPolicy::TrackInFlight => false,
                    DedupPolicy::LatestWins => true,
                };
                state.loading = Some(status);

                let lists = Arc::clone(&env.clients.challenge_lists);
                smallvec![
                    async_effect! {
                        match lists.fetch_my_challenges(status).await {
                            Ok(list) => Some(MyChallengeTabAction::Fetched(status, list)),
                            Err(error) => {
                                tracing::warn!(?status, %error, "my challenge fetch failed");
                                Some(MyChallengeTabAction::FetchFailed(status))
                            },
                        }
                    }
                    .cancellable(FETCH, cancel_in_flight)
                ]
            },

            MyChallengeTabAction::Fetched(status, list) => {
                if state.loading == Some(status) {
                    state.loading = None;
                }
                if status == state.status_filter {
                    state.list = list;
                } else {
                    tracing::debug!(?status, "dropping list for a stale filter");
                }
                smallvec![Effect::None]
            },

            MyChallengeTabAction::FetchFailed(status) => {
                if state.loading == Some(status) {
                    state.loading = None;
                }
                smallvec![Effect::send(MyChallengeTabAction::NetworkError)]
            },

            MyChallengeTabAction::NetworkError => {
                state.network_errors = state.network_errors.saturating_add(1);
                smallvec![Effect::None]
            },

            MyChallengeTabAction::TappedItem(_) | MyChallengeTabAction::MoveToHome => smallvec![Effect::None],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureConfig;
    use crate::test_support::{challenge, environment};
    use popseoul_clients::mocks::MockClients;
    use popseoul_testing::{ReducerTest, assertions, run_effects};

    #[test]
    fn duplicate_fetch_is_ignored_while_in_flight() {
        let mocks = MockClients::signed_in();
        ReducerTest::new(MyChallengeTabFeature::new())
            .with_env(environment(&mocks))
            .given_state(MyChallengeTabState::default())
            .when_action(MyChallengeTabAction::Fetch(ChallengeStatus::Progress))
            .when_action(MyChallengeTabAction::Fetch(ChallengeStatus::Progress))
            .then_state(|state| assert_eq!(state.loading, Some(ChallengeStatus::Progress)))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn latest_wins_restarts_the_fetch() {
        let mocks = MockClients::signed_in();
        let env = environment(&mocks)
            .with_config(FeatureConfig::default().with_my_challenge_dedup(DedupPolicy::LatestWins));
        ReducerTest::new(MyChallengeTabFeature::new())
            .with_env(env)
            .given_state(MyChallengeTabState::default())
            .when_action(MyChallengeTabAction::Fetch(ChallengeStatus::Progress))
            .when_action(MyChallengeTabAction::Fetch(ChallengeStatus::Progress))
            .then_effects(|effects| {
                assert!(matches!(
                    &effects[0],
                    Effect::Cancellable { cancel_in_flight: true, .. }
                ));
            })
            .run();
    }

    #[test]
    fn signed_out_fetch_does_nothing() {
        let mocks = MockClients::new();
        ReducerTest::new(MyChallengeTabFeature::new())
            .with_env(environment(&mocks))
            .given_state(MyChallengeTabState::default())
            .when_action(MyChallengeTabAction::Fetch(ChallengeStatus::Progress))
            .then_state(|state| assert_eq!(state.loading, None))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn stale_filter_results_are_dropped() {
        let mocks = MockClients::signed_in();
        ReducerTest::new(MyChallengeTabFeature::new())
            .with_env(environment(&mocks))
            .given_state(MyChallengeTabState::default())
            .when_action(MyChallengeTabAction::FilterChanged(ChallengeStatus::Completed))
            .when_action(MyChallengeTabAction::Fetched(ChallengeStatus::Progress, vec![challenge(1)]))
            .then_state(|state| {
                assert_eq!(state.status_filter, ChallengeStatus::Completed);
                assert!(state.list.is_empty());
            })
            .run();
    }

    #[tokio::test]
    async fn fetch_resolves_the_users_list() {
        let mocks = MockClients::signed_in();
        mocks.server.insert_challenge(Challenge {
            status: ChallengeStatus::Progress,
            ..challenge(4)
        });
        let env = environment(&mocks);
        let mut state = MyChallengeTabState::default();

        let effects = MyChallengeTabFeature::new().reduce(&mut state, MyChallengeTabAction::OnAppear, &env);
        assert_eq!(
            assertions::sent_actions(&effects),
            vec![MyChallengeTabAction::Fetch(ChallengeStatus::Progress)]
        );

        let effects =
            MyChallengeTabFeature::new().reduce(&mut state, MyChallengeTabAction::Fetch(ChallengeStatus::Progress), &env);
        let actions = run_effects(effects).await;
        assert!(matches!(
            actions.as_slice(),
            [MyChallengeTabAction::Fetched(ChallengeStatus::Progress, list)] if list.len() == 1
        ));
    }
}
