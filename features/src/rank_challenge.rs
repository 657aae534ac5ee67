//! Rank challenge screen: the full popularity ranking.

use crate::common::LoginAlertAction;
use crate::environment::AppEnvironment;
use crate::identity::replace_by_id;
use crate::optimistic::{Reconciled, predict_like, reconcile};
use popseoul_clients::Challenge;
use popseoul_core::{Effect, Reducer, SmallVec, async_effect, smallvec};
use std::sync::Arc;

/// Rank challenge state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RankChallengeState {
    /// Ranking, most popular first
    pub rank_list: Vec<Challenge>,
    /// Fetch in flight
    pub is_loading: bool,
    /// Login prompt on screen
    pub show_login_alert: bool,
    /// Failed requests while on screen
    pub network_errors: u32,
}

/// Rank challenge actions
#[derive(Clone, Debug, PartialEq)]
pub enum RankChallengeAction {
    /// The screen came on screen
    OnAppear,
    /// Ranking arrived
    Fetched(Vec<Challenge>),
    /// Like toggle on a row
    TappedLike(Challenge),
    /// Replace a challenge by identity
    Update(Challenge),
    /// Raise the login prompt
    ShowLoginAlert,
    /// Login prompt buttons
    LoginAlert(LoginAlertAction),
    /// Delegate: open a challenge
    TappedChallenge(i64),
    /// Delegate: leave the screen
    TappedBack,
    /// A request failed
    NetworkError,
}

/// Rank challenge reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct RankChallengeFeature;

impl RankChallengeFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for RankChallengeFeature {
    type State = RankChallengeState;
    type Action = RankChallengeAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            RankChallengeAction::OnAppear => {
                if state.is_loading {
                    return smallvec![Effect::None];
                }
                state.is_loading = true;
                let lists = Arc::clone(&env.clients.challenge_lists);
                smallvec![
                    async_effect! {
                        match lists.fetch_rank_list().await {
                            Ok(list) => Some(RankChallengeAction::Fetched(list)),
                            Err(error) => {
                                tracing::warn!(%error, "rank list fetch failed");
                                Some(RankChallengeAction::NetworkError)
                            },
                        }
                    }
                    .cancellable("fetch", true)
                ]
            },

            RankChallengeAction::Fetched(list) => {
                state.is_loading = false;
                state.rank_list = list;
                smallvec![Effect::None]
            },

            RankChallengeAction::TappedLike(challenge) => {
                if !env.is_authenticated() {
                    return smallvec![Effect::send(RankChallengeAction::ShowLoginAlert)];
                }
                let predicted = predict_like(&challenge);
                let predicted_flag = predicted.is_liked;
                let client = Arc::clone(&env.clients.challenges);
                smallvec![
                    Effect::send(RankChallengeAction::Update(predicted)),
                    async_effect! {
                        match reconcile(
                            client.put_like(challenge.id),
                            |response| response.is_liked == predicted_flag,
                            |response| client.get(response.id),
                        )
                        .await
                        {
                            Reconciled::Confirmed(_) => None,
                            Reconciled::Corrected { fresh, .. } => Some(RankChallengeAction::Update(fresh)),
                            Reconciled::Failed(error) => {
                                tracing::warn!(id = challenge.id, %error, "like failed");
                                Some(RankChallengeAction::NetworkError)
                            },
                        }
                    },
                ]
            },

            RankChallengeAction::Update(challenge) => {
                replace_by_id(&mut state.rank_list, &challenge);
                smallvec![Effect::None]
            },

            RankChallengeAction::ShowLoginAlert => {
                state.show_login_alert = true;
                smallvec![Effect::None]
            },

            RankChallengeAction::LoginAlert(_) => {
                state.show_login_alert = false;
                smallvec![Effect::None]
            },

            RankChallengeAction::NetworkError => {
                state.is_loading = false;
                state.network_errors = state.network_errors.saturating_add(1);
                smallvec![Effect::None]
            },

            RankChallengeAction::TappedChallenge(_) | RankChallengeAction::TappedBack => smallvec![Effect::None],
        }
    }
}
