//! In-memory stand-in for the REST backend.

use super::{Behavior, settle};
use crate::error::{ApiError, Result};
use crate::models::{
    Attraction, Challenge, ChallengeStatus, ChallengeTheme, Coordinate, LikeResponse, LocationChallenges,
    StampChallenge, StampChallenges, StampResponse, StatusResponse, User,
};
use crate::{AttractionClient, ChallengeClient, ChallengeListClient, ClientFuture, UserClient};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// Named challenge lists served by [`MockServer`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListKey {
    /// Seoul master banner
    Seoul,
    /// Cultural event banner
    Cultural,
    /// Popularity ranking
    Rank,
    /// One theme
    Theme(ChallengeTheme),
    /// Challenges containing an attraction
    Stamp(i64),
}

#[derive(Debug, Default)]
struct Data {
    challenges: BTreeMap<i64, Challenge>,
    attractions: BTreeMap<i64, Attraction>,
    challenge_attractions: HashMap<i64, Vec<i64>>,
    lists: HashMap<ListKey, Vec<i64>>,
    missing: Option<(StampChallenge, Vec<i64>)>,
    location: (bool, Vec<i64>),
    like_script: HashMap<i64, VecDeque<bool>>,
    user: User,
}

impl Data {
    fn resolve(&self, ids: &[i64]) -> Vec<Challenge> {
        ids.iter().filter_map(|id| self.challenges.get(id).cloned()).collect()
    }

    fn list(&self, key: ListKey) -> Vec<Challenge> {
        self.lists.get(&key).map(|ids| self.resolve(ids)).unwrap_or_default()
    }

    fn challenge_mut(&mut self, id: i64) -> Result<&mut Challenge> {
        self.challenges.get_mut(&id).ok_or(ApiError::ClientError(404))
    }
}

/// Challenge, list, attraction and user endpoints over shared in-memory data
///
/// Likes toggle the stored record unless a scripted answer is queued with
/// [`MockServer::script_like`], which lets a test make the server disagree
/// with the client's prediction.
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    data: Arc<Mutex<Data>>,
    behavior: Behavior,
}

impl MockServer {
    /// Empty server with its own call log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty server recording into `behavior`
    #[must_use]
    pub fn with_behavior(behavior: Behavior) -> Self {
        Self {
            data: Arc::default(),
            behavior,
        }
    }

    /// Call log and failure injection
    #[must_use]
    pub const fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    /// Store or overwrite a challenge
    pub fn insert_challenge(&self, challenge: Challenge) {
        self.with_data(|data| {
            data.challenges.insert(challenge.id, challenge);
        });
    }

    /// Stored version of a challenge
    #[must_use]
    pub fn challenge(&self, id: i64) -> Option<Challenge> {
        self.with_data(|data| data.challenges.get(&id).cloned())
    }

    /// Store an attraction as part of a challenge
    pub fn insert_attraction(&self, challenge_id: i64, attraction: Attraction) {
        self.with_data(|data| {
            data.challenge_attractions
                .entry(challenge_id)
                .or_default()
                .push(attraction.id);
            data.attractions.insert(attraction.id, attraction);
        });
    }

    /// Stored version of an attraction
    #[must_use]
    pub fn attraction(&self, id: i64) -> Option<Attraction> {
        self.with_data(|data| data.attractions.get(&id).cloned())
    }

    /// Set the members of a named list
    pub fn set_list(&self, key: ListKey, ids: Vec<i64>) {
        self.with_data(|data| {
            data.lists.insert(key, ids);
        });
    }

    /// Set the answer of the missing-challenge endpoint
    pub fn set_missing(&self, kind: StampChallenge, ids: Vec<i64>) {
        self.with_data(|data| data.missing = Some((kind, ids)));
    }

    /// Set the answer of the nearby endpoint
    pub fn set_location_list(&self, jong_gak: bool, ids: Vec<i64>) {
        self.with_data(|data| data.location = (jong_gak, ids));
    }

    /// Queue the flag the next like of challenge `id` answers with
    ///
    /// A scripted answer leaves the stored record untouched.
    pub fn script_like(&self, id: i64, is_liked: bool) {
        self.with_data(|data| data.like_script.entry(id).or_default().push_back(is_liked));
    }

    /// Set the signed-in user's profile
    pub fn set_user(&self, user: User) {
        self.with_data(|data| data.user = user);
    }

    fn with_data<T>(&self, f: impl FnOnce(&mut Data) -> T) -> T {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut data)
    }

    fn respond<T, F>(&self, op: &'static str, call: String, answer: F) -> ClientFuture<'_, Result<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut Data) -> Result<T> + Send + 'static,
    {
        let (latency, failure) = self.behavior.begin(op, call);
        let data = Arc::clone(&self.data);
        Box::pin(async move {
            settle(latency).await;
            if let Some(error) = failure {
                return Err(error);
            }
            let mut data = data.lock().unwrap_or_else(PoisonError::into_inner);
            answer(&mut data)
        })
    }
}

fn toggle_like(is_liked: &mut bool, likes: &mut u32) {
    *is_liked = !*is_liked;
    *likes = if *is_liked {
        likes.saturating_add(1)
    } else {
        likes.saturating_sub(1)
    };
}

impl ChallengeClient for MockServer {
    fn get(&self, id: i64) -> ClientFuture<'_, Result<Challenge>> {
        self.respond("challenge.get", format!("challenge.get({id})"), move |data| {
            data.challenges.get(&id).cloned().ok_or(ApiError::ClientError(404))
        })
    }

    fn put_like(&self, id: i64) -> ClientFuture<'_, Result<LikeResponse>> {
        self.respond("challenge.put_like", format!("challenge.put_like({id})"), move |data| {
            if let Some(is_liked) = data.like_script.get_mut(&id).and_then(VecDeque::pop_front) {
                return Ok(LikeResponse { id, is_liked });
            }
            let challenge = data.challenge_mut(id)?;
            toggle_like(&mut challenge.is_liked, &mut challenge.likes);
            Ok(LikeResponse {
                id,
                is_liked: challenge.is_liked,
            })
        })
    }

    fn put_status(&self, id: i64, status: ChallengeStatus) -> ClientFuture<'_, Result<StatusResponse>> {
        self.respond(
            "challenge.put_status",
            format!("challenge.put_status({id}, {status:?})"),
            move |data| {
                let challenge = data.challenge_mut(id)?;
                challenge.status = status;
                Ok(StatusResponse {
                    id,
                    challenge_status: status,
                })
            },
        )
    }

    fn stamp(
        &self,
        challenge_id: i64,
        attraction_id: i64,
        at: Coordinate,
    ) -> ClientFuture<'_, Result<StampResponse>> {
        self.respond(
            "challenge.stamp",
            format!(
                "challenge.stamp({challenge_id}, {attraction_id}, {:.4}, {:.4})",
                at.latitude, at.longitude
            ),
            move |data| {
                let already = data
                    .attractions
                    .get(&attraction_id)
                    .is_some_and(|attraction| attraction.is_stamped);
                if let Some(attraction) = data.attractions.get_mut(&attraction_id) {
                    attraction.is_stamped = true;
                }
                let challenge = data.challenge_mut(challenge_id)?;
                if !already {
                    challenge.my_stamp_count = challenge.my_stamp_count.saturating_add(1);
                }
                challenge.status = if challenge.attraction_count > 0
                    && challenge.my_stamp_count >= challenge.attraction_count
                {
                    ChallengeStatus::Completed
                } else {
                    ChallengeStatus::Progress
                };
                Ok(StampResponse {
                    challenge_id,
                    attraction_id,
                    my_stamp_count: challenge.my_stamp_count,
                    challenge_status: challenge.status,
                })
            },
        )
    }
}

impl ChallengeListClient for MockServer {
    fn fetch_seoul_list(&self) -> ClientFuture<'_, Result<Vec<Challenge>>> {
        self.respond("list.seoul", "list.seoul()".to_string(), |data| Ok(data.list(ListKey::Seoul)))
    }

    fn fetch_cultural_list(&self) -> ClientFuture<'_, Result<Vec<Challenge>>> {
        self.respond("list.cultural", "list.cultural()".to_string(), |data| {
            Ok(data.list(ListKey::Cultural))
        })
    }

    fn fetch_location_list(
        &self,
        at: Coordinate,
        radius: u32,
        limit: u32,
    ) -> ClientFuture<'_, Result<LocationChallenges>> {
        self.respond(
            "list.location",
            format!(
                "list.location({:.4}, {:.4}, {radius}, {limit})",
                at.latitude, at.longitude
            ),
            move |data| {
                let (jong_gak, ids) = &data.location;
                let mut challenges = data.resolve(ids);
                challenges.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
                Ok(LocationChallenges {
                    jong_gak: *jong_gak,
                    challenges,
                })
            },
        )
    }

    fn fetch_theme_list(&self, theme: ChallengeTheme) -> ClientFuture<'_, Result<Vec<Challenge>>> {
        self.respond("list.theme", format!("list.theme({})", theme.id()), move |data| {
            Ok(data.list(ListKey::Theme(theme)))
        })
    }

    fn fetch_missing_list(&self) -> ClientFuture<'_, Result<StampChallenges>> {
        self.respond("list.missing", "list.missing()".to_string(), |data| {
            Ok(match &data.missing {
                Some((kind, ids)) => StampChallenges {
                    data_code: match kind {
                        StampChallenge::Missed => "MISSED",
                        StampChallenge::Challenge => "CHALLENGE",
                    }
                    .to_string(),
                    challenges: data.resolve(ids),
                },
                None => StampChallenges::default(),
            })
        })
    }

    fn fetch_stamp_list(&self, attraction_id: i64) -> ClientFuture<'_, Result<StampChallenges>> {
        self.respond("list.stamp", format!("list.stamp({attraction_id})"), move |data| {
            Ok(StampChallenges {
                data_code: "CHALLENGE".to_string(),
                challenges: data.list(ListKey::Stamp(attraction_id)),
            })
        })
    }

    fn fetch_rank_list(&self) -> ClientFuture<'_, Result<Vec<Challenge>>> {
        self.respond("list.rank", "list.rank()".to_string(), |data| Ok(data.list(ListKey::Rank)))
    }

    fn fetch_my_challenges(&self, status: ChallengeStatus) -> ClientFuture<'_, Result<Vec<Challenge>>> {
        self.respond("list.my", format!("list.my({status:?})"), move |data| {
            Ok(data
                .challenges
                .values()
                .filter(|challenge| challenge.status == status)
                .cloned()
                .collect())
        })
    }
}

impl AttractionClient for MockServer {
    fn get(&self, id: i64) -> ClientFuture<'_, Result<Attraction>> {
        self.respond("attraction.get", format!("attraction.get({id})"), move |data| {
            data.attractions.get(&id).cloned().ok_or(ApiError::ClientError(404))
        })
    }

    fn put_like(&self, id: i64) -> ClientFuture<'_, Result<LikeResponse>> {
        self.respond("attraction.put_like", format!("attraction.put_like({id})"), move |data| {
            let attraction = data.attractions.get_mut(&id).ok_or(ApiError::ClientError(404))?;
            toggle_like(&mut attraction.is_liked, &mut attraction.likes);
            Ok(LikeResponse {
                id,
                is_liked: attraction.is_liked,
            })
        })
    }

    fn fetch_for_challenge(&self, challenge_id: i64) -> ClientFuture<'_, Result<Vec<Attraction>>> {
        self.respond(
            "attraction.list",
            format!("attraction.list({challenge_id})"),
            move |data| {
                let ids = data.challenge_attractions.get(&challenge_id).cloned().unwrap_or_default();
                Ok(ids.iter().filter_map(|id| data.attractions.get(id).cloned()).collect())
            },
        )
    }
}

impl UserClient for MockServer {
    fn get_user(&self) -> ClientFuture<'_, Result<User>> {
        self.respond("user.get", "user.get()".to_string(), |data| Ok(data.user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palace_tour() -> Challenge {
        Challenge {
            id: 42,
            name: "Five palaces".to_string(),
            likes: 10,
            attraction_count: 2,
            ..Challenge::default()
        }
    }

    #[tokio::test]
    async fn like_toggles_stored_record() {
        let server = MockServer::new();
        server.insert_challenge(palace_tour());

        let response = ChallengeClient::put_like(&server, 42).await;
        assert_eq!(response, Ok(LikeResponse { id: 42, is_liked: true }));
        assert_eq!(server.challenge(42).map(|c| c.likes), Some(11));
    }

    #[tokio::test]
    async fn scripted_like_leaves_record_untouched() {
        let server = MockServer::new();
        server.insert_challenge(palace_tour());
        server.script_like(42, true);

        let response = ChallengeClient::put_like(&server, 42).await;
        assert_eq!(response, Ok(LikeResponse { id: 42, is_liked: true }));
        assert_eq!(server.challenge(42).map(|c| (c.is_liked, c.likes)), Some((false, 10)));
    }

    #[tokio::test]
    async fn stamping_every_attraction_completes() {
        let server = MockServer::new();
        server.insert_challenge(palace_tour());
        server.insert_attraction(42, Attraction { id: 1, ..Attraction::default() });
        server.insert_attraction(42, Attraction { id: 2, ..Attraction::default() });
        let at = Coordinate::new(37.57, 126.97);

        let first = server.stamp(42, 1, at).await;
        assert_eq!(first.map(|r| r.challenge_status), Ok(ChallengeStatus::Progress));
        let again = server.stamp(42, 1, at).await;
        assert_eq!(again.map(|r| r.my_stamp_count), Ok(1));
        let last = server.stamp(42, 2, at).await;
        assert_eq!(last.map(|r| r.challenge_status), Ok(ChallengeStatus::Completed));
    }

    #[tokio::test]
    async fn injected_failure_and_missing_record() {
        let server = MockServer::new();
        server.behavior().fail_next("list.rank", ApiError::Connectivity);

        assert_eq!(server.fetch_rank_list().await, Err(ApiError::Connectivity));
        assert_eq!(server.fetch_rank_list().await, Ok(Vec::new()));
        assert_eq!(ChallengeClient::get(&server, 7).await, Err(ApiError::ClientError(404)));
        assert_eq!(
            server.behavior().calls(),
            vec!["list.rank()", "list.rank()", "challenge.get(7)"]
        );
    }

    #[tokio::test]
    async fn lists_resolve_current_records() {
        let server = MockServer::new();
        server.insert_challenge(palace_tour());
        server.set_list(ListKey::Theme(ChallengeTheme::HistoryCulture), vec![42, 99]);
        server.insert_challenge(Challenge {
            is_liked: true,
            ..palace_tour()
        });

        let list = server.fetch_theme_list(ChallengeTheme::HistoryCulture).await.unwrap_or_default();
        assert_eq!(list.len(), 1);
        assert!(list[0].is_liked);
    }
}
