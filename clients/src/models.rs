//! Domain records carried through feature state.
//!
//! Records are plain values. Every record with an `id` is replaced by
//! identity when a fresher copy arrives, never merged field by field.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of the signed-in user on a challenge
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeStatus {
    /// Not started
    #[default]
    None,
    /// Started, stamps still missing
    Progress,
    /// Every attraction stamped
    Completed,
}

/// Curated challenge themes
///
/// Declaration order is display priority, so `Ord` sorts by priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeTheme {
    /// Landmarks every visitor should see
    #[default]
    MustSeeSpots,
    /// Neighbourhood walks
    LocalTour,
    /// Palaces, museums and heritage sites
    HistoryCulture,
    /// Film, drama and K-pop locations
    KCulture,
    /// Parks, rivers and trails
    NatureHealing,
}

impl ChallengeTheme {
    /// All themes, highest priority first
    pub const ALL: [Self; 5] = [
        Self::MustSeeSpots,
        Self::LocalTour,
        Self::HistoryCulture,
        Self::KCulture,
        Self::NatureHealing,
    ];

    /// Server-side theme id
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::MustSeeSpots => 1,
            Self::LocalTour => 2,
            Self::HistoryCulture => 3,
            Self::KCulture => 4,
            Self::NatureHealing => 5,
        }
    }

    /// Theme for a server-side id
    #[must_use]
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|theme| theme.id() == id)
    }
}

impl fmt::Display for ChallengeTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MustSeeSpots => "must-see spots",
            Self::LocalTour => "local tour",
            Self::HistoryCulture => "history & culture",
            Self::KCulture => "K-culture",
            Self::NatureHealing => "nature & healing",
        };
        f.write_str(name)
    }
}

/// A stamp-collecting challenge
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Challenge {
    /// Identity
    pub id: i64,
    /// Display name
    pub name: String,
    /// Theme the challenge belongs to
    pub theme: Option<ChallengeTheme>,
    /// Cover image
    pub image_url: Option<String>,
    /// Like counter
    pub likes: u32,
    /// Whether the signed-in user liked it
    pub is_liked: bool,
    /// Number of comments
    pub comment_count: u32,
    /// Number of attractions to stamp
    pub attraction_count: u32,
    /// Attractions the signed-in user already stamped
    pub my_stamp_count: u32,
    /// Progress of the signed-in user
    pub status: ChallengeStatus,
    /// Name of the headline attraction
    pub main_location: Option<String>,
}

/// WGS84 position
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

impl Coordinate {
    const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

    /// New coordinate
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance in meters
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * Self::EARTH_RADIUS_METERS * a.sqrt().asin()
    }
}

/// A place that can be stamped as part of a challenge
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attraction {
    /// Identity
    pub id: i64,
    /// Display name
    pub name: String,
    /// Street address
    pub address: String,
    /// Cover image
    pub image_url: Option<String>,
    /// Whether the signed-in user liked it
    pub is_liked: bool,
    /// Like counter
    pub likes: u32,
    /// Whether the signed-in user stamped it
    pub is_stamped: bool,
    /// Position, when known
    pub coordinate: Option<Coordinate>,
}

/// Signed-in user profile
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    /// Identity
    pub id: i64,
    /// Display name
    pub nickname: String,
    /// Account email
    pub email: Option<String>,
    /// Total stamps collected
    pub stamp_count: u32,
    /// Total likes given
    pub like_count: u32,
    /// Total comments written
    pub comment_count: u32,
}

/// Result of a one-shot location request
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LocationResult {
    /// A fix was obtained
    Success(Coordinate),
    /// Permission missing or the fix failed
    Fail,
}

/// Location permission as reported by the platform
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The user was never asked
    #[default]
    NotDetermined,
    /// The user refused
    Denied,
    /// Allowed while the app is in use
    AuthorizedWhenInUse,
    /// Allowed at all times
    AuthorizedAlways,
}

impl AuthorizationStatus {
    /// Whether location fixes may be requested
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::AuthorizedWhenInUse | Self::AuthorizedAlways)
    }
}

/// Authoritative like flag after a like toggle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    /// Record identity
    pub id: i64,
    /// Flag as stored by the server
    pub is_liked: bool,
}

/// Authoritative status after a status change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Challenge identity
    pub id: i64,
    /// Status as stored by the server
    pub challenge_status: ChallengeStatus,
}

/// Authoritative progress after stamping an attraction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampResponse {
    /// Challenge identity
    pub challenge_id: i64,
    /// Stamped attraction
    pub attraction_id: i64,
    /// Stamp counter as stored by the server
    pub my_stamp_count: u32,
    /// Status after the stamp
    pub challenge_status: ChallengeStatus,
}

/// Challenges near the user
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationChallenges {
    /// `true` when the user is outside the service area and the server
    /// answered with its default selection
    pub jong_gak: bool,
    /// Challenges, nearest first
    pub challenges: Vec<Challenge>,
}

/// Which list the stamp endpoint answered with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StampChallenge {
    /// Challenges the user started and left unfinished
    Missed,
    /// Suggestions for a user with nothing in progress
    Challenge,
}

impl StampChallenge {
    /// Decode the server's list code
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "MISSED" => Some(Self::Missed),
            "CHALLENGE" => Some(Self::Challenge),
            _ => None,
        }
    }
}

/// Answer of the stamp list endpoint
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StampChallenges {
    /// List code, see [`StampChallenge::from_code`]
    pub data_code: String,
    /// Challenges
    pub challenges: Vec<Challenge>,
}

impl StampChallenges {
    /// Decoded list kind
    #[must_use]
    pub fn kind(&self) -> Option<StampChallenge> {
        StampChallenge::from_code(&self.data_code)
    }
}

/// Last attraction the user stamped, kept in preferences
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StampedAttraction {
    /// Attraction identity
    pub id: i64,
    /// Attraction name
    pub name: String,
}

/// Credentials handed over by a sign-in provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthProvider {
    /// Google sign-in
    Google {
        /// OpenID token
        id_token: String,
    },
    /// Sign in with Apple
    Apple {
        /// Identity token
        identity_token: String,
    },
    /// Facebook login
    Facebook {
        /// Account email
        email: String,
    },
}

/// Result of a successful login
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Whether the account was created by this login
    pub is_new_user: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn themes_sort_by_priority() {
        let mut themes = vec![ChallengeTheme::NatureHealing, ChallengeTheme::MustSeeSpots, ChallengeTheme::KCulture];
        themes.sort();
        assert_eq!(
            themes,
            vec![ChallengeTheme::MustSeeSpots, ChallengeTheme::KCulture, ChallengeTheme::NatureHealing]
        );
        assert_eq!(ChallengeTheme::from_id(3), Some(ChallengeTheme::HistoryCulture));
        assert_eq!(ChallengeTheme::from_id(9), None);
    }

    #[test]
    fn distance_between_seoul_landmarks() {
        let city_hall = Coordinate::new(37.5663, 126.9779);
        let gyeongbokgung = Coordinate::new(37.5796, 126.9770);
        let meters = city_hall.distance_to(&gyeongbokgung);
        assert!((1_400.0..1_550.0).contains(&meters), "{meters}");
        assert!(city_hall.distance_to(&city_hall).abs() < f64::EPSILON);
    }

    #[test]
    fn stamp_list_codes() {
        let missed = StampChallenges {
            data_code: "MISSED".to_string(),
            challenges: Vec::new(),
        };
        assert_eq!(missed.kind(), Some(StampChallenge::Missed));
        assert_eq!(StampChallenge::from_code("OTHER"), None);
    }

    #[test]
    fn status_wire_names() {
        let response: StatusResponse =
            serde_json::from_str(r#"{"id":4,"challengeStatus":"PROGRESS"}"#).unwrap_or(StatusResponse {
                id: 0,
                challenge_status: ChallengeStatus::None,
            });
        assert_eq!(response.challenge_status, ChallengeStatus::Progress);
        assert!(AuthorizationStatus::AuthorizedAlways.is_authorized());
        assert!(!AuthorizationStatus::Denied.is_authorized());
    }

    mod distance {
        use super::*;
        use proptest::prelude::*;

        fn seoul() -> impl Strategy<Value = Coordinate> {
            (37.4..37.7f64, 126.8..127.2f64).prop_map(|(latitude, longitude)| Coordinate::new(latitude, longitude))
        }

        proptest! {
            #[test]
            fn symmetric_and_non_negative(a in seoul(), b in seoul()) {
                let there = a.distance_to(&b);
                let back = b.distance_to(&a);
                prop_assert!(there >= 0.0);
                prop_assert!((there - back).abs() < 1e-6);
            }

            #[test]
            fn never_exceeds_a_detour(a in seoul(), b in seoul(), via in seoul()) {
                prop_assert!(a.distance_to(&b) <= a.distance_to(&via) + via.distance_to(&b) + 1e-6);
            }
        }
    }
}
