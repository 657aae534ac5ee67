//! Feature configuration.
//!
//! Values the original app hard-coded (banner rotation, nearby search radius,
//! which themes the home tab prefetches) plus the per-feature fetch dedup
//! policy.
//!
//! # Example
//!
//! ```
//! use popseoul_features::config::{DedupPolicy, FeatureConfig};
//! use std::time::Duration;
//!
//! let config = FeatureConfig::default()
//!     .with_banner_rotation(Duration::from_secs(60))
//!     .with_home_theme_dedup(DedupPolicy::LatestWins);
//! assert!(config.validate().is_ok());
//! ```

use popseoul_clients::ChallengeTheme;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable holds a value that does not parse
    #[error("Invalid value for {var}: {value}")]
    InvalidValue {
        /// Variable name
        var: String,
        /// Offending value
        value: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// How a feature treats a fetch trigger while the same fetch is in flight
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Keep an in-flight marker in state and ignore the duplicate trigger
    TrackInFlight,
    /// Cancel the earlier request and start again
    LatestWins,
}

impl FromStr for DedupPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "track" | "track-in-flight" | "track_in_flight" => Ok(Self::TrackInFlight),
            "latest" | "latest-wins" | "latest_wins" => Ok(Self::LatestWins),
            _ => Err(ConfigError::InvalidValue {
                var: "dedup policy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Tunables of the feature reducers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureConfig {
    /// Minimum time between banner list rotations
    ///
    /// Default: 300 seconds
    pub banner_rotation: Duration,

    /// Search radius of the nearby list in meters
    ///
    /// Default: 5000
    pub location_radius: u32,

    /// Maximum size of the nearby list
    ///
    /// Default: 10
    pub location_limit: u32,

    /// Themes the home tab fetches on first appearance
    pub prefetch_themes: Vec<ChallengeTheme>,

    /// Dedup of theme fetches in the home tab
    ///
    /// Default: [`DedupPolicy::TrackInFlight`]
    pub home_theme_dedup: DedupPolicy,

    /// Dedup of theme fetches in the theme challenge screen
    ///
    /// Default: [`DedupPolicy::LatestWins`]
    pub theme_screen_dedup: DedupPolicy,

    /// Dedup of the my-challenge list fetch
    ///
    /// Default: [`DedupPolicy::TrackInFlight`]
    pub my_challenge_dedup: DedupPolicy,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            banner_rotation: Duration::from_secs(300),
            location_radius: 5000,
            location_limit: 10,
            prefetch_themes: vec![
                ChallengeTheme::MustSeeSpots,
                ChallengeTheme::LocalTour,
                ChallengeTheme::HistoryCulture,
            ],
            home_theme_dedup: DedupPolicy::TrackInFlight,
            theme_screen_dedup: DedupPolicy::LatestWins,
            my_challenge_dedup: DedupPolicy::TrackInFlight,
        }
    }
}

impl FeatureConfig {
    /// Set the banner rotation interval
    #[must_use]
    pub const fn with_banner_rotation(mut self, interval: Duration) -> Self {
        self.banner_rotation = interval;
        self
    }

    /// Set the nearby search radius and list size
    #[must_use]
    pub const fn with_location_search(mut self, radius: u32, limit: u32) -> Self {
        self.location_radius = radius;
        self.location_limit = limit;
        self
    }

    /// Set the prefetched themes
    #[must_use]
    pub fn with_prefetch_themes(mut self, themes: Vec<ChallengeTheme>) -> Self {
        self.prefetch_themes = themes;
        self
    }

    /// Set the home tab theme dedup policy
    #[must_use]
    pub const fn with_home_theme_dedup(mut self, policy: DedupPolicy) -> Self {
        self.home_theme_dedup = policy;
        self
    }

    /// Set the theme screen dedup policy
    #[must_use]
    pub const fn with_theme_screen_dedup(mut self, policy: DedupPolicy) -> Self {
        self.theme_screen_dedup = policy;
        self
    }

    /// Set the my-challenge dedup policy
    #[must_use]
    pub const fn with_my_challenge_dedup(mut self, policy: DedupPolicy) -> Self {
        self.my_challenge_dedup = policy;
        self
    }

    /// Load from `POPSEOUL_*` environment variables over the defaults
    ///
    /// - `POPSEOUL_BANNER_ROTATION_SECS`
    /// - `POPSEOUL_LOCATION_RADIUS`
    /// - `POPSEOUL_LOCATION_LIMIT`
    /// - `POPSEOUL_PREFETCH_THEMES` (comma-separated theme ids)
    /// - `POPSEOUL_HOME_THEME_DEDUP`, `POPSEOUL_THEME_SCREEN_DEDUP`,
    ///   `POPSEOUL_MY_CHALLENGE_DEDUP` (`track` or `latest`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable does not parse or the result
    /// fails [`FeatureConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`FeatureConfig::from_env`] with an explicit variable source
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable does not parse or the result
    /// fails validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = parsed::<u64>(&lookup, "POPSEOUL_BANNER_ROTATION_SECS")? {
            config.banner_rotation = Duration::from_secs(secs);
        }
        if let Some(radius) = parsed(&lookup, "POPSEOUL_LOCATION_RADIUS")? {
            config.location_radius = radius;
        }
        if let Some(limit) = parsed(&lookup, "POPSEOUL_LOCATION_LIMIT")? {
            config.location_limit = limit;
        }
        if let Some(raw) = lookup("POPSEOUL_PREFETCH_THEMES") {
            config.prefetch_themes = parse_themes(&raw)?;
        }
        if let Some(policy) = parsed(&lookup, "POPSEOUL_HOME_THEME_DEDUP")? {
            config.home_theme_dedup = policy;
        }
        if let Some(policy) = parsed(&lookup, "POPSEOUL_THEME_SCREEN_DEDUP")? {
            config.theme_screen_dedup = policy;
        }
        if let Some(policy) = parsed(&lookup, "POPSEOUL_MY_CHALLENGE_DEDUP")? {
            config.my_challenge_dedup = policy;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a zero rotation interval,
    /// radius or limit, and for duplicated prefetch themes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.banner_rotation.is_zero() {
            return Err(ConfigError::Validation("banner_rotation must be > 0".to_string()));
        }
        if self.location_radius == 0 {
            return Err(ConfigError::Validation("location_radius must be > 0".to_string()));
        }
        if self.location_limit == 0 {
            return Err(ConfigError::Validation("location_limit must be > 0".to_string()));
        }
        let mut themes = self.prefetch_themes.clone();
        themes.sort();
        themes.dedup();
        if themes.len() != self.prefetch_themes.len() {
            return Err(ConfigError::Validation("prefetch_themes contains duplicates".to_string()));
        }
        Ok(())
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Result<Option<T>, ConfigError> {
    lookup(var)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_themes(raw: &str) -> Result<Vec<ChallengeTheme>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse()
                .ok()
                .and_then(ChallengeTheme::from_id)
                .ok_or_else(|| ConfigError::InvalidValue {
                    var: "POPSEOUL_PREFETCH_THEMES".to_string(),
                    value: part.to_string(),
                })
        })
        .collect()
}
