//! # `PopSeoul` Features
//!
//! Feature reducers of the `PopSeoul` client, composed from the primitives
//! in `popseoul-core` and run by the `popseoul-runtime` store.
//!
//! - Tabs: [`home_tab`], [`my_challenge_tab`], [`profile_tab`]
//! - Pushed screens: [`detail_challenge`], [`detail_attraction`],
//!   [`theme_challenge`], [`rank_challenge`], [`attraction_map`],
//!   [`complete_challenge`], [`my_badge`], [`login`]
//! - Root: [`main_tab`], which owns the tabs and the navigation stack and
//!   routes delegate actions between them
//!
//! Every reducer takes the same [`AppEnvironment`].
//!
//! ## Example
//!
//! ```ignore
//! use popseoul_features::{AppEnvironment, MainTabFeature, MainTabState};
//! use popseoul_runtime::Store;
//!
//! let env = AppEnvironment::new(clients, Arc::new(SystemClock));
//! let store = Store::new(MainTabState::default(), MainTabFeature::new(), env);
//! store.send(MainTabAction::Home(HomeTabAction::OnAppear)).await?;
//! ```

pub mod attraction_map;
pub mod common;
pub mod complete_challenge;
pub mod config;
pub mod detail_attraction;
pub mod detail_challenge;
pub mod environment;
pub mod home_tab;
pub mod identity;
pub mod login;
pub mod main_tab;
pub mod my_badge;
pub mod my_challenge_tab;
pub mod optimistic;
pub mod profile_tab;
pub mod rank_challenge;
pub mod theme_challenge;

pub use config::{ConfigError, DedupPolicy, FeatureConfig};
pub use environment::AppEnvironment;
pub use main_tab::{MainTabAction, MainTabFeature, MainTabState, PathAction, PathState, Tab};
