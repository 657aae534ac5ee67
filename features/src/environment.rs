//! Injected collaborators shared by every feature.

use crate::config::FeatureConfig;
use popseoul_clients::Clients;
use popseoul_core::environment::Clock;
use std::sync::Arc;

/// Environment of every feature reducer
///
/// Reducers read the session flag and preferences through it as ambient
/// input and clone collaborators out of it into their effects.
#[derive(Clone)]
pub struct AppEnvironment {
    /// Network, device and session collaborators
    pub clients: Clients,
    /// Time source for the banner rotation
    pub clock: Arc<dyn Clock>,
    /// Tunables
    pub config: FeatureConfig,
}

impl AppEnvironment {
    /// Environment with the default configuration
    #[must_use]
    pub fn new(clients: Clients, clock: Arc<dyn Clock>) -> Self {
        Self {
            clients,
            clock,
            config: FeatureConfig::default(),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: FeatureConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether a session is present
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.clients.session.is_authenticated()
    }
}

impl std::fmt::Debug for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppEnvironment")
            .field("clients", &self.clients)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
