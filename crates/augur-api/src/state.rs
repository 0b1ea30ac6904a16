//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use augur_chat::{narrator_from_config, ChatError, Narrator, SessionStore, TurnOrchestrator};
use augur_core::config::AugurConfig;

/// Shared application state.
///
/// All fields are cheap to clone; the session store lives inside the
/// orchestrator behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, read-only after startup.
    pub config: Arc<AugurConfig>,
    pub orchestrator: TurnOrchestrator,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AugurConfig, narrator: Arc<dyn Narrator>) -> Self {
        let store = Arc::new(SessionStore::new());
        let orchestrator = TurnOrchestrator::new(store, narrator, &config);
        Self {
            config: Arc::new(config),
            orchestrator,
            start_time: Instant::now(),
        }
    }

    /// Build state with the narrator named in `config.narrator`.
    pub fn from_config(config: AugurConfig) -> Result<Self, ChatError> {
        let narrator = narrator_from_config(&config.narrator)?;
        Ok(Self::new(config, narrator))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.orchestrator.store()
    }
}
