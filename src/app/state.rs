//! Application state shared across tasks

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::game::arena::{Arena, ArenaHandle, ARENA_QUEUE};
use crate::net::connection::SessionSettings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: ArenaHandle,
    /// Fires once when the server begins stopping
    pub shutdown: CancellationToken,
    /// Per-connection tasks, awaited on shutdown
    pub tasks: TaskTracker,
}

impl AppState {
    /// Build the state and spawn the arena task. Must run inside a runtime.
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize arena
        let arena = Arena::spawn(ARENA_QUEUE);

        Self {
            config,
            arena,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_timeout: self.config.idle_timeout,
            max_line_length: self.config.max_line_length,
        }
    }
}
