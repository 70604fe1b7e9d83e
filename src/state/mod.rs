use crate::broadcast::Hub;
use crate::config::Config;
use crate::store::RoomStore;

/// Shared application state, one per process
pub struct AppState {
    pub store: RoomStore,
    /// Socket registry and room channels
    pub hub: Hub,
    pub config: Config,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            store: RoomStore::new(),
            hub: Hub::new(),
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
