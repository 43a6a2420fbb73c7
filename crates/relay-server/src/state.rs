use relay_core::{ConfigStore, EventRecorder, RelayController};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RelayController>,
    pub config: Arc<dyn ConfigStore>,
    pub events: Arc<dyn EventRecorder>,
    /// Serializes read-modify-apply-persist cycles on the configuration.
    pub config_write: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        controller: Arc<RelayController>,
        config: Arc<dyn ConfigStore>,
        events: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            controller,
            config,
            events,
            config_write: Arc::new(Mutex::new(())),
        }
    }
}
