use crate::config::Config;
use crate::engine::{GenerationEngine, TokenCounter};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared by every request. Settings are swapped wholesale on config reload.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<RwLock<Arc<Config>>>,
    pub engine: Arc<dyn GenerationEngine>,
    pub token_counter: Arc<dyn TokenCounter>,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<dyn GenerationEngine>,
        token_counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            settings: Arc::new(RwLock::new(Arc::new(config))),
            engine,
            token_counter,
        }
    }

    pub async fn settings(&self) -> Arc<Config> {
        self.settings.read().await.clone()
    }

    /// Engine connection fields are only read at startup; a reload changes
    /// everything else.
    pub async fn update_settings(&self, config: Config) {
        *self.settings.write().await = Arc::new(config);
    }
}
