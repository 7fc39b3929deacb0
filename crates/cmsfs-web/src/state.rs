use std::sync::Arc;

use cmsfs_core::FileContext;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    /// Shared by every request so the image size cache and file index are
    /// process-wide.
    pub ctx: Arc<FileContext>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            ctx: Arc::new(FileContext::from_config(&config.core)),
        }
    }
}
