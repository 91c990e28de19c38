use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use folia_core::Library;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub library: Arc<Library>,
    /// Revoked JWT token IDs (jti), kept until the token would have expired.
    pub revoked_tokens: Arc<DashMap<String, Instant>>,
}

impl AppState {
    pub fn new(config: ServerConfig, library: Library) -> Self {
        Self {
            config: Arc::new(config),
            library: Arc::new(library),
            revoked_tokens: Arc::new(DashMap::new()),
        }
    }
}
