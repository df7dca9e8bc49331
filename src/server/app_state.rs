use std::sync::Arc;

use crate::configs::Config;
use crate::relay::RelayEngine;
use crate::server::store::SessionStore;

/// Top-level application state, constructed once per server instance and
/// passed by reference to all handlers. The engine owns the session store,
/// the only process-wide mutable state.
pub struct AppState {
    pub engine: RelayEngine,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(SessionStore::new());
        let engine = RelayEngine::new(store, &config.session);
        Self { engine }
    }
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
