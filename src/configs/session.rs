use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// How long a disconnected participant's slot (and host status) is kept
    /// for reconnection before eviction, in seconds.
    pub grace_period_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 300,
        }
    }
}
