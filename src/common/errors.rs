use thiserror::Error;

use crate::common::types::{ConnectionId, SessionCode};

/// Failures that can occur while processing a relay event.
///
/// `Unauthorized` and `NotInSession` are expected in normal operation
/// (stale client UI, races against grace-timer eviction) and are dropped
/// silently by the engine; only `SessionNotFound` and `SessionExpired`
/// surface back to the requesting client.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Unknown join code on `join-session`.
    #[error("session not found: {0}")]
    SessionNotFound(SessionCode),

    /// Unknown join code on `rejoin-session`; the session was destroyed
    /// or the server restarted since the client last saw it.
    #[error("session expired: {0}")]
    SessionExpired(SessionCode),

    /// Event from a connection that is not bound to any session.
    #[error("connection {0} is not in a session")]
    NotInSession(ConnectionId),

    /// Playback-control event from a non-host connection.
    #[error("playback control from non-host connection {0}")]
    Unauthorized(ConnectionId),
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
