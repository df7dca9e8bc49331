use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::common::types::{ConnectionId, SessionCode};
use crate::server::session::{Participant, Session};

/// Process-wide registry of active sessions, keyed by join code, plus the
/// connection-to-session index used to resolve inbound events. Constructed
/// once per server instance and lives for the process lifetime; entries are
/// reclaimed individually as sessions empty. No persistence: a restart
/// loses all sessions and clients recover via a failed rejoin.
pub struct SessionStore {
    sessions: DashMap<SessionCode, Arc<Session>>,
    connections: DashMap<ConnectionId, SessionCode>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            connections: DashMap::new(),
        }
    }

    /// Creates a session with `host` as its sole participant, under a
    /// freshly generated code. Collisions against live sessions are rare at
    /// 32^6 codes but handled by regenerating rather than failing.
    pub fn create(&self, host: Participant) -> Arc<Session> {
        loop {
            let code = SessionCode::generate();
            match self.sessions.entry(code.clone()) {
                Entry::Occupied(_) => {
                    debug!("Join code collision on {}, regenerating", code);
                    continue;
                }
                Entry::Vacant(entry) => {
                    let host_conn = host.connection_id.clone();
                    let session = Arc::new(Session::new(code.clone(), host));
                    entry.insert(session.clone());
                    self.connections.insert(host_conn, code.clone());
                    info!("Session created: {} ({})", session.session_id, code);
                    return session;
                }
            }
        }
    }

    pub fn lookup(&self, code: &SessionCode) -> Option<Arc<Session>> {
        self.sessions.get(code).map(|entry| entry.value().clone())
    }

    /// Removes the session. Called only once its participant set, grace
    /// periods included, is empty.
    pub fn destroy(&self, code: &SessionCode) {
        if let Some((_, session)) = self.sessions.remove(code) {
            info!("Session destroyed: {} ({})", session.session_id, code);
        }
    }

    /// Points a connection at a session for later event resolution.
    pub fn bind(&self, conn: ConnectionId, code: SessionCode) {
        self.connections.insert(conn, code);
    }

    pub fn unbind(&self, conn: &ConnectionId) {
        self.connections.remove(conn);
    }

    /// Resolves the session an inbound event belongs to. Returns None both
    /// for unbound connections and for bindings whose session has already
    /// been destroyed by another path.
    pub fn session_for(&self, conn: &ConnectionId) -> Option<Arc<Session>> {
        let code = self.connections.get(conn)?.value().clone();
        self.lookup(&code)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
