use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use tracing::{debug, info};

use crate::common::types::{ConnectionId, SessionCode};
use crate::protocol::ServerEvent;
use crate::server::session::{Participant, SessionState};
use crate::server::store::SessionStore;

/// Result of a `rejoin-session` reconciliation.
pub struct RejoinOutcome {
    /// True when an existing grace-period slot was restored rather than a
    /// fresh participant appended.
    pub was_reconnect: bool,
    /// True when the reconnecting participant holds host authority.
    pub is_host: bool,
}

/// Tracks participants per session: joins, reconnect reconciliation, host
/// transfer, and both departure flavors.
///
/// Transport drops are common (network blips, backgrounded tabs) and must
/// not evict a participant or strip host authority; only an explicit leave
/// or an expired grace window does that. Mutating methods take the already
/// locked session state so each inbound event is applied atomically.
#[derive(Clone)]
pub struct MembershipManager {
    store: Arc<SessionStore>,
    grace_period: Duration,
}

impl MembershipManager {
    pub fn new(store: Arc<SessionStore>, grace_period: Duration) -> Self {
        Self {
            store,
            grace_period,
        }
    }

    /// Appends a new non-host participant.
    pub fn join(
        &self,
        state: &mut SessionState,
        name: String,
        listens_locally: bool,
        conn: ConnectionId,
        sender: flume::Sender<Message>,
    ) {
        state
            .participants
            .push(Participant::new(conn, name, false, listens_locally, sender));
    }

    /// Reconnect-or-join. A participant with a matching name and an active
    /// grace period gets its old slot back under the new connection id, its
    /// eviction timer canceled, and - if it was host - `host_connection_id`
    /// re-pointed. Anyone else is appended as a plain guest.
    ///
    /// Matching by display name is inherited behavior: two guests sharing a
    /// name could cross-reconnect. See DESIGN.md.
    pub fn rejoin(
        &self,
        state: &mut SessionState,
        name: String,
        listens_locally: bool,
        conn: ConnectionId,
        sender: flume::Sender<Message>,
    ) -> RejoinOutcome {
        let slot = state
            .participants
            .iter_mut()
            .find(|p| p.name == name && p.in_grace());

        match slot {
            Some(participant) => {
                participant.cancel_eviction();
                participant.connection_id = conn.clone();
                participant.disconnected_at_ms = None;
                participant.listens_locally = listens_locally;
                participant.sender = sender;
                let is_host = participant.is_host;
                if is_host {
                    state.host_connection_id = conn;
                }
                RejoinOutcome {
                    was_reconnect: true,
                    is_host,
                }
            }
            None => {
                self.join(state, name, listens_locally, conn, sender);
                RejoinOutcome {
                    was_reconnect: false,
                    is_host: false,
                }
            }
        }
    }

    /// Removes the participant outright (explicit `leave-session`, not a
    /// transport drop). Promotes a new host if needed, destroys the session
    /// when nobody is left, and broadcasts `participant-left` to the rest.
    pub fn leave_immediate(
        &self,
        code: &SessionCode,
        state: &mut SessionState,
        conn: &ConnectionId,
    ) {
        self.remove_and_settle(code, state, conn);
    }

    /// Marks the participant disconnected, schedules its eviction after the
    /// grace period, and broadcasts `participant-disconnected` (distinct
    /// from `participant-left`) to the remaining connections.
    pub fn begin_grace(
        &self,
        code: &SessionCode,
        state: &mut SessionState,
        conn: &ConnectionId,
        now_ms: u64,
    ) {
        let Some(participant) = state.participant_mut(conn) else {
            return;
        };
        participant.disconnected_at_ms = Some(now_ms);
        let name = participant.name.clone();

        let manager = self.clone();
        let task_code = code.clone();
        let task_conn = conn.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(manager.grace_period).await;
            manager.evict_expired(&task_code, &task_conn);
        });
        // participant_mut borrow ended above; re-borrow to store the handle
        if let Some(participant) = state.participant_mut(conn) {
            participant.cancel_eviction();
            participant.eviction = Some(task);
        }

        info!(
            "Participant '{}' disconnected from {} ({}s grace)",
            name,
            code,
            self.grace_period.as_secs()
        );
        state.broadcast(
            &ServerEvent::ParticipantDisconnected {
                participants: state.active_infos(),
                disconnected_name: name,
            },
            None,
        );
    }

    /// Grace-timer expiry path. Idempotent: the session may already be
    /// destroyed, or the participant may have rejoined (new connection id)
    /// or been removed by another path; in all those cases this is a no-op.
    fn evict_expired(&self, code: &SessionCode, conn: &ConnectionId) {
        let Some(session) = self.store.lookup(code) else {
            return;
        };
        let mut state = session.state.lock();
        let still_disconnected = state
            .participant(conn)
            .map(|p| p.in_grace())
            .unwrap_or(false);
        if !still_disconnected {
            debug!("Eviction timer fired for {} but slot was reclaimed", conn);
            return;
        }
        info!("Grace period expired for connection {} in {}", conn, code);
        self.remove_and_settle(code, &mut state, conn);
        self.store.unbind(conn);
    }

    /// Shared removal routine for explicit leave and grace expiry: drops
    /// the participant, destroys the session if it emptied, otherwise
    /// transfers host authority and notifies the rest.
    fn remove_and_settle(&self, code: &SessionCode, state: &mut SessionState, conn: &ConnectionId) {
        let Some(pos) = state
            .participants
            .iter()
            .position(|p| &p.connection_id == conn)
        else {
            return;
        };
        let departed = state.participants.remove(pos);

        if state.participants.is_empty() {
            self.store.destroy(code);
            return;
        }

        if departed.is_host {
            self.promote_next_host(state);
        }

        state.broadcast(
            &ServerEvent::ParticipantLeft {
                participants: state.active_infos(),
            },
            None,
        );
    }

    /// Promotes the first non-grace participant in stable join order. When
    /// everyone left is in grace, the flag goes to the first slot anyway so
    /// the single-host invariant holds; `host_connection_id` gets re-pointed
    /// when that participant rejoins.
    fn promote_next_host(&self, state: &mut SessionState) {
        let idx = state
            .participants
            .iter()
            .position(|p| !p.in_grace())
            .unwrap_or(0);
        let promoted = &mut state.participants[idx];
        promoted.is_host = true;
        let conn = promoted.connection_id.clone();
        let name = promoted.name.clone();
        state.host_connection_id = conn;
        info!("Host authority transferred to '{}'", name);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
