use axum::extract::ws::Message;
use parking_lot::Mutex;

use crate::common::types::{ConnectionId, SessionCode, SessionId};
use crate::protocol::{ParticipantInfo, ServerEvent, Song, SyncState};
use crate::server::playback::PlaybackState;

/// One participant of a session. The connection id is transport-level and
/// changes across reconnects; `name` is the stable logical identity used to
/// reconcile a reconnecting client with its old slot.
pub struct Participant {
    pub connection_id: ConnectionId,
    pub name: String,
    pub is_host: bool,
    /// Whether this client drives its own local playback or only mirrors
    /// the host's broadcast clock.
    pub listens_locally: bool,
    /// Set while the participant is in its reconnection grace period.
    pub disconnected_at_ms: Option<u64>,
    /// Pending eviction task for the grace period. Owned by this record;
    /// aborted on rejoin or removal.
    pub eviction: Option<tokio::task::JoinHandle<()>>,
    /// Outgoing message channel for this participant's connection.
    pub sender: flume::Sender<Message>,
}

impl Participant {
    pub fn new(
        connection_id: ConnectionId,
        name: String,
        is_host: bool,
        listens_locally: bool,
        sender: flume::Sender<Message>,
    ) -> Self {
        Self {
            connection_id,
            name,
            is_host,
            listens_locally,
            disconnected_at_ms: None,
            eviction: None,
            sender,
        }
    }

    pub fn in_grace(&self) -> bool {
        self.disconnected_at_ms.is_some()
    }

    /// Cancels the pending eviction task, if any. Safe to call on any path
    /// that removes or reconnects the participant; canceling an already
    /// fired or absent timer is a no-op.
    pub fn cancel_eviction(&mut self) {
        if let Some(task) = self.eviction.take() {
            task.abort();
        }
    }

    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.connection_id.clone(),
            name: self.name.clone(),
            is_host: self.is_host,
            listens_locally: self.listens_locally,
        }
    }

    /// Sends a single event to this participant. Fire-and-forget: a closed
    /// channel just means the connection is already gone.
    pub fn send(&self, event: &ServerEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = self.sender.send(Message::Text(json.into()));
        }
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.cancel_eviction();
    }
}

/// Mutable state of a session, guarded by the session mutex so that no two
/// events for the same session are ever applied out of order.
pub struct SessionState {
    pub host_connection_id: ConnectionId,
    pub participants: Vec<Participant>,
    pub playlist: Vec<Song>,
    pub playback: PlaybackState,
}

impl SessionState {
    pub fn participant(&self, conn: &ConnectionId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.connection_id == conn)
    }

    pub fn participant_mut(&mut self, conn: &ConnectionId) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| &p.connection_id == conn)
    }

    pub fn is_host(&self, conn: &ConnectionId) -> bool {
        &self.host_connection_id == conn
    }

    /// Participant list as broadcast to clients. Grace-period participants
    /// are excluded, though they still count toward session liveness.
    pub fn active_infos(&self) -> Vec<ParticipantInfo> {
        self.participants
            .iter()
            .filter(|p| !p.in_grace())
            .map(Participant::info)
            .collect()
    }

    /// Broadcast primitive at the transport boundary: sends `event` to every
    /// connected participant, optionally excluding the originating sender.
    pub fn broadcast(&self, event: &ServerEvent, exclude: Option<&ConnectionId>) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!("Failed to serialize broadcast event: {}", err);
                return;
            }
        };
        for participant in &self.participants {
            if participant.in_grace() {
                continue;
            }
            if exclude == Some(&participant.connection_id) {
                continue;
            }
            let _ = participant
                .sender
                .send(Message::Text(json.clone().into()));
        }
    }

    /// Full-state snapshot with the clock-reconciled position estimate.
    pub fn sync_state(&self, now_ms: u64) -> SyncState {
        SyncState {
            playlist: self.playlist.clone(),
            current_index: self.playback.current_index(),
            is_playing: self.playback.is_playing(),
            current_time: self.playback.estimated_position(now_ms),
        }
    }
}

/// One shared-listening group. Owned exclusively by the session store;
/// handlers get `Arc` clones and serialize all mutation through `state`.
pub struct Session {
    pub session_id: SessionId,
    pub code: SessionCode,
    pub state: Mutex<SessionState>,
}

impl Session {
    pub fn new(code: SessionCode, host: Participant) -> Self {
        let session_id = SessionId::for_code(&code);
        let host_connection_id = host.connection_id.clone();
        Self {
            session_id,
            code,
            state: Mutex::new(SessionState {
                host_connection_id,
                participants: vec![host],
                playlist: Vec::new(),
                playback: PlaybackState::Idle,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
