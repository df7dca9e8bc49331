use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use tracing::{debug, info};

use crate::common::errors::{RelayError, RelayResult};
use crate::common::types::{ConnectionId, SessionCode};
use crate::configs::SessionConfig;
use crate::protocol::{ClientEvent, ServerEvent, Song};
use crate::server::app_state::now_ms;
use crate::server::membership::MembershipManager;
use crate::server::session::{Participant, Session, SessionState};
use crate::server::store::SessionStore;

const DEFAULT_HOST_NAME: &str = "Host";
const DEFAULT_GUEST_NAME: &str = "Guest";

/// Server-side handle for one WebSocket connection: its transport identity
/// plus the outgoing message channel the socket task drains.
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub sender: flume::Sender<Message>,
}

impl ConnectionHandle {
    pub fn new(sender: flume::Sender<Message>) -> Self {
        Self {
            id: ConnectionId::generate(),
            sender,
        }
    }

    /// Sends an event to this connection only.
    pub fn send(&self, event: &ServerEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = self.sender.send(Message::Text(json.into()));
        }
    }
}

/// Validates inbound client events, mutates session state under the
/// per-session lock, and fans derived events out to the right subset of
/// connections.
///
/// Authorization model: playback transport control (`play-song`,
/// `pause-song`, `resume-song`, `seek-song`, `sync-playback`) is host-only;
/// playlist mutation is collaborative and accepted from any participant.
/// Unauthorized and unresolvable events are dropped, never errored - they
/// are expected from stale client UI and from races against grace-timer
/// eviction.
pub struct RelayEngine {
    store: Arc<SessionStore>,
    membership: MembershipManager,
}

impl RelayEngine {
    pub fn new(store: Arc<SessionStore>, session_config: &SessionConfig) -> Self {
        let membership = MembershipManager::new(
            store.clone(),
            Duration::from_secs(session_config.grace_period_secs),
        );
        Self { store, membership }
    }

    /// Entry point for one inbound event, stamped with the current wall
    /// clock.
    pub fn handle_event(&self, conn: &ConnectionHandle, event: ClientEvent) {
        self.handle_event_at(conn, event, now_ms());
    }

    /// Same as [`handle_event`](Self::handle_event) but with an explicit
    /// timestamp, which keeps clock-dependent behavior testable.
    pub fn handle_event_at(&self, conn: &ConnectionHandle, event: ClientEvent, now_ms: u64) {
        match event {
            ClientEvent::CreateSession {
                name,
                playlist,
                current_index,
                is_playing,
                current_time,
            } => self.on_create(
                conn,
                name,
                playlist,
                current_index,
                is_playing,
                current_time,
                now_ms,
            ),
            ClientEvent::JoinSession {
                code,
                name,
                listen_locally,
            } => self.on_join(conn, code, name, listen_locally, now_ms),
            ClientEvent::RejoinSession {
                code,
                name,
                listen_locally,
            } => self.on_rejoin(conn, code, name, listen_locally, now_ms),
            ClientEvent::LeaveSession => self.on_leave(conn),
            ClientEvent::AddSong { song } => self.on_add_song(conn, song),
            ClientEvent::RemoveSong { index } => self.on_remove_song(conn, index),
            ClientEvent::PlaySong { index } => self.on_play_song(conn, index, now_ms),
            ClientEvent::PauseSong { current_time } => self.on_pause_song(conn, current_time),
            ClientEvent::ResumeSong { current_time } => {
                self.on_resume_song(conn, current_time, now_ms)
            }
            ClientEvent::SeekSong { current_time } => self.on_seek_song(conn, current_time, now_ms),
            ClientEvent::SyncPlayback {
                current_time,
                is_playing,
            } => self.on_sync_playback(conn, current_time, is_playing, now_ms),
            ClientEvent::UpdateListenMode { listen_locally } => {
                self.on_update_listen_mode(conn, listen_locally)
            }
        }
    }

    /// Transport-level disconnect: the participant keeps its slot (and host
    /// status) for the grace period instead of being evicted outright.
    pub fn handle_disconnect(&self, conn: &ConnectionHandle) {
        let Some(session) = self.store.session_for(&conn.id) else {
            return;
        };
        {
            let mut state = session.state.lock();
            self.membership
                .begin_grace(&session.code, &mut state, &conn.id, now_ms());
        }
        self.store.unbind(&conn.id);
    }

    // -- session lifecycle --------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn on_create(
        &self,
        conn: &ConnectionHandle,
        name: Option<String>,
        playlist: Vec<Song>,
        current_index: Option<i64>,
        is_playing: bool,
        current_time: f64,
        now_ms: u64,
    ) {
        let name = display_name(name, DEFAULT_HOST_NAME);
        let host = Participant::new(conn.id.clone(), name, true, true, conn.sender.clone());
        let session = self.store.create(host);

        let mut state = session.state.lock();
        state.playlist = playlist;
        if let Some(index) = current_index {
            if index >= 0 && (index as usize) < state.playlist.len() {
                let index = index as usize;
                if is_playing {
                    state.playback.play(index, now_ms);
                    state.playback.seek(current_time, now_ms);
                } else {
                    state.playback.play(index, now_ms);
                    state.playback.pause(current_time);
                }
            }
        }

        conn.send(&ServerEvent::SessionCreated {
            session_id: session.session_id.clone(),
            code: session.code.clone(),
        });
        state.broadcast(
            &ServerEvent::ParticipantJoined {
                participants: state.active_infos(),
            },
            None,
        );
    }

    fn on_join(
        &self,
        conn: &ConnectionHandle,
        code: String,
        name: Option<String>,
        listen_locally: Option<bool>,
        now_ms: u64,
    ) {
        let code = SessionCode::from(code);
        let Some(session) = self.store.lookup(&code) else {
            info!("{}", RelayError::SessionNotFound(code));
            conn.send(&ServerEvent::Error {
                message: "Session not found".to_string(),
            });
            return;
        };

        let name = display_name(name, DEFAULT_GUEST_NAME);
        {
            let mut state = session.state.lock();
            self.membership.join(
                &mut state,
                name,
                listen_locally.unwrap_or(true),
                conn.id.clone(),
                conn.sender.clone(),
            );
            self.reply_joined(conn, &session, &state, None, now_ms);
        }
        self.store.bind(conn.id.clone(), code);
    }

    fn on_rejoin(
        &self,
        conn: &ConnectionHandle,
        code: String,
        name: Option<String>,
        listen_locally: Option<bool>,
        now_ms: u64,
    ) {
        let code = SessionCode::from(code);
        let Some(session) = self.store.lookup(&code) else {
            info!("{}", RelayError::SessionExpired(code));
            conn.send(&ServerEvent::SessionExpired);
            return;
        };

        let name = display_name(name, DEFAULT_GUEST_NAME);
        {
            let mut state = session.state.lock();
            let outcome = self.membership.rejoin(
                &mut state,
                name,
                listen_locally.unwrap_or(true),
                conn.id.clone(),
                conn.sender.clone(),
            );
            debug!(
                "Rejoin to {}: reconnect={} host={}",
                code, outcome.was_reconnect, outcome.is_host
            );
            self.reply_joined(conn, &session, &state, Some(outcome.is_host), now_ms);
        }
        self.store.bind(conn.id.clone(), code);
    }

    /// Shared join/rejoin reply: `session-joined` and the clock-reconciled
    /// `sync-state` go to the requester only, then everyone in the session
    /// gets the refreshed participant list.
    fn reply_joined(
        &self,
        conn: &ConnectionHandle,
        session: &Session,
        state: &SessionState,
        is_host: Option<bool>,
        now_ms: u64,
    ) {
        conn.send(&ServerEvent::SessionJoined {
            session_id: session.session_id.clone(),
            code: session.code.clone(),
            participants: state.active_infos(),
            is_host,
        });
        conn.send(&ServerEvent::SyncState {
            state: state.sync_state(now_ms),
        });
        state.broadcast(
            &ServerEvent::ParticipantJoined {
                participants: state.active_infos(),
            },
            Some(&conn.id),
        );
    }

    fn on_leave(&self, conn: &ConnectionHandle) {
        let Some(session) = self.store.session_for(&conn.id) else {
            return;
        };
        {
            let mut state = session.state.lock();
            self.membership
                .leave_immediate(&session.code, &mut state, &conn.id);
        }
        self.store.unbind(&conn.id);
    }

    // -- playlist (collaborative, any participant) --------------------------

    fn on_add_song(&self, conn: &ConnectionHandle, song: Song) {
        let Ok(session) = self.resolve(&conn.id) else {
            return;
        };
        let mut state = session.state.lock();
        state.playlist.push(song.clone());
        state.broadcast(&ServerEvent::SongAdded { song }, Some(&conn.id));
    }

    fn on_remove_song(&self, conn: &ConnectionHandle, index: usize) {
        let Ok(session) = self.resolve(&conn.id) else {
            return;
        };
        let mut state = session.state.lock();
        if index >= state.playlist.len() {
            debug!("Dropping remove-song with out-of-range index {}", index);
            return;
        }
        state.playlist.remove(index);
        state.broadcast(&ServerEvent::SongRemoved { index }, Some(&conn.id));

        // Removing the current track collapses playback; everyone, the
        // remover included, gets told there is no current track anymore.
        if state.playback.remove_track(index) {
            state.broadcast(&ServerEvent::PlaybackCleared, None);
        }
    }

    // -- playback transport (host only) -------------------------------------

    fn on_play_song(&self, conn: &ConnectionHandle, index: usize, now_ms: u64) {
        let Ok(session) = self.resolve(&conn.id) else {
            return;
        };
        let mut state = session.state.lock();
        if self.host_gate(&state, &conn.id).is_err() {
            return;
        }
        if index >= state.playlist.len() {
            debug!("Dropping play-song with out-of-range index {}", index);
            return;
        }
        state.playback.play(index, now_ms);
        state.broadcast(&ServerEvent::SongPlayed { index }, Some(&conn.id));
    }

    fn on_pause_song(&self, conn: &ConnectionHandle, current_time: f64) {
        let Ok(session) = self.resolve(&conn.id) else {
            return;
        };
        let mut state = session.state.lock();
        if self.host_gate(&state, &conn.id).is_err() || state.playback.current_index() < 0 {
            return;
        }
        state.playback.pause(current_time);
        state.broadcast(&ServerEvent::SongPaused { current_time }, Some(&conn.id));
    }

    fn on_resume_song(&self, conn: &ConnectionHandle, current_time: f64, now_ms: u64) {
        let Ok(session) = self.resolve(&conn.id) else {
            return;
        };
        let mut state = session.state.lock();
        if self.host_gate(&state, &conn.id).is_err() || state.playback.current_index() < 0 {
            return;
        }
        state.playback.resume(current_time, now_ms);
        state.broadcast(&ServerEvent::SongResumed { current_time }, Some(&conn.id));
    }

    fn on_seek_song(&self, conn: &ConnectionHandle, current_time: f64, now_ms: u64) {
        let Ok(session) = self.resolve(&conn.id) else {
            return;
        };
        let mut state = session.state.lock();
        if self.host_gate(&state, &conn.id).is_err() || state.playback.current_index() < 0 {
            return;
        }
        state.playback.seek(current_time, now_ms);
        state.broadcast(&ServerEvent::SongSeeked { current_time }, Some(&conn.id));
    }

    fn on_sync_playback(
        &self,
        conn: &ConnectionHandle,
        current_time: f64,
        is_playing: bool,
        now_ms: u64,
    ) {
        let Ok(session) = self.resolve(&conn.id) else {
            return;
        };
        let mut state = session.state.lock();
        if self.host_gate(&state, &conn.id).is_err() || state.playback.current_index() < 0 {
            return;
        }
        state.playback.sync(current_time, is_playing, now_ms);
        state.broadcast(
            &ServerEvent::PlaybackSynced {
                current_time,
                is_playing,
            },
            Some(&conn.id),
        );
    }

    // -- participant preferences --------------------------------------------

    fn on_update_listen_mode(&self, conn: &ConnectionHandle, listen_locally: bool) {
        let Ok(session) = self.resolve(&conn.id) else {
            return;
        };
        let mut state = session.state.lock();
        let Some(participant) = state.participant_mut(&conn.id) else {
            return;
        };
        participant.listens_locally = listen_locally;
        state.broadcast(
            &ServerEvent::ParticipantUpdated {
                participants: state.active_infos(),
            },
            None,
        );
    }

    // -- helpers ------------------------------------------------------------

    /// Resolves the sender's session. Events from connections that are not
    /// bound, or whose session was reclaimed by a racing eviction, are
    /// discarded here.
    fn resolve(&self, conn: &ConnectionId) -> RelayResult<Arc<Session>> {
        self.store.session_for(conn).ok_or_else(|| {
            let err = RelayError::NotInSession(conn.clone());
            debug!("Dropping event: {}", err);
            err
        })
    }

    /// Host-only check. A failure is logged at debug and otherwise silent:
    /// stale non-host UI is expected, not malicious.
    fn host_gate(&self, state: &SessionState, conn: &ConnectionId) -> RelayResult<()> {
        if state.is_host(conn) {
            Ok(())
        } else {
            let err = RelayError::Unauthorized(conn.clone());
            debug!("Ignoring playback control: {}", err);
            Err(err)
        }
    }
}

fn display_name(name: Option<String>, fallback: &str) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name,
        _ => fallback.to_string(),
    }
}
