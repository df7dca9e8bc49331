use serde::{Deserialize, Serialize};

use crate::common::types::{SessionCode, SessionId};
use crate::protocol::models::{ParticipantInfo, Song, SyncState};

/// Messages sent from client to server over WebSocket.
///
/// Playback-control events (`play-song`, `pause-song`, `resume-song`,
/// `seek-song`, `sync-playback`) are host-gated by the relay engine;
/// playlist mutations are accepted from any participant.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    CreateSession {
        #[serde(default)]
        name: Option<String>,
        /// Hosts may open a session over an in-progress local playlist;
        /// the seed lets late guests sync to it instead of an empty state.
        #[serde(default)]
        playlist: Vec<Song>,
        #[serde(default)]
        current_index: Option<i64>,
        #[serde(default)]
        is_playing: bool,
        #[serde(default)]
        current_time: f64,
    },
    JoinSession {
        code: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        listen_locally: Option<bool>,
    },
    RejoinSession {
        code: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        listen_locally: Option<bool>,
    },
    AddSong {
        song: Song,
    },
    RemoveSong {
        index: usize,
    },
    PlaySong {
        index: usize,
    },
    PauseSong {
        current_time: f64,
    },
    ResumeSong {
        current_time: f64,
    },
    SeekSong {
        current_time: f64,
    },
    SyncPlayback {
        current_time: f64,
        is_playing: bool,
    },
    UpdateListenMode {
        listen_locally: bool,
    },
    LeaveSession,
}

/// Messages sent from server to client over WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    SessionCreated {
        session_id: SessionId,
        code: SessionCode,
    },
    SessionJoined {
        session_id: SessionId,
        code: SessionCode,
        participants: Vec<ParticipantInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_host: Option<bool>,
    },
    /// Reply to `rejoin-session` when the code no longer resolves.
    SessionExpired,
    Error {
        message: String,
    },
    /// Requester-only snapshot with the reconciled clock estimate.
    SyncState {
        #[serde(flatten)]
        state: SyncState,
    },
    ParticipantJoined {
        participants: Vec<ParticipantInfo>,
    },
    ParticipantLeft {
        participants: Vec<ParticipantInfo>,
    },
    /// A participant dropped at the transport level and entered its
    /// reconnection grace period. Distinct from `participant-left`.
    ParticipantDisconnected {
        participants: Vec<ParticipantInfo>,
        disconnected_name: String,
    },
    ParticipantUpdated {
        participants: Vec<ParticipantInfo>,
    },
    SongAdded {
        song: Song,
    },
    SongRemoved {
        index: usize,
    },
    SongPlayed {
        index: usize,
    },
    SongPaused {
        current_time: f64,
    },
    SongResumed {
        current_time: f64,
    },
    SongSeeked {
        current_time: f64,
    },
    PlaybackSynced {
        current_time: f64,
        is_playing: bool,
    },
    /// The current track was removed from the playlist; observers should
    /// show "nothing playing".
    PlaybackCleared,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_tags() {
        let ev: ClientEvent =
            serde_json::from_str(r#"{"op":"join-session","code":"AB23CD","name":"Ana"}"#).unwrap();
        match ev {
            ClientEvent::JoinSession { code, name, .. } => {
                assert_eq!(code, "AB23CD");
                assert_eq!(name.as_deref(), Some("Ana"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let ev: ClientEvent =
            serde_json::from_str(r#"{"op":"pause-song","currentTime":42.5}"#).unwrap();
        assert!(matches!(
            ev,
            ClientEvent::PauseSong { current_time } if current_time == 42.5
        ));

        let ev: ClientEvent = serde_json::from_str(r#"{"op":"leave-session"}"#).unwrap();
        assert!(matches!(ev, ClientEvent::LeaveSession));
    }

    #[test]
    fn test_create_session_optional_seed() {
        let ev: ClientEvent =
            serde_json::from_str(r#"{"op":"create-session","name":"Host"}"#).unwrap();
        match ev {
            ClientEvent::CreateSession {
                playlist,
                current_index,
                is_playing,
                ..
            } => {
                assert!(playlist.is_empty());
                assert!(current_index.is_none());
                assert!(!is_playing);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_server_event_wire_format() {
        let ev = ServerEvent::SessionCreated {
            session_id: SessionId("jam_AB23CD".to_string()),
            code: SessionCode("AB23CD".to_string()),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&ev).unwrap()).unwrap();
        assert_eq!(json["op"], "session-created");
        assert_eq!(json["sessionId"], "jam_AB23CD");
        assert_eq!(json["code"], "AB23CD");

        let ev = ServerEvent::SessionExpired;
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&ev).unwrap()).unwrap();
        assert_eq!(json["op"], "session-expired");
    }

    #[test]
    fn test_sync_state_is_flattened() {
        let ev = ServerEvent::SyncState {
            state: SyncState {
                playlist: vec![],
                current_index: -1,
                is_playing: false,
                current_time: 0.0,
            },
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&ev).unwrap()).unwrap();
        assert_eq!(json["op"], "sync-state");
        assert_eq!(json["currentIndex"], -1);
        assert_eq!(json["isPlaying"], false);
    }

    #[test]
    fn test_session_joined_omits_absent_host_flag() {
        let ev = ServerEvent::SessionJoined {
            session_id: SessionId("jam_AB23CD".to_string()),
            code: SessionCode("AB23CD".to_string()),
            participants: vec![],
            is_host: None,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(!json.contains("isHost"));
    }
}
