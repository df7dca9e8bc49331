use serde::{Deserialize, Serialize};

use crate::common::types::ConnectionId;

/// One entry of the shared playlist. Immutable value; two songs are the
/// same song when their external video ids match, whatever the display
/// metadata says. Duplicate rejection lives in the client playlist layer,
/// the relay never re-validates uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub channel: String,
}

impl PartialEq for Song {
    fn eq(&self, other: &Self) -> bool {
        self.video_id == other.video_id
    }
}

impl Eq for Song {}

/// Participant entry as seen by clients in broadcast lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: ConnectionId,
    pub name: String,
    pub is_host: bool,
    pub listens_locally: bool,
}

/// One-shot full-state snapshot sent to a joining or rejoining connection.
/// `current_time` carries the clock-reconciled position estimate, never the
/// raw stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub playlist: Vec<Song>,
    pub current_index: i64,
    pub is_playing: bool,
    pub current_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_song_equality_is_by_video_id() {
        let a = Song {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: "Never Gonna Give You Up".to_string(),
            channel: "Rick Astley".to_string(),
        };
        let b = Song {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: "never gonna give you up (remaster)".to_string(),
            channel: String::new(),
        };
        let c = Song {
            video_id: "9bZkp7q19f0".to_string(),
            title: "Gangnam Style".to_string(),
            channel: "officialpsy".to_string(),
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_song_wire_format() {
        let json = r#"{"videoId":"abc123","title":"A Song"}"#;
        let song: Song = serde_json::from_str(json).unwrap();
        assert_eq!(song.video_id, "abc123");
        assert_eq!(song.channel, "");
    }
}
