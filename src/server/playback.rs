/// Authoritative per-session description of what is playing, where, and
/// since when. The host is the sole source of truth: reported positions are
/// stored as-is, never reconciled against a server-side estimate.
///
/// Modeled as a tagged state so that "playing with no current track" is
/// unrepresentable. `since_ms` is the wall-clock stamp of the last position
/// write; the true elapsed position while `Playing` is
/// `position_secs + (now - since_ms) / 1000`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Idle,
    Playing {
        index: usize,
        position_secs: f64,
        since_ms: u64,
    },
    Paused {
        index: usize,
        position_secs: f64,
    },
}

impl PlaybackState {
    /// Starts the track at `index` from position zero.
    pub fn play(&mut self, index: usize, now_ms: u64) {
        *self = Self::Playing {
            index,
            position_secs: 0.0,
            since_ms: now_ms,
        };
    }

    /// Records the host-reported position and stops the clock. No-op when
    /// nothing is current.
    pub fn pause(&mut self, position_secs: f64) {
        match *self {
            Self::Playing { index, .. } | Self::Paused { index, .. } => {
                *self = Self::Paused {
                    index,
                    position_secs,
                };
            }
            Self::Idle => {}
        }
    }

    /// Restarts the clock at the host-reported position. No-op when nothing
    /// is current.
    pub fn resume(&mut self, position_secs: f64, now_ms: u64) {
        match *self {
            Self::Playing { index, .. } | Self::Paused { index, .. } => {
                *self = Self::Playing {
                    index,
                    position_secs,
                    since_ms: now_ms,
                };
            }
            Self::Idle => {}
        }
    }

    /// Updates the position without changing play/pause state.
    pub fn seek(&mut self, position_secs: f64, now_ms: u64) {
        match self {
            Self::Playing {
                position_secs: pos,
                since_ms,
                ..
            } => {
                *pos = position_secs;
                *since_ms = now_ms;
            }
            Self::Paused {
                position_secs: pos, ..
            } => *pos = position_secs,
            Self::Idle => {}
        }
    }

    /// Periodic host tick: idempotently overwrites position and play state
    /// to correct accumulated estimation drift between discrete transitions.
    pub fn sync(&mut self, position_secs: f64, is_playing: bool, now_ms: u64) {
        if is_playing {
            self.resume(position_secs, now_ms);
        } else {
            self.pause(position_secs);
        }
    }

    /// Adjusts the machine after the playlist entry at `removed` is deleted.
    /// Removing the current track collapses to `Idle`; removing an earlier
    /// track shifts the index down so it keeps naming the same song.
    /// Returns true when the machine collapsed.
    pub fn remove_track(&mut self, removed: usize) -> bool {
        let index = match *self {
            Self::Playing { index, .. } | Self::Paused { index, .. } => index,
            Self::Idle => return false,
        };

        if index == removed {
            *self = Self::Idle;
            return true;
        }
        if index > removed {
            match self {
                Self::Playing { index, .. } | Self::Paused { index, .. } => *index -= 1,
                Self::Idle => unreachable!(),
            }
        }
        false
    }

    /// Current playlist index, -1 when idle.
    pub fn current_index(&self) -> i64 {
        match *self {
            Self::Playing { index, .. } | Self::Paused { index, .. } => index as i64,
            Self::Idle => -1,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    /// Timestamp-consistent position estimate for late joiners. While
    /// `Playing` the stored position is advanced by the elapsed wall time;
    /// otherwise the stored position is exact.
    pub fn estimated_position(&self, now_ms: u64) -> f64 {
        match *self {
            Self::Playing {
                position_secs,
                since_ms,
                ..
            } => position_secs + now_ms.saturating_sub(since_ms) as f64 / 1000.0,
            Self::Paused { position_secs, .. } => position_secs,
            Self::Idle => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
