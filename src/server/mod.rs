pub mod app_state;
pub mod membership;
pub mod playback;
pub mod session;
pub mod store;

pub use app_state::{AppState, now_ms};
pub use membership::MembershipManager;
pub use playback::PlaybackState;
pub use session::{Participant, Session, SessionState};
pub use store::SessionStore;
